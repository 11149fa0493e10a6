mod cli;

use projconf::env::{Env, EnvMixinVars};
use projconf::project::FsProject;
use projconf::{ConfigTree, FlagTable, LoadOptions, Loader};
use std::path::PathBuf;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("PROJCONF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli),
        cli::Command::DefaultTasks(tasks_cli) => default_tasks(tasks_cli),
        cli::Command::Flags(flags_cli) => flags(flags_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn resolve(cli: cli::ResolveCommand) -> anyhow::Result<()> {
    let (_, config) = load(&cli.input)?;

    match cli.output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), &config)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), &config)?,
    };

    Ok(())
}

pub fn default_tasks(cli: cli::DefaultTasksCommand) -> anyhow::Result<()> {
    let (_, mut config) = load(&cli.input)?;

    for task in projconf::default_tasks(&mut config, &cli.fallback) {
        println!("{task}");
    }

    Ok(())
}

pub fn flags(cli: cli::FlagsCommand) -> anyhow::Result<()> {
    let (_, config) = load(&cli.input)?;
    let table = FlagTable::from_section(&config, &cli.section)?;

    if !table.flags_defined(&cli.context, cli.operation.as_deref()) {
        tracing::info!(
            section = cli.section,
            context = cli.context,
            operation = cli.operation,
            "no flags configured"
        );
    }

    for flag in table.flag_down(&cli.context, cli.operation.as_deref(), &cli.filepath) {
        println!("{flag}");
    }

    Ok(())
}

fn load(input: &cli::InputArgs) -> anyhow::Result<(PathBuf, ConfigTree)> {
    let project = match &input.builtin_mixins {
        Some(path) => FsProject::new().with_builtin_load_path(path),
        None => FsProject::new(),
    };
    let loader = Loader::new(project, EnvMixinVars::default());

    let env: Env = std::env::vars().collect();
    let options = LoadOptions::new(
        input.project.clone(),
        input.mixins.clone(),
        env,
        input.silent,
    );

    let (project_filepath, config) = loader.load(options)?;
    tracing::debug!(path=%project_filepath.display(), "configuration loaded");

    Ok((project_filepath, config))
}
