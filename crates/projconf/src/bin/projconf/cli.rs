//! projconf cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; projconf ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the merged project configuration
    Resolve(ResolveCommand),

    /// Print the effective default tasks
    DefaultTasks(DefaultTasksCommand),

    /// Print the flags that apply to a file
    Flags(FlagsCommand),
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct DefaultTasksCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Tasks used when the configuration sets none
    #[clap(long = "fallback", default_value = "test:all")]
    pub fallback: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct FlagsCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Configuration section holding the flags
    #[clap(long = "section", default_value = projconf::flags::FLAGS_SECTION)]
    pub section: String,

    /// Flag context, e.g. test or release
    #[clap(short = 'x', long = "context")]
    pub context: String,

    /// Operation within the context, e.g. compile or link
    #[clap(short = 'o', long = "operation")]
    pub operation: Option<String>,

    /// File the flags are resolved for
    pub filepath: String,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Project file (defaults to $PROJCONF_PROJECT_FILE or project.yml)
    #[clap(short = 'p', long = "project")]
    pub project: Option<PathBuf>,

    /// Mixin name or filepath, can be given multiple times
    #[clap(short = 'm', long = "mixin")]
    pub mixins: Vec<String>,

    /// Directory with built-in mixins, searched after the configured load paths
    #[clap(long = "builtin-mixins")]
    pub builtin_mixins: Option<PathBuf>,

    /// Only log loading progress at debug level
    #[clap(short = 's', long = "silent")]
    pub silent: bool,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
