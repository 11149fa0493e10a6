//! configuration loading pipeline
//!
//! [Loader::load] turns a project file plus mixins into one merged [ConfigTree]:
//!
//! 1. load the project file and extract its `mixins` section
//! 2. deduplicate mixin names and load paths
//! 3. validate load paths, project file mixins and command line mixins
//! 4. locate the mixin files
//! 5. collect environment mixins
//! 6. [assemble] all mixins into merge order
//! 7. parse and [merge_mixins] them into the project configuration
//!
//! Any failure aborts the whole load.
use crate::env::{Env, EnvMixinError, EnvMixinVars, EnvMixins};
use crate::mixin::{
    absolute, anchor_filepath, assemble, dedup_load_paths, dedup_names, load_mixin, merge_mixins,
    MixinError, MixinSource,
};
use crate::project::{FsProject, ProjectError, ProjectSource};
use crate::tree::ConfigTree;
use crate::value::Value;
use std::path::{Path, PathBuf};

const DEFAULT_TASKS_PATH: [&str; 2] = ["project", "default_tasks"];

/// Label used when project file mixins fail validation
pub const CONFIG_MIXINS_LABEL: &str = "Project configuration :mixins ↳ :enabled";

/// Label used when command line mixins fail validation
pub const CMDLINE_MIXINS_LABEL: &str = "Command line mixins";

#[derive(derive_new::new, Debug, Default, Clone)]
pub struct LoadOptions {
    /// Explicit project file
    pub filepath: Option<PathBuf>,
    /// Mixin names or filepaths given on the command line
    pub mixins: Vec<String>,
    pub env: Env,
    /// Log loading progress at debug instead of info level
    pub silent: bool,
}

#[derive(Debug, Default)]
pub struct Loader<P = FsProject, E = EnvMixinVars> {
    project: P,
    env_mixins: E,
}

impl<P: ProjectSource, E: EnvMixins> Loader<P, E> {
    pub fn new(project: P, env_mixins: E) -> Self {
        Self {
            project,
            env_mixins,
        }
    }

    /// Load and merge the project configuration, relative paths resolve against the current directory
    pub fn load(&self, options: LoadOptions) -> Result<(PathBuf, ConfigTree), LoadError> {
        let cwd = std::env::current_dir().map_err(LoadError::WorkingDirectory)?;
        self.load_in(options, &cwd)
    }

    /// [Loader::load] with an explicit working directory
    ///
    /// Every relative path (project file, load paths, filepath mixins from any source) is resolved
    /// against `cwd`.
    pub fn load_in(
        &self,
        options: LoadOptions,
        cwd: &Path,
    ) -> Result<(PathBuf, ConfigTree), LoadError> {
        let LoadOptions {
            filepath,
            mixins: cmdline_mixins,
            env,
            silent,
        } = options;

        let (project_filepath, mut config) =
            self.project.load(filepath.as_deref(), &env, cwd, silent)?;

        let (config_mixins, load_paths) = self.project.extract_mixins(&mut config)?;

        let anchor = |mixins: Vec<String>| -> Vec<String> {
            mixins
                .into_iter()
                .map(|mixin| anchor_filepath(mixin, cwd))
                .collect()
        };
        let config_mixins = dedup_names(anchor(config_mixins));
        let cmdline_mixins = dedup_names(anchor(cmdline_mixins));
        let load_paths = dedup_load_paths(load_paths, cwd);
        tracing::debug!(?config_mixins, ?cmdline_mixins, ?load_paths, "mixin declarations");

        self.project.validate_mixin_load_paths(&load_paths)?;

        self.project
            .validate_mixins(&config_mixins, &load_paths, MixinSource::Config)
            .map_err(|issues| ValidationFailure::new(CONFIG_MIXINS_LABEL, issues))?;

        self.project
            .validate_mixins(&cmdline_mixins, &load_paths, MixinSource::Cmdline)
            .map_err(|issues| ValidationFailure::new(CMDLINE_MIXINS_LABEL, issues))?;

        let config_mixins =
            self.project
                .lookup_mixins(&config_mixins, &load_paths, MixinSource::Config)?;
        let cmdline_mixins =
            self.project
                .lookup_mixins(&cmdline_mixins, &load_paths, MixinSource::Cmdline)?;

        let env_mixins: Vec<_> = self
            .env_mixins
            .fetch_env_filepaths(&env)
            .into_iter()
            .map(|mut entry| {
                entry.filepath = absolute(&entry.filepath, cwd);
                entry
            })
            .collect();
        self.env_mixins.validate_env_filepaths(&env_mixins)?;

        let resolved = assemble(config_mixins, env_mixins, cmdline_mixins)
            .into_iter()
            .map(load_mixin)
            .collect::<Result<Vec<_>, _>>()?;

        let config = merge_mixins(config, resolved, silent)?;

        Ok((project_filepath, config))
    }

    /// See [default_tasks]
    pub fn default_tasks(&self, config: &mut ConfigTree, fallback: &[String]) -> Vec<String> {
        default_tasks(config, fallback)
    }
}

/// Effective default task list
///
/// A non-empty `project.default_tasks` in `config` wins and a copy of it is returned. Otherwise
/// `fallback` is written to `project.default_tasks` and returned, so later readers (and later
/// calls) see it as configured.
pub fn default_tasks(config: &mut ConfigTree, fallback: &[String]) -> Vec<String> {
    let configured: Vec<String> = match config.get(&DEFAULT_TASKS_PATH) {
        Some(Value::Array(tasks)) => tasks.iter().filter_map(Value::scalar_string).collect(),
        Some(Value::String(task)) => vec![task.clone()],
        _ => vec![],
    };

    if !configured.is_empty() {
        return configured;
    }

    tracing::debug!(?fallback, "default tasks not configured");
    let tree = std::mem::take(config);
    *config = tree.merge_at(&DEFAULT_TASKS_PATH, fallback.to_vec().into());

    fallback.to_vec()
}

/// Mixins from one source that failed validation
#[derive(Debug)]
pub struct ValidationFailure {
    pub label: &'static str,
    pub issues: Vec<MixinError>,
}

impl ValidationFailure {
    pub fn new(label: &'static str, issues: Vec<MixinError>) -> Self {
        Self { label, issues }
    }
}

impl std::error::Error for ValidationFailure {}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed validation", self.label)?;
        for issue in &self.issues {
            write!(f, "\n - {issue}")?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("Unable to determine working directory")]
    WorkingDirectory(#[source] std::io::Error),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    EnvMixins(#[from] EnvMixinError),
    #[error(transparent)]
    Mixin(#[from] MixinError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config_tree;
    use pretty_assertions::assert_eq;

    fn tasks(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn default_tasks_persist_fallback() {
        let mut config = config_tree!("project:\n  build_root: build\n");

        assert_eq!(default_tasks(&mut config, &tasks(&["test"])), tasks(&["test"]));
        assert_eq!(
            config.get(&DEFAULT_TASKS_PATH),
            Some(&Value::from(vec!["test"]))
        );

        // idempotent once written
        assert_eq!(default_tasks(&mut config, &tasks(&["release"])), tasks(&["test"]));
        assert_eq!(config.get(&["project", "build_root"]), Some(&Value::from("build")));
    }

    #[test]
    fn default_tasks_prefer_configuration() {
        let mut config = config_tree!("project:\n  default_tasks: [clobber, test]\n");
        let mut resolved = default_tasks(&mut config, &tasks(&["release"]));
        assert_eq!(resolved, tasks(&["clobber", "test"]));

        // the returned list is a copy
        resolved.push("extra".into());
        assert_eq!(
            config.get(&DEFAULT_TASKS_PATH),
            Some(&Value::from(vec!["clobber", "test"]))
        );
    }

    #[test]
    fn default_tasks_empty_list_counts_as_unset() {
        let mut config = config_tree!("project:\n  default_tasks: []\n");
        assert_eq!(default_tasks(&mut config, &tasks(&["test"])), tasks(&["test"]));
        assert_eq!(
            config.get(&DEFAULT_TASKS_PATH),
            Some(&Value::from(vec!["test"]))
        );
    }

    #[test]
    fn validation_failure_lists_issues() {
        let failure = ValidationFailure::new(
            CMDLINE_MIXINS_LABEL,
            vec![MixinError::Unresolved {
                name: "gcov".into(),
                origin: MixinSource::Cmdline,
            }],
        );

        assert_eq!(
            failure.to_string(),
            "Command line mixins failed validation\n - command line mixin 'gcov' cannot be found in mixin load paths as 'gcov.yml'"
        );
    }
}
