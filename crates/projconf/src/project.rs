//! project file loading and mixin lookup
//!
//! [ProjectSource] is everything the loader needs to know about the project file and mixin load
//! paths. [FsProject] implements it on top of the filesystem.
use crate::env::Env;
use crate::mixin::{
    absolute, has_yaml_extension, is_filepath, LocatedMixin, MixinError, MixinReference,
    MixinSource, MIXINS_SECTION,
};
use crate::tree::{ConfigTree, TreeError};
use crate::value::Value;
use std::path::{Path, PathBuf};

/// Environment variable naming the project file when none is given explicitly
pub const PROJECT_FILE_VAR: &str = "PROJCONF_PROJECT_FILE";

/// Project file used when neither an explicit path nor [PROJECT_FILE_VAR] is given
pub const DEFAULT_PROJECT_FILE: &str = "project.yml";

pub trait ProjectSource {
    /// Load the base project configuration, returning the file it came from
    ///
    /// A relative project file is looked up in `cwd`.
    fn load(
        &self,
        filepath: Option<&Path>,
        env: &Env,
        cwd: &Path,
        silent: bool,
    ) -> Result<(PathBuf, ConfigTree), ProjectError>;

    /// Remove the `mixins` section from `config`, returning `(enabled, load_paths)`
    fn extract_mixins(
        &self,
        config: &mut ConfigTree,
    ) -> Result<(Vec<String>, Vec<PathBuf>), ProjectError>;

    fn validate_mixin_load_paths(&self, paths: &[PathBuf]) -> Result<(), ProjectError>;

    /// Check that every mixin can be found, one issue per mixin that cannot
    fn validate_mixins(
        &self,
        mixins: &[String],
        load_paths: &[PathBuf],
        source: MixinSource,
    ) -> Result<(), Vec<MixinError>>;

    /// Locate each mixin, in declaration order
    fn lookup_mixins(
        &self,
        mixins: &[String],
        load_paths: &[PathBuf],
        source: MixinSource,
    ) -> Result<Vec<LocatedMixin>, MixinError>;
}

/// Filesystem backed [ProjectSource]
#[derive(Debug, Clone, Default)]
pub struct FsProject {
    /// Searched after all configured load paths
    builtin_load_path: Option<PathBuf>,
}

impl FsProject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_load_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.builtin_load_path = Some(path.into());
        self
    }

    fn find_in_load_paths(mixin: &str, load_paths: &[PathBuf]) -> Option<PathBuf> {
        let filename = format!("{mixin}.yml");
        load_paths
            .iter()
            .map(|path| path.join(&filename))
            .find(|candidate| candidate.is_file())
    }
}

impl ProjectSource for FsProject {
    fn load(
        &self,
        filepath: Option<&Path>,
        env: &Env,
        cwd: &Path,
        silent: bool,
    ) -> Result<(PathBuf, ConfigTree), ProjectError> {
        let (filepath, origin) = match (filepath, env.get(PROJECT_FILE_VAR)) {
            (Some(path), _) => (path.to_path_buf(), "command line"),
            (None, Some(path)) => (PathBuf::from(path), PROJECT_FILE_VAR),
            (None, None) => (PathBuf::from(DEFAULT_PROJECT_FILE), "default filepath"),
        };
        let filepath = absolute(&filepath, cwd);

        if !filepath.is_file() {
            return Err(ProjectError::NotFound {
                path: filepath,
                origin,
            });
        }

        if silent {
            tracing::debug!(path=%filepath.display(), origin, "loading project configuration");
        } else {
            tracing::info!(path=%filepath.display(), origin, "loading project configuration");
        }

        let config = ConfigTree::from_yaml_file(&filepath).map_err(|reason| {
            ProjectError::Unparsable {
                path: filepath.clone(),
                reason,
            }
        })?;

        if config.is_empty() {
            return Err(ProjectError::Empty(filepath));
        }

        Ok((filepath, config))
    }

    fn extract_mixins(
        &self,
        config: &mut ConfigTree,
    ) -> Result<(Vec<String>, Vec<PathBuf>), ProjectError> {
        let section = match config.remove(MIXINS_SECTION) {
            None | Some(Value::Null) => Default::default(),
            Some(Value::Object(section)) => section,
            Some(other) => {
                return Err(ProjectError::InvalidMixinsSection(format!(
                    "expected a mapping, found {}",
                    other.kind()
                )))
            }
        };

        let enabled = string_list(section.get("enabled"), "enabled")?;
        let mut load_paths: Vec<PathBuf> = string_list(section.get("load_paths"), "load_paths")?
            .into_iter()
            .map(PathBuf::from)
            .collect();

        if let Some(builtin) = &self.builtin_load_path {
            load_paths.push(builtin.clone());
        }

        Ok((enabled, load_paths))
    }

    fn validate_mixin_load_paths(&self, paths: &[PathBuf]) -> Result<(), ProjectError> {
        let invalid: Vec<PathBuf> = paths.iter().filter(|path| !path.is_dir()).cloned().collect();

        for path in &invalid {
            tracing::error!(path=%path.display(), "mixin load path does not exist");
        }

        if !invalid.is_empty() {
            return Err(ProjectError::InvalidLoadPaths(invalid));
        }

        Ok(())
    }

    fn validate_mixins(
        &self,
        mixins: &[String],
        load_paths: &[PathBuf],
        source: MixinSource,
    ) -> Result<(), Vec<MixinError>> {
        let mut issues = vec![];

        for mixin in mixins {
            if is_filepath(mixin) {
                let path = PathBuf::from(mixin);
                if !path.is_file() {
                    issues.push(MixinError::MissingFile { path, origin: source });
                } else if !has_yaml_extension(&path) {
                    issues.push(MixinError::NotYaml { path, origin: source });
                }
            } else if Self::find_in_load_paths(mixin, load_paths).is_none() {
                issues.push(MixinError::Unresolved {
                    name: mixin.clone(),
                    origin: source,
                });
            }
        }

        for issue in &issues {
            tracing::error!(%issue, "mixin validation");
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    fn lookup_mixins(
        &self,
        mixins: &[String],
        load_paths: &[PathBuf],
        source: MixinSource,
    ) -> Result<Vec<LocatedMixin>, MixinError> {
        mixins
            .iter()
            .map(|mixin| {
                if is_filepath(mixin) {
                    return Ok(LocatedMixin::from_filepath(mixin.as_str(), source));
                }

                let filepath = Self::find_in_load_paths(mixin, load_paths).ok_or_else(|| {
                    MixinError::Unresolved {
                        name: mixin.clone(),
                        origin: source,
                    }
                })?;

                tracing::trace!(mixin, path=%filepath.display(), "found mixin");
                Ok(LocatedMixin::new(
                    MixinReference::new(mixin.clone(), source),
                    filepath,
                ))
            })
            .collect()
    }
}

fn string_list(value: Option<&Value>, key: &'static str) -> Result<Vec<String>, ProjectError> {
    match value {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.scalar_string().ok_or_else(|| {
                    ProjectError::InvalidMixinsSection(format!(
                        ":{key} entries must be strings, found {}",
                        item.kind()
                    ))
                })
            })
            .collect(),
        Some(other) => Err(ProjectError::InvalidMixinsSection(format!(
            ":{key} must be a list, found {}",
            other.kind()
        ))),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Project configuration {} ({origin}) does not exist", .path.display())]
    NotFound { path: PathBuf, origin: &'static str },
    #[error("Unable to load project configuration {}: {reason}", .path.display())]
    Unparsable { path: PathBuf, reason: TreeError },
    #[error("Project configuration {} is empty", .0.display())]
    Empty(PathBuf),
    #[error("Project configuration section :mixins is invalid: {0}")]
    InvalidMixinsSection(String),
    #[error("Mixin load paths do not exist: {0:?}")]
    InvalidLoadPaths(Vec<PathBuf>),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config_tree;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_prefers_explicit_path_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = write(dir.path(), "explicit.yml", "project:\n  name: explicit\n");
        let from_env = write(dir.path(), "env.yml", "project:\n  name: env\n");

        let env: Env = [(PROJECT_FILE_VAR.to_string(), from_env.display().to_string())].into();

        let (path, config) = FsProject::new()
            .load(Some(&explicit), &env, dir.path(), true)
            .unwrap();
        assert_eq!(path, explicit);
        assert_eq!(config.get(&["project", "name"]), Some(&Value::from("explicit")));

        let (path, _) = FsProject::new().load(None, &env, dir.path(), true).unwrap();
        assert_eq!(path, from_env);
    }

    #[test]
    fn load_relative_paths_from_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let default = write(dir.path(), DEFAULT_PROJECT_FILE, "project:\n  name: default\n");
        let explicit = write(dir.path(), "explicit.yml", "project:\n  name: explicit\n");

        let (path, _) = FsProject::new()
            .load(Some(Path::new("./explicit.yml")), &Env::new(), dir.path(), true)
            .unwrap();
        assert_eq!(path, explicit);

        let (path, config) = FsProject::new()
            .load(None, &Env::new(), dir.path(), true)
            .unwrap();
        assert_eq!(path, default);
        assert_eq!(config.get(&["project", "name"]), Some(&Value::from("default")));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsProject::new()
            .load(Some(&dir.path().join("nope.yml")), &Env::new(), dir.path(), true)
            .expect_err("must fail");
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }

    #[test]
    fn extract_mixins_removes_section() {
        let mut config = config_tree!(
            ":project:\n  :build_root: build\n:mixins:\n  :enabled: [gcov, arm]\n  :load_paths: [support/mixins]\n"
        );

        let (enabled, load_paths) = FsProject::new()
            .with_builtin_load_path("/usr/share/projconf/mixins")
            .extract_mixins(&mut config)
            .unwrap();

        assert_eq!(enabled, vec!["gcov", "arm"]);
        assert_eq!(
            load_paths,
            vec![
                PathBuf::from("support/mixins"),
                PathBuf::from("/usr/share/projconf/mixins")
            ]
        );
        assert_eq!(config.get(&[MIXINS_SECTION]), None);
    }

    #[test]
    fn extract_mixins_without_section() {
        let mut config = config_tree!("project:\n  build_root: build\n");
        let (enabled, load_paths) = FsProject::new().extract_mixins(&mut config).unwrap();
        assert!(enabled.is_empty());
        assert!(load_paths.is_empty());
    }

    #[test]
    fn extract_mixins_rejects_scalar_enabled() {
        let mut config = config_tree!("mixins:\n  enabled: gcov\n");
        let err = FsProject::new()
            .extract_mixins(&mut config)
            .expect_err("must fail");
        assert!(err.to_string().contains(":enabled must be a list"));
    }

    #[test]
    fn validate_and_lookup_mixins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        write(&second, "gcov.yml", "gcov: {}\n");
        write(&first, "gcov.yml", "gcov: {}\n");
        write(&second, "arm.yml", "arm: {}\n");
        let load_paths = vec![first.clone(), second.clone()];
        let project = FsProject::new();

        let mixins = vec!["gcov".to_string(), "arm".to_string()];
        project
            .validate_mixins(&mixins, &load_paths, MixinSource::Config)
            .unwrap();

        let located = project
            .lookup_mixins(&mixins, &load_paths, MixinSource::Config)
            .unwrap();
        assert_eq!(located[0].filepath, first.join("gcov.yml"));
        assert_eq!(located[1].filepath, second.join("arm.yml"));

        let issues = project
            .validate_mixins(
                &["missing".to_string(), "gcov".to_string()],
                &load_paths,
                MixinSource::Cmdline,
            )
            .expect_err("must fail");
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            MixinError::Unresolved { name, origin: MixinSource::Cmdline } if name == "missing"
        ));
    }

    #[test]
    fn validate_filepath_mixins() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(dir.path(), "extra.yml", "a: 1\n");
        let text = write(dir.path(), "extra.txt", "a: 1\n");
        let missing = dir.path().join("missing.yml");

        let issues = FsProject::new()
            .validate_mixins(
                &[
                    yaml.display().to_string(),
                    text.display().to_string(),
                    missing.display().to_string(),
                ],
                &[],
                MixinSource::Cmdline,
            )
            .expect_err("must fail");

        assert_eq!(issues.len(), 2);
        assert!(matches!(issues[0], MixinError::NotYaml { .. }));
        assert!(matches!(issues[1], MixinError::MissingFile { .. }));
    }

    #[test]
    fn validate_load_paths() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsProject::new()
            .validate_mixin_load_paths(&[dir.path().to_path_buf(), dir.path().join("gone")])
            .expect_err("must fail");
        match err {
            ProjectError::InvalidLoadPaths(paths) => {
                assert_eq!(paths, vec![dir.path().join("gone")])
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
