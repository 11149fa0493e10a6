//! mixins declared by environment variables
//!
//! Every variable named `PROJCONF_MIXIN_<n>` (with `n >= 1`, no leading zero) holds the filepath of
//! one mixin. Variables are applied in ascending numeric order, so `PROJCONF_MIXIN_10` comes after
//! `PROJCONF_MIXIN_2`.
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment as seen by the loader (variable name to value)
pub type Env = HashMap<String, String>;

pub const MIXIN_VAR_PREFIX: &str = "PROJCONF_MIXIN_";

/// One mixin environment variable
#[derive(derive_new::new, Debug, Clone, PartialEq, Eq)]
pub struct EnvMixin {
    pub var: String,
    pub filepath: PathBuf,
}

/// Source of environment declared mixins
pub trait EnvMixins {
    /// Ordered mixin variables found in `env`
    fn fetch_env_filepaths(&self, env: &Env) -> Vec<EnvMixin>;

    /// Fails if any variable names a file that does not exist
    fn validate_env_filepaths(&self, entries: &[EnvMixin]) -> Result<(), EnvMixinError>;
}

/// Default [EnvMixins] reading `<prefix><n>` variables and checking the filesystem
#[derive(Debug, Clone)]
pub struct EnvMixinVars {
    prefix: String,
}

impl Default for EnvMixinVars {
    fn default() -> Self {
        Self::with_prefix(MIXIN_VAR_PREFIX)
    }
}

impl EnvMixinVars {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn index_of(&self, var: &str) -> Option<u64> {
        let digits = var.strip_prefix(&self.prefix)?;
        let valid = !digits.is_empty()
            && !digits.starts_with('0')
            && digits.chars().all(|c| c.is_ascii_digit());
        if !valid {
            return None;
        }
        digits.parse().ok()
    }
}

impl EnvMixins for EnvMixinVars {
    fn fetch_env_filepaths(&self, env: &Env) -> Vec<EnvMixin> {
        let mut indexed: Vec<(u64, EnvMixin)> = env
            .iter()
            .filter_map(|(var, value)| {
                let index = self.index_of(var)?;
                // accept windows style separators
                let filepath = PathBuf::from(value.replace('\\', "/"));
                Some((index, EnvMixin::new(var.clone(), filepath)))
            })
            .collect();

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, entry)| entry).collect()
    }

    fn validate_env_filepaths(&self, entries: &[EnvMixin]) -> Result<(), EnvMixinError> {
        let missing: Vec<EnvMixin> = entries
            .iter()
            .filter(|entry| !entry.filepath.is_file())
            .cloned()
            .collect();

        for entry in &missing {
            tracing::error!(
                var = entry.var,
                path = %entry.filepath.display(),
                "environment variable specifies a filepath that does not exist"
            );
        }

        if !missing.is_empty() {
            return Err(EnvMixinError::MissingFiles(missing));
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EnvMixinError {
    #[error("Mixin environment variable validation failed: {}", describe(.0))]
    MissingFiles(Vec<EnvMixin>),
}

fn describe(entries: &[EnvMixin]) -> String {
    entries
        .iter()
        .map(|entry| format!("{} => {}", entry.var, entry.filepath.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(vars: &[(&str, &str)]) -> Env {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn fetch_orders_by_numeric_index() {
        let env = env(&[
            ("PROJCONF_MIXIN_10", "ten.yml"),
            ("PROJCONF_MIXIN_2", "two.yml"),
            ("PROJCONF_MIXIN_1", "one.yml"),
            ("PATH", "/usr/bin"),
        ]);

        let vars: Vec<_> = EnvMixinVars::default()
            .fetch_env_filepaths(&env)
            .into_iter()
            .map(|entry| entry.var)
            .collect();

        assert_eq!(
            vars,
            vec!["PROJCONF_MIXIN_1", "PROJCONF_MIXIN_2", "PROJCONF_MIXIN_10"]
        );
    }

    #[test]
    fn fetch_ignores_zero_and_malformed_indices() {
        let env = env(&[
            ("PROJCONF_MIXIN_0", "zero.yml"),
            ("PROJCONF_MIXIN_01", "leading.yml"),
            ("PROJCONF_MIXIN_X", "x.yml"),
            ("PROJCONF_MIXIN_", "empty.yml"),
        ]);

        assert!(EnvMixinVars::default().fetch_env_filepaths(&env).is_empty());
    }

    #[test]
    fn fetch_normalizes_backslashes() {
        let env = env(&[("PROJCONF_MIXIN_1", "mixins\\gcov.yml")]);
        let entries = EnvMixinVars::default().fetch_env_filepaths(&env);
        assert_eq!(entries[0].filepath, PathBuf::from("mixins/gcov.yml"));
    }

    #[test]
    fn validate_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.yml");
        std::fs::write(&present, "a: 1\n").unwrap();

        let entries = vec![
            EnvMixin::new("PROJCONF_MIXIN_1".into(), present),
            EnvMixin::new("PROJCONF_MIXIN_2".into(), dir.path().join("absent.yml")),
        ];

        let err = EnvMixinVars::default()
            .validate_env_filepaths(&entries)
            .expect_err("must fail");
        let EnvMixinError::MissingFiles(missing) = &err;
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].var, "PROJCONF_MIXIN_2");
        assert!(err.to_string().contains("PROJCONF_MIXIN_2"));
    }
}
