//! configuration tree
//!
//! [ConfigTree] is the root object of a project configuration. Merging consumes both sides and
//! returns the merged tree, so a clone kept by the caller is never changed behind its back.
use crate::merge::deep_merge;
use crate::value::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    root: Map,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML text. An empty document is an empty tree.
    pub fn from_yaml_str(source: &str) -> Result<Self, TreeError> {
        let blank = source.lines().map(str::trim).all(|line| {
            line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
        });
        if blank {
            return Ok(Self::default());
        }

        let yaml: serde_yaml::Value = serde_yaml::from_str(source)?;
        Self::try_from(Value::from(yaml))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, TreeError> {
        tracing::debug!(path=%path.display(), "reading yaml");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn root(&self) -> &Map {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Walk `path` key by key. `None` when any step is missing or not an object.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    /// Remove a top level section, keeping the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.root.shift_remove(key)
    }

    /// Deep merge `overlay` on top of this tree (see [crate::merge])
    pub fn merge(self, overlay: ConfigTree) -> ConfigTree {
        match deep_merge(Value::Object(self.root), Value::Object(overlay.root)) {
            Value::Object(root) => ConfigTree { root },
            _ => unreachable!("merging two objects yields an object"),
        }
    }

    /// Merge a single value at `path`, creating intermediate objects as needed
    pub fn merge_at(self, path: &[&str], value: Value) -> ConfigTree {
        let overlay = path
            .iter()
            .rev()
            .fold(value, |inner, key| {
                Value::Object(Map::from_iter([(key.to_string(), inner)]))
            });

        match overlay {
            Value::Object(root) => self.merge(ConfigTree { root }),
            _ => self,
        }
    }
}

impl From<Map> for ConfigTree {
    fn from(root: Map) -> Self {
        Self { root }
    }
}

impl TryFrom<Value> for ConfigTree {
    type Error = TreeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            Value::Null => Ok(Self::default()),
            other => Err(TreeError::NotAMapping(other.kind())),
        }
    }
}

impl From<ConfigTree> for Value {
    fn from(tree: ConfigTree) -> Self {
        Value::Object(tree.root)
    }
}

impl serde::ser::Serialize for ConfigTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut ser = serializer.serialize_map(Some(self.root.len()))?;
        for (key, value) in &self.root {
            ser.serialize_entry(key, value)?;
        }
        ser.end()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TreeError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse yaml")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Top level is a {0}, expected a mapping")]
    NotAMapping(&'static str),
}

/// Utility macro to create a [ConfigTree] from YAML text
///
/// ```
/// # use projconf::config_tree;
/// let tree = config_tree!(":project:\n  :build_root: build");
/// assert!(tree.get(&["project", "build_root"]).is_some());
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use projconf::config_tree;
/// config_tree!("- not\n- a mapping");
/// ```
#[macro_export]
macro_rules! config_tree {
    { $expr:expr } => {
        $crate::tree::ConfigTree::from_yaml_str($expr).expect("tree must parse")
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn get_walks_nested_objects() {
        let tree = config_tree!(":project:\n  :default_tasks: [test]\n");
        assert_eq!(
            tree.get(&["project", "default_tasks"]),
            Some(&Value::from(vec!["test"]))
        );
        assert_eq!(tree.get(&["project", "missing"]), None);
        assert_eq!(tree.get(&["project", "default_tasks", "deeper"]), None);
        assert_eq!(tree.get(&[]), None);
    }

    #[test]
    fn empty_document_is_empty_tree() {
        assert!(config_tree!("").is_empty());
        assert!(config_tree!("# only a comment").is_empty());
    }

    #[test]
    fn non_mapping_is_rejected() {
        let err = ConfigTree::from_yaml_str("just a string").expect_err("must fail");
        assert!(matches!(err, TreeError::NotAMapping("string")));
    }

    #[test]
    fn merge_leaves_kept_clone_untouched() {
        let base = config_tree!("project:\n  build_root: build\n");
        let kept = base.clone();

        let merged = base.merge(config_tree!("project:\n  build_root: out\n"));

        assert_eq!(merged.get(&["project", "build_root"]), Some(&Value::from("out")));
        assert_eq!(kept.get(&["project", "build_root"]), Some(&Value::from("build")));
    }

    #[test]
    fn merge_at_creates_path() {
        let tree = config_tree!("project:\n  build_root: build\n")
            .merge_at(&["project", "default_tasks"], vec!["test"].into());

        assert_eq!(
            tree,
            config_tree!("project:\n  build_root: build\n  default_tasks: [test]\n")
        );
    }

    #[test]
    fn remove_keeps_order() {
        let mut tree = config_tree!("a: 1\nmixins: {}\nb: 2\n");
        assert!(tree.remove("mixins").is_some());
        let keys: Vec<_> = tree.root().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
