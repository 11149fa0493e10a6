//! per-file flag resolution
//!
//! Extra compiler/linker flags live in the `flags` section of the configuration:
//!
//! ```yaml
//! :flags:
//!   :test:
//!     :compile:
//!       :*:                       # every file
//!         - -foo
//!       :Model:                   # any filepath containing "Model"
//!         - -Wall
//!     :link:
//!       :tests/comm/TestUsart.c:
//!         - --bar
//!         - --baz
//!   :release:                     # every operation of the release context
//!     - -std=c99
//! ```
//!
//! [FlagTable] reads a section once, validates every matcher key and turns each
//! `context`/`operation` entry into a [FlagSpec]. Lookups afterwards never fail.
//!
//! Matching a [PatternMap] is first-match-wins:
//! 1. a filepath key equal to the filepath
//! 2. filepath keys occurring in the filepath, in declaration order
//! 3. glob keys (`*`, `?`, `[...]`, `{a,b}`; `*` also matches `/`) in declaration order
//! 4. the wildcard key `*`
//!
//! Flags of several matching keys are never combined.
use crate::tree::ConfigTree;
use crate::value::{Map, Value};
use globset::{Glob, GlobMatcher};
use indexmap::IndexMap;

pub const FLAGS_SECTION: &str = "flags";

pub const WILDCARD: &str = "*";

static ABSENT: FlagSpec = FlagSpec::Absent;

/// Configured flags for one context/operation
#[derive(Debug, Clone, Default)]
pub enum FlagSpec {
    #[default]
    Absent,
    /// Applies to every file
    FlatList(Vec<String>),
    PatternMap(PatternMap),
}

impl FlagSpec {
    pub fn is_absent(&self) -> bool {
        matches!(self, FlagSpec::Absent)
    }

    /// Flags that apply to `filepath`
    pub fn flags_for(&self, filepath: &str) -> &[String] {
        match self {
            FlagSpec::Absent => &[],
            FlagSpec::FlatList(flags) => flags,
            FlagSpec::PatternMap(map) => map.resolve(filepath),
        }
    }
}

/// Matcher key of a [PatternMap]
#[derive(Debug, Clone)]
pub enum Matcher {
    Wildcard,
    Glob(GlobMatcher),
    Filepath(String),
}

impl Matcher {
    /// Classify a key; `None` if it is not a usable matcher
    pub fn parse(key: &str) -> Option<Matcher> {
        let key = key.trim();

        if key.is_empty() {
            return None;
        }

        if key == WILDCARD {
            return Some(Matcher::Wildcard);
        }

        if key.contains(['*', '?', '[', '{']) {
            let glob = Glob::new(key).ok()?;
            return Some(Matcher::Glob(glob.compile_matcher()));
        }

        Some(Matcher::Filepath(key.to_string()))
    }

    /// Precedence of a match against `filepath`, lower wins; `None` if it does not match
    fn rank(&self, filepath: &str) -> Option<u8> {
        match self {
            Matcher::Filepath(key) if key == filepath => Some(0),
            Matcher::Filepath(key) => filepath.contains(key.as_str()).then_some(1),
            Matcher::Glob(glob) => glob.is_match(filepath).then_some(2),
            Matcher::Wildcard => Some(3),
        }
    }
}

/// Matcher keys with their flags, in declaration order
#[derive(Debug, Clone, Default)]
pub struct PatternMap {
    entries: Vec<(String, Matcher, Vec<String>)>,
}

impl PatternMap {
    fn from_map(map: &Map, at: &FlagPath) -> Result<Self, FlagError> {
        let entries = map
            .iter()
            .map(|(key, value)| {
                let matcher = Matcher::parse(key).ok_or_else(|| FlagError::InvalidFlagMatcher {
                    key: key.clone(),
                    path: at.clone(),
                })?;
                let flags = flag_list(value).ok_or_else(|| FlagError::InvalidFlagList {
                    path: at.with(key),
                    found: value.kind(),
                })?;
                Ok((key.clone(), matcher, flags))
            })
            .collect::<Result<_, FlagError>>()?;

        Ok(Self { entries })
    }

    /// Flags of the best matching key (see module documentation), empty if nothing matches
    pub fn resolve(&self, filepath: &str) -> &[String] {
        let best = self
            .entries
            .iter()
            .filter_map(|entry| entry.1.rank(filepath).map(|rank| (rank, entry)))
            .min_by_key(|(rank, _)| *rank);

        match best {
            Some((_, (key, _, flags))) => {
                tracing::trace!(key, filepath, "flag matcher");
                flags
            }
            None => &[],
        }
    }
}

/// Location inside the configuration, used in error messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagPath(Vec<String>);

impl FlagPath {
    fn new(section: &str) -> Self {
        Self(vec![section.to_string()])
    }

    fn with(&self, key: &str) -> Self {
        let mut path = self.0.clone();
        path.push(key.to_string());
        Self(path)
    }
}

impl std::fmt::Display for FlagPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for key in &self.0 {
            if !first {
                f.write_str(" ↳ ")?;
            }
            write!(f, ":{key}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum ContextFlags {
    /// A list directly under the context, shared by every operation
    Uniform(FlagSpec),
    Operations {
        operations: IndexMap<String, FlagSpec>,
        /// The operation mapping read as a pattern map, for queries without an operation
        whole: FlagSpec,
    },
}

/// Flag specifications of one configuration section, resolved once
#[derive(Debug, Clone, Default)]
pub struct FlagTable {
    section: String,
    contexts: IndexMap<String, ContextFlags>,
}

impl FlagTable {
    /// Read the `flags` section of `config`
    pub fn from_tree(config: &ConfigTree) -> Result<Self, FlagError> {
        Self::from_section(config, FLAGS_SECTION)
    }

    /// Read any section shaped like `flags` (e.g. `defines`)
    pub fn from_section(config: &ConfigTree, section: &str) -> Result<Self, FlagError> {
        let root = FlagPath::new(section);
        let mut contexts = IndexMap::new();

        let entries = match config.get(&[section]) {
            None | Some(Value::Null) => None,
            Some(Value::Object(entries)) => Some(entries),
            Some(other) => {
                return Err(FlagError::UnrecognizedShape {
                    path: root,
                    found: other.kind(),
                })
            }
        };

        for (context, value) in entries.into_iter().flatten() {
            let at = root.with(context);
            let flags = match value {
                Value::Null => continue,
                Value::Object(operations) => ContextFlags::from_operations(operations, &at)?,
                other => ContextFlags::Uniform(FlagSpec::FlatList(flag_list(other).ok_or_else(
                    || FlagError::UnrecognizedShape {
                        path: at.clone(),
                        found: other.kind(),
                    },
                )?)),
            };
            contexts.insert(context.clone(), flags);
        }

        tracing::debug!(section, contexts = contexts.len(), "flag table built");
        Ok(Self {
            section: section.to_string(),
            contexts,
        })
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    /// Whether anything is configured for `context` (and `operation`, if given)
    ///
    /// A list directly under the context counts for every operation.
    pub fn flags_defined(&self, context: &str, operation: Option<&str>) -> bool {
        match (self.contexts.get(context), operation) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(ContextFlags::Uniform(_)), Some(_)) => true,
            (Some(ContextFlags::Operations { operations, .. }), Some(operation)) => operations
                .get(operation)
                .is_some_and(|spec| !spec.is_absent()),
        }
    }

    /// The resolved specification for `context`/`operation`
    pub fn spec(&self, context: &str, operation: Option<&str>) -> &FlagSpec {
        match (self.contexts.get(context), operation) {
            (None, _) => &ABSENT,
            (Some(ContextFlags::Uniform(spec)), _) => spec,
            (Some(ContextFlags::Operations { whole, .. }), None) => whole,
            (Some(ContextFlags::Operations { operations, .. }), Some(operation)) => {
                operations.get(operation).unwrap_or(&ABSENT)
            }
        }
    }

    /// Flags for `filepath` under `context`/`operation`; empty when nothing is configured
    pub fn flag_down(&self, context: &str, operation: Option<&str>, filepath: &str) -> Vec<String> {
        let flags = self.spec(context, operation).flags_for(filepath).to_vec();
        tracing::trace!(context, operation, filepath, ?flags, "flags resolved");
        flags
    }
}

impl ContextFlags {
    fn from_operations(operations: &Map, at: &FlagPath) -> Result<Self, FlagError> {
        let mut resolved = IndexMap::new();
        for (operation, value) in operations {
            let at = at.with(operation);
            let spec = match value {
                Value::Null => FlagSpec::Absent,
                Value::Object(map) => FlagSpec::PatternMap(PatternMap::from_map(map, &at)?),
                other => FlagSpec::FlatList(flag_list(other).ok_or_else(|| {
                    FlagError::UnrecognizedShape {
                        path: at.clone(),
                        found: other.kind(),
                    }
                })?),
            };
            resolved.insert(operation.clone(), spec);
        }

        let all_lists = operations
            .values()
            .all(|value| matches!(value, Value::Array(_)));
        let whole = if all_lists {
            FlagSpec::PatternMap(PatternMap::from_map(operations, at)?)
        } else {
            FlagSpec::Absent
        };

        Ok(ContextFlags::Operations {
            operations: resolved,
            whole,
        })
    }
}

/// Flatten a list of scalars (nested lists allowed) into flags
fn flag_list(value: &Value) -> Option<Vec<String>> {
    fn collect(value: &Value, out: &mut Vec<String>) -> Option<()> {
        match value {
            Value::Array(items) => items.iter().try_for_each(|item| collect(item, out)),
            scalar => {
                out.push(scalar.scalar_string()?);
                Some(())
            }
        }
    }

    let Value::Array(_) = value else {
        return None;
    };

    let mut flags = vec![];
    collect(value, &mut flags)?;
    Some(flags)
}

#[derive(thiserror::Error, Debug)]
pub enum FlagError {
    #[error("Matcher '{key}' at {path} is not a wildcard, glob or filepath")]
    InvalidFlagMatcher { key: String, path: FlagPath },
    #[error("{path} must be a list of flags, found {found}")]
    InvalidFlagList { path: FlagPath, found: &'static str },
    #[error("{path} must be a list or a mapping, found {found}")]
    UnrecognizedShape { path: FlagPath, found: &'static str },
}
