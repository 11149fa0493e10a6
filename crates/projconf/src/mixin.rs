//! mixin references, assembly and merging
//!
//! Mixins are declared by three sources. In merge order (lowest precedence first):
//! 1. the project file (`:mixins` ↳ `:enabled`)
//! 2. indexed environment variables (see [crate::env])
//! 3. the command line
//!
//! [assemble] keeps one entry per mixin name, taken from the highest precedence source, and
//! returns the entries in merge order. [merge_mixins] then folds each mixin tree into the base
//! configuration so the last applied mixin has the final say on any value it defines.
use crate::env::EnvMixin;
use crate::tree::{ConfigTree, TreeError};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Section holding mixin declarations; never merged from a mixin file
pub const MIXINS_SECTION: &str = "mixins";

/// Where a mixin was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MixinSource {
    Config,
    Env,
    Cmdline,
}

impl std::fmt::Display for MixinSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixinSource::Config => f.write_str("project configuration"),
            MixinSource::Env => f.write_str("environment variable"),
            MixinSource::Cmdline => f.write_str("command line"),
        }
    }
}

#[derive(derive_new::new, Debug, Clone, PartialEq, Eq)]
pub struct MixinReference {
    pub name: String,
    pub source: MixinSource,
}

/// A mixin reference found on disk, not yet parsed
#[derive(derive_new::new, Debug, Clone, PartialEq, Eq)]
pub struct LocatedMixin {
    pub reference: MixinReference,
    pub filepath: PathBuf,
}

impl LocatedMixin {
    /// Locate a mixin that was declared by filepath, named after the file stem
    pub fn from_filepath(filepath: impl Into<PathBuf>, source: MixinSource) -> Self {
        let filepath = filepath.into();
        let name = mixin_name(&filepath.to_string_lossy());
        Self::new(MixinReference::new(name, source), filepath)
    }
}

/// A mixin with its parsed configuration tree
#[derive(derive_new::new, Debug)]
pub struct ResolvedMixin {
    pub reference: MixinReference,
    pub filepath: PathBuf,
    pub tree: ConfigTree,
}

/// A mixin is given by filepath (rather than by name) if it looks like one
pub fn is_filepath(mixin: &str) -> bool {
    mixin.contains('/') || mixin.contains('\\') || has_yaml_extension(Path::new(mixin))
}

pub(crate) fn has_yaml_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Name of a mixin declaration: the file stem for filepaths, the declaration itself otherwise
pub fn mixin_name(mixin: &str) -> String {
    if !is_filepath(mixin) {
        return mixin.to_string();
    }

    let normalized = mixin.replace('\\', "/");
    Path::new(&normalized)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(normalized)
}

/// Deduplicate mixin declarations, keeping the first occurrence
pub fn dedup_names(mixins: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    mixins
        .into_iter()
        .filter(|mixin| seen.insert(mixin.clone()))
        .collect()
}

/// Resolve load paths against `cwd` and deduplicate them, keeping the first occurrence
pub fn dedup_load_paths(paths: Vec<PathBuf>, cwd: &Path) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .map(|path| absolute(&path, cwd))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Resolve a mixin declared by filepath against `cwd`, names are returned unchanged
pub fn anchor_filepath(mixin: String, cwd: &Path) -> String {
    if !is_filepath(&mixin) {
        return mixin;
    }

    let normalized = mixin.replace('\\', "/");
    absolute(Path::new(&normalized), cwd)
        .to_string_lossy()
        .into_owned()
}

/// Lexical absolute form of `path` relative to `cwd`
///
/// `.` and `..` are folded without touching the filesystem, so paths that do not exist yet still
/// compare equal.
pub fn absolute(path: &Path, cwd: &Path) -> PathBuf {
    let joined = cwd.join(path);
    let mut result = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Order mixins for merging, dropping lower precedence duplicates (by name)
///
/// Returns project file mixins, then environment mixins, then command line mixins, each group in
/// its declaration order.
pub fn assemble(
    config: Vec<LocatedMixin>,
    env: Vec<EnvMixin>,
    cmdline: Vec<LocatedMixin>,
) -> Vec<LocatedMixin> {
    let env = env
        .into_iter()
        .map(|entry| LocatedMixin::from_filepath(entry.filepath, MixinSource::Env))
        .collect();

    // highest precedence first so that the surviving entry is claimed before its duplicates
    let mut seen = HashSet::new();
    let mut groups: Vec<Vec<LocatedMixin>> = [cmdline, env, config]
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .filter(|mixin| {
                    let fresh = seen.insert(mixin.reference.name.clone());
                    if !fresh {
                        tracing::debug!(
                            name = mixin.reference.name,
                            source = %mixin.reference.source,
                            "dropping duplicate mixin"
                        );
                    }
                    fresh
                })
                .collect()
        })
        .collect();

    groups.reverse();
    groups.into_iter().flatten().collect()
}

/// Read and parse a located mixin
pub fn load_mixin(mixin: LocatedMixin) -> Result<ResolvedMixin, MixinError> {
    let LocatedMixin {
        reference,
        filepath,
    } = mixin;

    let tree = ConfigTree::from_yaml_file(&filepath).map_err(|err| match err {
        TreeError::IoError(source) => MixinError::Io {
            path: filepath.clone(),
            source,
        },
        other => MixinError::Malformed {
            path: filepath.clone(),
            reason: other,
        },
    })?;

    Ok(ResolvedMixin::new(reference, filepath, tree))
}

/// Deep merge every mixin into `base`, in order
pub fn merge_mixins(
    base: ConfigTree,
    mixins: Vec<ResolvedMixin>,
    silent: bool,
) -> Result<ConfigTree, MixinError> {
    let mut config = base;

    for mixin in mixins {
        let mut tree = mixin.tree;
        tree.remove(MIXINS_SECTION);

        let empty = if tree.is_empty() { "(empty) " } else { "" };
        if silent {
            tracing::debug!(path=%mixin.filepath.display(), "merged {empty}{} mixin", mixin.reference.source);
        } else {
            tracing::info!(path=%mixin.filepath.display(), "merged {empty}{} mixin", mixin.reference.source);
        }

        config = config.merge(tree);
    }

    if config.is_empty() {
        return Err(MixinError::EmptyConfiguration);
    }

    Ok(config)
}

#[derive(thiserror::Error, Debug)]
pub enum MixinError {
    #[error("{origin} mixin '{name}' cannot be found in mixin load paths as '{name}.yml'")]
    Unresolved { name: String, origin: MixinSource },
    #[error("{origin} mixin '{}' does not exist", .path.display())]
    MissingFile { path: PathBuf, origin: MixinSource },
    #[error("{origin} mixin '{}' is not a YAML file", .path.display())]
    NotYaml { path: PathBuf, origin: MixinSource },
    #[error("Mixin {} is malformed: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: TreeError },
    #[error("Unable to read mixin {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Final configuration is empty")]
    EmptyConfiguration,
}
