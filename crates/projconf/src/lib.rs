//! # projconf - project configuration for C build tools
//!
//! Assembles one fully resolved build configuration from a base project file plus "mixin"
//! fragments, and answers "which extra flags apply to this file" for the finished configuration.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `projconf` works internally.
//!
//! ### Terms
//!
//! - **configuration tree**: a YAML mapping ([tree::ConfigTree]), keys keep their declaration
//!   order. Ruby-symbol style keys (`:project:`) and plain keys (`project:`) are the same key.
//! - **mixin**: a named YAML fragment that gets deep merged into the project configuration.
//! - **load path**: a directory searched (in order) for `<mixin name>.yml`.
//! - **context** / **operation**: the two levels below `flags`, e.g. `test` / `compile`.
//!
//! This is a valid project file:
//! ```yaml
//! :project:
//!   :build_root: build
//!   :default_tasks:
//!     - test:all
//!
//! :mixins:
//!   :enabled:
//!     - gcov              # found as support/mixins/gcov.yml
//!   :load_paths:
//!     - support/mixins
//!
//! :flags:
//!   :test:
//!     :compile:
//!       :*: [-foo]
//!       :Model: [-Wall]
//! ```
//!
//! ### Loading
//!
//! see [loader::Loader::load]
//!
//! The project file is found via an explicit path, the `PROJCONF_PROJECT_FILE` environment
//! variable or `project.yml` (see [project::FsProject]). Its `mixins` section is removed from the
//! configuration and yields the enabled mixins and the load paths.
//!
//! ### Mixins
//!
//! Mixins come from three sources, in merge order:
//!
//! | **source**    | **declared as**                    | **located by**            |
//! |---------------|------------------------------------|---------------------------|
//! | project file  | `:mixins` ↳ `:enabled` name or path | load paths / filepath     |
//! | environment   | `PROJCONF_MIXIN_<n>` filepath       | filepath                  |
//! | command line  | name or path                        | load paths / filepath     |
//!
//! Everything is validated before anything is merged. [mixin::assemble] keeps one entry per mixin
//! name (from the highest precedence source) and [mixin::merge_mixins] merges them in order:
//! objects merge key by key, lists and scalars are replaced, later mixins win.
//!
//! ### Default tasks
//!
//! [loader::default_tasks] prefers `project.default_tasks` from the merged tree and otherwise
//! persists the caller's fallback into the tree.
//!
//! ### Flags
//!
//! [flags::FlagTable] reads the `flags` section once into closed [flags::FlagSpec] variants and
//! validates every matcher key up front. Afterwards it is immutable and may be shared between
//! threads; [flags::FlagTable::flag_down] never fails.
//!
pub mod env;
pub mod flags;
pub mod loader;
pub mod merge;
pub mod mixin;
pub mod project;
pub mod tree;
pub mod value;

pub use flags::{FlagSpec, FlagTable};
pub use loader::{default_tasks, LoadError, LoadOptions, Loader};
pub use tree::ConfigTree;
