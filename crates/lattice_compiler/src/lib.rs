//! Incremental build orchestration.
//!
//! [`CompilerContext`] is the process-lifetime state that survives across
//! rebuilds: the module map, the virtual filesystem, the content cache,
//! the worker pool, and the bundler caches. Each call to [`build`] creates
//! one ephemeral [`BuildContext`], snapshots the dirty sets, re-extracts
//! metadata for changed modules only, dispatches CPU-heavy substeps to the
//! worker pool through the cache, commits the staged filesystem, and
//! archives the results on the context for the next rebuild. Watch mode
//! drives the same path through [`Watcher`].

pub mod build;
pub mod build_ctx;
pub mod bundler_cache;
pub mod context;
pub mod events;
pub mod manifest;
pub mod module;
pub mod results;
pub mod watch;

pub use build::{build, ModuleParser};
pub use build_ctx::BuildContext;
pub use bundler_cache::{BundlerCache, BundlerCaches, CachedModule};
pub use context::CompilerContext;
pub use events::{BuildEvent, BuildEvents, SubscriptionId};
pub use manifest::{parse_project_manifest, CollectionManifest, CompilerInfo, ProjectManifest};
pub use module::Module;
pub use results::BuildResults;
pub use watch::{create_watcher, FsChange, Watcher};
