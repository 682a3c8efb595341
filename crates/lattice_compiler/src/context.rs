//! Process-lifetime compiler state.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::path::{Path, PathBuf};

use lattice_cache::ContentCache;
use lattice_common::normalize_path;
use lattice_config::CompilerConfig;
use lattice_vfs::VirtualFs;
use lattice_workers::{RunnerFactory, WorkerPool};
use tracing::{debug, info, warn};

use crate::build_ctx::BuildContext;
use crate::bundler_cache::BundlerCaches;
use crate::events::BuildEvents;
use crate::module::Module;
use crate::results::BuildResults;
use crate::watch::FsChange;

/// The state that survives across builds for one compiler instance.
///
/// Owns the VFS, the content cache, the worker pool, the module map, and
/// the bundler caches. Output writers never touch these directly; they go
/// through the context so the dirty tracking stays consistent. There is
/// no ambient global: every orchestration call takes the context it
/// operates on.
pub struct CompilerContext {
    /// The validated configuration this context was created with.
    pub config: CompilerConfig,
    /// Absolute project root all relative config paths resolve against.
    pub project_dir: PathBuf,
    compiler_version: String,

    build_count: u64,
    active_build_id: Option<u64>,
    has_successful_build: bool,
    last_build_results: Option<BuildResults>,

    /// Path → module record for every source file seen this process.
    pub module_map: BTreeMap<String, Module>,
    /// Collection dependencies already resolved this process.
    pub resolved_collections: BTreeSet<String>,

    changed_files: BTreeSet<String>,
    changed_modules: BTreeSet<String>,

    /// Every output path added across this process's builds.
    pub all_files_added: Vec<String>,
    /// Every output path updated across this process's builds.
    pub all_files_updated: Vec<String>,
    /// Every output path deleted across this process's builds.
    pub all_files_deleted: Vec<String>,

    /// The staged filesystem.
    pub vfs: VirtualFs,
    /// The content-addressable artifact cache.
    pub cache: ContentCache,
    /// The task pool for CPU-heavy substeps.
    pub workers: WorkerPool,
    /// Named bundler caches, one per output kind.
    pub bundler_caches: BundlerCaches,
    /// Build/watch event subscribers.
    pub events: BuildEvents,
}

impl CompilerContext {
    /// Creates a context for one project.
    ///
    /// Initializes the disk cache layer when caching is enabled (falling
    /// back to memory-only on failure), starts the worker pool, and
    /// registers watch interest in the source directory.
    pub fn new(
        project_dir: &Path,
        config: CompilerConfig,
        compiler_version: &str,
        runner_factory: RunnerFactory,
    ) -> Self {
        let mut cache = ContentCache::new(compiler_version);
        if config.build.enable_cache {
            cache.init_cache_dir(&project_dir.join(&config.build.cache_dir));
        }

        let workers = WorkerPool::new(config.build.max_workers, runner_factory);

        let mut vfs = VirtualFs::new();
        vfs.add_watch_dir(&project_dir.join(&config.project.src_dir), true);

        info!(
            namespace = %config.project.namespace,
            workers = workers.worker_count(),
            disk_cache = cache.has_disk_layer(),
            "compiler context created"
        );

        Self {
            config,
            project_dir: project_dir.to_path_buf(),
            compiler_version: compiler_version.to_string(),
            build_count: 0,
            active_build_id: None,
            has_successful_build: false,
            last_build_results: None,
            module_map: BTreeMap::new(),
            resolved_collections: BTreeSet::new(),
            changed_files: BTreeSet::new(),
            changed_modules: BTreeSet::new(),
            all_files_added: Vec::new(),
            all_files_updated: Vec::new(),
            all_files_deleted: Vec::new(),
            vfs,
            cache,
            workers,
            bundler_caches: BundlerCaches::default(),
            events: BuildEvents::new(),
        }
    }

    /// The version string stamped into cache artifacts.
    pub fn compiler_version(&self) -> &str {
        &self.compiler_version
    }

    /// Whether a build is currently active.
    pub fn is_actively_building(&self) -> bool {
        self.active_build_id.is_some()
    }

    /// Whether any prior build finished without errors.
    pub fn has_successful_build(&self) -> bool {
        self.has_successful_build
    }

    /// The archived results of the most recent non-stale build.
    pub fn last_build_results(&self) -> Option<&BuildResults> {
        self.last_build_results.as_ref()
    }

    /// Whether any file or module is dirty.
    pub fn has_pending_changes(&self) -> bool {
        !self.changed_files.is_empty() || !self.changed_modules.is_empty()
    }

    /// Records one filesystem change into the dirty sets.
    ///
    /// Updates and deletes drop the VFS's cached copy of the path so the
    /// next read reflects the disk; a deleted source file's module is
    /// marked stale but kept for reporting.
    pub fn apply_change(&mut self, change: &FsChange) {
        match change {
            FsChange::FileAdd(path) | FsChange::FileUpdate(path) => {
                let path = normalize_path(Path::new(path));
                self.vfs.invalidate(Path::new(&path));
                if self.module_map.contains_key(&path) {
                    self.changed_modules.insert(path.clone());
                }
                self.changed_files.insert(path);
            }
            FsChange::FileDelete(path) => {
                let path = normalize_path(Path::new(path));
                self.vfs.invalidate(Path::new(&path));
                if let Some(module) = self.module_map.get_mut(&path) {
                    module.is_stale = true;
                    self.changed_modules.insert(path.clone());
                }
                self.changed_files.insert(path);
            }
            FsChange::DirAdd(path) | FsChange::DirDelete(path) => {
                // Directory-level changes dirty nothing by themselves;
                // the watcher reports the contained files separately.
                debug!(path = %path, "directory change recorded");
            }
        }
    }

    /// Begins a build: bumps the monotonic counter, makes the new id the
    /// active one, and hands the current dirty sets to the new build
    /// context as a snapshot.
    ///
    /// Starting a build while another is active supersedes it; the older
    /// build's results will be discarded when it tries to finish.
    pub fn start_build(&mut self) -> BuildContext {
        if let Some(stale) = self.active_build_id {
            warn!(superseded = stale, "build superseded before finishing");
        }
        self.build_count += 1;
        self.active_build_id = Some(self.build_count);

        let changed_files = mem::take(&mut self.changed_files);
        let changed_modules = mem::take(&mut self.changed_modules);
        debug!(
            build = self.build_count,
            changed_files = changed_files.len(),
            "build started"
        );
        BuildContext::new(
            self.build_count,
            self.has_successful_build,
            changed_files,
            changed_modules,
        )
    }

    /// Completes a build. Returns `None` and discards the results when
    /// the build was superseded while in flight.
    pub fn finish_build(&mut self, results: BuildResults) -> Option<BuildResults> {
        if self.active_build_id != Some(results.build_id) {
            debug!(build = results.build_id, "discarding stale build results");
            return None;
        }
        self.active_build_id = None;
        if !results.has_error {
            self.has_successful_build = true;
        }
        self.all_files_added
            .extend(results.files_added.iter().cloned());
        self.all_files_updated
            .extend(results.files_updated.iter().cloned());
        self.all_files_deleted
            .extend(results.files_deleted.iter().cloned());
        self.last_build_results = Some(results.clone());
        Some(results)
    }

    /// Clears every piece of derived state while preserving the cache,
    /// the VFS content, and the worker pool. The build counter keeps
    /// counting; it is never reused.
    pub fn reset(&mut self) {
        self.module_map.clear();
        self.resolved_collections.clear();
        self.changed_files.clear();
        self.changed_modules.clear();
        self.bundler_caches.clear();
        self.all_files_added.clear();
        self.all_files_updated.clear();
        self.all_files_deleted.clear();
        self.active_build_id = None;
        self.has_successful_build = false;
        self.last_build_results = None;
        info!("compiler context reset");
    }

    /// Shuts the worker pool down. The context is unusable for builds
    /// afterwards.
    pub fn destroy(&mut self) {
        self.workers.destroy();
        info!("compiler context destroyed");
    }
}
