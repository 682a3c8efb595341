//! Invalidation of externally-held bundler caches.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::module::Module;

/// One module entry inside a bundler cache.
#[derive(Clone, Debug, Default)]
pub struct CachedModule {
    /// The module content the bundler last saw. `None` means unknown:
    /// the next bundling pass must re-read the file.
    pub original_content: Option<String>,
}

/// The cache one bundler invocation keeps between builds, keyed by
/// module path.
#[derive(Clone, Debug, Default)]
pub struct BundlerCache {
    modules: BTreeMap<String, CachedModule>,
}

impl BundlerCache {
    /// Records the content the bundler read for a module.
    pub fn set_content(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.modules.insert(
            path.into(),
            CachedModule {
                original_content: Some(content.into()),
            },
        );
    }

    /// The cached entry for a module, if the bundler has seen it.
    pub fn module(&self, path: &str) -> Option<&CachedModule> {
        self.modules.get(path)
    }

    /// Marks a module's cached content unknown.
    pub fn invalidate(&mut self, path: &str) {
        if let Some(entry) = self.modules.get_mut(path) {
            entry.original_content = None;
        }
    }
}

/// The named bundler caches the compiler context holds, one per output
/// target kind.
#[derive(Default)]
pub struct BundlerCaches {
    caches: BTreeMap<String, BundlerCache>,
}

impl BundlerCaches {
    /// The cache for the given output name, created on first use.
    pub fn get_or_create(&mut self, name: &str) -> &mut BundlerCache {
        self.caches.entry(name.to_string()).or_default()
    }

    /// Drops the cached content of every module whose transform
    /// dependencies intersect the changed-file set, plus the changed
    /// modules themselves, across all named caches.
    pub fn invalidate_changed<'a>(
        &mut self,
        modules: impl IntoIterator<Item = &'a Module> + Clone,
        changed_files: &BTreeSet<String>,
    ) {
        for cache in self.caches.values_mut() {
            for module in modules.clone() {
                if changed_files.contains(&module.path) || module.depends_on_changed(changed_files)
                {
                    debug!(path = %module.path, "invalidating bundler cache entry");
                    cache.invalidate(&module.path);
                }
            }
        }
    }

    /// Discards every named cache.
    pub fn clear(&mut self) {
        self.caches.clear();
    }
}
