//! The two-layer content cache used by build steps.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lattice_common::{InternalError, LatticeResult};
use tracing::{debug, warn};

use crate::artifact::ArtifactStore;
use crate::key::CacheKey;

/// Subdirectory for cross-build assets (downloaded or generated resources
/// reused between builds without re-derivation).
const RESOURCES_SUBDIR: &str = "resources";

/// A content-addressable cache with a hot in-memory layer and an optional
/// on-disk layer.
///
/// `get` checks the hot layer first and falls through to disk, promoting
/// hits back into memory. `put` writes to both layers. Identical keys
/// must imply identical values; no LRU is needed because keys are
/// content-derived and naturally bounded by the working set.
///
/// All disk failures degrade the cache to memory-only mode for the rest
/// of the process; they are never fatal to a build.
pub struct ContentCache {
    hot: HashMap<CacheKey, Vec<u8>>,
    disk: Option<ArtifactStore>,
    cache_dir: Option<PathBuf>,
    compiler_version: String,
}

impl ContentCache {
    /// Creates a memory-only cache. Call
    /// [`init_cache_dir`](Self::init_cache_dir) to attach the disk layer.
    pub fn new(compiler_version: &str) -> Self {
        Self {
            hot: HashMap::new(),
            disk: None,
            cache_dir: None,
            compiler_version: compiler_version.to_string(),
        }
    }

    /// Attaches the on-disk layer rooted at `cache_dir`, creating the
    /// directory if absent.
    ///
    /// On any I/O failure the cache stays usable in memory-only mode; the
    /// failure is logged, not returned.
    pub fn init_cache_dir(&mut self, cache_dir: &Path) {
        let store = ArtifactStore::new(cache_dir);
        match store.ensure_dirs() {
            Ok(()) => {
                debug!(dir = %cache_dir.display(), "cache directory ready");
                self.disk = Some(store);
                self.cache_dir = Some(cache_dir.to_path_buf());
            }
            Err(e) => {
                warn!(error = %e, "cache directory unusable, continuing memory-only");
                self.disk = None;
                self.cache_dir = None;
            }
        }
    }

    /// Returns `true` if the on-disk layer is active.
    pub fn has_disk_layer(&self) -> bool {
        self.disk.is_some()
    }

    /// Looks up a key, checking the hot layer first and falling through
    /// to disk. A disk hit is promoted into the hot layer.
    pub fn get(&mut self, key: &CacheKey) -> Option<Vec<u8>> {
        if let Some(value) = self.hot.get(key) {
            return Some(value.clone());
        }

        let value = self.disk.as_ref()?.read_entry(&key.to_string())?;
        self.hot.insert(*key, value.clone());
        Some(value)
    }

    /// Stores a value under a key in both layers.
    ///
    /// Overwriting an existing key with a different value indicates a
    /// key-derivation bug (the key no longer covers all logical inputs).
    /// Both layers are consulted, so the check holds across process
    /// restarts; on mismatch the original value is kept so earlier
    /// readers stay consistent, and the bug is returned as an
    /// [`InternalError`].
    pub fn put(&mut self, key: CacheKey, value: Vec<u8>) -> LatticeResult<()> {
        if let Some(existing) = self.hot.get(&key) {
            if *existing != value {
                return Err(InternalError::new(format!(
                    "cache key {key} rewritten with a differing value; key derivation is missing an input"
                )));
            }
            return Ok(());
        }

        if let Some(disk) = &self.disk {
            if let Some(existing) = disk.read_entry(&key.to_string()) {
                let collision = existing != value;
                self.hot.insert(key, existing);
                if collision {
                    return Err(InternalError::new(format!(
                        "cache key {key} rewritten with a differing value; key derivation is missing an input"
                    )));
                }
                return Ok(());
            }
            if let Err(e) = disk.write_entry(&key.to_string(), &value, &self.compiler_version) {
                warn!(error = %e, "cache disk write failed, continuing memory-only");
                self.disk = None;
            }
        }

        self.hot.insert(key, value);
        Ok(())
    }

    /// Returns the cross-build resources directory, creating it if
    /// needed. `None` in memory-only mode or if creation fails.
    pub fn resources_dir(&mut self) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?.join(RESOURCES_SUBDIR);
        match std::fs::create_dir_all(&dir) {
            Ok(()) => Some(dir),
            Err(e) => {
                warn!(error = %e, "resources directory unusable");
                None
            }
        }
    }

    /// Drops the hot layer. Disk entries are untouched, so subsequent
    /// gets re-read them (used by the context's `reset`).
    pub fn clear_hot(&mut self) {
        self.hot.clear();
    }

    /// Removes all on-disk entries and clears the hot layer.
    pub fn clear(&mut self) {
        self.hot.clear();
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.remove_entries() {
                warn!(error = %e, "failed to clear disk cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn css_key(input: &str) -> CacheKey {
        CacheKey::derive("optimizeCss", [input.as_bytes(), b"minify=true".as_slice()])
    }

    #[test]
    fn memory_only_roundtrip() {
        let mut cache = ContentCache::new("0.1.0");
        let key = css_key("a{color:red}");
        assert!(cache.get(&key).is_none());

        cache.put(key, b"a{color:red}".to_vec()).unwrap();
        assert_eq!(cache.get(&key).unwrap(), b"a{color:red}");
        assert!(!cache.has_disk_layer());
    }

    #[test]
    fn disk_layer_survives_process_restart() {
        let dir = tempfile::tempdir().unwrap();
        let key = css_key("a{color:red}");

        {
            let mut cache = ContentCache::new("0.1.0");
            cache.init_cache_dir(dir.path());
            cache.put(key, br#"{"css":"a{color:red}"}"#.to_vec()).unwrap();
        }

        // Fresh cache instance simulates a new process.
        let mut cache = ContentCache::new("0.1.0");
        cache.init_cache_dir(dir.path());
        assert_eq!(cache.get(&key).unwrap(), br#"{"css":"a{color:red}"}"#);
    }

    #[test]
    fn disk_hit_promotes_to_hot_layer() {
        let dir = tempfile::tempdir().unwrap();
        let key = css_key("promoted");

        {
            let mut cache = ContentCache::new("0.1.0");
            cache.init_cache_dir(dir.path());
            cache.put(key, b"value".to_vec()).unwrap();
        }

        let mut cache = ContentCache::new("0.1.0");
        cache.init_cache_dir(dir.path());
        assert!(cache.get(&key).is_some());

        // Remove the disk entry; the promoted hot copy still answers.
        cache.disk.as_ref().unwrap().remove_entries().unwrap();
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn put_same_key_different_value_keeps_original() {
        let mut cache = ContentCache::new("0.1.0");
        let key = css_key("collision");
        cache.put(key, b"original".to_vec()).unwrap();
        assert!(cache.put(key, b"different".to_vec()).is_err());
        assert_eq!(cache.get(&key).unwrap(), b"original");
    }

    #[test]
    fn disk_collision_keeps_original_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let key = css_key("restart-collision");

        {
            let mut cache = ContentCache::new("0.1.0");
            cache.init_cache_dir(dir.path());
            cache.put(key, b"original".to_vec()).unwrap();
        }

        // New process, empty hot layer: the disk entry still guards the
        // key, and the rewrite must not reach it.
        let mut cache = ContentCache::new("0.1.0");
        cache.init_cache_dir(dir.path());
        assert!(cache.put(key, b"different".to_vec()).is_err());
        assert_eq!(cache.get(&key).unwrap(), b"original");

        let mut third = ContentCache::new("0.1.0");
        third.init_cache_dir(dir.path());
        assert_eq!(third.get(&key).unwrap(), b"original");
    }

    #[test]
    fn put_is_idempotent() {
        let mut cache = ContentCache::new("0.1.0");
        let key = css_key("idempotent");
        cache.put(key, b"value".to_vec()).unwrap();
        cache.put(key, b"value".to_vec()).unwrap();
        assert_eq!(cache.get(&key).unwrap(), b"value");
    }

    #[test]
    fn unusable_cache_dir_degrades_to_memory_only() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the cache dir should be.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "file in the way").unwrap();

        let mut cache = ContentCache::new("0.1.0");
        cache.init_cache_dir(&blocked);
        assert!(!cache.has_disk_layer());

        // Still fully usable in memory.
        let key = css_key("degraded");
        cache.put(key, b"value".to_vec()).unwrap();
        assert_eq!(cache.get(&key).unwrap(), b"value");
    }

    #[test]
    fn resources_dir_created_under_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ContentCache::new("0.1.0");
        cache.init_cache_dir(dir.path());

        let resources = cache.resources_dir().unwrap();
        assert!(resources.ends_with("resources"));
        assert!(resources.is_dir());
    }

    #[test]
    fn resources_dir_none_in_memory_only_mode() {
        let mut cache = ContentCache::new("0.1.0");
        assert!(cache.resources_dir().is_none());
    }

    #[test]
    fn clear_hot_keeps_disk_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ContentCache::new("0.1.0");
        cache.init_cache_dir(dir.path());

        let key = css_key("kept");
        cache.put(key, b"value".to_vec()).unwrap();
        cache.clear_hot();
        assert_eq!(cache.get(&key).unwrap(), b"value");
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ContentCache::new("0.1.0");
        cache.init_cache_dir(dir.path());

        let key = css_key("gone");
        cache.put(key, b"value".to_vec()).unwrap();
        cache.clear();
        assert!(cache.get(&key).is_none());
    }
}
