//! On-disk storage format for cached artifacts.
//!
//! Each cache entry is one file at `<cache_dir>/entries/<key>.bin` with a
//! binary header containing magic bytes, a format version, and a checksum
//! for integrity validation. Corrupt or mismatched files read as cache
//! misses, never as errors.

use std::path::{Path, PathBuf};

use lattice_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying a Lattice cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"LTTC";

/// Current artifact format version. Increment on breaking changes to
/// the header or payload format.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Subdirectory holding one file per cache key.
const ENTRIES_SUBDIR: &str = "entries";

/// File extension for cached entries.
const ENTRY_EXT: &str = "bin";

/// Header prepended to every cached artifact for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Magic bytes: must be `b"LTTC"`.
    pub magic: [u8; 4],

    /// Artifact format version.
    pub format_version: u32,

    /// Compiler version that produced this artifact.
    pub compiler_version: String,

    /// Content hash of the payload data (for integrity checks).
    pub checksum: ContentHash,
}

/// Reads and writes cache entry files in the cache directory.
pub struct ArtifactStore {
    cache_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a new artifact store rooted at the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Ensures the entries subdirectory exists.
    pub fn ensure_dirs(&self) -> Result<(), CacheError> {
        let dir = self.cache_dir.join(ENTRIES_SUBDIR);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir,
            source: e,
        })
    }

    /// Returns the file path for the entry with the given key.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join(ENTRIES_SUBDIR)
            .join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Writes an entry with a validated binary header.
    pub fn write_entry(
        &self,
        key: &str,
        data: &[u8],
        compiler_version: &str,
    ) -> Result<(), CacheError> {
        self.ensure_dirs()?;

        let path = self.entry_path(key);
        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            compiler_version: compiler_version.to_string(),
            checksum: ContentHash::from_bytes(data),
        };

        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // Layout: 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        std::fs::write(&path, &output).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Reads an entry, validating its header.
    ///
    /// Returns `None` if the file doesn't exist, the header is invalid,
    /// the format version doesn't match, or the checksum doesn't verify.
    /// This is fail-safe: corruption results in a cache miss.
    pub fn read_entry(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        let raw = std::fs::read(&path).ok()?;

        // Need at least 4 bytes for the header length
        if raw.len() < 4 {
            return None;
        }

        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }

        let header: ArtifactHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .ok()?
                .0;

        if header.magic != ARTIFACT_MAGIC {
            return None;
        }
        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return None;
        }

        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }

        Some(payload.to_vec())
    }

    /// Removes the entries subdirectory and everything in it.
    pub fn remove_entries(&self) -> Result<(), CacheError> {
        let dir = self.cache_dir.join(ENTRIES_SUBDIR);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| CacheError::Io {
                path: dir,
                source: e,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn write_and_read_roundtrip() {
        let (_dir, store) = make_store();
        let data = b"optimized css payload";
        store.write_entry("abc123", data, "0.1.0").unwrap();

        let read_back = store.read_entry("abc123").unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn read_missing_returns_none() {
        let (_dir, store) = make_store();
        assert!(store.read_entry("nonexistent").is_none());
    }

    #[test]
    fn read_corrupt_data_returns_none() {
        let (_dir, store) = make_store();
        store.ensure_dirs().unwrap();
        std::fs::write(store.entry_path("corrupt"), b"garbage data").unwrap();
        assert!(store.read_entry("corrupt").is_none());
    }

    #[test]
    fn read_wrong_magic_returns_none() {
        let (_dir, store) = make_store();
        store.ensure_dirs().unwrap();

        let header = ArtifactHeader {
            magic: *b"BAAD",
            format_version: ARTIFACT_FORMAT_VERSION,
            compiler_version: "0.1.0".to_string(),
            checksum: ContentHash::from_bytes(b"data"),
        };
        let header_bytes =
            bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::new();
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(b"data");

        std::fs::write(store.entry_path("badmagic"), &output).unwrap();
        assert!(store.read_entry("badmagic").is_none());
    }

    #[test]
    fn read_checksum_mismatch_returns_none() {
        let (_dir, store) = make_store();
        store.ensure_dirs().unwrap();

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            compiler_version: "0.1.0".to_string(),
            checksum: ContentHash::from_bytes(b"data"),
        };
        let header_bytes =
            bincode::serde::encode_to_vec(&header, bincode::config::standard()).unwrap();
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::new();
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(b"tampered");

        std::fs::write(store.entry_path("mismatch"), &output).unwrap();
        assert!(store.read_entry("mismatch").is_none());
    }

    #[test]
    fn read_truncated_header_returns_none() {
        let (_dir, store) = make_store();
        store.ensure_dirs().unwrap();
        std::fs::write(store.entry_path("truncated"), b"AB").unwrap();
        assert!(store.read_entry("truncated").is_none());
    }

    #[test]
    fn remove_entries_clears_dir() {
        let (_dir, store) = make_store();
        store.write_entry("k1", b"v1", "0.1.0").unwrap();
        store.remove_entries().unwrap();
        assert!(store.read_entry("k1").is_none());
    }

    #[test]
    fn write_large_payload() {
        let (_dir, store) = make_store();
        let data: Vec<u8> = (0..10_000).map(|i| (i % 256) as u8).collect();
        store.write_entry("large", &data, "0.1.0").unwrap();
        assert_eq!(store.read_entry("large").unwrap(), data);
    }
}
