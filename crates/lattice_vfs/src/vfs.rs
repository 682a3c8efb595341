//! The virtual filesystem: an all-in-memory view of the project tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use lattice_common::normalize_path;
use tracing::{debug, warn};

use crate::commit::{CommitError, CommitResults};

/// The result of a VFS read. A missing file is an explicit value, never
/// an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReadResult {
    /// The file exists; its current (possibly staged, uncommitted) content.
    Found(String),
    /// The file exists neither in the staging layer nor on disk.
    NotFound,
}

impl FileReadResult {
    /// Returns the content if the file was found.
    pub fn content(&self) -> Option<&str> {
        match self {
            FileReadResult::Found(text) => Some(text),
            FileReadResult::NotFound => None,
        }
    }
}

/// One path's state in the staging layer.
#[derive(Debug, Clone, Default)]
struct VfsItem {
    /// Current content, if known. Staged writes live here until commit.
    file_text: Option<String>,
    /// Whether the path existed on disk the last time it was checked.
    /// `None` means disk has not been consulted for this path yet.
    on_disk: Option<bool>,
    /// A write is staged for this path.
    queue_write: bool,
    /// A delete is staged for this path.
    queue_delete: bool,
}

/// An in-memory, copy-on-write staging layer over the real filesystem.
///
/// Reads fall through to disk on a miss and cache the result; writes and
/// deletes are buffered until [`commit`](Self::commit). The VFS is owned
/// exclusively by the compiler context, which is how dirty tracking stays
/// consistent: collaborators never mutate disk directly.
#[derive(Debug, Default)]
pub struct VirtualFs {
    items: BTreeMap<String, VfsItem>,
    /// Directories staged for deletion by `empty_dirs`.
    queued_dir_deletes: BTreeSet<String>,
    /// Directory watch interest: path -> recursive.
    watch_dirs: BTreeMap<String, bool>,
    /// File watch interest.
    watch_files: BTreeSet<String>,
    /// Set once the first commit has run; `empty_dirs` is a no-op afterwards.
    has_committed: bool,
}

impl VirtualFs {
    /// Creates an empty VFS with no staged operations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a file, checking the in-memory layer first and falling
    /// through to the real filesystem on a miss. Disk content is cached
    /// so repeated reads of the same path hit memory.
    ///
    /// Never fails: a missing or unreadable file yields
    /// [`FileReadResult::NotFound`].
    pub fn read_file(&mut self, path: &Path) -> FileReadResult {
        let key = normalize_path(path);

        if let Some(item) = self.items.get(&key) {
            if item.queue_delete {
                return FileReadResult::NotFound;
            }
            if let Some(text) = &item.file_text {
                return FileReadResult::Found(text.clone());
            }
            if item.on_disk == Some(false) {
                return FileReadResult::NotFound;
            }
        }

        match std::fs::read_to_string(path) {
            Ok(text) => {
                let item = self.items.entry(key).or_default();
                item.file_text = Some(text.clone());
                item.on_disk = Some(true);
                FileReadResult::Found(text)
            }
            Err(_) => {
                let item = self.items.entry(key).or_default();
                item.on_disk = Some(false);
                FileReadResult::NotFound
            }
        }
    }

    /// Stages a write. The content is visible to subsequent reads
    /// immediately but does not touch disk until [`commit`](Self::commit).
    ///
    /// Writing content identical to what is already staged or cached for
    /// the path is a no-op, so repeated identical writes do not dirty it.
    pub fn write_file(&mut self, path: &Path, content: &str) {
        let key = normalize_path(path);
        let item = self.items.entry(key).or_default();
        if !item.queue_delete && item.file_text.as_deref() == Some(content) && !item.queue_write {
            // Already cached from disk with identical content.
            if item.on_disk == Some(true) {
                return;
            }
        }
        item.file_text = Some(content.to_string());
        item.queue_write = true;
        item.queue_delete = false;
    }

    /// Stages a delete for a single file.
    pub fn delete_file(&mut self, path: &Path) {
        let key = normalize_path(path);
        let item = self.items.entry(key).or_default();
        item.queue_delete = true;
        item.queue_write = false;
        item.file_text = None;
    }

    /// Recursively stages deletion of everything under the given
    /// directories. Used before the first build of an output target whose
    /// `empty` flag is set; a no-op on rebuilds (after the first commit).
    pub fn empty_dirs(&mut self, dirs: &[&Path]) {
        if self.has_committed {
            return;
        }
        for dir in dirs {
            let dir_key = normalize_path(dir);
            debug!(dir = %dir_key, "staging dir for emptying");

            // Drop any staged state under the directory.
            let prefix = format!("{dir_key}/");
            let staged: Vec<String> = self
                .items
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();
            for key in staged {
                self.items.remove(&key);
            }

            self.queued_dir_deletes.insert(dir_key);
        }
    }

    /// Drops the cached copy of a single path so the next read falls
    /// through to disk. Used when the watcher reports the file changed
    /// outside the compiler. Staged, uncommitted writes for the path are
    /// discarded too.
    pub fn invalidate(&mut self, path: &Path) {
        let key = normalize_path(path);
        if self.items.remove(&key).is_some() {
            debug!(path = %key, "invalidated cached file");
        }
    }

    /// Registers watch interest for a directory. The external watcher
    /// collaborator consumes this set and emits fs-change events.
    pub fn add_watch_dir(&mut self, path: &Path, recursive: bool) {
        self.watch_dirs.insert(normalize_path(path), recursive);
    }

    /// Registers watch interest for a single file.
    pub fn add_watch_file(&mut self, path: &Path) {
        self.watch_files.insert(normalize_path(path));
    }

    /// Returns the registered directory watch interest as
    /// `(path, recursive)` pairs.
    pub fn watched_dirs(&self) -> Vec<(String, bool)> {
        self.watch_dirs.iter().map(|(p, r)| (p.clone(), *r)).collect()
    }

    /// Returns the registered file watch interest.
    pub fn watched_files(&self) -> Vec<String> {
        self.watch_files.iter().cloned().collect()
    }

    /// Flushes all staged writes and deletes to the real filesystem in a
    /// single pass.
    ///
    /// Returns the files and directories actually added, updated, or
    /// deleted. A failed write or delete becomes a path-level
    /// [`CommitError`](crate::CommitError) and the rest of the batch still
    /// completes. Committing twice with no staged operations in between
    /// returns an empty result the second time.
    pub fn commit(&mut self) -> CommitResults {
        let mut results = CommitResults::default();

        // Emptied directories first, so staged writes can recreate content.
        let dir_deletes = std::mem::take(&mut self.queued_dir_deletes);
        for dir in dir_deletes {
            let path = Path::new(&dir);
            if !path.exists() {
                continue;
            }
            match remove_dir_contents(path) {
                Ok(removed) => {
                    results.files_deleted.extend(removed.files);
                    results.dirs_deleted.extend(removed.dirs);
                }
                Err(e) => {
                    warn!(dir = %dir, error = %e, "failed to empty dir");
                    results.errors.push(CommitError {
                        path: dir,
                        message: e.to_string(),
                    });
                }
            }
        }

        for (key, item) in self.items.iter_mut() {
            if item.queue_write {
                let path = Path::new(key);
                let existed = path.exists();

                if let Some(parent) = path.parent() {
                    if !parent.exists() {
                        // Every missing ancestor is a directory this
                        // commit adds, not just the immediate parent.
                        let mut created: Vec<String> = Vec::new();
                        let mut cursor = parent;
                        while !cursor.exists() {
                            created.push(normalize_path(cursor));
                            match cursor.parent() {
                                Some(up) if !up.as_os_str().is_empty() => cursor = up,
                                _ => break,
                            }
                        }
                        match std::fs::create_dir_all(parent) {
                            Ok(()) => results.dirs_added.extend(created),
                            Err(e) => {
                                results.errors.push(CommitError {
                                    path: key.clone(),
                                    message: e.to_string(),
                                });
                                item.queue_write = false;
                                continue;
                            }
                        }
                    }
                }

                let content = item.file_text.as_deref().unwrap_or_default();
                match std::fs::write(path, content) {
                    Ok(()) => {
                        if existed {
                            results.files_updated.push(key.clone());
                        } else {
                            results.files_added.push(key.clone());
                        }
                        item.on_disk = Some(true);
                    }
                    Err(e) => {
                        warn!(path = %key, error = %e, "failed to write file");
                        results.errors.push(CommitError {
                            path: key.clone(),
                            message: e.to_string(),
                        });
                    }
                }
                item.queue_write = false;
            } else if item.queue_delete {
                let path = Path::new(key);
                if path.exists() {
                    match std::fs::remove_file(path) {
                        Ok(()) => {
                            results.files_deleted.push(key.clone());
                            item.on_disk = Some(false);
                        }
                        Err(e) => {
                            warn!(path = %key, error = %e, "failed to delete file");
                            results.errors.push(CommitError {
                                path: key.clone(),
                                message: e.to_string(),
                            });
                        }
                    }
                } else {
                    item.on_disk = Some(false);
                }
                item.queue_delete = false;
            }
        }

        self.has_committed = true;
        results.sort();
        results
    }

    /// Drops the entire in-memory layer, keeping watch registrations.
    /// Staged, uncommitted operations are discarded.
    pub fn clear(&mut self) {
        self.items.clear();
        self.queued_dir_deletes.clear();
    }
}

/// Files and directories removed by [`remove_dir_contents`].
struct RemovedPaths {
    files: Vec<String>,
    dirs: Vec<String>,
}

/// Recursively removes everything inside `dir` (but not `dir` itself),
/// returning the removed paths.
fn remove_dir_contents(dir: &Path) -> std::io::Result<RemovedPaths> {
    let mut removed = RemovedPaths {
        files: Vec::new(),
        dirs: Vec::new(),
    };
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let inner = remove_dir_contents(&path)?;
            removed.files.extend(inner.files);
            removed.dirs.extend(inner.dirs);
            std::fs::remove_dir(&path)?;
            removed.dirs.push(normalize_path(&path));
        } else {
            std::fs::remove_file(&path)?;
            removed.files.push(normalize_path(&path));
        }
    }
    Ok(removed)
}
