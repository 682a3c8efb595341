//! Commit results returned when staged VFS operations are flushed to disk.

use serde::{Deserialize, Serialize};

/// A path-level failure captured during a commit.
///
/// Commit never aborts on a failed write or delete; the failure is
/// recorded here and the rest of the batch proceeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitError {
    /// The normalized path the operation failed on.
    pub path: String,
    /// Description of the underlying I/O failure.
    pub message: String,
}

/// The set of filesystem mutations a [`commit`](crate::VirtualFs::commit)
/// actually performed.
///
/// Feeds the changed-file sets of the build that triggered the commit.
/// All paths are normalized. A commit with nothing staged returns an
/// empty result (`is_empty() == true`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitResults {
    /// Files created that did not previously exist on disk.
    pub files_added: Vec<String>,
    /// Files that existed on disk and were overwritten with new content.
    pub files_updated: Vec<String>,
    /// Files removed from disk.
    pub files_deleted: Vec<String>,
    /// Directories created while writing files.
    pub dirs_added: Vec<String>,
    /// Directories removed (via `empty_dirs` staging).
    pub dirs_deleted: Vec<String>,
    /// Path-level failures; the rest of the batch still completed.
    pub errors: Vec<CommitError>,
}

impl CommitResults {
    /// Returns `true` if the commit performed no filesystem mutations
    /// and recorded no errors.
    pub fn is_empty(&self) -> bool {
        self.files_added.is_empty()
            && self.files_updated.is_empty()
            && self.files_deleted.is_empty()
            && self.dirs_added.is_empty()
            && self.dirs_deleted.is_empty()
            && self.errors.is_empty()
    }

    /// Sorts every path list for deterministic reporting.
    pub fn sort(&mut self) {
        self.files_added.sort();
        self.files_updated.sort();
        self.files_deleted.sort();
        self.dirs_added.sort();
        self.dirs_deleted.sort();
        self.errors.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(CommitResults::default().is_empty());
    }

    #[test]
    fn error_makes_non_empty() {
        let mut results = CommitResults::default();
        results.errors.push(CommitError {
            path: "/www/index.js".to_string(),
            message: "permission denied".to_string(),
        });
        assert!(!results.is_empty());
    }

    #[test]
    fn sort_orders_paths() {
        let mut results = CommitResults::default();
        results.files_added = vec!["/b.js".to_string(), "/a.js".to_string()];
        results.sort();
        assert_eq!(results.files_added, vec!["/a.js", "/b.js"]);
    }
}
