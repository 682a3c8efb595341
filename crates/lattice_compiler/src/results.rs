//! The reporting shape a finished build produces.

use lattice_diagnostics::Diagnostic;
use lattice_meta::BuildConditionals;
use serde::{Deserialize, Serialize};

/// Everything a caller learns from one finished build.
///
/// Archived on the compiler context as the last build's results; a build
/// with at least one error still carries whatever partial output was
/// produced, with `has_error` set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildResults {
    /// The id of the build that produced these results.
    pub build_id: u64,
    /// Whether this was an incremental rebuild.
    pub is_rebuild: bool,
    /// The project namespace.
    pub namespace: String,
    /// Wall-clock duration of the build in milliseconds.
    pub duration_ms: u64,
    /// Milliseconds since the Unix epoch at build start.
    pub timestamp_ms: u64,
    /// All diagnostics, ordered by file then position.
    pub diagnostics: Vec<Diagnostic>,
    /// Whether any diagnostic is an error.
    pub has_error: bool,
    /// Number of components in scope for this build.
    pub component_count: usize,
    /// Modules (re-)extracted during this build.
    pub modules_touched: Vec<String>,
    /// Files the commit created on disk.
    pub files_added: Vec<String>,
    /// Files the commit rewrote on disk.
    pub files_updated: Vec<String>,
    /// Files the commit removed from disk.
    pub files_deleted: Vec<String>,
    /// Directories the commit created.
    pub dirs_added: Vec<String>,
    /// Directories the commit removed.
    pub dirs_deleted: Vec<String>,
    /// The aggregate feature flags derived for this build's component set.
    pub conditionals: BuildConditionals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_roundtrip() {
        let results = BuildResults {
            build_id: 3,
            is_rebuild: true,
            namespace: "App".to_string(),
            duration_ms: 12,
            timestamp_ms: 1_700_000_000_000,
            diagnostics: Vec::new(),
            has_error: false,
            component_count: 2,
            modules_touched: vec!["/src/a.tsx".to_string()],
            files_added: Vec::new(),
            files_updated: vec!["/www/build/app.js".to_string()],
            files_deleted: Vec::new(),
            dirs_added: Vec::new(),
            dirs_deleted: Vec::new(),
            conditionals: BuildConditionals::default(),
        };
        let json = serde_json::to_string(&results).unwrap();
        let back: BuildResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back.build_id, 3);
        assert!(back.is_rebuild);
        assert_eq!(back.files_updated, results.files_updated);
    }
}
