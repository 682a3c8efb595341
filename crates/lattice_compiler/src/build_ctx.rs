//! The ephemeral per-build context.

use std::collections::BTreeSet;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use lattice_diagnostics::{sort_diagnostics, DiagnosticSink, Severity};
use lattice_meta::{BuildConditionals, ComponentMeta};
use lattice_vfs::CommitResults;

use crate::results::BuildResults;

/// State collected over the course of exactly one build.
///
/// Created at build start with a snapshot of the dirty sets; every field
/// is append-only while the build runs. At build end it is folded into a
/// [`BuildResults`] and discarded.
pub struct BuildContext {
    /// The id of this build, copied from the context's counter at start.
    pub build_id: u64,
    /// Whether a successful build preceded this one.
    pub is_rebuild: bool,
    /// The files that were dirty when this build started. Files changing
    /// mid-build are not in here; they belong to the next build.
    pub changed_files: BTreeSet<String>,
    /// The modules that were dirty when this build started.
    pub changed_modules: BTreeSet<String>,
    /// Diagnostics collected while the build runs.
    pub sink: DiagnosticSink,
    /// Modules (re-)extracted during this build.
    pub modules_touched: Vec<String>,
    /// Every component in scope for this build.
    pub components: Vec<ComponentMeta>,
    /// The aggregate feature flags for this build's component set.
    pub conditionals: BuildConditionals,
    start: Instant,
    timestamp_ms: u64,
}

impl BuildContext {
    /// Starts a build context with the given dirty-set snapshot.
    pub fn new(
        build_id: u64,
        is_rebuild: bool,
        changed_files: BTreeSet<String>,
        changed_modules: BTreeSet<String>,
    ) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            build_id,
            is_rebuild,
            changed_files,
            changed_modules,
            sink: DiagnosticSink::new(),
            modules_touched: Vec::new(),
            components: Vec::new(),
            conditionals: BuildConditionals::default(),
            start: Instant::now(),
            timestamp_ms,
        }
    }

    /// Whether any error diagnostic has been recorded so far.
    pub fn has_error(&self) -> bool {
        self.sink.has_errors()
    }

    /// Folds this build and its commit results into the final reporting
    /// shape. Diagnostics are ordered by file then position.
    pub fn finalize(self, namespace: &str, commit: CommitResults) -> BuildResults {
        let mut diagnostics = self.sink.take_all();
        sort_diagnostics(&mut diagnostics);
        let has_error = diagnostics.iter().any(|d| d.severity == Severity::Error);

        BuildResults {
            build_id: self.build_id,
            is_rebuild: self.is_rebuild,
            namespace: namespace.to_string(),
            duration_ms: self.start.elapsed().as_millis() as u64,
            timestamp_ms: self.timestamp_ms,
            diagnostics,
            has_error,
            component_count: self.components.len(),
            modules_touched: self.modules_touched,
            files_added: commit.files_added,
            files_updated: commit.files_updated,
            files_deleted: commit.files_deleted,
            dirs_added: commit.dirs_added,
            dirs_deleted: commit.dirs_deleted,
            conditionals: self.conditionals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_diagnostics::{Category, Diagnostic, DiagnosticCode};

    #[test]
    fn finalize_orders_diagnostics_and_sets_has_error() {
        let ctx = BuildContext::new(1, false, BTreeSet::new(), BTreeSet::new());
        ctx.sink.emit(
            Diagnostic::warning(
                DiagnosticCode::new(Category::Style, 301),
                "Unused Style",
                "mode never selected",
            )
            .with_file("/src/b.tsx"),
        );
        ctx.sink.emit(
            Diagnostic::error(
                DiagnosticCode::new(Category::Meta, 101),
                "Missing Component Tag",
                "empty tag",
            )
            .with_file("/src/a.tsx"),
        );

        let results = ctx.finalize("App", CommitResults::default());
        assert!(results.has_error);
        assert_eq!(results.diagnostics[0].file_path.as_deref(), Some("/src/a.tsx"));
        assert_eq!(results.diagnostics[1].file_path.as_deref(), Some("/src/b.tsx"));
    }

    #[test]
    fn warnings_alone_do_not_fail_the_build() {
        let ctx = BuildContext::new(2, true, BTreeSet::new(), BTreeSet::new());
        ctx.sink.emit(Diagnostic::warning(
            DiagnosticCode::new(Category::Warning, 1),
            "Slow Build",
            "still fine",
        ));
        let results = ctx.finalize("App", CommitResults::default());
        assert!(!results.has_error);
        assert!(results.is_rebuild);
    }
}
