//! The incremental rebuild driver for watch mode.

use std::path::Path;

use lattice_common::normalize_path;
use tracing::{debug, info};

use crate::build::{build, ModuleParser};
use crate::context::CompilerContext;
use crate::events::BuildEvent;
use crate::results::BuildResults;

/// One filesystem change reported by the external watcher collaborator.
///
/// The compiler registers watch interest through the VFS
/// ([`VirtualFs::watched_dirs`](lattice_vfs::VirtualFs::watched_dirs));
/// the collaborator observes the OS and reports back batches of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FsChange {
    /// A file appeared.
    FileAdd(String),
    /// A file's content changed.
    FileUpdate(String),
    /// A file was removed.
    FileDelete(String),
    /// A directory appeared.
    DirAdd(String),
    /// A directory was removed.
    DirDelete(String),
}

/// Drives incremental rebuilds from filesystem change batches.
///
/// The watcher is cooperative: the external collaborator pushes change
/// batches in via [`on_fs_change`](Watcher::on_fs_change), and the
/// embedder decides when to call [`rebuild`](Watcher::rebuild) (typically
/// after its debounce window). Every change and build is announced
/// through the context's event emitter.
pub struct Watcher {
    started: bool,
    closed: bool,
}

/// Creates a watcher. It accepts nothing until [`Watcher::start`].
pub fn create_watcher() -> Watcher {
    Watcher {
        started: false,
        closed: false,
    }
}

impl Watcher {
    /// Begins accepting change batches and rebuild requests.
    pub fn start(&mut self) {
        self.started = true;
        info!("watcher started");
    }

    /// Stops the watcher permanently. Later change batches and rebuild
    /// requests are ignored.
    pub fn close(&mut self) {
        self.closed = true;
        info!("watcher closed");
    }

    /// Whether the watcher is currently accepting input.
    pub fn is_active(&self) -> bool {
        self.started && !self.closed
    }

    /// Folds one batch of filesystem changes into the context's dirty
    /// sets, emitting one event per change.
    pub fn on_fs_change(&mut self, ctx: &mut CompilerContext, changes: &[FsChange]) {
        if !self.is_active() {
            debug!(changes = changes.len(), "ignoring changes, watcher inactive");
            return;
        }
        for change in changes {
            let event = match change {
                FsChange::FileAdd(path) => BuildEvent::FileAdd(path.clone()),
                FsChange::FileUpdate(path) => BuildEvent::FileUpdate(path.clone()),
                FsChange::FileDelete(path) => BuildEvent::FileDelete(path.clone()),
                FsChange::DirAdd(path) => BuildEvent::DirAdd(path.clone()),
                FsChange::DirDelete(path) => BuildEvent::DirDelete(path.clone()),
            };
            ctx.events.emit(&event);
            ctx.apply_change(change);
        }
    }

    /// Marks a single file dirty, as if the watcher had reported an
    /// update for it.
    pub fn request(&mut self, ctx: &mut CompilerContext, path: &Path) {
        let path = normalize_path(path);
        self.on_fs_change(ctx, &[FsChange::FileUpdate(path)]);
    }

    /// Runs a rebuild when anything is dirty; emits
    /// [`BuildEvent::BuildNoChange`] and skips the build otherwise.
    pub fn rebuild(
        &mut self,
        ctx: &mut CompilerContext,
        parser: &dyn ModuleParser,
    ) -> Option<BuildResults> {
        if !self.is_active() {
            return None;
        }
        if !ctx.has_pending_changes() {
            ctx.events.emit(&BuildEvent::BuildNoChange);
            return None;
        }
        Some(build(ctx, parser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_config::load_config_from_str;
    use lattice_meta::ComponentDecl;
    use lattice_workers::{RunnerFactory, TaskRunner};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct NullParser;

    impl ModuleParser for NullParser {
        fn parse_module(&self, _path: &str, _source: &str) -> Vec<ComponentDecl> {
            Vec::new()
        }
    }

    fn echo_factory() -> RunnerFactory {
        Arc::new(|_worker_id| {
            let runner: TaskRunner =
                Arc::new(|_m, args| Ok(args.get("css").cloned().unwrap_or_default()));
            runner
        })
    }

    fn test_context(project_dir: &Path) -> CompilerContext {
        let config = load_config_from_str(
            r#"
[project]
namespace = "App"

[build]
enable_cache = false
max_workers = 1
"#,
        )
        .unwrap();
        CompilerContext::new(project_dir, config, "0.1.0-test", echo_factory())
    }

    #[test]
    fn inactive_watcher_ignores_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let mut watcher = create_watcher();

        watcher.on_fs_change(
            &mut ctx,
            &[FsChange::FileUpdate("/p/src/a.tsx".to_string())],
        );
        assert!(!ctx.has_pending_changes());

        watcher.start();
        watcher.close();
        watcher.on_fs_change(
            &mut ctx,
            &[FsChange::FileUpdate("/p/src/a.tsx".to_string())],
        );
        assert!(!ctx.has_pending_changes());
        ctx.destroy();
    }

    #[test]
    fn changes_emit_events_and_dirty_the_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        ctx.events
            .subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let mut watcher = create_watcher();
        watcher.start();
        watcher.on_fs_change(
            &mut ctx,
            &[
                FsChange::FileAdd("/p/src/new.tsx".to_string()),
                FsChange::FileDelete("/p/src/old.tsx".to_string()),
            ],
        );

        assert!(ctx.has_pending_changes());
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], BuildEvent::FileAdd("/p/src/new.tsx".to_string()));
        assert_eq!(seen[1], BuildEvent::FileDelete("/p/src/old.tsx".to_string()));
        drop(seen);
        ctx.destroy();
    }

    #[test]
    fn rebuild_without_changes_emits_no_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let no_change_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&no_change_count);
        ctx.events.subscribe(move |event| {
            if *event == BuildEvent::BuildNoChange {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut watcher = create_watcher();
        watcher.start();
        let results = watcher.rebuild(&mut ctx, &NullParser);
        assert!(results.is_none());
        assert_eq!(no_change_count.load(Ordering::SeqCst), 1);
        ctx.destroy();
    }

    #[test]
    fn request_marks_file_dirty_and_rebuild_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        let log_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&log_count);
        ctx.events.subscribe(move |event| {
            if matches!(event, BuildEvent::BuildLog(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let mut watcher = create_watcher();
        watcher.start();

        watcher.request(&mut ctx, &dir.path().join("src/a.tsx"));
        assert!(ctx.has_pending_changes());

        let results = watcher.rebuild(&mut ctx, &NullParser);
        assert!(results.is_some());
        assert!(!ctx.has_pending_changes());
        assert!(log_count.load(Ordering::SeqCst) >= 1, "builds report progress");
        ctx.destroy();
    }
}
