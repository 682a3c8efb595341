//! A single worker thread and its request channel.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::task::{TaskRunner, WireRequest, WireResponse};

/// A request envelope: the wire message plus the channel the response
/// travels back on. Only the wire message itself is serializable data;
/// the reply channel is the transport.
pub(crate) struct WorkerEnvelope {
    pub request: WireRequest,
    pub reply: Sender<WireResponse>,
}

/// Control messages understood by the worker loop.
pub(crate) enum WorkerMsg {
    Run(WorkerEnvelope),
    Exit,
}

/// Worker state shared with the pool's dispatch policy.
pub(crate) struct WorkerShared {
    /// Number of tasks currently assigned and not yet completed.
    pub load: AtomicUsize,
    /// Number of long-running tasks currently assigned.
    pub long_running: AtomicUsize,
    /// Cleared when the worker thread dies (crash or exit).
    pub alive: AtomicBool,
}

impl WorkerShared {
    pub fn new() -> Self {
        Self {
            load: AtomicUsize::new(0),
            long_running: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
        }
    }
}

/// Handle to one worker owned by the pool.
///
/// The pool holds the only `Sender` for the worker's queue; dropping it
/// (on shutdown, or when purging a dead worker) tears the channel down
/// and with it any buffered envelopes, which wakes their waiters.
pub(crate) struct WorkerHandle {
    pub id: usize,
    pub sender: Option<Sender<WorkerMsg>>,
    pub shared: Arc<WorkerShared>,
    pub thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns a worker thread running `runner`. Returns `None` if the OS
    /// refuses to start the thread.
    pub fn spawn(id: usize, runner: TaskRunner, receiver: Receiver<WorkerMsg>, sender: Sender<WorkerMsg>) -> Option<Self> {
        let shared = Arc::new(WorkerShared::new());
        let thread_shared = Arc::clone(&shared);

        let thread = thread::Builder::new()
            .name(format!("lattice-worker-{id}"))
            .spawn(move || {
                run_loop(id, runner, receiver, &thread_shared);
                thread_shared.alive.store(false, Ordering::Release);
            })
            .ok()?;

        Some(Self {
            id,
            sender: Some(sender),
            shared,
            thread: Some(thread),
        })
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }
}

/// The worker loop: receive a request, run it, send the response.
///
/// A panic inside the runner is a crash: the worker reports nothing for
/// that task (the dropped reply channel signals the loss) and the thread
/// exits, mirroring a dead worker process.
fn run_loop(
    id: usize,
    runner: TaskRunner,
    receiver: Receiver<WorkerMsg>,
    shared: &WorkerShared,
) {
    debug!(worker = id, "worker started");
    while let Ok(msg) = receiver.recv() {
        let envelope = match msg {
            WorkerMsg::Run(envelope) => envelope,
            WorkerMsg::Exit => break,
        };

        let WireRequest {
            task_id,
            method,
            args,
        } = envelope.request;

        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| runner(&method, &args)));

        match outcome {
            Ok(Ok(value)) => {
                let _ = envelope.reply.send(WireResponse {
                    task_id,
                    value: Some(value),
                    error: None,
                });
            }
            Ok(Err(message)) => {
                let _ = envelope.reply.send(WireResponse {
                    task_id,
                    value: None,
                    error: Some(message),
                });
            }
            Err(_) => {
                // Crash: report nothing for this task and die. The alive
                // flag goes down before the reply sender is dropped, so a
                // waiter observing the loss never routes back here; any
                // envelopes already queued are drained so their waiters
                // see the loss too.
                warn!(worker = id, task = task_id, method = %method, "worker crashed running task");
                shared.alive.store(false, Ordering::Release);
                drop(envelope.reply);
                while receiver.try_recv().is_ok() {}
                return;
            }
        }
    }
    debug!(worker = id, "worker exited");
}
