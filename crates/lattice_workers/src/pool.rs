//! The worker pool: dispatch policy, retries, affinity, and shutdown.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, unbounded, Receiver};
use tracing::{debug, warn};

use crate::task::{RunnerFactory, TaskError, TaskId, TaskOptions, TaskRunner, WireRequest, WireResponse};
use crate::worker::{WorkerEnvelope, WorkerHandle, WorkerMsg, WorkerShared};

/// Infrastructure failures (worker crash) are retried this many times
/// before the task fails terminally. Logical task errors never retry.
const MAX_TASK_RETRIES: usize = 2;

/// Worker id reported for tasks executed in-process when no worker
/// thread could be started.
pub const IN_PROCESS_WORKER_ID: usize = usize::MAX;

/// A fixed-size pool of worker threads executing named, serializable
/// tasks.
///
/// Tasks without an affinity key go to the least-loaded live worker;
/// tasks with one are pinned to a single worker until that worker dies,
/// at which point the binding is reassigned. Long-running tasks prefer
/// workers not already running another long-running task. If no worker
/// thread can be started at all, the pool degrades to executing tasks
/// in-process on the caller's thread.
pub struct WorkerPool {
    state: Mutex<PoolState>,
    next_task_id: AtomicU64,
    shutdown: AtomicBool,
    fallback_runner: TaskRunner,
}

struct PoolState {
    workers: Vec<WorkerHandle>,
    /// Affinity key -> index into `workers`.
    affinity: HashMap<String, usize>,
}

impl WorkerPool {
    /// Creates a pool with `max_workers` threads (`0` means hardware
    /// concurrency), building each worker's runner from `factory`.
    pub fn new(max_workers: usize, factory: RunnerFactory) -> Self {
        let count = if max_workers == 0 {
            num_cpus::get()
        } else {
            max_workers
        };

        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let (sender, receiver) = unbounded();
            match WorkerHandle::spawn(id, factory(id), receiver, sender) {
                Some(handle) => workers.push(handle),
                None => warn!(worker = id, "failed to start worker thread"),
            }
        }

        if workers.is_empty() {
            warn!("no worker threads available, tasks will run in-process");
        } else {
            debug!(workers = workers.len(), "worker pool started");
        }

        Self {
            state: Mutex::new(PoolState {
                workers,
                affinity: HashMap::new(),
            }),
            next_task_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            fallback_runner: factory(IN_PROCESS_WORKER_ID),
        }
    }

    /// Creates a pool that executes every task in-process on the
    /// caller's thread. This is the degraded mode used when worker
    /// threads cannot start; exposed for callers that want it directly.
    pub fn in_process(factory: RunnerFactory) -> Self {
        Self {
            state: Mutex::new(PoolState {
                workers: Vec::new(),
                affinity: HashMap::new(),
            }),
            next_task_id: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            fallback_runner: factory(IN_PROCESS_WORKER_ID),
        }
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Returns `true` after [`destroy`](Self::destroy).
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Dispatches a task and returns a handle to await its result.
    ///
    /// Responses arrive out of order across tasks; each pending task's
    /// response is correlated by task id on its own reply channel.
    pub fn dispatch(
        &self,
        method: &str,
        args: serde_json::Value,
        opts: TaskOptions,
    ) -> PendingTask<'_> {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);

        if self.is_shutdown() {
            // A closed reply channel makes the pending task fail with
            // PoolShutdown on wait.
            let (_tx, rx) = bounded(1);
            return PendingTask {
                pool: self,
                task_id,
                method: method.to_string(),
                args,
                opts,
                attempts: 1,
                receiver: rx,
                assigned: None,
            };
        }

        let (receiver, assigned) = self.send_to_worker(task_id, method, &args, &opts);
        PendingTask {
            pool: self,
            task_id,
            method: method.to_string(),
            args,
            opts,
            attempts: 1,
            receiver,
            assigned,
        }
    }

    /// Dispatches a task and blocks for its result.
    pub fn run(
        &self,
        method: &str,
        args: serde_json::Value,
        opts: TaskOptions,
    ) -> Result<serde_json::Value, TaskError> {
        self.dispatch(method, args, opts).wait()
    }

    /// Routes one request to a worker per the dispatch policy, or runs it
    /// in-process when no live worker exists. Returns the reply channel
    /// and the shared state of the assigned worker (for load accounting).
    fn send_to_worker(
        &self,
        task_id: TaskId,
        method: &str,
        args: &serde_json::Value,
        opts: &TaskOptions,
    ) -> (Receiver<WireResponse>, Option<Arc<WorkerShared>>) {
        let mut state = self.state.lock().unwrap();

        // Drop the queue sender of any worker that has died. That tears
        // down its channel, and with it any envelopes still buffered
        // behind the crash, so their waiters wake and retry.
        for worker in state.workers.iter_mut() {
            if !worker.is_alive() && worker.sender.is_some() {
                warn!(worker = worker.id, "purging dead worker queue");
                worker.sender = None;
            }
        }

        let chosen = choose_worker(&mut state, opts);
        match chosen {
            Some(idx) => {
                let worker = &state.workers[idx];
                worker.shared.load.fetch_add(1, Ordering::Relaxed);
                if opts.is_long_running {
                    worker.shared.long_running.fetch_add(1, Ordering::Relaxed);
                }

                let (reply_tx, reply_rx) = bounded(1);
                let envelope = WorkerEnvelope {
                    request: WireRequest {
                        task_id,
                        method: method.to_string(),
                        args: args.clone(),
                    },
                    reply: reply_tx,
                };
                let shared = Arc::clone(&worker.shared);
                let sent = worker
                    .sender
                    .as_ref()
                    .is_some_and(|s| s.send(WorkerMsg::Run(envelope)).is_ok());
                if !sent {
                    // The worker died between the liveness check and the
                    // send; the dropped envelope surfaces as a lost
                    // worker and the retry path picks another.
                    warn!(worker = worker.id, task = task_id, "worker channel closed before send");
                }
                (reply_rx, Some(shared))
            }
            None => {
                drop(state);
                (self.run_in_process(task_id, method, args), None)
            }
        }
    }

    /// Executes a task synchronously on the caller's thread and returns
    /// a reply channel already holding the response.
    fn run_in_process(
        &self,
        task_id: TaskId,
        method: &str,
        args: &serde_json::Value,
    ) -> Receiver<WireResponse> {
        let (reply_tx, reply_rx) = bounded(1);
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            (self.fallback_runner)(method, args)
        }));
        let response = match outcome {
            Ok(Ok(value)) => WireResponse {
                task_id,
                value: Some(value),
                error: None,
            },
            Ok(Err(message)) => WireResponse {
                task_id,
                value: None,
                error: Some(message),
            },
            // In-process there is no other worker to retry on; a panic
            // is a logical failure.
            Err(_) => WireResponse {
                task_id,
                value: None,
                error: Some(format!("task '{method}' panicked in-process")),
            },
        };
        let _ = reply_tx.send(response);
        reply_rx
    }

    /// Signals all workers to exit and joins them. In-flight tasks are
    /// rejected with [`TaskError::PoolShutdown`]; no new tasks are
    /// accepted afterwards.
    pub fn destroy(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut state = self.state.lock().unwrap();
        for worker in state.workers.iter_mut() {
            if let Some(sender) = worker.sender.take() {
                let _ = sender.send(WorkerMsg::Exit);
            }
        }
        for worker in state.workers.iter_mut() {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
        state.workers.clear();
        state.affinity.clear();
        debug!("worker pool destroyed");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Picks a worker index per the dispatch policy, updating the affinity
/// map. `None` means no live worker exists.
fn choose_worker(state: &mut PoolState, opts: &TaskOptions) -> Option<usize> {
    if let Some(key) = &opts.affinity_key {
        if let Some(&idx) = state.affinity.get(key) {
            if state.workers.get(idx).is_some_and(|w| w.is_alive()) {
                return Some(idx);
            }
            // Bound worker died; fall through and rebind below.
        }
    }

    let live: Vec<usize> = state
        .workers
        .iter()
        .enumerate()
        .filter(|(_, w)| w.is_alive())
        .map(|(i, _)| i)
        .collect();
    if live.is_empty() {
        return None;
    }

    // Long-running tasks avoid workers already running one, when possible.
    let candidates: Vec<usize> = if opts.is_long_running {
        let free: Vec<usize> = live
            .iter()
            .copied()
            .filter(|&i| state.workers[i].shared.long_running.load(Ordering::Relaxed) == 0)
            .collect();
        if free.is_empty() {
            live
        } else {
            free
        }
    } else {
        live
    };

    let idx = candidates
        .into_iter()
        .min_by_key(|&i| state.workers[i].shared.load.load(Ordering::Relaxed))?;

    if let Some(key) = &opts.affinity_key {
        state.affinity.insert(key.clone(), idx);
    }
    Some(idx)
}

/// A dispatched task whose result has not been collected yet.
///
/// Holds everything needed to resubmit the task if its worker crashes:
/// the retry is an explicit loop threading an attempt count, not mutation
/// of a shared task object.
pub struct PendingTask<'a> {
    pool: &'a WorkerPool,
    task_id: TaskId,
    method: String,
    args: serde_json::Value,
    opts: TaskOptions,
    attempts: usize,
    receiver: Receiver<WireResponse>,
    assigned: Option<Arc<WorkerShared>>,
}

impl PendingTask<'_> {
    /// The unique id assigned to this task.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Blocks until the task completes, retrying crashed-worker failures
    /// up to the retry budget. Logical task errors are returned on the
    /// first occurrence.
    pub fn wait(mut self) -> Result<serde_json::Value, TaskError> {
        loop {
            match self.receiver.recv() {
                Ok(response) => {
                    self.release_assignment();
                    if self.pool.is_shutdown() {
                        return Err(TaskError::PoolShutdown);
                    }
                    debug_assert_eq!(response.task_id, self.task_id);
                    return match response.error {
                        Some(message) => Err(TaskError::Task(message)),
                        None => Ok(response.value.unwrap_or(serde_json::Value::Null)),
                    };
                }
                Err(_) => {
                    // The reply sender was dropped: the worker crashed,
                    // or the pool shut down with this task in flight.
                    self.release_assignment();
                    if self.pool.is_shutdown() {
                        return Err(TaskError::PoolShutdown);
                    }
                    if self.attempts > MAX_TASK_RETRIES {
                        return Err(TaskError::WorkerLost {
                            attempts: self.attempts,
                        });
                    }
                    self.attempts += 1;
                    debug!(task = self.task_id, attempt = self.attempts, "resubmitting task after worker loss");
                    let (receiver, assigned) = self.pool.send_to_worker(
                        self.task_id,
                        &self.method,
                        &self.args,
                        &self.opts,
                    );
                    self.receiver = receiver;
                    self.assigned = assigned;
                }
            }
        }
    }

    fn release_assignment(&mut self) {
        if let Some(shared) = self.assigned.take() {
            shared.load.fetch_sub(1, Ordering::Relaxed);
            if self.opts.is_long_running {
                shared.long_running.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Runner that reports the executing worker's id.
    fn worker_id_factory() -> RunnerFactory {
        Arc::new(|worker_id: usize| {
            let runner: TaskRunner = Arc::new(move |method, _args| {
                Ok(serde_json::json!({ "method": method, "workerId": worker_id }))
            });
            runner
        })
    }

    #[test]
    fn runs_task_and_returns_value() {
        let pool = WorkerPool::new(2, worker_id_factory());
        let value = pool
            .run("optimizeCss", serde_json::json!({"css": "a{}"}), TaskOptions::default())
            .unwrap();
        assert_eq!(value["method"], "optimizeCss");
        pool.destroy();
    }

    #[test]
    fn task_ids_are_unique_and_monotonic() {
        let pool = WorkerPool::new(2, worker_id_factory());
        let a = pool.dispatch("m", serde_json::Value::Null, TaskOptions::default());
        let b = pool.dispatch("m", serde_json::Value::Null, TaskOptions::default());
        assert!(b.task_id() > a.task_id());
        a.wait().unwrap();
        b.wait().unwrap();
        pool.destroy();
    }

    #[test]
    fn out_of_order_collection_matches_by_task_id() {
        let pool = WorkerPool::new(3, worker_id_factory());
        let a = pool.dispatch("first", serde_json::Value::Null, TaskOptions::default());
        let b = pool.dispatch("second", serde_json::Value::Null, TaskOptions::default());
        // Collect in reverse dispatch order.
        assert_eq!(b.wait().unwrap()["method"], "second");
        assert_eq!(a.wait().unwrap()["method"], "first");
        pool.destroy();
    }

    #[test]
    fn affinity_tasks_route_to_same_worker() {
        let pool = WorkerPool::new(4, worker_id_factory());
        let opts = TaskOptions::with_affinity("ts-program");

        let first = pool
            .run("prepareModule", serde_json::Value::Null, opts.clone())
            .unwrap();
        let second = pool
            .run("prepareModule", serde_json::Value::Null, opts)
            .unwrap();
        assert_eq!(first["workerId"], second["workerId"]);
        pool.destroy();
    }

    #[test]
    fn keyless_tasks_spread_by_load() {
        let pool = WorkerPool::new(2, worker_id_factory());
        // Dispatch two tasks without collecting: the second must not pile
        // onto the busy worker.
        let a = pool.dispatch("m", serde_json::Value::Null, TaskOptions::default());
        let b = pool.dispatch("m", serde_json::Value::Null, TaskOptions::default());
        let ra = a.wait().unwrap();
        let rb = b.wait().unwrap();
        assert_ne!(ra["workerId"], rb["workerId"]);
        pool.destroy();
    }

    #[test]
    fn logical_error_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let factory: RunnerFactory = Arc::new(move |_worker_id| {
            let counter = Arc::clone(&counter);
            let runner: TaskRunner = Arc::new(move |_m, _a| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("invalid css".to_string())
            });
            runner
        });

        let pool = WorkerPool::new(2, factory);
        let err = pool
            .run("optimizeCss", serde_json::Value::Null, TaskOptions::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::Task(ref m) if m == "invalid css"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "logical errors never retry");
        pool.destroy();
    }

    #[test]
    fn crash_retries_then_fails_terminally() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let factory: RunnerFactory = Arc::new(move |_worker_id| {
            let counter = Arc::clone(&counter);
            let runner: TaskRunner = Arc::new(move |_m, _a| {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("worker dies every time");
            });
            runner
        });

        // Enough workers that every retry finds a live one.
        let pool = WorkerPool::new(4, factory);
        let err = pool
            .run("prerender", serde_json::Value::Null, TaskOptions::default())
            .unwrap_err();
        match err {
            TaskError::WorkerLost { attempts: n } => {
                assert_eq!(n, 1 + MAX_TASK_RETRIES, "first attempt plus the retry budget")
            }
            other => panic!("expected WorkerLost, got {other:?}"),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1 + MAX_TASK_RETRIES);
        pool.destroy();
    }

    #[test]
    fn crash_once_then_succeed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: RunnerFactory = Arc::new(move |worker_id| {
            let counter = Arc::clone(&counter);
            let runner: TaskRunner = Arc::new(move |_m, _a| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first attempt crashes");
                }
                Ok(serde_json::json!({ "workerId": worker_id }))
            });
            runner
        });

        let pool = WorkerPool::new(3, factory);
        let value = pool
            .run("prepareModule", serde_json::Value::Null, TaskOptions::default())
            .unwrap();
        assert!(value["workerId"].is_number());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        pool.destroy();
    }

    #[test]
    fn affinity_rebinds_after_worker_death() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: RunnerFactory = Arc::new(move |worker_id| {
            let counter = Arc::clone(&counter);
            let runner: TaskRunner = Arc::new(move |_m, _a| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("bound worker dies");
                }
                Ok(serde_json::json!({ "workerId": worker_id }))
            });
            runner
        });

        let pool = WorkerPool::new(3, factory);
        let opts = TaskOptions::with_affinity("styles");

        // First task crashes its worker, retries elsewhere, and the
        // binding moves with it.
        let survivor = pool.run("m", serde_json::Value::Null, opts.clone()).unwrap();
        let again = pool.run("m", serde_json::Value::Null, opts).unwrap();
        assert_eq!(survivor["workerId"], again["workerId"]);
        pool.destroy();
    }

    #[test]
    fn long_running_tasks_avoid_each_other() {
        let factory: RunnerFactory = Arc::new(|worker_id| {
            let runner: TaskRunner = Arc::new(move |method, _a| {
                if method == "slow" {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                Ok(serde_json::json!({ "workerId": worker_id }))
            });
            runner
        });

        let pool = WorkerPool::new(2, factory);
        let a = pool.dispatch("slow", serde_json::Value::Null, TaskOptions::long_running("a"));
        let b = pool.dispatch("slow", serde_json::Value::Null, TaskOptions::long_running("b"));
        let ra = a.wait().unwrap();
        let rb = b.wait().unwrap();
        assert_ne!(ra["workerId"], rb["workerId"]);
        pool.destroy();
    }

    #[test]
    fn destroy_rejects_new_tasks() {
        let pool = WorkerPool::new(2, worker_id_factory());
        pool.destroy();
        let err = pool
            .run("m", serde_json::Value::Null, TaskOptions::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::PoolShutdown));
    }

    #[test]
    fn in_process_pool_runs_on_caller_thread() {
        let pool = WorkerPool::in_process(worker_id_factory());
        assert_eq!(pool.worker_count(), 0);
        let value = pool
            .run("optimizeCss", serde_json::Value::Null, TaskOptions::default())
            .unwrap();
        assert_eq!(value["workerId"], serde_json::json!(IN_PROCESS_WORKER_ID));
    }

    #[test]
    fn in_process_panic_is_logical_error() {
        let factory: RunnerFactory = Arc::new(|_worker_id| {
            let runner: TaskRunner = Arc::new(|_m, _a| panic!("boom"));
            runner
        });
        let pool = WorkerPool::in_process(factory);
        let err = pool
            .run("m", serde_json::Value::Null, TaskOptions::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::Task(_)));
    }
}
