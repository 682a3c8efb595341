//! Fixed-size worker pool for CPU-bound, side-effect-free build tasks.
//!
//! Workers are independent OS threads that communicate with the
//! orchestrator purely by message passing: every task argument and result
//! is plain serializable data, never a live reference. Tasks with an
//! affinity key are pinned to one worker to reuse its warm in-worker
//! caches; crashed-worker failures are retried on another worker up to a
//! small budget, while logical task errors are reported immediately.

pub mod pool;
pub mod task;
pub mod worker;

pub use pool::{PendingTask, WorkerPool};
pub use task::{RunnerFactory, TaskError, TaskId, TaskOptions, TaskRunner, WireRequest, WireResponse};
