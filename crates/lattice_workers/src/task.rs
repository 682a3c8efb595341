//! Task types and the wire protocol between orchestrator and workers.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique task identifier, monotonic for the life of the pool.
///
/// Responses may arrive out of dispatch order; the task id is the only
/// ordering key that matters.
pub type TaskId = u64;

/// The message sent from the orchestrator to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    /// Unique id for correlating the response.
    pub task_id: TaskId,
    /// Name of the method the worker should run (e.g. `"optimizeCss"`).
    pub method: String,
    /// Serialized arguments; plain data only, no live references.
    pub args: serde_json::Value,
}

/// The message a worker sends back for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    /// The id of the request this responds to.
    pub task_id: TaskId,
    /// The successful result, if the method completed.
    pub value: Option<serde_json::Value>,
    /// The logical error message, if the method ran and failed.
    pub error: Option<String>,
}

/// Scheduling options for a dispatched task.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Long-running tasks are scheduled onto workers not already running
    /// one, so short tasks are not stuck behind them.
    pub is_long_running: bool,
    /// Tasks sharing an affinity key always route to the same worker
    /// while that worker lives, to reuse its warm in-worker state.
    pub affinity_key: Option<String>,
}

impl TaskOptions {
    /// Options for a long-running task with the given affinity key.
    pub fn long_running(affinity_key: impl Into<String>) -> Self {
        Self {
            is_long_running: true,
            affinity_key: Some(affinity_key.into()),
        }
    }

    /// Options for a task pinned to the given affinity key.
    pub fn with_affinity(affinity_key: impl Into<String>) -> Self {
        Self {
            is_long_running: false,
            affinity_key: Some(affinity_key.into()),
        }
    }
}

/// How a task ultimately failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// The worker ran the method and it failed. Never retried.
    #[error("task failed: {0}")]
    Task(String),

    /// The worker crashed or became unreachable and the retry budget is
    /// exhausted.
    #[error("worker lost while running task (after {attempts} attempts)")]
    WorkerLost {
        /// Total attempts made, including the first.
        attempts: usize,
    },

    /// The pool was destroyed while the task was queued or in flight.
    #[error("worker pool shut down")]
    PoolShutdown,
}

/// The function each worker uses to execute methods.
///
/// Returns `Ok(value)` on success or `Err(message)` for a logical task
/// error. A panic inside the runner is treated as a worker crash.
pub type TaskRunner =
    Arc<dyn Fn(&str, &serde_json::Value) -> Result<serde_json::Value, String> + Send + Sync>;

/// Builds the runner for one worker, given the worker's id.
///
/// The id is handed to the factory so worker-local state (and tests that
/// verify affinity routing) can observe which worker executed a task.
pub type RunnerFactory = Arc<dyn Fn(usize) -> TaskRunner + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_request_roundtrip() {
        let req = WireRequest {
            task_id: 7,
            method: "optimizeCss".to_string(),
            args: serde_json::json!({"css": "a{}", "minify": true}),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: WireRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_id, 7);
        assert_eq!(back.method, "optimizeCss");
        assert_eq!(back.args["minify"], true);
    }

    #[test]
    fn wire_response_success_or_error() {
        let ok = WireResponse {
            task_id: 1,
            value: Some(serde_json::json!("done")),
            error: None,
        };
        let err = WireResponse {
            task_id: 2,
            value: None,
            error: Some("bad css".to_string()),
        };
        assert!(ok.value.is_some() && ok.error.is_none());
        assert!(err.value.is_none() && err.error.is_some());
    }

    #[test]
    fn task_error_display() {
        assert_eq!(
            TaskError::Task("bad input".to_string()).to_string(),
            "task failed: bad input"
        );
        assert!(TaskError::WorkerLost { attempts: 3 }
            .to_string()
            .contains("3 attempts"));
        assert_eq!(TaskError::PoolShutdown.to_string(), "worker pool shut down");
    }

    #[test]
    fn options_constructors() {
        let opts = TaskOptions::long_running("ts-program");
        assert!(opts.is_long_running);
        assert_eq!(opts.affinity_key.as_deref(), Some("ts-program"));

        let opts = TaskOptions::with_affinity("styles");
        assert!(!opts.is_long_running);
        assert_eq!(opts.affinity_key.as_deref(), Some("styles"));
    }
}
