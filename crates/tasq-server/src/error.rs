//! Error types for task server operations.

use std::time::Duration;

use tasq_queue::{TaskFailure, TaskId, TaskQueueError};

use crate::state_machine::ServerState;

/// Result alias used throughout the server crate.
pub type ServerResult<T> = Result<T, TaskServerError>;

/// Unified error type for task server operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServerError {
    #[error("Task server is not running")]
    NotRunning,

    #[error("Timed out after {waited:?} waiting for task {id}")]
    Timeout { id: TaskId, waited: Duration },

    #[error("Invalid task kind: {0}")]
    InvalidTaskKind(String),

    #[error("Task kind {kind} expects {expected} operand(s), got {actual}")]
    InvalidOperands {
        kind: String,
        expected: usize,
        actual: usize,
    },

    #[error("Task {id} failed: {failure}")]
    Evaluation { id: TaskId, failure: TaskFailure },

    #[error("Task {0} was abandoned by server stop")]
    Abandoned(TaskId),

    #[error("Maximum pending tasks limit reached: {0}")]
    QueueFull(usize),

    #[error("Invalid lifecycle transition: {current} -> {requested}")]
    InvalidTransition {
        current: ServerState,
        requested: ServerState,
    },

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Queue error: {0}")]
    Queue(TaskQueueError),
}

impl From<TaskQueueError> for TaskServerError {
    fn from(err: TaskQueueError) -> Self {
        match err {
            TaskQueueError::Closed | TaskQueueError::WorkerStopped(_) => TaskServerError::NotRunning,
            TaskQueueError::QueueFull(limit) => TaskServerError::QueueFull(limit),
            TaskQueueError::Timeout { id, waited } => TaskServerError::Timeout { id, waited },
            TaskQueueError::InvalidTaskKind(kind) => TaskServerError::InvalidTaskKind(kind),
            other => TaskServerError::Queue(other),
        }
    }
}

impl TaskServerError {
    /// Returns `true` for errors a caller may recover from by retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskServerError::Timeout { .. } | TaskServerError::QueueFull(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_errors_map_onto_server_taxonomy() {
        assert!(matches!(
            TaskServerError::from(TaskQueueError::Closed),
            TaskServerError::NotRunning
        ));
        assert!(matches!(
            TaskServerError::from(TaskQueueError::WorkerStopped(TaskId::new(4))),
            TaskServerError::NotRunning
        ));
        assert!(matches!(
            TaskServerError::from(TaskQueueError::QueueFull(8)),
            TaskServerError::QueueFull(8)
        ));
        assert!(matches!(
            TaskServerError::from(TaskQueueError::UnknownTask(TaskId::new(9))),
            TaskServerError::Queue(TaskQueueError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_retryable_errors() {
        let timeout = TaskServerError::Timeout {
            id: TaskId::new(1),
            waited: Duration::from_millis(50),
        };
        assert!(timeout.is_retryable());
        assert!(TaskServerError::QueueFull(1).is_retryable());
        assert!(!TaskServerError::NotRunning.is_retryable());
        assert!(!TaskServerError::Abandoned(TaskId::new(1)).is_retryable());
    }
}
