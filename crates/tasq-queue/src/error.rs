//! Unified error type for task queue operations.

use std::time::Duration;

use crate::model::TaskId;

/// Unified error type for task queue operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskQueueError {
    #[error("Task queue is closed to new work")]
    Closed,

    #[error("Maximum pending tasks limit reached: {0}")]
    QueueFull(usize),

    #[error("Timed out after {waited:?} waiting for result of task {id}")]
    Timeout { id: TaskId, waited: Duration },

    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("Result already published for task {0}")]
    AlreadyPublished(TaskId),

    #[error("Task {0} is not executing")]
    NotExecuting(TaskId),

    #[error("Worker stopped before task {0} produced a result")]
    WorkerStopped(TaskId),

    #[error("Invalid task kind: {0}")]
    InvalidTaskKind(String),
}
