//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use tasq_queue::prelude::*;
//! ```

pub use crate::error::TaskQueueError;
pub use crate::model::{FailureReason, Task, TaskFailure, TaskId, TaskKind, TaskOutcome, TaskResult};
pub use crate::queue::{QueueConfig, QueueStats, TaskQueue};
