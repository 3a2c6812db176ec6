//! # Task Queue
//!
//! **Thread-safe mailbox and result table for the tasq in-process task server.**
//!
//! Many producers enqueue tasks, one worker dequeues them in arrival order and
//! publishes results keyed by task id, and any number of waiters block (or
//! `.await`) until the result for their id is available.
//!
//! ## Quick Start
//!
//! ```rust
//! use tasq_queue::prelude::*;
//!
//! # fn example() -> Result<(), TaskQueueError> {
//! let queue = TaskQueue::new();
//! queue.open();
//! queue.attach_worker();
//!
//! let id = queue.enqueue(TaskKind::Sqrt, vec![9.0])?;
//!
//! // Worker side
//! let task = queue.dequeue().expect("queue is open and non-empty");
//! let value = task.operands[0].sqrt();
//! queue.publish_result(task.id, TaskOutcome::Value(value))?;
//!
//! // Waiter side
//! let result = queue.await_result(id)?;
//! assert_eq!(result.outcome.value(), Some(3.0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`TaskQueue`**: pending set + result table behind one `parking_lot::Mutex`
//! - **`Task` / `TaskResult`**: immutable records (serializable)
//! - **`TaskOutcome`**: value, evaluator failure, or abandoned on stop

pub mod error;
pub mod model;
pub mod prelude;
pub mod queue;

pub use error::TaskQueueError;
pub use model::{FailureReason, Task, TaskFailure, TaskId, TaskKind, TaskOutcome, TaskResult};
pub use queue::{QueueConfig, QueueStats, TaskQueue};
