//! # Task Server
//!
//! **Single-worker in-process task server with submit/await semantics.**
//!
//! Any number of producer threads submit tasks and receive an id immediately.
//! One worker thread evaluates tasks strictly in submission order and
//! publishes each result under its id. Producers later block (or `.await`)
//! until the result for their id is published.
//!
//! ## Quick Start
//!
//! ```rust
//! use tasq_server::prelude::*;
//!
//! # fn example() -> Result<(), TaskServerError> {
//! let server = TaskServer::default();
//! server.start()?;
//!
//! let id = server.submit(TaskKind::Pow, [2.0, 10.0])?;
//! assert_eq!(server.await_result(id)?, 1024.0);
//!
//! // Drains anything still queued, then joins the worker
//! server.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`TaskServer`**: lifecycle (`start`/`stop`) and the client API
//! - **`Evaluator` trait**: computes a task's value; `NumericEvaluator` by default
//! - **State machine**: `Stopped -> Running -> Stopping -> Stopped`
//! - **`DrainPolicy`**: run (default) or abandon pending tasks on stop

pub mod config;
pub mod error;
pub mod evaluator;
pub mod prelude;
pub mod server;
pub mod state_machine;

mod worker;

pub use config::{DrainPolicy, ServerConfig};
pub use error::{ServerResult, TaskServerError};
pub use evaluator::{CustomFn, EvalError, Evaluator, NumericEvaluator};
pub use server::{ServerStats, TaskServer};
pub use state_machine::ServerState;

// Re-export the queue data model so callers need a single dependency
pub use tasq_queue::{
    FailureReason, QueueStats, TaskFailure, TaskId, TaskKind, TaskOutcome, TaskResult,
};
