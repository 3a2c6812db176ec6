//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use tasq_server::prelude::*;
//! ```

pub use crate::config::{DrainPolicy, ServerConfig};
pub use crate::error::{ServerResult, TaskServerError};
pub use crate::evaluator::{EvalError, Evaluator, NumericEvaluator};
pub use crate::server::{ServerStats, TaskServer};
pub use crate::state_machine::ServerState;
pub use tasq_queue::{FailureReason, TaskFailure, TaskId, TaskKind, TaskOutcome, TaskResult};
