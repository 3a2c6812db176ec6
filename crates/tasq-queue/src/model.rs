//! Task and result data model.
//!
//! A [`Task`] is immutable once enqueued. The worker consumes it exactly once
//! and supersedes it with a [`TaskResult`], which then lives in the result
//! table for the lifetime of the queue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaskQueueError;

/// Opaque task identifier allocated by the queue at enqueue time.
///
/// Identifiers start at 1 and strictly increase; `0` is reserved as
/// [`TaskId::INVALID`] and is never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// The reserved "unset" identifier.
    pub const INVALID: TaskId = TaskId(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// The computation a task requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// `sin(x)`
    Sin,
    /// `sqrt(x)`, defined for `x >= 0`
    Sqrt,
    /// `pow(x, y)`
    Pow,
    /// A function registered with the evaluator under this name
    Custom(String),
}

impl TaskKind {
    pub fn custom(name: impl Into<String>) -> Self {
        TaskKind::Custom(name.into())
    }

    /// Short label used in logs and reports.
    pub fn label(&self) -> &str {
        match self {
            TaskKind::Sin => "sin",
            TaskKind::Sqrt => "sqrt",
            TaskKind::Pow => "pow",
            TaskKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Custom(name) => write!(f, "custom:{name}"),
            other => f.write_str(other.label()),
        }
    }
}

impl FromStr for TaskKind {
    type Err = TaskQueueError;

    /// Parses `sin`, `sqrt`, `pow` or `custom:<name>` (case-insensitive prefix).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "sin" => return Ok(TaskKind::Sin),
            "sqrt" => return Ok(TaskKind::Sqrt),
            "pow" => return Ok(TaskKind::Pow),
            _ => {}
        }
        match trimmed.split_once(':') {
            Some((prefix, name)) if prefix.eq_ignore_ascii_case("custom") && !name.is_empty() => {
                Ok(TaskKind::Custom(name.to_string()))
            }
            _ => Err(TaskQueueError::InvalidTaskKind(s.to_string())),
        }
    }
}

/// A unit of requested computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub operands: Vec<f64>,
    pub submitted_at: DateTime<Utc>,
}

/// Why a task failed to produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// An operand was outside the function's domain
    Domain,
    /// The computation produced NaN or an infinity
    NonFinite,
    /// The evaluator does not support the kind or operand count
    Malformed,
    /// The evaluator panicked while running the task
    Panicked,
}

/// Evaluator failure recorded in place of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{reason:?}: {message}")]
pub struct TaskFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl TaskFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// The outcome of executing (or not executing) a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task evaluated to a finite value
    Value(f64),
    /// The evaluator rejected the operands or failed
    Failed(TaskFailure),
    /// The task was removed from the pending set by an abandoning stop
    Abandoned,
}

impl TaskOutcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            TaskOutcome::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, TaskOutcome::Value(_))
    }
}

/// Published result of a task. Never mutated after publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Identifier of the originating task
    pub id: TaskId,
    pub outcome: TaskOutcome,
    /// 1-based completion counter; orders results by publication
    pub sequence: u64,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_id_is_zero() {
        assert_eq!(TaskId::INVALID.get(), 0);
        assert!(!TaskId::INVALID.is_valid());
        assert!(TaskId::new(1).is_valid());
    }

    #[test]
    fn test_parse_builtin_kinds() {
        assert_eq!("sin".parse::<TaskKind>().unwrap(), TaskKind::Sin);
        assert_eq!("SQRT".parse::<TaskKind>().unwrap(), TaskKind::Sqrt);
        assert_eq!(" pow ".parse::<TaskKind>().unwrap(), TaskKind::Pow);
    }

    #[test]
    fn test_parse_custom_kind() {
        let kind: TaskKind = "custom:hypot".parse().unwrap();
        assert_eq!(kind, TaskKind::custom("hypot"));
        assert_eq!(kind.to_string(), "custom:hypot");
        assert_eq!(kind.label(), "hypot");
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        for bad in ["cos", "", "custom:", "custom"] {
            match bad.parse::<TaskKind>() {
                Err(TaskQueueError::InvalidTaskKind(s)) => assert_eq!(s, bad),
                other => panic!("Expected InvalidTaskKind for {:?}, got: {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_outcome_serialization_shape() {
        let json = serde_json::to_value(TaskOutcome::Value(2.0)).unwrap();
        assert_eq!(json["value"], 2.0);

        let failed = TaskOutcome::Failed(TaskFailure::new(FailureReason::Domain, "sqrt(-1)"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["failed"]["reason"], "domain");
        assert_eq!(failed.value(), None);
    }
}
