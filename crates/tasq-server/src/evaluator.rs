//! Evaluators compute the value of a task.
//!
//! Separates *what a task computes* from *how tasks are queued and run*.
//! Default: [`NumericEvaluator`] (sin, sqrt, pow and registered custom
//! functions).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tasq_queue::{FailureReason, TaskFailure, TaskKind};

/// Failure reported by an [`Evaluator`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unsupported task kind: {0}")]
    UnsupportedKind(String),

    #[error("{kind} expects {expected} operand(s), got {actual}")]
    Arity {
        kind: String,
        expected: usize,
        actual: usize,
    },

    #[error("domain error: {0}")]
    Domain(String),

    #[error("{0} produced a non-finite value")]
    NonFinite(String),
}

impl From<EvalError> for TaskFailure {
    fn from(err: EvalError) -> Self {
        let reason = match &err {
            EvalError::UnsupportedKind(_) | EvalError::Arity { .. } => FailureReason::Malformed,
            EvalError::Domain(_) => FailureReason::Domain,
            EvalError::NonFinite(_) => FailureReason::NonFinite,
        };
        TaskFailure::new(reason, err.to_string())
    }
}

/// Pure function from a task's kind and operands to a value.
///
/// Implementations must be side-effect free; the worker calls `evaluate`
/// exactly once per task, on the worker thread only.
pub trait Evaluator: Send + Sync {
    /// Human-readable name of the evaluator (e.g., "numeric")
    fn name(&self) -> &'static str;

    /// Number of operands `kind` takes, or `None` if the kind is unsupported.
    fn arity(&self, kind: &TaskKind) -> Option<usize>;

    /// Check a task before it is accepted.
    fn validate(&self, kind: &TaskKind, operands: &[f64]) -> Result<(), EvalError> {
        let expected = self
            .arity(kind)
            .ok_or_else(|| EvalError::UnsupportedKind(kind.to_string()))?;
        if operands.len() != expected {
            return Err(EvalError::Arity {
                kind: kind.to_string(),
                expected,
                actual: operands.len(),
            });
        }
        Ok(())
    }

    /// Compute the value of a validated task.
    fn evaluate(&self, kind: &TaskKind, operands: &[f64]) -> Result<f64, EvalError>;
}

/// Function registered under a custom task kind.
pub type CustomFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

#[derive(Clone)]
struct CustomEntry {
    arity: usize,
    func: CustomFn,
}

/// Default evaluator for numeric kernels.
///
/// Any non-finite result is reported as [`EvalError::NonFinite`] rather than
/// published as a value.
#[derive(Clone, Default)]
pub struct NumericEvaluator {
    custom: HashMap<String, CustomEntry>,
}

impl NumericEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function for `TaskKind::Custom(name)` taking `arity` operands.
    pub fn with_function<F>(mut self, name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.custom.insert(
            name.into(),
            CustomEntry {
                arity,
                func: Arc::new(func),
            },
        );
        self
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    fn compute(&self, kind: &TaskKind, operands: &[f64]) -> Result<f64, EvalError> {
        match kind {
            TaskKind::Sin => Ok(operands[0].sin()),
            TaskKind::Sqrt => {
                let x = operands[0];
                if x < 0.0 {
                    return Err(EvalError::Domain(format!("sqrt of negative operand {x}")));
                }
                Ok(x.sqrt())
            }
            TaskKind::Pow => Ok(operands[0].powf(operands[1])),
            TaskKind::Custom(name) => {
                let entry = self
                    .custom
                    .get(name)
                    .ok_or_else(|| EvalError::UnsupportedKind(kind.to_string()))?;
                Ok((entry.func)(operands))
            }
        }
    }
}

impl fmt::Debug for NumericEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.custom.keys().collect();
        names.sort();
        f.debug_struct("NumericEvaluator")
            .field("custom", &names)
            .finish()
    }
}

impl Evaluator for NumericEvaluator {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn arity(&self, kind: &TaskKind) -> Option<usize> {
        match kind {
            TaskKind::Sin | TaskKind::Sqrt => Some(1),
            TaskKind::Pow => Some(2),
            TaskKind::Custom(name) => self.custom.get(name).map(|e| e.arity),
        }
    }

    fn evaluate(&self, kind: &TaskKind, operands: &[f64]) -> Result<f64, EvalError> {
        self.validate(kind, operands)?;
        let value = self.compute(kind, operands)?;
        if !value.is_finite() {
            return Err(EvalError::NonFinite(format!("{kind}{operands:?}")));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_builtin_kernels() {
        let eval = NumericEvaluator::new();
        assert!(eval.evaluate(&TaskKind::Sin, &[0.0]).unwrap().abs() < EPS);
        assert!((eval.evaluate(&TaskKind::Sqrt, &[81.0]).unwrap() - 9.0).abs() < EPS);
        assert!((eval.evaluate(&TaskKind::Pow, &[3.0, 4.0]).unwrap() - 81.0).abs() < EPS);
    }

    #[test]
    fn test_sqrt_negative_is_domain_error() {
        let eval = NumericEvaluator::new();
        match eval.evaluate(&TaskKind::Sqrt, &[-1.0]) {
            Err(EvalError::Domain(msg)) => assert!(msg.contains("-1")),
            other => panic!("Expected Domain error, got: {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_result_flagged() {
        let eval = NumericEvaluator::new();
        assert!(matches!(
            eval.evaluate(&TaskKind::Pow, &[10.0, 400.0]),
            Err(EvalError::NonFinite(_))
        ));
        assert!(matches!(
            eval.evaluate(&TaskKind::Pow, &[-8.0, 0.5]),
            Err(EvalError::NonFinite(_))
        ));
    }

    #[test]
    fn test_arity_checked() {
        let eval = NumericEvaluator::new();
        assert_eq!(
            eval.validate(&TaskKind::Pow, &[2.0]),
            Err(EvalError::Arity {
                kind: "pow".to_string(),
                expected: 2,
                actual: 1
            })
        );
        assert!(eval.validate(&TaskKind::Sin, &[]).is_err());
    }

    #[test]
    fn test_custom_function_registration() {
        let eval = NumericEvaluator::new().with_function("hypot", 2, |ops| ops[0].hypot(ops[1]));
        assert!(eval.has_function("hypot"));
        assert_eq!(eval.arity(&TaskKind::custom("hypot")), Some(2));
        let v = eval.evaluate(&TaskKind::custom("hypot"), &[3.0, 4.0]).unwrap();
        assert!((v - 5.0).abs() < EPS);
    }

    #[test]
    fn test_unregistered_custom_kind_unsupported() {
        let eval = NumericEvaluator::new();
        assert_eq!(eval.arity(&TaskKind::custom("nope")), None);
        assert_eq!(
            eval.validate(&TaskKind::custom("nope"), &[1.0]),
            Err(EvalError::UnsupportedKind("custom:nope".to_string()))
        );
    }

    #[test]
    fn test_eval_error_to_failure_reason() {
        let failure: TaskFailure = EvalError::Domain("x".into()).into();
        assert_eq!(failure.reason, FailureReason::Domain);
        let failure: TaskFailure = EvalError::UnsupportedKind("k".into()).into();
        assert_eq!(failure.reason, FailureReason::Malformed);
    }
}
