//! Operator-level error type.

use thiserror::Error;

/// Errors returned by an operator's `run` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable` — the task is retried per its `RetryPolicy`, up to its
///   configured retry budget.
/// - `Fatal` — no retry is attempted regardless of the task's retry budget;
///   the task goes straight to `Failed`.
#[derive(Debug, Error, Clone)]
pub enum OperatorError {
    /// Transient failure; the engine should retry per the task's policy.
    #[error("retryable operator error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal operator error: {0}")]
    Fatal(String),
}

impl OperatorError {
    /// Whether this error forbids any retry, irrespective of budget.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OperatorError::Fatal(_))
    }
}
