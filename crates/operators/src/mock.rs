//! `MockOperator` — a test double for [`Operator`].
//!
//! Useful in unit and integration tests where a real operator implementation
//! is either unavailable or irrelevant.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{Operator, OperatorError};

/// Behaviour injected into `MockOperator` at construction time.
enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
    /// Fail with a `Retryable` error for the first `failures` calls, then succeed.
    FailThenSucceed { failures: usize, value: Value },
}

/// A mock operator that records how many times it has been invoked and
/// returns a programmer-specified result.
pub struct MockOperator {
    name: String,
    behaviour: MockBehaviour,
    calls: Arc<AtomicUsize>,
}

impl MockOperator {
    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnValue(value),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::FailFatal(msg.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::FailRetryable(msg.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that fails retryably `failures` times, then succeeds
    /// returning `value`. Used to exercise retry/backoff behaviour.
    pub fn flaky(name: impl Into<String>, failures: usize, value: Value) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::FailThenSucceed { failures, value },
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times this operator has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operator for MockOperator {
    async fn run(&self) -> Result<Value, OperatorError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(json!({ "operator": self.name, "value": v })),
            MockBehaviour::FailRetryable(msg) => Err(OperatorError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(OperatorError::Fatal(msg.clone())),
            MockBehaviour::FailThenSucceed { failures, value } => {
                if call_index < *failures {
                    Err(OperatorError::Retryable(format!(
                        "{} failed on attempt {}",
                        self.name,
                        call_index + 1
                    )))
                } else {
                    Ok(json!({ "operator": self.name, "value": value }))
                }
            }
        }
    }
}
