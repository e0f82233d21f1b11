//! The `Operator` trait — the contract every operator must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::OperatorError;

/// The core operator trait.
///
/// Operators are stateless between attempts; the engine treats them as pure
/// effectful functions. All built-in operators (`Command`, `Mock`) and any
/// user-defined operator must implement this.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Run the operator to completion and return its output value.
    async fn run(&self) -> Result<Value, OperatorError>;
}
