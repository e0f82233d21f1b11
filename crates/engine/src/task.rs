//! `Task` — a named operator plus its retry and trigger-rule configuration.

use std::sync::Arc;

use operators::Operator;

use crate::retry::RetryPolicy;

/// Predicate over upstream terminal states deciding whether a task runs or
/// is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRule {
    /// Proceed iff every upstream task terminated `Successful`.
    AllSuccessful,
    /// Proceed once every upstream task is terminal, regardless of outcome.
    AllDone,
}

impl Default for TriggerRule {
    fn default() -> Self {
        TriggerRule::AllSuccessful
    }
}

/// A single node in a job's DAG: a named operator with retry policy and
/// trigger rule. Immutable after construction.
pub struct Task {
    pub name: String,
    pub operator: Arc<dyn Operator>,
    pub max_retries: u32,
    pub retry_policy: RetryPolicy,
    pub trigger_rule: TriggerRule,
}

impl Task {
    /// Construct a task with default retry policy (`max_retries = 0`) and
    /// default trigger rule (`AllSuccessful`).
    pub fn new(name: impl Into<String>, operator: Arc<dyn Operator>) -> Self {
        Self {
            name: name.into(),
            operator,
            max_retries: 0,
            retry_policy: RetryPolicy::default(),
            trigger_rule: TriggerRule::default(),
        }
    }

    pub fn with_retries(mut self, max_retries: u32, policy: RetryPolicy) -> Self {
        self.max_retries = max_retries;
        self.retry_policy = policy;
        self
    }

    pub fn with_trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.trigger_rule = rule;
        self
    }
}
