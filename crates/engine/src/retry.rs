//! `RetryPolicy` — given the upcoming attempt index, yields the delay to
//! wait before making it.

use std::time::Duration;

/// Ceiling applied to `ExponentialBackoff` delays, per spec.
const EXPONENTIAL_BACKOFF_CEILING_SECS: u64 = 60;

/// How long to wait before a task's next retry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryPolicy {
    /// Every retry waits the same fixed period.
    ConstantDelay { period_seconds: u64 },
    /// Retry `k` (1-indexed) waits `2^(k-1)` seconds, capped at 60s.
    ExponentialBackoff,
}

impl Default for RetryPolicy {
    /// The default policy retries with no delay.
    fn default() -> Self {
        RetryPolicy::ConstantDelay { period_seconds: 0 }
    }
}

impl RetryPolicy {
    /// `attempt` is the 1-indexed number of the upcoming retry.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        match self {
            RetryPolicy::ConstantDelay { period_seconds } => Duration::from_secs(*period_seconds),
            RetryPolicy::ExponentialBackoff => {
                let seconds = 2u64.saturating_pow(attempt.saturating_sub(1));
                Duration::from_secs(seconds.min(EXPONENTIAL_BACKOFF_CEILING_SECS))
            }
        }
    }
}
