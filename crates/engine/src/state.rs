//! `TaskState` — the per-task lifecycle state.

use serde::{Deserialize, Serialize};

/// A task's current position in its execution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TaskState {
    /// Not yet started.
    None,
    /// The operator is currently executing.
    Running,
    /// An attempt failed retryably; waiting out the backoff before retrying.
    UpForRetry,
    /// Upstream tasks did not all succeed and this task's trigger rule is
    /// `AllSuccessful`.
    Skipped,
    /// All retries exhausted, or the operator returned a fatal error.
    Failed,
    /// The operator returned successfully.
    Successful,
}

impl TaskState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Skipped | TaskState::Failed | TaskState::Successful
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::None => "None",
            TaskState::Running => "Running",
            TaskState::UpForRetry => "UpForRetry",
            TaskState::Skipped => "Skipped",
            TaskState::Failed => "Failed",
            TaskState::Successful => "Successful",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_named_states_are_terminal() {
        assert!(!TaskState::None.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::UpForRetry.is_terminal());
        assert!(TaskState::Skipped.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Successful.is_terminal());
    }
}
