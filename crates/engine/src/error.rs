//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine (DAG validation, job registry,
/// scheduling, and execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ DAG validation errors ------
    /// Two or more task names collide within a job.
    #[error("duplicate name: '{0}'")]
    DuplicateName(String),

    /// An edge references a task name that doesn't exist in the job.
    #[error("edge references unknown task '{task}' ({side} side)")]
    UnknownTaskReference { task: String, side: &'static str },

    /// Topological sort detected a cycle, or the job's task list and DAG
    /// disagree on membership.
    #[error("invalid DAG: {0}")]
    InvalidDag(String),

    // ------ Registry errors ------
    /// `runJob`/`getJob`/etc. referenced a job name the scheduler doesn't know.
    #[error("unknown job: '{0}'")]
    UnknownJob(String),

    // ------ Execution errors ------
    /// The run was cancelled before or during execution.
    #[error("job run cancelled: {0}")]
    Cancelled(String),
}
