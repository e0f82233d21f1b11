//! `Job` — an ordered task set plus a DAG and a cron schedule.
//!
//! Jobs are built from a zero-argument factory function registered with the
//! [`crate::scheduler::Scheduler`] under the job's name, so each run gets a
//! fresh, unshared instance — no mutable state leaks across runs.

use std::collections::HashSet;
use std::sync::Arc;

use crate::dag::Dag;
use crate::error::EngineError;
use crate::task::Task;

/// A complete job definition: its DAG-ordered tasks and cron schedule.
pub struct Job {
    pub name: String,
    /// Six-field, seconds-precision cron expression.
    pub schedule: String,
    /// Whether the job is eligible for schedule-triggered runs. This is the
    /// *initial* value set at registration; the scheduler tracks the live
    /// value separately since `toggleActive` must survive across the
    /// factory re-creating a fresh `Job` for every run.
    pub active: bool,
    pub tasks: Vec<Task>,
    pub dag: Dag,
}

impl Job {
    /// Construct a job, validating that the task list and DAG agree on
    /// membership (spec invariant: every task named in the DAG exists in the
    /// task list and vice versa).
    pub fn new(
        name: impl Into<String>,
        schedule: impl Into<String>,
        active: bool,
        tasks: Vec<Task>,
        dag: Dag,
    ) -> Result<Self, EngineError> {
        let task_names: HashSet<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        let dag_names: HashSet<&str> = dag.nodes().collect();

        if task_names != dag_names {
            let missing_from_dag: Vec<&str> =
                task_names.difference(&dag_names).copied().collect();
            let missing_from_tasks: Vec<&str> =
                dag_names.difference(&task_names).copied().collect();
            return Err(EngineError::InvalidDag(format!(
                "task list and DAG disagree on membership (tasks without DAG nodes: {missing_from_dag:?}, \
                 DAG nodes without tasks: {missing_from_tasks:?})"
            )));
        }

        Ok(Self {
            name: name.into(),
            schedule: schedule.into(),
            active,
            tasks,
            dag,
        })
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

/// A zero-arg constructor registered under the job's name. Each invocation
/// must return a job with the same name.
pub type JobFactory = Arc<dyn Fn() -> Job + Send + Sync>;
