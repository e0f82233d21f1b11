//! `JobRun` — one execution of a [`Job`]: the per-task state machine that
//! drives tasks forward respecting DAG order and trigger rules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{info, instrument, warn};

use crate::error::EngineError;
use crate::job::Job;
use crate::state::TaskState;
use crate::stream_hub::{Event, StreamHub};
use crate::task::TriggerRule;

/// Overall outcome of a `JobRun`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunState {
    Running,
    Successful,
    Failed,
    /// Cancelled via [`JobRunHandle::cancel`]. Distinct from `Failed`: a
    /// cancelled run terminated cleanly, it didn't fail on its own.
    Cancelled,
}

impl std::fmt::Display for JobRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobRunState::Running => "Running",
            JobRunState::Successful => "Successful",
            JobRunState::Failed => "Failed",
            JobRunState::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

/// Last-issued monotonic component of a run id, guarding against two runs of
/// the same job landing on the same wall-clock nanosecond.
static LAST_RUN_STAMP: AtomicI64 = AtomicI64::new(0);

fn next_run_stamp() -> i64 {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or(0);
    loop {
        let last = LAST_RUN_STAMP.load(Ordering::SeqCst);
        let next = now.max(last + 1);
        if LAST_RUN_STAMP
            .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return next;
        }
    }
}

/// A live or completed execution of a `Job`. Cheaply cloneable; every clone
/// observes the same underlying state.
#[derive(Clone)]
pub struct JobRunHandle {
    pub run_id: String,
    pub job_name: String,
    pub start_time: chrono::DateTime<Utc>,
    task_states: Arc<RwLock<HashMap<String, TaskState>>>,
    results: Arc<RwLock<HashMap<String, Result<Value, String>>>>,
    overall_state: Arc<RwLock<JobRunState>>,
    cancel: watch::Sender<bool>,
}

impl JobRunHandle {
    /// Snapshot of every task's current state.
    pub async fn task_states(&self) -> HashMap<String, TaskState> {
        self.task_states.read().await.clone()
    }

    pub async fn result_of(&self, task: &str) -> Option<Result<Value, String>> {
        self.results.read().await.get(task).cloned()
    }

    pub async fn overall_state(&self) -> JobRunState {
        *self.overall_state.read().await
    }

    /// Request cancellation. Tasks not yet `Running` transition to
    /// `Skipped`; already-running operators are awaited to completion (the
    /// engine provides no preemption).
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Validate the job's DAG and, if valid, spawn one worker per task. Returns
/// immediately with a handle; the run proceeds in the background. Returns
/// `EngineError::InvalidDag` without starting any task if the DAG is cyclic
/// or inconsistent with the task list.
#[instrument(skip(job, hub), fields(job = %job.name))]
pub fn start(job: Arc<Job>, hub: StreamHub) -> Result<(JobRunHandle, JoinAll), EngineError> {
    if !job.dag.validate() {
        return Err(EngineError::InvalidDag(format!(
            "job '{}' has a cyclic DAG",
            job.name
        )));
    }

    let run_id = format!("{}-{}", job.name, next_run_stamp());
    let start_time = Utc::now();

    let mut task_states = HashMap::new();
    let mut watches: HashMap<String, (watch::Sender<TaskState>, watch::Receiver<TaskState>)> =
        HashMap::new();
    for task in &job.tasks {
        task_states.insert(task.name.clone(), TaskState::None);
        watches.insert(task.name.clone(), watch::channel(TaskState::None));
    }

    let task_states = Arc::new(RwLock::new(task_states));
    let results = Arc::new(RwLock::new(HashMap::new()));
    let overall_state = Arc::new(RwLock::new(JobRunState::Running));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let watch_senders: HashMap<String, watch::Sender<TaskState>> =
        watches.iter().map(|(k, (tx, _))| (k.clone(), tx.clone())).collect();

    let mut handles = Vec::with_capacity(job.tasks.len());
    for task_idx in 0..job.tasks.len() {
        let job = Arc::clone(&job);
        let run_id = run_id.clone();
        let hub = hub.clone();
        let task_states = Arc::clone(&task_states);
        let results = Arc::clone(&results);
        let watch_senders = watch_senders.clone();
        let upstream_receivers: Vec<(String, watch::Receiver<TaskState>)> = job
            .dag
            .dependencies(&job.tasks[task_idx].name)
            .into_iter()
            .map(|dep| (dep.clone(), watches[&dep].1.clone()))
            .collect();
        let mut cancel_rx = cancel_rx.clone();

        handles.push(tokio::spawn(async move {
            let task = &job.tasks[task_idx];
            run_task_worker(
                &job.name,
                &run_id,
                task,
                upstream_receivers,
                watch_senders,
                task_states,
                results,
                hub,
                &mut cancel_rx,
            )
            .await;
        }));
    }

    let handle = JobRunHandle {
        run_id,
        job_name: job.name.clone(),
        start_time,
        task_states,
        results,
        overall_state: Arc::clone(&overall_state),
        cancel: cancel_tx,
    };

    Ok((
        handle.clone(),
        JoinAll {
            handles,
            overall_state,
            run_handle: handle,
        },
    ))
}

/// Awaitable completion of a started `JobRun`: joins every task worker, then
/// computes the overall outcome.
pub struct JoinAll {
    handles: Vec<tokio::task::JoinHandle<()>>,
    overall_state: Arc<RwLock<JobRunState>>,
    run_handle: JobRunHandle,
}

impl JoinAll {
    pub async fn wait(self) -> JobRunState {
        join_all(self.handles).await;

        let states = self.run_handle.task_states().await;
        let any_failed = states.values().any(|s| *s == TaskState::Failed);
        let cancelled = *self.run_handle.cancel.borrow();

        let final_state = if cancelled {
            JobRunState::Cancelled
        } else if any_failed {
            JobRunState::Failed
        } else {
            JobRunState::Successful
        };

        *self.overall_state.write().await = final_state;
        info!(run = %self.run_handle.run_id, state = ?final_state, "job run finished");
        final_state
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_task_worker(
    job_name: &str,
    run_id: &str,
    task: &crate::task::Task,
    upstream: Vec<(String, watch::Receiver<TaskState>)>,
    watch_senders: HashMap<String, watch::Sender<TaskState>>,
    task_states: Arc<RwLock<HashMap<String, TaskState>>>,
    results: Arc<RwLock<HashMap<String, Result<Value, String>>>>,
    hub: StreamHub,
    cancel_rx: &mut watch::Receiver<bool>,
) {
    // 1. Gate on upstream: wait until every upstream task is terminal.
    for (_, mut rx) in upstream.iter().cloned() {
        loop {
            if rx.borrow().is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    let publish = |state: TaskState, error: Option<String>| {
        let hub = hub.clone();
        let job_name = job_name.to_string();
        let run_id = run_id.to_string();
        let task_name = task.name.clone();
        async move {
            hub.publish(Event {
                job: job_name,
                run: run_id,
                task: task_name,
                state,
                ts: Utc::now(),
                error,
            });
        }
    };

    let set_state = |state: TaskState| {
        let task_states = Arc::clone(&task_states);
        let task_name = task.name.clone();
        async move {
            task_states.write().await.insert(task_name, state);
        }
    };

    // 2. Apply trigger rule.
    let upstream_all_successful = {
        let states = task_states.read().await;
        upstream
            .iter()
            .all(|(name, _)| states.get(name) == Some(&TaskState::Successful))
    };

    let should_skip = match task.trigger_rule {
        TriggerRule::AllSuccessful => !upstream_all_successful,
        TriggerRule::AllDone => false,
    } || *cancel_rx.borrow();

    if should_skip {
        set_state(TaskState::Skipped).await;
        publish(TaskState::Skipped, None).await;
        let _ = watch_senders[&task.name].send(TaskState::Skipped);
        return;
    }

    // 3. Attempt loop.
    let mut attempts_used: u32 = 0;
    let final_state = loop {
        set_state(TaskState::Running).await;
        publish(TaskState::Running, None).await;
        let _ = watch_senders[&task.name].send(TaskState::Running);

        match task.operator.run().await {
            Ok(value) => {
                results.write().await.insert(task.name.clone(), Ok(value));
                break TaskState::Successful;
            }
            Err(err) => {
                attempts_used += 1;
                let retryable = !err.is_fatal();
                let message = err.to_string();

                if retryable && attempts_used <= task.max_retries {
                    set_state(TaskState::UpForRetry).await;
                    publish(TaskState::UpForRetry, Some(message.clone())).await;
                    let _ = watch_senders[&task.name].send(TaskState::UpForRetry);

                    let delay = task.retry_policy.next_delay(attempts_used);
                    warn!(task = %task.name, attempt = attempts_used, ?delay, "task failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }

                results
                    .write()
                    .await
                    .insert(task.name.clone(), Err(message.clone()));
                break TaskState::Failed;
            }
        }
    };

    set_state(final_state).await;
    publish(
        final_state,
        match final_state {
            TaskState::Failed => results
                .read()
                .await
                .get(&task.name)
                .and_then(|r| r.clone().err()),
            _ => None,
        },
    )
    .await;
    let _ = watch_senders[&task.name].send(final_state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Dag;
    use crate::job::Job;
    use crate::retry::RetryPolicy;
    use crate::task::Task;
    use operators::mock::MockOperator;
    use serde_json::json;
    use std::time::Instant;

    fn op_task(name: &str) -> Task {
        Task::new(name, Arc::new(MockOperator::returning(name, json!(1))))
    }

    async fn run_to_completion(job: Job) -> (JobRunHandle, JobRunState) {
        let hub = StreamHub::new();
        let (handle, join) = start(Arc::new(job), hub).expect("valid dag");
        let state = join.wait().await;
        (handle, state)
    }

    // S1 — diamond
    #[tokio::test]
    async fn diamond_job_completes_successfully_with_correct_ordering() {
        let mut dag = Dag::new();
        for n in ["a", "b", "c", "d"] {
            dag.add_node(n).unwrap();
        }
        dag.set_downstream("a", "b").unwrap();
        dag.set_downstream("a", "c").unwrap();
        dag.set_downstream("b", "d").unwrap();
        dag.set_downstream("c", "d").unwrap();

        let job = Job::new(
            "diamond",
            "* * * * * *",
            false,
            vec![op_task("a"), op_task("b"), op_task("c"), op_task("d")],
            dag,
        )
        .unwrap();

        let (handle, state) = run_to_completion(job).await;
        assert_eq!(state, JobRunState::Successful);
        let states = handle.task_states().await;
        for name in ["a", "b", "c", "d"] {
            assert_eq!(states[name], TaskState::Successful);
        }
    }

    // S2 — cycle
    #[tokio::test]
    async fn cyclic_dag_is_rejected_before_any_task_runs() {
        let mut dag = Dag::new();
        dag.add_node("x").unwrap();
        dag.add_node("y").unwrap();
        dag.set_downstream("x", "y").unwrap();
        dag.set_downstream("y", "x").unwrap();

        let job = Job::new(
            "cyclic",
            "* * * * * *",
            false,
            vec![op_task("x"), op_task("y")],
            dag,
        )
        .unwrap();

        let hub = StreamHub::new();
        let mut rx = hub.subscribe();
        let result = start(Arc::new(job), hub);
        assert!(matches!(result, Err(EngineError::InvalidDag(_))));
        assert!(rx.try_recv().is_err());
    }

    // S3 — retry with backoff
    #[tokio::test(start_paused = true)]
    async fn flaky_task_retries_with_exponential_backoff_then_succeeds() {
        let mut dag = Dag::new();
        dag.add_node("flaky").unwrap();

        let flaky_task = Task::new(
            "flaky",
            Arc::new(MockOperator::flaky("flaky", 2, json!("ok"))),
        )
        .with_retries(3, RetryPolicy::ExponentialBackoff);

        let job = Job::new("flaky-job", "* * * * * *", false, vec![flaky_task], dag).unwrap();

        let hub = StreamHub::new();
        let mut rx = hub.subscribe();
        let (_, join) = start(Arc::new(job), hub).unwrap();

        let mut seen = Vec::new();
        let collector = tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                seen.push(event.state);
                if seen.last() == Some(&TaskState::Successful) || seen.last() == Some(&TaskState::Failed) {
                    break;
                }
            }
            seen
        });

        let state = join.wait().await;
        assert_eq!(state, JobRunState::Successful);

        let seen = collector.await.unwrap();
        assert_eq!(
            seen,
            vec![
                TaskState::Running,
                TaskState::UpForRetry,
                TaskState::Running,
                TaskState::UpForRetry,
                TaskState::Running,
                TaskState::Successful,
            ]
        );
    }

    // S4 — skip propagation
    #[tokio::test]
    async fn failed_upstream_skips_all_successful_child_but_not_all_done_child() {
        let mut dag = Dag::new();
        for n in ["a", "b", "c"] {
            dag.add_node(n).unwrap();
        }
        dag.set_downstream("a", "b").unwrap();
        dag.set_downstream("b", "c").unwrap();

        let a = Task::new("a", Arc::new(MockOperator::failing_retryable("a", "boom")));
        let b = Task::new("b", Arc::new(MockOperator::returning("b", json!(1))))
            .with_trigger_rule(TriggerRule::AllSuccessful);
        let c = Task::new("c", Arc::new(MockOperator::returning("c", json!(1))))
            .with_trigger_rule(TriggerRule::AllDone);

        let job = Job::new("skip-job", "* * * * * *", false, vec![a, b, c], dag).unwrap();
        let (handle, state) = run_to_completion(job).await;

        let states = handle.task_states().await;
        assert_eq!(states["a"], TaskState::Failed);
        assert_eq!(states["b"], TaskState::Skipped);
        assert_eq!(states["c"], TaskState::Successful);
        assert_eq!(state, JobRunState::Failed);
    }

    // S5 — parallel independents
    #[tokio::test]
    async fn independent_tasks_run_in_parallel() {
        use operators::{Operator, OperatorError};

        struct SleepOneSecond;
        #[async_trait::async_trait]
        impl Operator for SleepOneSecond {
            async fn run(&self) -> Result<Value, OperatorError> {
                tokio::time::sleep(std::time::Duration::from_millis(1000)).await;
                Ok(json!(null))
            }
        }

        let mut dag = Dag::new();
        dag.add_node("p").unwrap();
        dag.add_node("q").unwrap();

        let job = Job::new(
            "parallel-job",
            "* * * * * *",
            false,
            vec![
                Task::new("p", Arc::new(SleepOneSecond)),
                Task::new("q", Arc::new(SleepOneSecond)),
            ],
            dag,
        )
        .unwrap();

        let start_time = Instant::now();
        let (_, state) = run_to_completion(job).await;
        let elapsed = start_time.elapsed();

        assert_eq!(state, JobRunState::Successful);
        assert!(elapsed < std::time::Duration::from_millis(1800), "elapsed={elapsed:?}");
    }

    #[tokio::test]
    async fn retries_never_exceed_budget() {
        let mut dag = Dag::new();
        dag.add_node("always-fails").unwrap();

        let task = Task::new(
            "always-fails",
            Arc::new(MockOperator::failing_retryable("always-fails", "nope")),
        )
        .with_retries(3, RetryPolicy::ConstantDelay { period_seconds: 0 });

        let job = Job::new("retry-budget", "* * * * * *", false, vec![task], dag).unwrap();
        let (handle, state) = run_to_completion(job).await;
        assert_eq!(state, JobRunState::Failed);
        assert_eq!(handle.task_states().await["always-fails"], TaskState::Failed);
    }
}
