//! `Scheduler` — the job registry and cron tick loop.
//!
//! Grounded on `loom-server-jobs`'s scheduler: a `broadcast` shutdown signal
//! observed by every background task, `JoinHandle`s collected under a
//! `Mutex` and drained on shutdown, and a fixed-interval tick loop driven by
//! `tokio::select!` rather than a sleep-per-job timer per registered job.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::error::EngineError;
use crate::job::{Job, JobFactory};
use crate::jobrun::{self, JobRunHandle, JobRunState};
use crate::stream_hub::StreamHub;

/// How often the scheduler checks registered jobs' cron schedules against
/// the current time.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded history retained per job; older runs are evicted regardless of
/// their outcome. The engine keeps no state across process restarts.
const HISTORY_CAPACITY: usize = 50;

/// How long `shutdown` waits for in-flight `JobRun`s to finish on their own
/// before requesting cancellation.
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

struct JobEntry {
    factory: JobFactory,
    schedule: String,
    active: bool,
    /// Wall-clock minute this job was last fired on, to avoid re-triggering
    /// within the same tick window if the tick interval ever drops below a
    /// cron field's resolution.
    last_fired: Option<chrono::DateTime<Utc>>,
    history: VecDeque<JobRunHandle>,
}

/// Owns every registered job and drives schedule-triggered runs. Manual runs
/// via [`Scheduler::run_job`] bypass both the `active` flag and the cron
/// schedule.
pub struct Scheduler {
    jobs: RwLock<HashMap<String, JobEntry>>,
    hub: StreamHub,
    shutdown: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    in_flight: Mutex<Vec<JobRunHandle>>,
}

impl Scheduler {
    pub fn new() -> Arc<Self> {
        let (shutdown, _) = broadcast::channel(1);
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            hub: StreamHub::new(),
            shutdown,
            handles: Mutex::new(Vec::new()),
            in_flight: Mutex::new(Vec::new()),
        })
    }

    pub fn event_hub(&self) -> StreamHub {
        self.hub.clone()
    }

    /// Register a job under `name`. Returns `EngineError::DuplicateName` if
    /// the name is already registered rather than silently replacing it —
    /// job registration is a programmer error surface, not something the
    /// engine swallows.
    pub async fn register(
        &self,
        name: impl Into<String>,
        schedule: impl Into<String>,
        active: bool,
        factory: JobFactory,
    ) -> Result<(), EngineError> {
        let name = name.into();
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&name) {
            return Err(EngineError::DuplicateName(name));
        }
        jobs.insert(
            name,
            JobEntry {
                factory,
                schedule: schedule.into(),
                active,
                last_fired: None,
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
            },
        );
        Ok(())
    }

    pub async fn list_jobs(&self) -> Vec<(String, String, bool)> {
        self.jobs
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), entry.schedule.clone(), entry.active))
            .collect()
    }

    /// Build a fresh `Job` instance from the registered factory, without
    /// running it. Used by `getJob`/`getJobDag`.
    pub async fn describe_job(&self, name: &str) -> Result<Job, EngineError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(name).ok_or_else(|| EngineError::UnknownJob(name.to_string()))?;
        Ok((entry.factory)())
    }

    /// `(name, schedule, active)` using the registry's live `active` flag,
    /// not a freshly-built `Job`'s registration-time default.
    pub async fn job_summary(&self, name: &str) -> Result<(String, String, bool), EngineError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(name).ok_or_else(|| EngineError::UnknownJob(name.to_string()))?;
        Ok((name.to_string(), entry.schedule.clone(), entry.active))
    }

    pub async fn toggle_active(&self, name: &str) -> Result<bool, EngineError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownJob(name.to_string()))?;
        entry.active = !entry.active;
        Ok(entry.active)
    }

    pub async fn history(&self, name: &str) -> Result<Vec<JobRunHandle>, EngineError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(name).ok_or_else(|| EngineError::UnknownJob(name.to_string()))?;
        Ok(entry.history.iter().cloned().collect())
    }

    /// Submit a run immediately, regardless of the job's `active` flag or
    /// schedule. Used by the manual `submitRun` facade call.
    #[instrument(skip(self))]
    pub async fn run_job(self: &Arc<Self>, name: &str) -> Result<JobRunHandle, EngineError> {
        let job = {
            let jobs = self.jobs.read().await;
            let entry = jobs.get(name).ok_or_else(|| EngineError::UnknownJob(name.to_string()))?;
            (entry.factory)()
        };

        let (handle, join) = jobrun::start(Arc::new(job), self.hub.clone())?;
        self.record_and_await(name.to_string(), handle.clone(), join);
        Ok(handle)
    }

    fn record_and_await(
        self: &Arc<Self>,
        job_name: String,
        handle: JobRunHandle,
        join: jobrun::JoinAll,
    ) {
        let scheduler = Arc::clone(self);
        let run_id = handle.run_id.clone();
        scheduler.in_flight.lock().unwrap().push(handle.clone());

        let task = tokio::spawn(async move {
            let outcome = join.wait().await;
            match outcome {
                JobRunState::Failed => warn!(job = %job_name, run = %handle.run_id, "job run failed"),
                JobRunState::Cancelled => info!(job = %job_name, run = %handle.run_id, "job run cancelled"),
                _ => info!(job = %job_name, run = %handle.run_id, "job run succeeded"),
            }

            {
                let mut jobs = scheduler.jobs.write().await;
                if let Some(entry) = jobs.get_mut(&job_name) {
                    if entry.history.len() == HISTORY_CAPACITY {
                        entry.history.pop_front();
                    }
                    entry.history.push_back(handle);
                }
            }

            scheduler.in_flight.lock().unwrap().retain(|h| h.run_id != run_id);
        });

        self.handles.lock().unwrap().push(task);
    }

    /// Start the cron tick loop as a background task. Returns immediately;
    /// call `shutdown` to stop it.
    pub fn start(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.tick().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("scheduler tick loop shutting down");
                        break;
                    }
                }
            }
        });

        self.handles.lock().unwrap().push(handle);
    }

    #[instrument(skip(self))]
    async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        let due: Vec<String> = {
            let mut jobs = self.jobs.write().await;
            let mut due = Vec::new();
            for (name, entry) in jobs.iter_mut() {
                if !entry.active {
                    continue;
                }
                let schedule = match cron::Schedule::from_str_unchecked(&entry.schedule) {
                    Some(s) => s,
                    None => {
                        error!(job = %name, schedule = %entry.schedule, "invalid cron expression, skipping");
                        continue;
                    }
                };
                let last = entry.last_fired.unwrap_or(now - chrono::Duration::seconds(1));
                if let Some(next) = schedule.after(&last).next() {
                    if next <= now {
                        entry.last_fired = Some(now);
                        due.push(name.clone());
                    }
                }
            }
            due
        };

        for name in due {
            info!(job = %name, "cron schedule due, submitting run");
            if let Err(e) = self.run_job(&name).await {
                error!(job = %name, error = %e, "failed to submit scheduled run");
            }
        }
    }

    /// Signal the tick loop to stop submitting new runs, then wait up to
    /// [`DRAIN_DEADLINE`] for in-flight `JobRun`s to finish on their own. Runs
    /// still outstanding past the deadline are sent a cancellation signal
    /// (tasks not yet `Running` are skipped; running operators still run to
    /// completion, per the engine's no-preemption cancellation model) and
    /// `shutdown` returns without waiting further.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(());
        let drained: Vec<JoinHandle<()>> = self.handles.lock().unwrap().drain(..).collect();

        let drain_all = async {
            for handle in drained {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(DRAIN_DEADLINE, drain_all).await.is_err() {
            let stragglers = self.in_flight.lock().unwrap();
            warn!(
                count = stragglers.len(),
                "drain deadline elapsed with job runs still in flight, requesting cancellation"
            );
            for handle in stragglers.iter() {
                handle.cancel();
            }
        }
    }
}

/// Extension point kept narrow on purpose: `cron::Schedule` implements
/// `FromStr`, but invalid expressions should only disable a job's
/// schedule-triggered runs, not panic the tick loop.
trait ScheduleParseExt {
    fn from_str_unchecked(expr: &str) -> Option<cron::Schedule>;
}

impl ScheduleParseExt for cron::Schedule {
    fn from_str_unchecked(expr: &str) -> Option<cron::Schedule> {
        use std::str::FromStr;
        cron::Schedule::from_str(expr).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Dag;
    use crate::task::Task;
    use operators::mock::MockOperator;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    fn single_task_factory(name: &'static str) -> JobFactory {
        StdArc::new(move || {
            let mut dag = Dag::new();
            dag.add_node("only").unwrap();
            Job::new(
                name,
                "* * * * * *",
                true,
                vec![Task::new(
                    "only",
                    StdArc::new(MockOperator::returning("only", json!(1))),
                )],
                dag,
            )
            .unwrap()
        })
    }

    #[tokio::test]
    async fn register_and_list_roundtrip() {
        let scheduler = Scheduler::new();
        scheduler
            .register("demo", "* * * * * *", true, single_task_factory("demo"))
            .await
            .unwrap();

        let jobs = scheduler.list_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, "demo");
        assert!(jobs[0].2);
    }

    #[tokio::test]
    async fn toggle_active_flips_and_persists_across_run_job_calls() {
        let scheduler = Scheduler::new();
        scheduler
            .register("demo", "* * * * * *", true, single_task_factory("demo"))
            .await
            .unwrap();

        assert!(!scheduler.toggle_active("demo").await.unwrap());
        let jobs = scheduler.list_jobs().await;
        assert!(!jobs[0].2);
    }

    #[tokio::test]
    async fn registering_a_duplicate_name_is_rejected_eagerly() {
        let scheduler = Scheduler::new();
        scheduler
            .register("demo", "* * * * * *", true, single_task_factory("demo"))
            .await
            .unwrap();

        let result = scheduler
            .register("demo", "* * * * * *", true, single_task_factory("demo"))
            .await;
        assert!(matches!(result, Err(EngineError::DuplicateName(name)) if name == "demo"));

        // The original registration, including its (empty) history, survives.
        let jobs = scheduler.list_jobs().await;
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn unknown_job_returns_error() {
        let scheduler = Scheduler::new();
        assert!(matches!(
            scheduler.toggle_active("ghost").await,
            Err(EngineError::UnknownJob(_))
        ));
        assert!(matches!(
            scheduler.describe_job("ghost").await,
            Err(EngineError::UnknownJob(_))
        ));
    }

    #[tokio::test]
    async fn run_job_executes_and_records_history() {
        let scheduler = Scheduler::new();
        scheduler
            .register("demo", "* * * * * *", false, single_task_factory("demo"))
            .await
            .unwrap();

        let handle = scheduler.run_job("demo").await.unwrap();
        // Poll until the background recorder task has appended to history.
        for _ in 0..50 {
            if !scheduler.history("demo").await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let history = scheduler.history("demo").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].run_id, handle.run_id);
        assert_eq!(handle.overall_state().await, JobRunState::Successful);
    }

    #[tokio::test]
    async fn manual_run_ignores_inactive_flag() {
        let scheduler = Scheduler::new();
        scheduler
            .register("demo", "* * * * * *", false, single_task_factory("demo"))
            .await
            .unwrap();

        assert!(scheduler.run_job("demo").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_runs_that_outlive_the_drain_deadline() {
        use operators::{Operator, OperatorError};
        use serde_json::Value;

        struct Forever;
        #[async_trait::async_trait]
        impl Operator for Forever {
            async fn run(&self) -> Result<Value, OperatorError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!(null))
            }
        }

        let factory: JobFactory = StdArc::new(|| {
            let mut dag = Dag::new();
            dag.add_node("forever").unwrap();
            Job::new(
                "forever-job",
                "* * * * * *",
                false,
                vec![Task::new("forever", StdArc::new(Forever))],
                dag,
            )
            .unwrap()
        });

        let scheduler = Scheduler::new();
        scheduler
            .register("forever-job", "* * * * * *", false, factory)
            .await
            .unwrap();
        scheduler.run_job("forever-job").await.unwrap();

        let for_shutdown = Arc::clone(&scheduler);
        let shutdown_task = tokio::spawn(async move {
            for_shutdown.shutdown().await;
        });

        tokio::time::advance(DRAIN_DEADLINE + Duration::from_secs(1)).await;
        tokio::time::timeout(Duration::from_secs(5), shutdown_task)
            .await
            .expect("shutdown should return once the drain deadline elapses")
            .unwrap();
    }
}
