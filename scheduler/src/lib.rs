//! Cron-triggered pipeline scheduling (C6).
//!
//! A single background tick loop sleeps until the earliest enabled job's
//! next fire time, then fires every job due at that instant, bounded by a
//! configured concurrency cap. Ported from a dependency-ordered stage
//! orchestrator that tracked per-stage outcomes in a state map and streamed
//! lifecycle events over an mpsc channel; generalized here from topological
//! stage ordering to cron-driven wall-clock ordering, and from a channel of
//! events to the shared event bus.

mod error;

pub use error::SchedulerError;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use mimir_core::cancel::CancelToken;
use mimir_core::context::Ctx;
use mimir_core::event::{Event, EventBus};
use mimir_core::pipeline::Engine;
use mimir_store::Store;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

/// What the tick loop does when a job's previous run is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Skip this fire entirely (default).
    SkipIfRunning,
    /// Enqueue the invocation instead of running it inline.
    ///
    /// Queueing onto the job queue (C7) is performed by the caller that owns
    /// both a `Scheduler` and a queue handle; the scheduler itself only
    /// reports that a fire was deferred via `JobRunStatus::Queued`, since C6
    /// has no dependency on C7.
    Queue,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        ConcurrencyPolicy::SkipIfRunning
    }
}

/// A scheduled, recurring pipeline trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub name: String,
    pub pipeline_id: String,
    pub cron_expr: String,
    pub enabled: bool,
    #[serde(default)]
    pub policy: ConcurrencyPolicy,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    Succeeded,
    Failed,
    Cancelled,
    Skipped,
    Queued,
    Orphaned,
}

/// One entry in a job's execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobRunStatus,
    pub triggered_run_id: Option<Uuid>,
}

const LOG_CAPACITY: usize = 200;

struct JobState {
    job: ScheduledJob,
    schedule: CronSchedule,
    running: Arc<AtomicBool>,
    log: VecDeque<JobLogEntry>,
}

/// Drives cron-scheduled pipeline executions against a pipeline store and
/// engine shared with the rest of the process.
#[derive(Clone)]
pub struct Scheduler {
    jobs: Arc<RwLock<HashMap<String, JobState>>>,
    store: Arc<Store>,
    engine: Arc<Engine>,
    bus: EventBus,
    timezone: Tz,
    semaphore: Arc<Semaphore>,
    shutdown: CancelToken,
}

/// Adapts the spec's standard 5-field cron syntax to the `cron` crate's
/// expected 6-field (seconds-first) format by prefixing a literal `0`
/// seconds field.
fn parse_cron(expr: &str) -> Result<CronSchedule, SchedulerError> {
    let with_seconds = format!("0 {expr}");
    CronSchedule::from_str(&with_seconds).map_err(|e| SchedulerError::InvalidCron(e.to_string()))
}

impl Scheduler {
    pub fn new(store: Arc<Store>, engine: Arc<Engine>, bus: EventBus, timezone: Tz, max_concurrent: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            store,
            engine,
            bus,
            timezone,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            shutdown: CancelToken::new(),
        }
    }

    pub async fn add_job(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        pipeline_id: impl Into<String>,
        cron_expr: impl Into<String>,
    ) -> Result<ScheduledJob, SchedulerError> {
        let id = id.into();
        let pipeline_id = pipeline_id.into();
        let cron_expr = cron_expr.into();

        if self.jobs.read().await.contains_key(&id) {
            return Err(SchedulerError::DuplicateId(id));
        }
        if self.store.get(&pipeline_id).await.is_err() {
            return Err(SchedulerError::PipelineMissing(pipeline_id));
        }

        let schedule = parse_cron(&cron_expr)?;
        let next_run = self.next_fire(&schedule);

        let job = ScheduledJob {
            id: id.clone(),
            name: name.into(),
            pipeline_id,
            cron_expr,
            enabled: true,
            policy: ConcurrencyPolicy::default(),
            last_run: None,
            next_run,
            created_at: Utc::now(),
        };

        self.jobs.write().await.insert(
            id,
            JobState {
                job: job.clone(),
                schedule,
                running: Arc::new(AtomicBool::new(false)),
                log: VecDeque::new(),
            },
        );
        Ok(job)
    }

    pub async fn remove_job(&self, id: &str) -> Result<(), SchedulerError> {
        self.jobs
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    pub async fn enable(&self, id: &str) -> Result<(), SchedulerError> {
        self.set_enabled(id, true).await
    }

    pub async fn disable(&self, id: &str) -> Result<(), SchedulerError> {
        self.set_enabled(id, false).await
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.write().await;
        let state = jobs.get_mut(id).ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        state.job.enabled = enabled;
        Ok(())
    }

    pub async fn update_cron(&self, id: &str, cron_expr: impl Into<String>) -> Result<ScheduledJob, SchedulerError> {
        let cron_expr = cron_expr.into();
        let schedule = parse_cron(&cron_expr)?;
        let next_run = self.next_fire(&schedule);

        let mut jobs = self.jobs.write().await;
        let state = jobs.get_mut(id).ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        state.job.cron_expr = cron_expr;
        state.job.next_run = next_run;
        state.schedule = schedule;
        Ok(state.job.clone())
    }

    pub async fn list(&self) -> Vec<ScheduledJob> {
        self.jobs.read().await.values().map(|s| s.job.clone()).collect()
    }

    pub async fn get(&self, id: &str) -> Result<ScheduledJob, SchedulerError> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|s| s.job.clone())
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    pub async fn logs(&self, id: &str, limit: usize) -> Result<Vec<JobLogEntry>, SchedulerError> {
        let jobs = self.jobs.read().await;
        let state = jobs.get(id).ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        Ok(state.log.iter().rev().take(limit).cloned().collect())
    }

    fn next_fire(&self, schedule: &CronSchedule) -> Option<DateTime<Utc>> {
        let now = Utc::now().with_timezone(&self.timezone);
        schedule.after(&now).next().map(|dt| dt.with_timezone(&Utc))
    }

    /// Spawn the background tick loop. Returns a handle the caller can
    /// ignore; shutdown is driven by `shutdown()`.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_tick_loop().await })
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn run_tick_loop(&self) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            let sleep_until = {
                let jobs = self.jobs.read().await;
                jobs.values()
                    .filter(|s| s.job.enabled)
                    .filter_map(|s| s.job.next_run)
                    .min()
            };

            match sleep_until {
                None => {
                    // No enabled jobs; poll periodically for new additions.
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {}
                        _ = self.shutdown.cancelled() => return,
                    }
                }
                Some(next) => {
                    let now = Utc::now();
                    if next > now {
                        let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            _ = self.shutdown.cancelled() => return,
                        }
                    }
                    self.fire_due_jobs().await;
                }
            }
        }
    }

    async fn fire_due_jobs(&self) {
        let now = Utc::now();
        let due_ids: Vec<String> = {
            let jobs = self.jobs.read().await;
            jobs.values()
                .filter(|s| s.job.enabled && s.job.next_run.map_or(false, |t| t <= now))
                .map(|s| s.job.id.clone())
                .collect()
        };

        self.bus
            .publish(Event::SchedulerTick {
                due_job_count: due_ids.len(),
            })
            .await;

        for id in due_ids {
            self.fire_job(&id).await;
        }
    }

    async fn fire_job(&self, id: &str) {
        let (pipeline_id, policy, running_flag, schedule_next) = {
            let mut jobs = self.jobs.write().await;
            let Some(state) = jobs.get_mut(id) else { return };
            let next = self.next_fire(&state.schedule);
            state.job.next_run = next;
            (state.job.pipeline_id.clone(), state.job.policy, state.running.clone(), next)
        };
        let _ = schedule_next;

        let Ok(pipeline_def) = self.store.get(&pipeline_id).await else {
            warn!(job_id = %id, pipeline_id = %pipeline_id, "scheduled job's pipeline is gone; auto-disabling");
            let mut jobs = self.jobs.write().await;
            if let Some(state) = jobs.get_mut(id) {
                state.job.enabled = false;
                push_log(
                    &mut state.log,
                    JobLogEntry {
                        job_id: id.to_string(),
                        started_at: Utc::now(),
                        finished_at: Some(Utc::now()),
                        status: JobRunStatus::Orphaned,
                        triggered_run_id: None,
                    },
                );
            }
            return;
        };

        if running_flag.load(Ordering::SeqCst) {
            match policy {
                ConcurrencyPolicy::SkipIfRunning => {
                    info!(job_id = %id, "skipping fire: previous run still in progress");
                    self.record(id, JobRunStatus::Skipped, None).await;
                    return;
                }
                ConcurrencyPolicy::Queue => {
                    info!(job_id = %id, "previous run in progress; caller should enqueue onto the job queue");
                    self.record(id, JobRunStatus::Queued, None).await;
                    return;
                }
            }
        }

        let Ok(permit) = self.semaphore.clone().acquire_owned().await else { return };
        running_flag.store(true, Ordering::SeqCst);

        let engine = self.engine.clone();
        let bus = self.bus.clone();
        let scheduler = self.clone();
        let id = id.to_string();
        let started_at = Utc::now();

        tokio::spawn(async move {
            let _permit = permit;
            let ctx = Ctx::new();
            let cancel = CancelToken::new();
            let run_id = match engine.run(&pipeline_def.config, &ctx, &cancel).await {
                Ok(record) => {
                    let status = match record.status {
                        mimir_core::pipeline::RunStatus::Succeeded => JobRunStatus::Succeeded,
                        mimir_core::pipeline::RunStatus::Cancelled => JobRunStatus::Cancelled,
                        _ => JobRunStatus::Failed,
                    };
                    scheduler.record(&id, status, Some(record.run_id)).await;
                    Some(record.run_id)
                }
                Err(e) => {
                    warn!(job_id = %id, error = %e, "scheduled pipeline run failed to start");
                    scheduler.record(&id, JobRunStatus::Failed, None).await;
                    None
                }
            };

            bus.publish(Event::JobCompleted {
                job_id: run_id.unwrap_or_else(Uuid::new_v4),
            })
            .await;

            running_flag.store(false, Ordering::SeqCst);
            let _ = started_at;
        });
    }

    async fn record(&self, id: &str, status: JobRunStatus, triggered_run_id: Option<Uuid>) {
        let mut jobs = self.jobs.write().await;
        if let Some(state) = jobs.get_mut(id) {
            let now = Utc::now();
            state.job.last_run = Some(now);
            push_log(
                &mut state.log,
                JobLogEntry {
                    job_id: id.to_string(),
                    started_at: now,
                    finished_at: Some(now),
                    status,
                    triggered_run_id,
                },
            );
        }
    }
}

fn push_log(log: &mut VecDeque<JobLogEntry>, entry: JobLogEntry) {
    if log.len() >= LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimir_core::cancel::CancelToken as PluginCancelToken;
    use mimir_core::context::Ctx as PluginCtx;
    use mimir_core::errors::PluginError;
    use mimir_core::pipeline::{PipelineConfig, StepConfig};
    use mimir_core::plugin::Plugin;
    use mimir_core::registry::Registry;
    use std::collections::HashSet;
    use tempfile::tempdir;

    struct EchoPlugin;

    #[async_trait::async_trait]
    impl Plugin for EchoPlugin {
        fn name(&self) -> &str {
            "Test.echo"
        }

        async fn execute(
            &self,
            _ctx: &PluginCtx,
            _config: &serde_json::Value,
            _global_ctx: &PluginCtx,
            _cancel: &PluginCancelToken,
        ) -> Result<(), PluginError> {
            Ok(())
        }
    }

    async fn test_scheduler() -> (Scheduler, Arc<Store>) {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).await.unwrap());
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(EchoPlugin)).unwrap();
        let engine = Arc::new(Engine::new(registry, EventBus::new()));
        let scheduler = Scheduler::new(store.clone(), engine, EventBus::new(), chrono_tz::UTC, 2);
        (scheduler, store)
    }

    fn sample_config() -> PipelineConfig {
        PipelineConfig {
            id: "p1".to_string(),
            description: None,
            steps: vec![StepConfig {
                name: "s1".to_string(),
                plugin: "Test.echo".to_string(),
                config: serde_json::Value::Null,
                output: None,
                continue_on_error: false,
            }],
        }
    }

    #[tokio::test]
    async fn add_job_rejects_missing_pipeline() {
        let (scheduler, _store) = test_scheduler().await;
        let err = scheduler.add_job("j1", "nightly", "missing-pipeline", "*/5 * * * *").await.unwrap_err();
        assert!(matches!(err, SchedulerError::PipelineMissing(_)));
    }

    #[tokio::test]
    async fn add_job_rejects_invalid_cron() {
        let (scheduler, store) = test_scheduler().await;
        let def = store.create("p", None, HashSet::new(), sample_config(), None).await.unwrap();
        let err = scheduler.add_job("j1", "nightly", def.id, "not a cron").await.unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron(_)));
    }

    #[tokio::test]
    async fn add_job_computes_next_run() {
        let (scheduler, store) = test_scheduler().await;
        let def = store.create("p", None, HashSet::new(), sample_config(), None).await.unwrap();
        let job = scheduler.add_job("j1", "nightly", def.id, "* * * * *").await.unwrap();
        assert!(job.next_run.is_some());
    }

    #[tokio::test]
    async fn duplicate_job_id_rejected() {
        let (scheduler, store) = test_scheduler().await;
        let def = store.create("p", None, HashSet::new(), sample_config(), None).await.unwrap();
        scheduler.add_job("j1", "nightly", def.id.clone(), "* * * * *").await.unwrap();
        let err = scheduler.add_job("j1", "nightly-2", def.id, "* * * * *").await.unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn disable_then_enable_roundtrips() {
        let (scheduler, store) = test_scheduler().await;
        let def = store.create("p", None, HashSet::new(), sample_config(), None).await.unwrap();
        scheduler.add_job("j1", "nightly", def.id, "* * * * *").await.unwrap();
        scheduler.disable("j1").await.unwrap();
        assert!(!scheduler.get("j1").await.unwrap().enabled);
        scheduler.enable("j1").await.unwrap();
        assert!(scheduler.get("j1").await.unwrap().enabled);
    }

    #[tokio::test]
    async fn orphaned_job_auto_disables_on_fire() {
        let (scheduler, store) = test_scheduler().await;
        let def = store.create("p", None, HashSet::new(), sample_config(), None).await.unwrap();
        scheduler.add_job("j1", "nightly", def.id.clone(), "* * * * *").await.unwrap();
        store.delete(&def.id).await.unwrap();

        scheduler.fire_job("j1").await;

        assert!(!scheduler.get("j1").await.unwrap().enabled);
        let logs = scheduler.logs("j1", 10).await.unwrap();
        assert_eq!(logs[0].status, JobRunStatus::Orphaned);
    }

    struct SlowPlugin;

    #[async_trait::async_trait]
    impl Plugin for SlowPlugin {
        fn name(&self) -> &str {
            "Test.slow"
        }

        async fn execute(
            &self,
            _ctx: &PluginCtx,
            _config: &serde_json::Value,
            _global_ctx: &PluginCtx,
            _cancel: &PluginCancelToken,
        ) -> Result<(), PluginError> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok(())
        }
    }

    /// Spec §8: "for all scheduled jobs J with skip_if_running: no two
    /// concurrent executions of J overlap." Firing the same job a second
    /// time while its first run is still in flight must be recorded as
    /// `Skipped`, never as a second overlapping run.
    #[tokio::test]
    async fn skip_if_running_prevents_overlapping_fires() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).await.unwrap());
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(SlowPlugin)).unwrap();
        let engine = Arc::new(Engine::new(registry, EventBus::new()));
        let scheduler = Scheduler::new(store.clone(), engine, EventBus::new(), chrono_tz::UTC, 4);

        let config = PipelineConfig {
            id: "p1".to_string(),
            description: None,
            steps: vec![StepConfig {
                name: "s1".to_string(),
                plugin: "Test.slow".to_string(),
                config: serde_json::Value::Null,
                output: None,
                continue_on_error: false,
            }],
        };
        let def = store.create("p", None, HashSet::new(), config, None).await.unwrap();
        scheduler.add_job("j1", "nightly", def.id, "* * * * *").await.unwrap();

        scheduler.fire_job("j1").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        scheduler.fire_job("j1").await;

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let logs = scheduler.logs("j1", 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().any(|e| e.status == JobRunStatus::Skipped));
        assert!(logs.iter().any(|e| e.status == JobRunStatus::Succeeded));
    }
}
