//! Bounded in-memory job queue and worker pool (C7).
//!
//! Pipeline runs submitted through [`JobQueue::enqueue`] wait in a FIFO
//! backlog, generalized from a single-priority-class instance of the
//! priority run queue this crate's bounded-capacity-plus-duplicate-id
//! checks are modeled on. A fixed-size pool of workers, bounded by a
//! semaphore, pulls jobs off the backlog and drives them through the
//! pipeline engine; results are held for a bounded retention window and
//! then reaped.

mod error;

pub use error::QueueError;

use chrono::{DateTime, Utc};
use mimir_core::cancel::CancelToken;
use mimir_core::context::Ctx;
use mimir_core::event::{Event, EventBus};
use mimir_core::pipeline::{Engine, ExecutionRecord};
use mimir_store::Store;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of a finished job, retained for `JOB_RESULT_TTL_SECONDS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub pipeline_id: String,
    pub status: JobStatus,
    pub record: Option<ExecutionRecord>,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    pipeline_id: String,
    status: JobStatus,
    record: Option<ExecutionRecord>,
    error: Option<String>,
    enqueued_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    cancel: CancelToken,
    done: Arc<Notify>,
}

impl JobEntry {
    fn to_result(&self, job_id: Uuid) -> JobResult {
        JobResult {
            job_id,
            pipeline_id: self.pipeline_id.clone(),
            status: self.status,
            record: self.record.clone(),
            error: self.error.clone(),
            enqueued_at: self.enqueued_at,
            finished_at: self.finished_at,
        }
    }
}

/// A bounded FIFO job queue backed by a fixed-size worker pool.
#[derive(Clone)]
pub struct JobQueue {
    capacity: usize,
    result_ttl: Duration,
    pending: Arc<Mutex<VecDeque<Uuid>>>,
    jobs: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
    dispatch: Arc<Notify>,
    workers: Arc<Semaphore>,
    store: Arc<Store>,
    engine: Arc<Engine>,
    bus: EventBus,
    shutdown: CancelToken,
}

impl JobQueue {
    pub fn new(
        store: Arc<Store>,
        engine: Arc<Engine>,
        bus: EventBus,
        capacity: usize,
        worker_count: usize,
        result_ttl: Duration,
    ) -> Self {
        Self {
            capacity,
            result_ttl,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            dispatch: Arc::new(Notify::new()),
            workers: Arc::new(Semaphore::new(worker_count.max(1))),
            store,
            engine,
            bus,
            shutdown: CancelToken::new(),
        }
    }

    /// Submit a pipeline run. Returns `QueueError::Full` if the backlog is
    /// already at capacity, or `QueueError::PipelineMissing` if `pipeline_id`
    /// doesn't resolve in the store.
    pub async fn enqueue(&self, pipeline_id: impl Into<String>) -> Result<Uuid, QueueError> {
        let pipeline_id = pipeline_id.into();
        if self.store.get(&pipeline_id).await.is_err() {
            return Err(QueueError::PipelineMissing(pipeline_id));
        }

        {
            let pending = self.pending.lock().await;
            if pending.len() >= self.capacity {
                return Err(QueueError::Full { max: self.capacity });
            }
        }

        let job_id = Uuid::new_v4();
        let now = Utc::now();
        self.jobs.write().await.insert(
            job_id,
            JobEntry {
                pipeline_id,
                status: JobStatus::Queued,
                record: None,
                error: None,
                enqueued_at: now,
                finished_at: None,
                cancel: CancelToken::new(),
                done: Arc::new(Notify::new()),
            },
        );
        self.pending.lock().await.push_back(job_id);
        self.bus.publish(Event::JobQueued { job_id }).await;
        self.dispatch.notify_one();
        Ok(job_id)
    }

    pub async fn status(&self, job_id: Uuid) -> Result<JobStatus, QueueError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|e| e.status)
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))
    }

    /// Return the job's result if it has finished, `None` if it is still
    /// queued or running.
    pub async fn result(&self, job_id: Uuid) -> Result<Option<JobResult>, QueueError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        Ok(match entry.status {
            JobStatus::Queued | JobStatus::Running => None,
            _ => Some(entry.to_result(job_id)),
        })
    }

    /// Block until the job finishes or `timeout` elapses.
    pub async fn wait_for_result(&self, job_id: Uuid, timeout: Duration) -> Result<JobResult, QueueError> {
        let done = {
            let jobs = self.jobs.read().await;
            let entry = jobs.get(&job_id).ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
            if !matches!(entry.status, JobStatus::Queued | JobStatus::Running) {
                return Ok(entry.to_result(job_id));
            }
            entry.done.clone()
        };

        tokio::select! {
            _ = done.notified() => {
                let jobs = self.jobs.read().await;
                let entry = jobs.get(&job_id).ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
                Ok(entry.to_result(job_id))
            }
            _ = tokio::time::sleep(timeout) => Err(QueueError::WaitTimeout),
        }
    }

    pub async fn queue_length(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Cancel a job. A still-queued job is removed from the backlog
    /// immediately; a running job's cooperative cancel token is tripped and
    /// the worker observes it on its next engine checkpoint.
    pub async fn cancel(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&job_id).ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;
        match entry.status {
            JobStatus::Queued => {
                self.pending.lock().await.retain(|id| *id != job_id);
                entry.status = JobStatus::Cancelled;
                entry.finished_at = Some(Utc::now());
                entry.done.notify_waiters();
            }
            JobStatus::Running => {
                entry.cancel.cancel();
            }
            _ => {}
        }
        Ok(())
    }

    /// Spawn the dispatcher loop and the result-reaping loop.
    pub fn start(&self) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let dispatcher = self.clone();
        let reaper = self.clone();
        (
            tokio::spawn(async move { dispatcher.run_dispatch_loop().await }),
            tokio::spawn(async move { reaper.run_reap_loop().await }),
        )
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn run_dispatch_loop(&self) {
        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            let next = self.pending.lock().await.pop_front();
            let Some(job_id) = next else {
                tokio::select! {
                    _ = self.dispatch.notified() => continue,
                    _ = self.shutdown.cancelled() => return,
                }
            };

            let Ok(permit) = self.workers.clone().acquire_owned().await else { return };
            let queue = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                queue.run_job(job_id).await;
            });
        }
    }

    async fn run_job(&self, job_id: Uuid) {
        let (pipeline_id, cancel) = {
            let mut jobs = self.jobs.write().await;
            let Some(entry) = jobs.get_mut(&job_id) else { return };
            if entry.status == JobStatus::Cancelled {
                return;
            }
            entry.status = JobStatus::Running;
            (entry.pipeline_id.clone(), entry.cancel.clone())
        };

        self.bus.publish(Event::JobStarted { job_id }).await;

        let Ok(def) = self.store.get(&pipeline_id).await else {
            self.finish(job_id, JobStatus::Failed, None, Some("pipeline no longer exists".to_string())).await;
            return;
        };

        let ctx = Ctx::new();
        match self.engine.run(&def.config, &ctx, &cancel).await {
            Ok(record) => {
                let status = match record.status {
                    mimir_core::pipeline::RunStatus::Succeeded => JobStatus::Succeeded,
                    mimir_core::pipeline::RunStatus::Cancelled => JobStatus::Cancelled,
                    _ => JobStatus::Failed,
                };
                self.finish(job_id, status, Some(record), None).await;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "job failed to run");
                self.finish(job_id, JobStatus::Failed, None, Some(e.to_string())).await;
            }
        }

        self.bus.publish(Event::JobCompleted { job_id }).await;
    }

    async fn finish(&self, job_id: Uuid, status: JobStatus, record: Option<ExecutionRecord>, error: Option<String>) {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(&job_id) {
            entry.status = status;
            entry.record = record;
            entry.error = error;
            entry.finished_at = Some(Utc::now());
            entry.done.notify_waiters();
        }
    }

    async fn run_reap_loop(&self) {
        let sweep_interval = Duration::from_secs(30).min(self.result_ttl);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(sweep_interval) => {}
                _ = self.shutdown.cancelled() => return,
            }

            let now = Utc::now();
            let mut jobs = self.jobs.write().await;
            let before = jobs.len();
            jobs.retain(|_, entry| match entry.finished_at {
                Some(finished) => {
                    let age = now.signed_duration_since(finished);
                    age.to_std().map(|d| d < self.result_ttl).unwrap_or(true)
                }
                None => true,
            });
            let reaped = before - jobs.len();
            if reaped > 0 {
                info!(reaped, "reaped expired job results");
            }
        }
    }
}
