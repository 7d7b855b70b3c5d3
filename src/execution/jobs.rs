//! Background trade execution with a submit/poll contract

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use crate::{
    errors::EngineResult,
    execution::engine::{ExecutionRequest, TradeExecutionEngine},
    types::{TradeExecution, TradingSignal},
};

pub type JobId = String;

#[derive(Debug, Clone)]
pub struct TradeJob {
    pub signal: TradingSignal,
    pub request: ExecutionRequest,
}

#[derive(Debug, Clone)]
pub enum JobStatus {
    /// Spawned and not yet finished. Jobs start as soon as they are submitted.
    Running,
    /// The engine produced a record. It may itself be FAILED or CANCELLED.
    Finished(TradeExecution),
    /// The engine refused the request or the task died.
    Failed(String),
    Unknown,
}

enum JobSlot {
    Running(JoinHandle<EngineResult<TradeExecution>>),
    Done(JobStatus),
}

// Per-job lock. A `wait` in progress holds it; `poll` only tries it.
type SharedSlot = Arc<Mutex<JobSlot>>;

pub struct BackgroundExecutor {
    engine: Arc<TradeExecutionEngine>,
    jobs: Mutex<HashMap<JobId, SharedSlot>>,
}

impl BackgroundExecutor {
    pub fn new(engine: Arc<TradeExecutionEngine>) -> Self {
        Self { engine, jobs: Mutex::new(HashMap::new()) }
    }

    pub fn engine(&self) -> &Arc<TradeExecutionEngine> {
        &self.engine
    }

    pub async fn submit(&self, job: TradeJob) -> JobId {
        let job_id = format!("job_{}", Uuid::new_v4().simple());
        let engine = self.engine.clone();
        let handle = tokio::spawn(async move { engine.execute_signal(job.signal, job.request).await });

        self.jobs
            .lock()
            .await
            .insert(job_id.clone(), Arc::new(Mutex::new(JobSlot::Running(handle))));
        info!("🗂️ Queued background trade job {}", job_id);
        job_id
    }

    /// Never blocks on a running job.
    pub async fn poll(&self, job_id: &str) -> JobStatus {
        match self.slot(job_id).await {
            Some(slot) => Self::poll_slot(job_id, &slot).await,
            None => JobStatus::Unknown,
        }
    }

    /// Waits for a job to finish. The job stays visible to `poll` meanwhile.
    pub async fn wait(&self, job_id: &str) -> JobStatus {
        let Some(slot) = self.slot(job_id).await else {
            return JobStatus::Unknown;
        };

        let mut guard = slot.lock().await;
        let status = match &mut *guard {
            JobSlot::Done(status) => return status.clone(),
            JobSlot::Running(handle) => Self::settle(job_id, handle).await,
        };
        *guard = JobSlot::Done(status.clone());
        status
    }

    /// Removes and returns every job that has finished. Running jobs stay.
    pub async fn take_finished(&self) -> Vec<(JobId, JobStatus)> {
        let slots: Vec<(JobId, SharedSlot)> = self
            .jobs
            .lock()
            .await
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut finished = Vec::new();
        for (job_id, slot) in slots {
            match Self::poll_slot(&job_id, &slot).await {
                JobStatus::Running => {}
                status => finished.push((job_id, status)),
            }
        }

        let mut jobs = self.jobs.lock().await;
        for (job_id, _) in &finished {
            jobs.remove(job_id);
        }
        finished.sort_by(|a, b| a.0.cmp(&b.0));
        finished
    }

    pub async fn job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.jobs.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops the engine's monitors and waits for every running job to record
    /// its outcome.
    pub async fn shutdown(&self) {
        self.engine.shutdown();
        for job_id in self.job_ids().await {
            self.wait(&job_id).await;
        }
    }

    async fn slot(&self, job_id: &str) -> Option<SharedSlot> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    async fn poll_slot(job_id: &str, slot: &SharedSlot) -> JobStatus {
        // Held by a `wait` in progress, so the job is still running.
        let Ok(mut guard) = slot.try_lock() else {
            return JobStatus::Running;
        };

        match &mut *guard {
            JobSlot::Done(status) => status.clone(),
            JobSlot::Running(handle) if !handle.is_finished() => JobStatus::Running,
            JobSlot::Running(handle) => {
                let status = Self::settle(job_id, handle).await;
                *guard = JobSlot::Done(status.clone());
                status
            }
        }
    }

    async fn settle(job_id: &str, handle: &mut JoinHandle<EngineResult<TradeExecution>>) -> JobStatus {
        match handle.await {
            Ok(Ok(execution)) => JobStatus::Finished(execution),
            Ok(Err(e)) => {
                warn!("⚠️ Background job {} rejected: {}", job_id, e);
                JobStatus::Failed(e.to_string())
            }
            Err(e) => {
                warn!("⚠️ Background job {} panicked or was aborted: {}", job_id, e);
                JobStatus::Failed(e.to_string())
            }
        }
    }
}
