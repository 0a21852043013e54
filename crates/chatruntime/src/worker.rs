use crate::executor::FlowExecutor;
use chatcore::{JobId, LockStore, QueueError, Task, TaskQueue};
use chrono::Utc;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub poll_interval: Duration,
    pub lock_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: Uuid::new_v4().to_string(),
            poll_interval: Duration::from_secs(1),
            lock_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Lock held elsewhere; the task is dropped, not requeued
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.completed += 1,
            JobOutcome::Skipped => self.skipped += 1,
            JobOutcome::Failed => self.failed += 1,
        }
    }
}

/// Polls the task queue and replays tasks through the executor.
///
/// Several workers may share one queue and lock store; a per-job TTL lock keeps
/// them from running the same task twice. A worker closes the queue on exit only
/// when it owns it.
pub struct Worker {
    config: WorkerConfig,
    executor: Arc<FlowExecutor>,
    queue: Arc<dyn TaskQueue>,
    locks: Arc<dyn LockStore>,
    owns_queue: bool,
    in_flight: DashSet<JobId>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        executor: Arc<FlowExecutor>,
        queue: Arc<dyn TaskQueue>,
        locks: Arc<dyn LockStore>,
    ) -> Self {
        Self {
            config,
            executor,
            queue,
            locks,
            owns_queue: false,
            in_flight: DashSet::new(),
        }
    }

    /// Hand the queue to this worker: it is closed when `run` returns
    pub fn owning_queue(mut self) -> Self {
        self.owns_queue = true;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Job ids currently being processed
    pub fn in_flight(&self) -> Vec<JobId> {
        self.in_flight.iter().map(|id| *id).collect()
    }

    /// Run until `shutdown` is cancelled; closes the queue only if it is owned
    pub async fn run(&self, shutdown: CancellationToken) -> Result<WorkerStats, QueueError> {
        tracing::info!(
            worker_id = %self.config.worker_id,
            "Worker started (poll every {:?})",
            self.config.poll_interval
        );
        let mut stats = WorkerStats::default();

        while !shutdown.is_cancelled() {
            match self.poll_once().await {
                Ok(outcomes) => {
                    let busy = !outcomes.is_empty();
                    outcomes.into_iter().for_each(|o| stats.record(o));
                    if busy {
                        continue;
                    }
                }
                Err(e) => tracing::error!(worker_id = %self.config.worker_id, "Queue poll failed: {}", e),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        // Jobs run inline in `poll_once`, so none are in flight once the loop exits
        tracing::info!(worker_id = %self.config.worker_id, "Shutdown requested");

        if self.owns_queue {
            self.queue.close().await?;
        }
        tracing::info!(
            worker_id = %self.config.worker_id,
            "Worker stopped: {} completed, {} skipped, {} failed",
            stats.completed,
            stats.skipped,
            stats.failed
        );
        Ok(stats)
    }

    /// One loop iteration: at most one immediate task, then every ready delayed task
    pub async fn poll_once(&self) -> Result<Vec<JobOutcome>, QueueError> {
        let mut outcomes = Vec::new();

        if let Some(task) = self.queue.dequeue().await? {
            outcomes.push(self.process_task(task).await);
        }

        let ready = self.queue.drain_ready(Utc::now().timestamp()).await?;
        for task in ready {
            outcomes.push(self.process_task(task).await);
        }

        Ok(outcomes)
    }

    pub async fn process_task(&self, task: Task) -> JobOutcome {
        let key = task.lock_key();
        let token = format!("{}:{}", self.config.worker_id, Uuid::new_v4());

        match self.locks.acquire_lock(&key, &token, self.config.lock_ttl).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(job_id = %task.job_id, "Job locked by another worker; skipping");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(job_id = %task.job_id, "Could not acquire job lock: {}", e);
                return JobOutcome::Failed;
            }
        }

        self.in_flight.insert(task.job_id);
        let result = self.executor.execute_task(&task).await;

        match self.locks.release_lock(&key, &token).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(job_id = %task.job_id, "Job lock expired before release"),
            Err(e) => tracing::error!(job_id = %task.job_id, "Could not release job lock: {}", e),
        }
        self.in_flight.remove(&task.job_id);

        match result {
            Ok(transition) => {
                tracing::debug!(job_id = %task.job_id, "Job finished: {:?}", transition);
                JobOutcome::Completed
            }
            Err(e) => {
                tracing::error!(
                    job_id = %task.job_id,
                    flow_id = %task.flow_id,
                    "Job failed: {}",
                    e
                );
                JobOutcome::Failed
            }
        }
    }
}
