//! Polling worker that drains pending sync jobs.
//!
//! Each tick lists pending jobs oldest first and runs them one at a time
//! through the [`SyncExecutor`]. A company gets at most one job per tick.
//! Every job runs under a wall-clock timeout; a job that overruns is
//! abandoned in `running` and later failed by the reaper.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ledgersync_core::{JobRepository, SyncExecutor};
use ledgersync_domain::{JobStatus, SyncError, WorkerConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::WorkerError;

#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    /// Budget for one job
    pub job_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for JobWorkerConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            batch_size: config.batch_size.max(1),
            job_timeout: Duration::from_secs(config.job_timeout_secs.max(1)),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Counts for one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub completed: usize,
    pub failed: usize,
    /// Another job for the same company ran earlier in the tick
    pub deferred: usize,
    pub timed_out: usize,
    /// Claimed elsewhere, vanished, or errored before reaching a terminal state
    pub abandoned: usize,
}

impl TickSummary {
    pub fn executed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Job worker with explicit lifecycle management.
pub struct JobWorker {
    executor: Arc<SyncExecutor>,
    jobs: Arc<dyn JobRepository>,
    config: JobWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl JobWorker {
    pub fn new(
        executor: Arc<SyncExecutor>,
        jobs: Arc<dyn JobRepository>,
        config: JobWorkerConfig,
    ) -> Self {
        Self { executor, jobs, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Spawn the polling loop.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.is_running() {
            return Err(WorkerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let executor = Arc::clone(&self.executor);
        let jobs = Arc::clone(&self.jobs);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::process_loop(executor, jobs, config, cancel).await;
        }));

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "job worker started"
        );
        Ok(())
    }

    /// Cancel the loop and wait for it to finish. A job in progress is
    /// dropped at its next await point.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(handle) = self.task_handle.take() else {
            return Err(WorkerError::NotRunning);
        };

        self.cancellation.cancel();

        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "job worker task panicked");
                return Err(WorkerError::TaskPanicked(e.to_string()));
            }
            Err(_) => {
                warn!("job worker task did not complete within timeout");
                return Err(WorkerError::JoinTimeout(self.config.join_timeout));
            }
        }

        info!("job worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Run a single polling pass on the caller's task.
    pub async fn run_once(&self) -> Result<TickSummary, SyncError> {
        Self::run_tick(&self.executor, &self.jobs, &self.config, &self.cancellation).await
    }

    async fn process_loop(
        executor: Arc<SyncExecutor>,
        jobs: Arc<dyn JobRepository>,
        config: JobWorkerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("job worker loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(config.poll_interval) => {
                    let started = Instant::now();
                    match Self::run_tick(&executor, &jobs, &config, &cancel).await {
                        Ok(summary) if summary == TickSummary::default() => {}
                        Ok(summary) => {
                            info!(
                                completed = summary.completed,
                                failed = summary.failed,
                                deferred = summary.deferred,
                                timed_out = summary.timed_out,
                                abandoned = summary.abandoned,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "job worker tick finished"
                            );
                        }
                        Err(e) => error!(error = %e, "failed to list pending jobs"),
                    }
                }
            }
        }
    }

    async fn run_tick(
        executor: &SyncExecutor,
        jobs: &Arc<dyn JobRepository>,
        config: &JobWorkerConfig,
        cancel: &CancellationToken,
    ) -> Result<TickSummary, SyncError> {
        let pending = jobs.list_pending(config.batch_size).await?;
        let mut summary = TickSummary::default();
        if pending.is_empty() {
            return Ok(summary);
        }

        debug!(count = pending.len(), "pending jobs found");
        let mut companies_in_flight = HashSet::new();

        for job in pending {
            if cancel.is_cancelled() {
                break;
            }

            if !companies_in_flight.insert(job.company_id) {
                debug!(job_id = job.id, company_id = job.company_id, "company already synced this tick, deferring");
                summary.deferred += 1;
                continue;
            }

            match tokio::time::timeout(config.job_timeout, executor.execute_job(job.id)).await {
                Ok(Ok(result)) if result.status == JobStatus::Completed => summary.completed += 1,
                Ok(Ok(_)) => summary.failed += 1,
                Ok(Err(SyncError::InvalidState(reason))) => {
                    debug!(job_id = job.id, %reason, "job claimed elsewhere");
                    summary.abandoned += 1;
                }
                Ok(Err(e)) => {
                    error!(job_id = job.id, error = %e, "job execution error");
                    summary.abandoned += 1;
                }
                Err(_) => {
                    warn!(
                        job_id = job.id,
                        company_id = job.company_id,
                        timeout_secs = config.job_timeout.as_secs(),
                        "job exceeded its time budget; leaving it to the reaper"
                    );
                    summary.timed_out += 1;
                }
            }
        }

        Ok(summary)
    }
}

impl Drop for JobWorker {
    fn drop(&mut self) {
        if self.task_handle.is_some() {
            warn!("JobWorker dropped while running; cancelling loop");
            self.cancellation.cancel();
        }
    }
}
