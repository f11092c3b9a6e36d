//! Cron-driven watchdog for jobs stuck in `running`.
//!
//! A worker that crashes or abandons a job on timeout leaves the row in
//! `running`. The reaper fails every such row whose `started_at` is older
//! than the configured threshold.

use std::sync::Arc;
use std::time::Duration;

use ledgersync_core::{Clock, JobRepository, SystemClock};
use ledgersync_domain::{Result as DomainResult, WorkerConfig};
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone)]
pub struct JobReaperConfig {
    /// Six-field cron expression (with seconds).
    pub cron_expression: String,
    /// Running jobs older than this are failed.
    pub stale_after: Duration,
    pub run_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    pub join_timeout: Duration,
}

impl Default for JobReaperConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for JobReaperConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            cron_expression: config.reaper_cron.clone(),
            stale_after: Duration::from_secs(config.stale_job_threshold_secs),
            run_timeout: Duration::from_secs(60),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

pub struct JobReaper {
    scheduler: Option<JobScheduler>,
    config: JobReaperConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    jobs: Arc<dyn JobRepository>,
    clock: Arc<dyn Clock>,
}

impl JobReaper {
    pub fn new(jobs: Arc<dyn JobRepository>, config: JobReaperConfig) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            jobs,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;
        tokio::time::timeout(start_timeout, scheduler.start())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.scheduler = Some(scheduler);

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!(scheduler = "reaper", event = "monitor_cancelled", "reaper monitor cancelled");
        }));

        info!(
            scheduler = "reaper",
            cron = %self.config.cron_expression,
            stale_after_secs = self.config.stale_after.as_secs(),
            "job reaper started"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, scheduler.shutdown())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!(scheduler = "reaper", "job reaper stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Fail stale running jobs now. Returns the ids that were failed.
    pub async fn reap_once(&self) -> DomainResult<Vec<i64>> {
        reap(self.jobs.as_ref(), self.clock.as_ref(), self.config.stale_after).await
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler =
            JobScheduler::new().await.map_err(|source| SchedulerError::CreationFailed { source })?;

        let jobs = Arc::clone(&self.jobs);
        let clock = Arc::clone(&self.clock);
        let stale_after = self.config.stale_after;
        let run_timeout = self.config.run_timeout;

        let job = Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let jobs = Arc::clone(&jobs);
            let clock = Arc::clone(&clock);

            Box::pin(async move {
                match tokio::time::timeout(run_timeout, reap(jobs.as_ref(), clock.as_ref(), stale_after)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => {
                        error!(scheduler = "reaper", error = %err, "failed to reap stale jobs");
                    }
                    Err(_) => {
                        warn!(
                            scheduler = "reaper",
                            timeout_secs = run_timeout.as_secs(),
                            "reaper run timed out"
                        );
                    }
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        scheduler
            .add(job)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        Ok(scheduler)
    }
}

async fn reap(jobs: &dyn JobRepository, clock: &dyn Clock, stale_after: Duration) -> DomainResult<Vec<i64>> {
    let now = clock.timestamp();
    let threshold = i64::try_from(stale_after.as_secs()).unwrap_or(i64::MAX);
    let message = format!("Job timed out after {threshold} seconds");

    let failed = jobs.fail_stale_running(now.saturating_sub(threshold), &message, now).await?;
    if failed.is_empty() {
        debug!(scheduler = "reaper", "no stale jobs");
    } else {
        warn!(scheduler = "reaper", count = failed.len(), job_ids = ?failed, "failed stale running jobs");
    }
    Ok(failed)
}

impl Drop for JobReaper {
    fn drop(&mut self) {
        if self.scheduler.is_some() {
            warn!("JobReaper dropped while running; call stop() for a clean shutdown");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use ledgersync_domain::{JobStatus, JobType, NewJob, SyncError};
    use tempfile::TempDir;

    use super::*;
    use crate::database::{DbManager, SqlCipherJobRepository};

    const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_opt(self.0, 0).single().unwrap()
        }
    }

    fn setup() -> (TempDir, Arc<SqlCipherJobRepository>) {
        let dir = TempDir::new().unwrap();
        let db = DbManager::new(dir.path().join("reaper.db"), 2, Some(TEST_KEY)).unwrap();
        db.run_migrations().unwrap();
        (dir, Arc::new(SqlCipherJobRepository::new(Arc::new(db))))
    }

    fn new_job(company_id: i64) -> NewJob {
        NewJob {
            company_id,
            job_type: JobType::Full,
            from_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
        }
    }

    fn config(stale_after: Duration) -> JobReaperConfig {
        JobReaperConfig {
            cron_expression: "*/1 * * * * *".into(),
            stale_after,
            ..JobReaperConfig::default()
        }
    }

    #[tokio::test]
    async fn fails_only_jobs_past_the_threshold() {
        let (_dir, repo) = setup();
        let stuck = repo.create_job(&new_job(1)).await.unwrap();
        let recent = repo.create_job(&new_job(2)).await.unwrap();
        repo.claim_job(stuck.id, 10_000).await.unwrap();
        repo.claim_job(recent.id, 13_000).await.unwrap();

        let reaper = JobReaper::new(repo.clone(), config(Duration::from_secs(3600)))
            .with_clock(Arc::new(FixedClock(14_000)));

        assert_eq!(reaper.reap_once().await.unwrap(), vec![stuck.id]);

        let failed = repo.get_job(stuck.id).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("Job timed out after 3600 seconds"));
        assert_eq!(failed.completed_at, Some(14_000));
        assert_eq!(repo.get_job(recent.id).await.unwrap().unwrap().status, JobStatus::Running);

        assert!(reaper.reap_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduled_run_reaps_in_background() {
        let (_dir, repo) = setup();
        let stuck = repo.create_job(&new_job(1)).await.unwrap();
        repo.claim_job(stuck.id, 0).await.unwrap();

        let mut reaper = JobReaper::new(repo.clone(), config(Duration::from_secs(60)));
        reaper.start().await.unwrap();
        assert!(matches!(reaper.start().await, Err(SchedulerError::AlreadyRunning)));

        let mut status = JobStatus::Running;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(200)).await;
            status = repo.get_job(stuck.id).await.unwrap().unwrap().status;
            if status == JobStatus::Failed {
                break;
            }
        }

        reaper.stop().await.unwrap();
        assert_eq!(status, JobStatus::Failed);
        assert!(matches!(reaper.stop().await, Err(SchedulerError::NotRunning)));
    }

    #[tokio::test]
    async fn invalid_cron_fails_registration() {
        let (_dir, repo) = setup();
        let mut reaper = JobReaper::new(
            repo,
            JobReaperConfig { cron_expression: "not a cron".into(), ..JobReaperConfig::default() },
        );

        let err = reaper.start().await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobRegistrationFailed { .. }));
        assert!(!reaper.is_running());
        assert!(matches!(SyncError::from(err), SyncError::Configuration(_)));
    }
}
