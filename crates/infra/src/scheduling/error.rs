//! Scheduler error types

use std::time::Duration;

use ledgersync_domain::SyncError;
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

use crate::errors::InfraError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler not running")]
    NotRunning,

    #[error("failed to create scheduler")]
    CreationFailed {
        #[source]
        source: JobSchedulerError,
    },

    #[error("failed to start scheduler")]
    StartFailed {
        #[source]
        source: JobSchedulerError,
    },

    #[error("failed to stop scheduler")]
    StopFailed {
        #[source]
        source: JobSchedulerError,
    },

    #[error("failed to register job")]
    JobRegistrationFailed {
        #[source]
        source: JobSchedulerError,
    },

    #[error("operation timed out after {duration:?}")]
    Timeout {
        duration: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    #[error("task join failed")]
    TaskJoinFailed(#[from] tokio::task::JoinError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let sync_err = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                SyncError::InvalidState(err.to_string())
            }
            SchedulerError::JobRegistrationFailed { ref source } => {
                SyncError::Configuration(format!("{err}: {source:?}"))
            }
            _ => SyncError::Internal(err.to_string()),
        };
        InfraError(sync_err)
    }
}

impl From<SchedulerError> for SyncError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
