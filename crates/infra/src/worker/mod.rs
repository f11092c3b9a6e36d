//! Background job execution.

use std::time::Duration;

use ledgersync_domain::SyncError;
use thiserror::Error;

mod job_worker;

pub use job_worker::{JobWorker, JobWorkerConfig, TickSummary};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker already running")]
    AlreadyRunning,

    #[error("worker not running")]
    NotRunning,

    #[error("worker task did not finish within {0:?}")]
    JoinTimeout(Duration),

    #[error("worker task panicked: {0}")]
    TaskPanicked(String),
}

impl From<WorkerError> for SyncError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::AlreadyRunning | WorkerError::NotRunning => {
                SyncError::InvalidState(err.to_string())
            }
            WorkerError::JoinTimeout(_) | WorkerError::TaskPanicked(_) => {
                SyncError::Internal(err.to_string())
            }
        }
    }
}
