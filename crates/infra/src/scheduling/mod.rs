//! Cron-based background tasks.
//!
//! Schedulers have an explicit start/stop lifecycle, track their join
//! handles and wrap every lifecycle await in a timeout.

pub mod error;
pub mod job_reaper;

pub use error::{SchedulerError, SchedulerResult};
pub use job_reaper::{JobReaper, JobReaperConfig};
