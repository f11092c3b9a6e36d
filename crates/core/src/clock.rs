//! Wall-clock abstraction so job timestamps and token expiry checks can be
//! pinned in tests.

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Unix seconds.
    fn timestamp(&self) -> i64 {
        self.now().timestamp()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
