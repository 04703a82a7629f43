//! Source of "today" and "now" for the services

use chrono::{DateTime, Local, NaiveDate, Utc};

#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Calendar date at the library (local time zone)
    fn today(&self) -> NaiveDate;
    /// Timestamp recorded in `added_at` / `updated_at`
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
