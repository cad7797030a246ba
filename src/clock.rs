//! Time sources and local-time helpers.
//!
//! Everything that needs "now" takes a [`Clock`] so tests can simulate time.
//! [`RuntimeClock`] follows the tokio clock, which keeps "now" and timer
//! delays consistent on a paused test runtime.

use crate::error::{DayplanError, Result};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = *guard + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Wall time anchored to the tokio clock.
///
/// Reports `origin + (tokio::time::Instant::now() - anchor)`. On a paused
/// runtime (`#[tokio::test(start_paused = true)]`) this advances exactly as
/// far as the runtime's virtual time does.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    origin: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl RuntimeClock {
    /// Anchor the clock so that it reads `origin` right now.
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.anchor);
        match chrono::Duration::from_std(elapsed) {
            Ok(elapsed) => self.origin + elapsed,
            Err(_) => self.origin,
        }
    }
}

/// Combine a local calendar date and wall-clock time into an instant.
///
/// An ambiguous local time (clocks falling back) resolves to the earlier
/// instant. A local time skipped by a daylight-saving jump does not exist
/// and is rejected.
///
/// # Errors
///
/// Returns [`DayplanError::Validation`] when the local time does not exist.
pub fn local_instant<Tz: TimeZone>(
    date: NaiveDate,
    time: NaiveTime,
    tz: &Tz,
) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(at) => Ok(at.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(DayplanError::Validation(format!(
            "{date} {time} does not exist in the local time zone"
        ))),
    }
}
