//! Wall-clock access.
//!
//! Every handler derives its delta from timestamps read here, never from a
//! running counter, so a handler invoked late, early or twice with the same
//! instant stays correct.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Calendar day used as the daily-ledger key.
    fn today(&self) -> NaiveDate;
}

/// Real wall clock; the calendar day follows the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests and simulations. Clones share the same instant.
///
/// The calendar day is derived from the instant in UTC so tests do not
/// depend on the machine timezone.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(now_ms)),
        }
    }

    /// Start at midday UTC on the given date.
    pub fn at_date(date: NaiveDate) -> Self {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis().max(0) as u64)
            .unwrap_or(0);
        Self::new(noon)
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs * 1000);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Move the clock backwards, as a user changing the device time would.
    pub fn rewind_secs(&self, secs: u64) {
        let now = self.now_ms.load(Ordering::SeqCst);
        self.now_ms
            .store(now.saturating_sub(secs * 1000), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn today(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp_millis(self.now_ms() as i64)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance_secs(5);
        assert_eq!(other.now_ms(), 6_000);
    }

    #[test]
    fn manual_clock_day_follows_instant() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let clock = ManualClock::at_date(day);
        assert_eq!(clock.today(), day);
        clock.advance_secs(12 * 3600);
        assert_eq!(clock.today(), day.succ_opt().unwrap());
    }

    #[test]
    fn rewind_saturates_at_epoch() {
        let clock = ManualClock::new(2_000);
        clock.rewind_secs(10);
        assert_eq!(clock.now_ms(), 0);
    }
}
