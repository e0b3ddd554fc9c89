//! Screen-time balance and its background-debit state machine.
//!
//! Like a wall-clock timer, the account has no thread of its own: the owner
//! calls [`TimeAccount::tick`] periodically and every debit is derived from
//! the distance between the stored tick instant and "now".
//!
//! ## States
//!
//! ```text
//! Foreground --background (balance > 0)--> Tracking --balance hits 0--> Expired
//!      ^                                       |                          |
//!      +-------------- foreground -------------+------ foreground --------+
//! Expired --credit (balance > 0)--> Tracking
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::TimeRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    /// Host in front; balance untouched.
    Foreground,
    /// Backgrounded with balance left; debiting.
    Tracking,
    /// Backgrounded with nothing left.
    Expired,
}

/// Result of entering the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundOutcome {
    TrackingStarted,
    /// Backgrounded with an empty balance.
    AlreadyExpired,
    /// Already backgrounded; nothing changed.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub debited_secs: u64,
    /// Balance reached zero during this tick.
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForegroundOutcome {
    /// Debited by the final reconciliation.
    pub reconciled_secs: u64,
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditOutcome {
    pub available_secs: u64,
    /// Expired account came back to tracking.
    pub resumed: bool,
    /// A negative credit drained a tracking account.
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestoreOutcome {
    /// Debited for time spent while the process was not running.
    pub debited_secs: u64,
    /// When the balance ran out while away, if it did.
    pub expired_at_ms: Option<u64>,
}

/// Screen-time balance owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAccount {
    available_secs: u64,
    backgrounded: bool,
    tracking: bool,
    background_entered_at_ms: Option<u64>,
    /// Instant up to which the balance is exact. Set only while tracking.
    last_tick_ms: Option<u64>,
    last_persisted_ms: u64,
    persist_interval_ms: u64,
}

impl TimeAccount {
    pub fn new(available_secs: u64, persist_interval_secs: u64) -> Self {
        Self {
            available_secs,
            backgrounded: false,
            tracking: false,
            background_entered_at_ms: None,
            last_tick_ms: None,
            last_persisted_ms: 0,
            persist_interval_ms: persist_interval_secs * 1000,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn available_secs(&self) -> u64 {
        self.available_secs
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn is_backgrounded(&self) -> bool {
        self.backgrounded
    }

    pub fn background_entered_at_ms(&self) -> Option<u64> {
        self.background_entered_at_ms
    }

    pub fn state(&self) -> AccountState {
        match (self.backgrounded, self.tracking) {
            (false, _) => AccountState::Foreground,
            (true, true) => AccountState::Tracking,
            (true, false) => AccountState::Expired,
        }
    }

    pub fn persist_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_persisted_ms) >= self.persist_interval_ms
    }

    /// Persisted form. While tracking, `last_updated` is the last tick
    /// instant so the sub-second remainder survives a reload.
    pub fn record(&self, now_ms: u64) -> TimeRecord {
        TimeRecord {
            available_time: self.available_secs,
            was_tracking: self.tracking,
            background_start_time: self.background_entered_at_ms,
            last_updated: self.last_tick_ms.unwrap_or(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn mark_persisted(&mut self, now_ms: u64) {
        self.last_persisted_ms = now_ms;
    }

    pub fn enter_background(&mut self, now_ms: u64) -> BackgroundOutcome {
        if self.backgrounded {
            return BackgroundOutcome::Unchanged;
        }
        self.backgrounded = true;
        self.background_entered_at_ms = Some(now_ms);
        if self.available_secs > 0 {
            self.tracking = true;
            self.last_tick_ms = Some(now_ms);
            BackgroundOutcome::TrackingStarted
        } else {
            BackgroundOutcome::AlreadyExpired
        }
    }

    /// Debit whole seconds elapsed since the previous tick.
    ///
    /// Calling twice with the same `now_ms` debits once.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        if !self.tracking {
            return TickOutcome::default();
        }
        let debited_secs = self.settle(now_ms);
        let expired = self.available_secs == 0;
        if expired {
            self.stop_tracking();
        }
        TickOutcome {
            debited_secs,
            expired,
        }
    }

    /// Return to the foreground, reconciling time since the last tick.
    pub fn enter_foreground(&mut self, now_ms: u64) -> Option<ForegroundOutcome> {
        if !self.backgrounded {
            return None;
        }
        let was_tracking = self.tracking;
        let reconciled_secs = if was_tracking { self.settle(now_ms) } else { 0 };
        self.stop_tracking();
        self.backgrounded = false;
        self.background_entered_at_ms = None;
        Some(ForegroundOutcome {
            reconciled_secs,
            expired: was_tracking && self.available_secs == 0,
        })
    }

    /// Apply a credit (negative values debit). The result never drops below 0.
    pub fn add_credits(&mut self, delta_secs: i64, now_ms: u64) -> CreditOutcome {
        if self.tracking {
            self.settle(now_ms);
        }
        self.available_secs = if delta_secs >= 0 {
            self.available_secs.saturating_add(delta_secs as u64)
        } else {
            self.available_secs.saturating_sub(delta_secs.unsigned_abs())
        };

        let mut resumed = false;
        let mut expired = false;
        if self.backgrounded && !self.tracking && self.available_secs > 0 {
            self.tracking = true;
            self.last_tick_ms = Some(now_ms);
            resumed = true;
        } else if self.tracking && self.available_secs == 0 {
            self.stop_tracking();
            expired = true;
        }
        CreditOutcome {
            available_secs: self.available_secs,
            resumed,
            expired,
        }
    }

    /// Rebuild from a persisted record, charging wall-clock time that passed
    /// while the process was gone if tracking was active.
    pub fn restore(
        &mut self,
        record: &TimeRecord,
        now_ms: u64,
        host_backgrounded: bool,
    ) -> RestoreOutcome {
        self.available_secs = record.available_time;
        self.tracking = false;
        self.backgrounded = false;
        self.last_tick_ms = None;
        self.background_entered_at_ms = None;
        self.last_persisted_ms = now_ms;

        let mut outcome = RestoreOutcome::default();
        // Instant up to which the restored balance is exact.
        let mut settled_to = now_ms;
        if record.was_tracking {
            let since = record
                .background_start_time
                .unwrap_or(record.last_updated)
                .max(record.last_updated);
            if now_ms < since {
                warn!(now_ms, since, "clock moved backwards since last run, no debit");
            } else {
                let elapsed = (now_ms - since) / 1000;
                settled_to = since + elapsed * 1000;
                let before = self.available_secs;
                outcome.debited_secs = elapsed.min(before);
                self.available_secs = before - outcome.debited_secs;
                if before > 0 && self.available_secs == 0 {
                    outcome.expired_at_ms = Some(since + before * 1000);
                }
                debug!(elapsed, debited = outcome.debited_secs, "recovered background time");
            }
        }

        if host_backgrounded {
            self.backgrounded = true;
            self.background_entered_at_ms = record.background_start_time.or(Some(now_ms));
            if self.available_secs > 0 {
                self.tracking = true;
                self.last_tick_ms = Some(settled_to);
            }
        }
        outcome
    }

    /// Drop all progress, keeping only the host's foreground state.
    pub fn reset(&mut self, available_secs: u64, now_ms: u64) {
        let backgrounded = self.backgrounded;
        *self = Self::new(available_secs, self.persist_interval_ms / 1000);
        self.last_persisted_ms = now_ms;
        if backgrounded {
            self.enter_background(now_ms);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn settle(&mut self, now_ms: u64) -> u64 {
        let Some(last) = self.last_tick_ms else {
            return 0;
        };
        if now_ms < last {
            warn!(
                now_ms,
                last_tick_ms = last,
                "clock moved backwards, elapsed clamped to zero"
            );
            self.last_tick_ms = Some(now_ms);
            return 0;
        }
        let whole_secs = (now_ms - last) / 1000;
        if whole_secs == 0 {
            return 0;
        }
        self.last_tick_ms = Some(last + whole_secs * 1000);
        let debit = whole_secs.min(self.available_secs);
        self.available_secs -= debit;
        debit
    }

    fn stop_tracking(&mut self) {
        self.tracking = false;
        self.last_tick_ms = None;
    }
}
