//! Best-effort reminder scheduling.
//!
//! The engine hands the scheduler state-derived reminders; delivery is the
//! collaborator's business. Every failure is logged and swallowed by
//! [`Reminders`], so a broken notifier never disturbs the balance or the
//! score ledger.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::Result;

pub const LOW_BALANCE_ID: &str = "low-balance";
pub const TIME_EXPIRED_ID: &str = "time-expired";

/// External notification collaborator.
pub trait NotificationScheduler: Send + Sync {
    fn schedule_at(&self, id: &str, message: &str, when_ms: u64) -> Result<()>;
    fn cancel(&self, id: &str) -> Result<()>;
    fn cancel_all(&self) -> Result<()>;
}

/// Scheduler that only writes to the log. Used by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationScheduler for LogNotifier {
    fn schedule_at(&self, id: &str, message: &str, when_ms: u64) -> Result<()> {
        info!(id, when_ms, message, "notification scheduled");
        Ok(())
    }

    fn cancel(&self, id: &str) -> Result<()> {
        debug!(id, "notification cancelled");
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        debug!("all notifications cancelled");
        Ok(())
    }
}

/// A call observed by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Schedule { id: String, when_ms: u64 },
    Cancel { id: String },
    CancelAll,
}

/// Scheduler that records calls; optionally fails every one of them.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<NotifierCall>>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: NotifierCall) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.failing {
            return Err(crate::error::CoreError::Notification(
                "scheduler unavailable".into(),
            ));
        }
        Ok(())
    }
}

impl NotificationScheduler for RecordingNotifier {
    fn schedule_at(&self, id: &str, _message: &str, when_ms: u64) -> Result<()> {
        self.record(NotifierCall::Schedule {
            id: id.to_string(),
            when_ms,
        })
    }

    fn cancel(&self, id: &str) -> Result<()> {
        self.record(NotifierCall::Cancel { id: id.to_string() })
    }

    fn cancel_all(&self) -> Result<()> {
        self.record(NotifierCall::CancelAll)
    }
}

/// Engine-side wrapper that turns balance snapshots into reminders.
#[derive(Clone)]
pub struct Reminders {
    scheduler: Arc<dyn NotificationScheduler>,
    enabled: bool,
    low_balance_warning_secs: u64,
}

impl Reminders {
    pub fn new(
        scheduler: Arc<dyn NotificationScheduler>,
        enabled: bool,
        low_balance_warning_secs: u64,
    ) -> Self {
        Self {
            scheduler,
            enabled,
            low_balance_warning_secs,
        }
    }

    /// Tracking began with `balance_secs` left at `now_ms`.
    pub fn tracking_started(&self, balance_secs: u64, now_ms: u64) {
        if !self.enabled {
            return;
        }
        if balance_secs > self.low_balance_warning_secs {
            let lead = balance_secs - self.low_balance_warning_secs;
            self.swallow(
                "schedule",
                self.scheduler.schedule_at(
                    LOW_BALANCE_ID,
                    &format!(
                        "Only {} minutes of screen time left",
                        self.low_balance_warning_secs / 60
                    ),
                    now_ms + lead * 1000,
                ),
            );
        }
        self.swallow(
            "schedule",
            self.scheduler.schedule_at(
                TIME_EXPIRED_ID,
                "Screen time is up. Answer a few questions to earn more.",
                now_ms + balance_secs * 1000,
            ),
        );
    }

    /// Host came back to the foreground; pending reminders are stale.
    pub fn tracking_stopped(&self) {
        if !self.enabled {
            return;
        }
        self.swallow("cancel", self.scheduler.cancel(LOW_BALANCE_ID));
        self.swallow("cancel", self.scheduler.cancel(TIME_EXPIRED_ID));
    }

    /// Balance hit zero while backgrounded.
    pub fn expired(&self, now_ms: u64) {
        if !self.enabled {
            return;
        }
        self.swallow("cancel", self.scheduler.cancel(LOW_BALANCE_ID));
        self.swallow(
            "schedule",
            self.scheduler.schedule_at(
                TIME_EXPIRED_ID,
                "Screen time is up. Points are being deducted every minute.",
                now_ms,
            ),
        );
    }

    pub fn clear(&self) {
        if !self.enabled {
            return;
        }
        self.swallow("cancel_all", self.scheduler.cancel_all());
    }

    fn swallow(&self, op: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!(op, error = %e, "notification scheduler failed");
        }
    }
}
