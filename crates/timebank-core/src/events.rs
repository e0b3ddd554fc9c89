use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::ledger::{RolloverSummary, ScoreInfo};

/// Every observable state change in the engine produces an Event.
/// UI consumers subscribe to them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Balance changed during tracking or reconciliation.
    TimeUpdate {
        available_secs: u64,
        is_tracking: bool,
        at: DateTime<Utc>,
    },
    /// Explicit credit (or debug debit) applied.
    CreditsAdded {
        delta_secs: i64,
        available_secs: u64,
        at: DateTime<Utc>,
    },
    /// Balance reached zero while backgrounded.
    TimeExpired { at: DateTime<Utc> },
    TrackingStarted {
        available_secs: u64,
        at: DateTime<Utc>,
    },
    TrackingStopped {
        available_secs: u64,
        /// Seconds debited by the final reconciliation on foreground.
        reconciled_secs: u64,
        at: DateTime<Utc>,
    },
    ScoreUpdate {
        points: u32,
        is_correct: bool,
        #[serde(default)]
        category: Option<String>,
        info: ScoreInfo,
        at: DateTime<Utc>,
    },
    /// Every Nth consecutive correct answer. Crediting the bonus is up to
    /// whoever listens.
    StreakMilestone {
        streak: u32,
        suggested_bonus_secs: u64,
        at: DateTime<Utc>,
    },
    DailyReset {
        summary: RolloverSummary,
        at: DateTime<Utc>,
    },
    PenaltyApplied {
        penalty: i64,
        daily_score: i64,
        overtime_penalty_accum: i64,
        at: DateTime<Utc>,
    },
    ShowMessage {
        level: MessageLevel,
        title: String,
        body: String,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
}

/// Convert an epoch-millisecond instant into an event timestamp.
pub(crate) fn stamp(now_ms: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(now_ms as i64).unwrap_or_default()
}

const BUS_CAPACITY: usize = 256;

/// Typed in-process fan-out over a broadcast channel.
///
/// Publishing never fails: with no subscribers the event is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!("event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Deliver every subsequent event to `callback` on a spawned task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add_listener<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Event) + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription {
            handle: Some(handle),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`EventBus::add_listener`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop delivery. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
