//! The time-economy context object.
//!
//! `Economy` owns the balance and the score ledger and exposes one handler
//! per input: lifecycle transitions, the balance tick, the penalty check, the
//! rollover poll, answers and credits. Handlers read "now" once, derive every
//! delta from stored timestamps and never return errors, so the periodic
//! tasks driving them cannot be halted by a failure inside one invocation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::{AccountState, BackgroundOutcome, TimeAccount};
use crate::clock::Clock;
use crate::events::{stamp, Event, EventBus, MessageLevel};
use crate::format::format_time;
use crate::ledger::{Answer, DailyLedger, ScoreHistory, ScoreInfo, ScoreLedger};
use crate::lifecycle::HostState;
use crate::notify::{NotificationScheduler, Reminders};
use crate::storage::records::{load_record, ALL_KEYS, DAILY_KEY, HISTORY_KEY, TIME_KEY};
use crate::storage::{Config, KeyValueStore, Persister, TimeRecord};

/// Collaborators the engine talks to but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn NotificationScheduler>,
    pub bus: EventBus,
}

/// Combined state view published after every handler.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EconomySnapshot {
    pub available_secs: u64,
    pub available_display: String,
    pub state: Option<AccountState>,
    pub penalty_window_open: bool,
    pub score: ScoreInfo,
}

pub struct Economy {
    config: Config,
    clock: Arc<dyn Clock>,
    bus: EventBus,
    reminders: Reminders,
    persister: Persister,
    account: TimeAccount,
    ledger: ScoreLedger,
    active: bool,
}

impl Economy {
    /// Build from persisted state (or defaults) and reconcile time that
    /// passed while the process was not running.
    pub fn load(
        config: Config,
        store: &dyn KeyValueStore,
        persister: Persister,
        collaborators: Collaborators,
        host: HostState,
    ) -> Self {
        let Collaborators {
            clock,
            notifier,
            bus,
        } = collaborators;
        let now = clock.now_ms();
        let today = clock.today();

        let mut account = TimeAccount::new(
            config.engine.initial_balance_secs,
            config.engine.persist_interval_secs,
        );
        let time_record = load_record::<TimeRecord>(store, TIME_KEY);
        let restored = match &time_record {
            Some(record) => account.restore(record, now, host == HostState::Background),
            None => {
                if host == HostState::Background {
                    account.enter_background(now);
                }
                Default::default()
            }
        };

        let ledger = ScoreLedger::restore(
            config.scoring.clone(),
            load_record::<DailyLedger>(store, DAILY_KEY),
            load_record::<ScoreHistory>(store, HISTORY_KEY),
            today,
        );

        let reminders = Reminders::new(
            notifier,
            config.notifications.enabled,
            config.notifications.low_balance_warning_secs,
        );

        let mut economy = Self {
            config,
            clock,
            bus,
            reminders,
            persister,
            account,
            ledger,
            active: true,
        };

        info!(
            available_secs = economy.account.available_secs(),
            state = ?economy.account.state(),
            recovered_secs = restored.debited_secs,
            "time economy loaded"
        );

        if restored.debited_secs > 0 {
            economy.publish_time_update(now);
        }
        if let Some(expired_at) = restored.expired_at_ms {
            economy.bus.publish(Event::TimeExpired { at: stamp(now) });
            economy.ledger.close_penalty_window();
            economy.ledger.open_penalty_window(expired_at);
        }
        match economy.account.state() {
            AccountState::Tracking => {
                economy.ledger.close_penalty_window();
                economy
                    .reminders
                    .tracking_started(economy.account.available_secs(), now);
                economy.bus.publish(Event::TrackingStarted {
                    available_secs: economy.account.available_secs(),
                    at: stamp(now),
                });
            }
            AccountState::Expired => {
                if restored.expired_at_ms.is_some() {
                    economy.reminders.expired(now);
                }
                // A window restored from the daily record keeps its checkpoint.
                economy.ledger.open_penalty_window(now);
            }
            AccountState::Foreground => {
                // Overtime spent away while backgrounded at zero balance.
                if economy.ledger.penalty_window_open() {
                    economy.apply_penalty(now, true);
                    economy.ledger.close_penalty_window();
                }
            }
        }

        economy.on_rollover_check();
        economy.persist_all(now);
        economy
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_tracking(&self) -> bool {
        self.account.is_tracking()
    }

    pub fn penalty_window_open(&self) -> bool {
        self.ledger.penalty_window_open()
    }

    pub fn available_time(&self) -> u64 {
        self.account.available_secs()
    }

    pub fn account_state(&self) -> AccountState {
        self.account.state()
    }

    pub fn score_info(&self) -> ScoreInfo {
        self.ledger.info()
    }

    pub fn daily(&self) -> &DailyLedger {
        self.ledger.daily()
    }

    pub fn history(&self) -> &ScoreHistory {
        self.ledger.history()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn snapshot(&self) -> EconomySnapshot {
        EconomySnapshot {
            available_secs: self.account.available_secs(),
            available_display: format_time(self.account.available_secs()),
            state: Some(self.account.state()),
            penalty_window_open: self.ledger.penalty_window_open(),
            score: self.ledger.info(),
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────

    pub fn on_host_state(&mut self, state: HostState) {
        if !self.active {
            return;
        }
        let now = self.clock.now_ms();
        match state {
            HostState::Background => self.enter_background(now),
            HostState::Active => self.enter_foreground(now),
            HostState::Inactive => debug!("host inactive, ignored"),
        }
    }

    /// Periodic balance tick. A no-op unless tracking.
    pub fn on_balance_tick(&mut self) {
        if !self.active || !self.account.is_tracking() {
            return;
        }
        let now = self.clock.now_ms();
        let outcome = self.account.tick(now);
        if outcome.debited_secs > 0 {
            self.publish_time_update(now);
        }
        if outcome.expired {
            self.expire(now);
        } else if self.account.persist_due(now) {
            self.persist_time(now);
        }
    }

    /// Periodic overtime check.
    pub fn on_penalty_check(&mut self) {
        if !self.active {
            return;
        }
        let now = self.clock.now_ms();
        self.apply_penalty(now, self.account.is_backgrounded());
    }

    /// Periodic (and opportunistic) daily-reset check.
    pub fn on_rollover_check(&mut self) {
        if !self.active {
            return;
        }
        let today = self.clock.today();
        if !self.ledger.rollover_due(today) {
            return;
        }
        let now = self.clock.now_ms();
        let summary = self.ledger.rollover(today, self.account.available_secs());
        let body = format!(
            "Yesterday you scored {} points. {} unused minutes became {} bonus points.",
            summary.yesterday_score, summary.unused_minutes, summary.rollover_bonus
        );
        self.bus.publish(Event::DailyReset {
            summary,
            at: stamp(now),
        });
        self.show_message(MessageLevel::Info, "New day", body, now);
        self.persist_daily();
        self.persist_history();
    }

    pub fn record_answer(&mut self, answer: Answer) {
        if !self.active {
            return;
        }
        self.on_rollover_check();
        let now = self.clock.now_ms();
        let outcome = self.ledger.record_answer(&answer);
        self.bus.publish(Event::ScoreUpdate {
            points: outcome.points,
            is_correct: answer.is_correct,
            category: answer.category,
            info: self.ledger.info(),
            at: stamp(now),
        });
        if let Some(streak) = outcome.milestone {
            let bonus = self.config.engine.milestone_bonus_secs;
            self.bus.publish(Event::StreakMilestone {
                streak,
                suggested_bonus_secs: bonus,
                at: stamp(now),
            });
            self.show_message(
                MessageLevel::Success,
                "Streak!",
                format!("{streak} correct in a row."),
                now,
            );
        }
        self.persist_daily();
    }

    /// Add (or with a negative value, remove) balance. Never fails; the
    /// balance is clamped at zero.
    pub fn add_time_credits(&mut self, delta_secs: i64) {
        if !self.active {
            return;
        }
        let now = self.clock.now_ms();
        let outcome = self.account.add_credits(delta_secs, now);
        self.bus.publish(Event::CreditsAdded {
            delta_secs,
            available_secs: outcome.available_secs,
            at: stamp(now),
        });
        if outcome.available_secs > 0 && self.ledger.penalty_window_open() {
            self.ledger.close_penalty_window();
            self.persist_daily();
        }
        if outcome.resumed {
            self.start_tracking_side_effects(now);
        }
        if outcome.expired {
            self.expire(now);
        } else {
            self.persist_time(now);
        }
    }

    /// Reset balance, ledger and history and remove every persisted record.
    pub fn erase_all_progress(&mut self) {
        if !self.active {
            return;
        }
        let now = self.clock.now_ms();
        self.account
            .reset(self.config.engine.initial_balance_secs, now);
        self.ledger.erase(self.clock.today());
        self.reminders.clear();
        self.persister.remove_many(&ALL_KEYS);
        match self.account.state() {
            AccountState::Tracking => self.start_tracking_side_effects(now),
            AccountState::Expired => {
                self.ledger.open_penalty_window(now);
                self.persist_daily();
            }
            AccountState::Foreground => {}
        }
        info!("all progress erased");
        self.publish_time_update(now);
        self.show_message(
            MessageLevel::Info,
            "Progress erased",
            "Balance, scores and history were reset.".into(),
            now,
        );
    }

    /// Flush state and stop accepting input. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if !self.active {
            return;
        }
        let now = self.clock.now_ms();
        self.persist_all(now);
        self.active = false;
        debug!("time economy shut down");
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn enter_background(&mut self, now: u64) {
        match self.account.enter_background(now) {
            BackgroundOutcome::TrackingStarted => {
                self.start_tracking_side_effects(now);
                self.persist_time(now);
            }
            BackgroundOutcome::AlreadyExpired => {
                self.ledger.open_penalty_window(now);
                self.persist_time(now);
                self.persist_daily();
            }
            BackgroundOutcome::Unchanged => {}
        }
    }

    fn enter_foreground(&mut self, now: u64) {
        if !self.account.is_backgrounded() {
            return;
        }
        // Charge overtime up to this instant while still backgrounded.
        self.apply_penalty(now, true);
        let Some(outcome) = self.account.enter_foreground(now) else {
            return;
        };
        if outcome.expired {
            self.bus.publish(Event::TimeExpired { at: stamp(now) });
        }
        self.ledger.close_penalty_window();
        self.reminders.tracking_stopped();
        self.bus.publish(Event::TrackingStopped {
            available_secs: self.account.available_secs(),
            reconciled_secs: outcome.reconciled_secs,
            at: stamp(now),
        });
        self.persist_time(now);
        self.persist_daily();
    }

    fn start_tracking_side_effects(&mut self, now: u64) {
        let available = self.account.available_secs();
        self.reminders.tracking_started(available, now);
        self.bus.publish(Event::TrackingStarted {
            available_secs: available,
            at: stamp(now),
        });
    }

    fn expire(&mut self, now: u64) {
        info!("screen time expired while backgrounded");
        self.bus.publish(Event::TimeExpired { at: stamp(now) });
        self.reminders.expired(now);
        self.ledger.open_penalty_window(now);
        self.persist_time(now);
        self.persist_daily();
    }

    fn apply_penalty(&mut self, now: u64, backgrounded: bool) {
        let Some(outcome) =
            self.ledger
                .check_penalty(now, self.account.available_secs(), backgrounded)
        else {
            return;
        };
        let daily = self.ledger.daily();
        self.bus.publish(Event::PenaltyApplied {
            penalty: outcome.penalty,
            daily_score: daily.daily_score,
            overtime_penalty_accum: daily.overtime_penalty_accum,
            at: stamp(now),
        });
        for total in outcome.warnings_crossed {
            self.show_message(
                MessageLevel::Warning,
                "Overtime",
                format!("You have lost {total} points to overtime today."),
                now,
            );
        }
        self.persist_daily();
    }

    fn publish_time_update(&self, now: u64) {
        self.bus.publish(Event::TimeUpdate {
            available_secs: self.account.available_secs(),
            is_tracking: self.account.is_tracking(),
            at: stamp(now),
        });
    }

    fn show_message(&self, level: MessageLevel, title: &str, body: String, now: u64) {
        self.bus.publish(Event::ShowMessage {
            level,
            title: title.to_string(),
            body,
            at: stamp(now),
        });
    }

    fn persist_time(&mut self, now: u64) {
        self.persister.write(TIME_KEY, &self.account.record(now));
        self.account.mark_persisted(now);
    }

    fn persist_daily(&self) {
        self.persister.write(DAILY_KEY, self.ledger.daily());
    }

    fn persist_history(&self) {
        self.persister.write(HISTORY_KEY, self.ledger.history());
    }

    fn persist_all(&mut self, now: u64) {
        self.persist_time(now);
        self.persist_daily();
        self.persist_history();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::{NotifierCall, RecordingNotifier, TIME_EXPIRED_ID};
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use tokio::sync::broadcast;

    struct Harness {
        clock: ManualClock,
        store: Arc<MemoryStore>,
        notifier: RecordingNotifier,
        bus: EventBus,
        rx: broadcast::Receiver<Event>,
    }

    impl Harness {
        fn new() -> Self {
            let bus = EventBus::new();
            let rx = bus.subscribe();
            Self {
                clock: ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()),
                store: Arc::new(MemoryStore::new()),
                notifier: RecordingNotifier::new(),
                bus,
                rx,
            }
        }

        fn load(&self, host: HostState) -> Economy {
            Economy::load(
                Config::default(),
                self.store.as_ref(),
                Persister::inline(self.store.clone()),
                Collaborators {
                    clock: Arc::new(self.clock.clone()),
                    notifier: Arc::new(self.notifier.clone()),
                    bus: self.bus.clone(),
                },
                host,
            )
        }

        fn drain(&mut self) -> Vec<Event> {
            let mut events = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn count(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    #[test]
    fn background_overshoot_expires_once() {
        let mut h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(100);
        economy.on_host_state(HostState::Background);
        assert_eq!(economy.account_state(), AccountState::Tracking);

        h.clock.advance_secs(150);
        for _ in 0..5 {
            economy.on_balance_tick();
            h.clock.advance_secs(1);
        }

        assert_eq!(economy.available_time(), 0);
        assert_eq!(economy.account_state(), AccountState::Expired);
        assert!(economy.penalty_window_open());
        let events = h.drain();
        assert_eq!(count(&events, |e| matches!(e, Event::TimeExpired { .. })), 1);
        assert!(h.notifier.calls().contains(&NotifierCall::Schedule {
            id: TIME_EXPIRED_ID.into(),
            when_ms: h.clock.now_ms() - 5_000,
        }));
    }

    #[test]
    fn tick_handler_is_idempotent_for_same_instant() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(100);
        economy.on_host_state(HostState::Background);
        h.clock.advance_ms(3_500);
        economy.on_balance_tick();
        let first = economy.snapshot();
        economy.on_balance_tick();
        assert_eq!(economy.snapshot(), first);
        assert_eq!(economy.available_time(), 97);
    }

    #[test]
    fn foreground_stops_tracking_and_cancels_reminders() {
        let mut h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(600);
        economy.on_host_state(HostState::Background);
        h.clock.advance_ms(42_700);
        economy.on_host_state(HostState::Active);

        assert_eq!(economy.available_time(), 558);
        assert_eq!(economy.account_state(), AccountState::Foreground);
        let events = h.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::TrackingStopped {
                reconciled_secs: 42,
                ..
            }
        )));
        assert!(h
            .notifier
            .calls()
            .contains(&NotifierCall::Cancel { id: TIME_EXPIRED_ID.into() }));
    }

    #[test]
    fn inactive_is_ignored() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(60);
        economy.on_host_state(HostState::Inactive);
        assert_eq!(economy.account_state(), AccountState::Foreground);
    }

    #[test]
    fn three_minutes_overtime_costs_150_points() {
        let mut h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.on_host_state(HostState::Background);
        assert_eq!(economy.account_state(), AccountState::Expired);

        for _ in 0..18 {
            h.clock.advance_secs(10);
            economy.on_penalty_check();
        }
        assert_eq!(economy.daily().overtime_penalty_accum, 150);
        assert_eq!(economy.daily().daily_score, -150);

        let events = h.drain();
        let warnings = count(&events, |e| {
            matches!(e, Event::ShowMessage { level: MessageLevel::Warning, .. })
        });
        assert_eq!(warnings, 3);
    }

    #[test]
    fn credit_closes_penalty_window_and_resumes_tracking() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.on_host_state(HostState::Background);
        h.clock.advance_secs(60);
        economy.on_penalty_check();
        assert_eq!(economy.daily().overtime_penalty_accum, 50);

        economy.add_time_credits(300);
        assert!(!economy.penalty_window_open());
        assert_eq!(economy.account_state(), AccountState::Tracking);

        h.clock.advance_secs(60);
        economy.on_penalty_check();
        assert_eq!(economy.daily().overtime_penalty_accum, 50);
    }

    #[test]
    fn foreground_charges_final_overtime_and_closes_window() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.on_host_state(HostState::Background);
        h.clock.advance_secs(120);
        economy.on_host_state(HostState::Active);
        assert_eq!(economy.daily().overtime_penalty_accum, 100);
        assert!(!economy.penalty_window_open());

        h.clock.advance_secs(600);
        economy.on_penalty_check();
        assert_eq!(economy.daily().overtime_penalty_accum, 100);
    }

    #[test]
    fn negative_credit_clamps_at_zero() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(30);
        economy.add_time_credits(-1_000);
        assert_eq!(economy.available_time(), 0);
        economy.add_time_credits(0);
        assert_eq!(economy.available_time(), 0);
    }

    #[test]
    fn persisted_state_round_trips_without_elapsed_time() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(1_234);
        economy.record_answer(Answer::correct(0.0));
        economy.shutdown();

        let reloaded = h.load(HostState::Active);
        assert_eq!(reloaded.available_time(), 1_234);
        assert_eq!(reloaded.daily().daily_score, 150);
    }

    #[test]
    fn relaunch_recovers_time_spent_backgrounded() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(600);
        economy.on_host_state(HostState::Background);
        h.clock.advance_secs(5);
        economy.on_balance_tick();
        // process killed without shutdown
        drop(economy);

        h.clock.advance_secs(200);
        let reloaded = h.load(HostState::Active);
        assert_eq!(reloaded.available_time(), 395);
        assert_eq!(reloaded.account_state(), AccountState::Foreground);
    }

    #[test]
    fn relaunch_after_expiry_opens_penalty_window_at_expiry() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(60);
        economy.on_host_state(HostState::Background);
        drop(economy);

        h.clock.advance_secs(60 + 180);
        let mut reloaded = h.load(HostState::Background);
        assert_eq!(reloaded.available_time(), 0);
        assert_eq!(reloaded.account_state(), AccountState::Expired);
        reloaded.on_penalty_check();
        assert_eq!(reloaded.daily().overtime_penalty_accum, 150);
    }

    #[test]
    fn relaunches_under_a_second_apart_still_debit() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(100);
        economy.on_host_state(HostState::Background);
        economy.shutdown();

        for _ in 0..20 {
            h.clock.advance_ms(900);
            let mut relaunched = h.load(HostState::Background);
            relaunched.shutdown();
        }
        let reloaded = h.load(HostState::Background);
        assert_eq!(reloaded.available_time(), 82);
    }

    #[test]
    fn overtime_before_relaunch_is_still_charged() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.on_host_state(HostState::Background);
        assert!(economy.penalty_window_open());
        economy.shutdown();

        h.clock.advance_secs(180);
        let mut reloaded = h.load(HostState::Background);
        assert!(reloaded.penalty_window_open());
        reloaded.on_penalty_check();
        assert_eq!(reloaded.daily().overtime_penalty_accum, 150);
    }

    #[test]
    fn relaunch_in_foreground_charges_overtime_once() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.on_host_state(HostState::Background);
        economy.shutdown();

        h.clock.advance_secs(120);
        let mut reloaded = h.load(HostState::Active);
        assert_eq!(reloaded.daily().overtime_penalty_accum, 100);
        assert!(!reloaded.penalty_window_open());

        h.clock.advance_secs(120);
        reloaded.on_penalty_check();
        reloaded.shutdown();
        let again = h.load(HostState::Active);
        assert_eq!(again.daily().overtime_penalty_accum, 100);
    }

    #[test]
    fn foreground_relaunch_after_offline_expiry() {
        let mut h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(60);
        economy.on_host_state(HostState::Background);
        drop(economy);
        h.drain();

        h.clock.advance_secs(60 + 180);
        let reloaded = h.load(HostState::Active);
        assert_eq!(reloaded.available_time(), 0);
        assert_eq!(reloaded.account_state(), AccountState::Foreground);
        assert_eq!(reloaded.daily().overtime_penalty_accum, 150);
        assert!(!reloaded.penalty_window_open());
        let events = h.drain();
        assert_eq!(count(&events, |e| matches!(e, Event::TimeExpired { .. })), 1);
    }

    #[test]
    fn clock_regression_clamps_without_halting_handlers() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(100);
        economy.on_host_state(HostState::Background);
        h.clock.advance_secs(10);
        economy.on_balance_tick();
        assert_eq!(economy.available_time(), 90);

        h.clock.rewind_secs(30);
        economy.on_balance_tick();
        economy.on_penalty_check();
        economy.on_rollover_check();
        assert_eq!(economy.available_time(), 90);
        assert_eq!(economy.account_state(), AccountState::Tracking);

        // ticking resumes from the regressed instant
        h.clock.advance_secs(35);
        economy.on_balance_tick();
        assert_eq!(economy.available_time(), 55);

        h.clock.advance_secs(55);
        economy.on_balance_tick();
        assert_eq!(economy.account_state(), AccountState::Expired);

        h.clock.rewind_secs(20);
        economy.on_penalty_check();
        assert_eq!(economy.daily().overtime_penalty_accum, 0);
        h.clock.advance_secs(60);
        economy.on_penalty_check();
        assert_eq!(economy.daily().overtime_penalty_accum, 50);
    }

    #[test]
    fn malformed_records_fall_back_to_defaults() {
        let h = Harness::new();
        h.store.set(TIME_KEY, "garbage").unwrap();
        h.store.set(DAILY_KEY, "[1,2").unwrap();
        let economy = h.load(HostState::Active);
        assert_eq!(economy.available_time(), 0);
        assert_eq!(economy.daily().daily_score, 0);
    }

    #[test]
    fn milestone_emitted_once_at_fifth_answer() {
        let mut h = Harness::new();
        let mut economy = h.load(HostState::Active);
        h.drain();
        let mut at = Vec::new();
        for i in 1..=5 {
            economy.record_answer(Answer::correct(20.0));
            if count(&h.drain(), |e| matches!(e, Event::StreakMilestone { .. })) > 0 {
                at.push(i);
            }
        }
        assert_eq!(at, vec![5]);
        // granting time is left to the listener
        assert_eq!(economy.available_time(), 0);
    }

    #[test]
    fn rollover_on_new_day_prefunds_score() {
        let mut h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(7_500);
        economy.record_answer(Answer::correct(20.0));
        economy.record_answer(Answer::correct(20.0));
        economy.record_answer(Answer::wrong(3.0));
        assert_eq!(economy.daily().daily_score, 250);
        h.drain();

        h.clock.advance_secs(24 * 3600);
        economy.on_rollover_check();
        economy.on_rollover_check();

        let score = economy.score_info();
        assert_eq!(score.daily_score, 1_200);
        assert_eq!(score.daily_rollover_bonus, 1_200);
        assert_eq!(score.yesterday_score, 250);
        assert_eq!(score.all_time_high_score, 250);
        assert_eq!(score.total_days_played, 1);
        let events = h.drain();
        assert_eq!(count(&events, |e| matches!(e, Event::DailyReset { .. })), 1);
    }

    #[test]
    fn answer_after_midnight_lands_on_new_day() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.record_answer(Answer::correct(20.0));
        h.clock.advance_secs(24 * 3600);
        economy.record_answer(Answer::correct(20.0));
        assert_eq!(economy.daily().date, NaiveDate::from_ymd_opt(2024, 5, 11).unwrap());
        assert_eq!(economy.daily().daily_score, 100);
        assert_eq!(economy.history().yesterday_score, 100);
    }

    #[test]
    fn erase_resets_everything() {
        let h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.add_time_credits(900);
        economy.record_answer(Answer::correct(1.0));
        economy.erase_all_progress();
        assert_eq!(economy.available_time(), 0);
        assert_eq!(economy.score_info(), ScoreInfo::default());
        assert!(h.store.get(TIME_KEY).unwrap().is_none());
        assert!(h.notifier.calls().contains(&NotifierCall::CancelAll));
    }

    #[test]
    fn handlers_ignored_after_shutdown() {
        let mut h = Harness::new();
        let mut economy = h.load(HostState::Active);
        economy.shutdown();
        economy.shutdown();
        h.drain();
        economy.add_time_credits(100);
        economy.on_host_state(HostState::Background);
        economy.record_answer(Answer::correct(0.0));
        assert_eq!(economy.available_time(), 0);
        assert_eq!(economy.account_state(), AccountState::Foreground);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn failing_notifier_does_not_disturb_engine() {
        let bus = EventBus::new();
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(1_700_000_000_000);
        let mut economy = Economy::load(
            Config::default(),
            store.as_ref(),
            Persister::inline(store.clone()),
            Collaborators {
                clock: Arc::new(clock.clone()),
                notifier: Arc::new(RecordingNotifier::failing()),
                bus,
            },
            HostState::Active,
        );
        economy.add_time_credits(10);
        economy.on_host_state(HostState::Background);
        clock.advance_secs(20);
        economy.on_balance_tick();
        assert_eq!(economy.account_state(), AccountState::Expired);
    }
}
