//! Async driver for [`Economy`].
//!
//! One task owns the economy and multiplexes every input with
//! `tokio::select!`: lifecycle changes, commands from handles, and three
//! independent periodic timers (balance tick, penalty check, rollover poll).
//! There is never more than one handler running, so the economy needs no
//! lock; handles talk to it over channels and read a `watch` snapshot.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::economy::{Collaborators, Economy, EconomySnapshot};
use crate::events::{Event, EventBus, Subscription};
use crate::ledger::{Answer, ScoreInfo};
use crate::lifecycle::{HostState, LifecycleSource};
use crate::storage::{Config, KeyValueStore, Persister};

#[derive(Debug)]
enum Command {
    AddCredits(i64),
    RecordAnswer(Answer),
    EraseAll,
    /// Replies once every earlier command has been handled.
    Sync(oneshot::Sender<()>),
}

pub struct EconomyService;

impl EconomyService {
    /// Load persisted state and start the event loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        lifecycle: &dyn LifecycleSource,
        collaborators: Collaborators,
    ) -> EconomyHandle {
        let mut lifecycle_rx = lifecycle.subscribe();
        let host = *lifecycle_rx.borrow_and_update();

        let bus = collaborators.bus.clone();
        let (persister, writer) = Persister::spawn(store.clone());
        let economy = Economy::load(config, store.as_ref(), persister, collaborators, host);

        let (snapshot_tx, snapshot_rx) = watch::channel(economy.snapshot());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_loop(
            economy,
            lifecycle_rx,
            command_rx,
            snapshot_tx,
            cancel.clone(),
            writer,
        ));

        EconomyHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            bus,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

async fn run_loop(
    mut economy: Economy,
    mut lifecycle_rx: watch::Receiver<HostState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshot_tx: watch::Sender<EconomySnapshot>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
) {
    let engine_cfg = economy.config().engine.clone();
    let mut balance_tick = interval(secs(engine_cfg.tick_interval_secs));
    let mut penalty_tick = interval(secs(engine_cfg.penalty_check_interval_secs));
    let mut rollover_tick = interval(secs(engine_cfg.rollover_check_interval_secs));
    for timer in [&mut balance_tick, &mut penalty_tick, &mut rollover_tick] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    }

    let mut lifecycle_open = true;
    let mut commands_open = true;
    info!("time economy service started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            changed = lifecycle_rx.changed(), if lifecycle_open => match changed {
                Ok(()) => {
                    let state = *lifecycle_rx.borrow_and_update();
                    economy.on_host_state(state);
                }
                Err(_) => {
                    debug!("lifecycle source closed");
                    lifecycle_open = false;
                }
            },

            cmd = commands.recv(), if commands_open => match cmd {
                Some(Command::AddCredits(secs)) => economy.add_time_credits(secs),
                Some(Command::RecordAnswer(answer)) => economy.record_answer(answer),
                Some(Command::EraseAll) => economy.erase_all_progress(),
                Some(Command::Sync(reply)) => {
                    let _ = reply.send(());
                }
                None => commands_open = false,
            },

            _ = balance_tick.tick(), if economy.is_tracking() => economy.on_balance_tick(),

            _ = penalty_tick.tick(), if economy.penalty_window_open() => economy.on_penalty_check(),

            _ = rollover_tick.tick() => economy.on_rollover_check(),
        }
        snapshot_tx.send_replace(economy.snapshot());
    }

    economy.shutdown();
    snapshot_tx.send_replace(economy.snapshot());
    // Dropping the economy drops the last persister, letting the writer drain.
    drop(economy);
    if let Err(e) = writer.await {
        warn!(error = %e, "storage writer ended abnormally");
    }
    info!("time economy service stopped");
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

/// Cloneable front door to a running [`EconomyService`].
#[derive(Clone)]
pub struct EconomyHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<EconomySnapshot>,
    bus: EventBus,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl EconomyHandle {
    /// Credit (or debit) balance. Ignored once the service has stopped.
    pub fn add_time_credits(&self, secs: i64) {
        self.send(Command::AddCredits(secs));
    }

    pub fn record_answer(&self, answer: Answer) {
        self.send(Command::RecordAnswer(answer));
    }

    pub fn erase_all_progress(&self) {
        self.send(Command::EraseAll);
    }

    /// Wait until every command sent before this call has been applied.
    pub async fn sync(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Sync(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn available_time(&self) -> u64 {
        self.snapshot.borrow().available_secs
    }

    pub fn score_info(&self) -> ScoreInfo {
        self.snapshot.borrow().score.clone()
    }

    pub fn snapshot(&self) -> EconomySnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn add_listener<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(Event) + Send + 'static,
    {
        self.bus.add_listener(callback)
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop every timer and subscription, flush state and wait for the loop
    /// to finish. Safe to call any number of times from any clone.
    pub async fn cleanup(&self) {
        self.cancel.cancel();
        let task = match self.task.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "economy loop ended abnormally");
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("economy service stopped, command ignored");
        }
    }
}
