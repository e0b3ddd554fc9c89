//! One-shot engine session backed by the on-disk database.

use std::sync::Arc;

use serde::Serialize;
use timebank_core::storage::load_record;
use timebank_core::{
    Collaborators, Config, Database, Economy, EconomySnapshot, Event, EventBus, HostState,
    KeyValueStore, LogNotifier, Persister, SystemClock,
};
use tokio::sync::broadcast;

/// Last host state reported through the CLI.
pub const HOST_STATE_KEY: &str = "cli.host_state";

/// What a one-shot command prints.
#[derive(Debug, Serialize)]
pub struct Report {
    pub events: Vec<Event>,
    pub snapshot: EconomySnapshot,
}

pub struct Session {
    store: Arc<Database>,
    events: broadcast::Receiver<Event>,
    pub economy: Economy,
}

impl Session {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let store = Arc::new(Database::open()?);
        let host = load_host_state(store.as_ref());

        let bus = EventBus::new();
        let events = bus.subscribe();
        let economy = Economy::load(
            config,
            store.as_ref(),
            Persister::inline(store.clone()),
            Collaborators {
                clock: Arc::new(SystemClock),
                notifier: Arc::new(LogNotifier),
                bus,
            },
            host,
        );
        Ok(Self {
            store,
            events,
            economy,
        })
    }

    /// Apply a host transition and remember it for later invocations.
    pub fn set_host_state(&mut self, state: HostState) -> Result<(), Box<dyn std::error::Error>> {
        self.economy.on_host_state(state);
        self.store
            .set(HOST_STATE_KEY, &serde_json::to_string(&state)?)?;
        Ok(())
    }

    /// Flush state and print every event emitted during the session.
    pub fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.economy.shutdown();
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        let report = Report {
            events,
            snapshot: self.economy.snapshot(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

pub fn load_host_state(store: &dyn KeyValueStore) -> HostState {
    load_record::<HostState>(store, HOST_STATE_KEY).unwrap_or_default()
}
