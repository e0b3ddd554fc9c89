//! # Timebank Core Library
//!
//! This library provides the time-economy engine behind Timebank: a screen-time
//! balance earned by answering quiz questions and spent while the host app is
//! in the background. It follows a CLI-first philosophy where every operation
//! is available through the standalone CLI binary, with any GUI being a thin
//! layer over the same core library.
//!
//! ## Architecture
//!
//! - **Time Account**: A wall-clock-based state machine that debits the balance
//!   while the host is backgrounded
//! - **Score Ledger**: Answer scoring, streaks, overtime penalties and the daily
//!   rollover into history
//! - **Economy**: The context object wiring both to storage, reminders and the
//!   event bus, plus an async service loop that drives it
//! - **Storage**: SQLite key-value persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Economy`]: Synchronous engine with one handler per input
//! - [`EconomyService`]: Event loop multiplexing lifecycle, commands and timers
//! - [`EventBus`]: Typed broadcast of [`Event`]s to UI consumers
//! - [`Config`]: Application configuration management

pub mod account;
pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod ledger;
pub mod lifecycle;
pub mod notify;
pub mod storage;

pub use account::{AccountState, TimeAccount};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Collaborators, Economy, EconomyHandle, EconomyService, EconomySnapshot};
pub use error::{ConfigError, CoreError, StorageError};
pub use events::{Event, EventBus, MessageLevel, Subscription};
pub use format::format_time;
pub use ledger::{answer_points, Answer, RolloverSummary, ScoreInfo, ScoreLedger};
pub use lifecycle::{ChannelLifecycle, HostState, LifecycleSource};
pub use notify::{LogNotifier, NotificationScheduler, RecordingNotifier};
pub use storage::{Config, Database, KeyValueStore, MemoryStore, Persister};
