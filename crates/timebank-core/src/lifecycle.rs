//! Host application lifecycle signals.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Foreground state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    #[default]
    Active,
    /// Transitional (e.g. app switcher open). Neither starts nor stops tracking.
    Inactive,
    Background,
}

impl HostState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" | "foreground" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "background" => Some(Self::Background),
            _ => None,
        }
    }
}

/// Capability that reports lifecycle transitions.
///
/// Subscribing hands out a receiver; dropping it is the unsubscribe.
pub trait LifecycleSource: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<HostState>;
}

/// In-process lifecycle source driven by whoever owns it.
#[derive(Debug, Clone)]
pub struct ChannelLifecycle {
    tx: watch::Sender<HostState>,
}

impl ChannelLifecycle {
    pub fn new(initial: HostState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Report a transition. Repeating the current state is not re-sent.
    pub fn set(&self, state: HostState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

impl Default for ChannelLifecycle {
    fn default() -> Self {
        Self::new(HostState::Active)
    }
}

impl LifecycleSource for ChannelLifecycle {
    fn subscribe(&self) -> watch::Receiver<HostState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(HostState::parse("Background"), Some(HostState::Background));
        assert_eq!(HostState::parse(" foreground "), Some(HostState::Active));
        assert_eq!(HostState::parse("inactive"), Some(HostState::Inactive));
        assert_eq!(HostState::parse("sleeping"), None);
    }

    #[test]
    fn repeated_state_does_not_notify() {
        let source = ChannelLifecycle::default();
        let mut rx = source.subscribe();
        source.set(HostState::Active);
        assert!(!rx.has_changed().unwrap());
        source.set(HostState::Background);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), HostState::Background);
    }
}
