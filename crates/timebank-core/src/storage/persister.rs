//! Fire-and-forget persistence.
//!
//! Writes never block a handler and never report failure to it. Storage is a
//! cache of in-memory state: the last write wins and a dropped write is
//! repaired by timestamp reconciliation on the next load.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::records::encode_record;
use super::KeyValueStore;

#[derive(Debug)]
enum WriteOp {
    Set { key: String, value: String },
    Remove { keys: Vec<String> },
}

#[derive(Clone)]
enum Sink {
    /// Apply on the caller's thread (CLI, tests).
    Inline(Arc<dyn KeyValueStore>),
    /// Queue for a background writer task (service mode).
    Queued(mpsc::UnboundedSender<WriteOp>),
}

/// Handle used by the engine to persist records.
#[derive(Clone)]
pub struct Persister {
    sink: Sink,
}

impl Persister {
    pub fn inline(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            sink: Sink::Inline(store),
        }
    }

    /// Start a writer task. It exits once every `Persister` clone is dropped
    /// and the queue has drained.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        let handle = tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                let store = store.clone();
                match tokio::task::spawn_blocking(move || apply(store.as_ref(), op)).await {
                    Ok(()) => {}
                    Err(e) => warn!(error = %e, "storage writer task failed"),
                }
            }
            debug!("storage writer drained");
        });
        (
            Self {
                sink: Sink::Queued(tx),
            },
            handle,
        )
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        let Some(json) = encode_record(key, value) else {
            return;
        };
        self.submit(WriteOp::Set {
            key: key.to_string(),
            value: json,
        });
    }

    pub fn remove_many(&self, keys: &[&str]) {
        self.submit(WriteOp::Remove {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        });
    }

    fn submit(&self, op: WriteOp) {
        match &self.sink {
            Sink::Inline(store) => apply(store.as_ref(), op),
            Sink::Queued(tx) => {
                if tx.send(op).is_err() {
                    warn!("storage writer gone, write dropped");
                }
            }
        }
    }
}

fn apply(store: &dyn KeyValueStore, op: WriteOp) {
    let result = match &op {
        WriteOp::Set { key, value } => store.set(key, value),
        WriteOp::Remove { keys } => {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            store.remove_many(&refs)
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "storage write failed, dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn inline_writes_land_immediately() {
        let store = Arc::new(MemoryStore::new());
        let persister = Persister::inline(store.clone());
        persister.write("k", &42u32);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("42"));
        persister.remove_many(&["k"]);
        assert!(store.get("k").unwrap().is_none());
    }

    #[tokio::test]
    async fn queued_writes_apply_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (persister, writer) = Persister::spawn(store.clone());
        persister.write("k", &1u32);
        persister.write("k", &2u32);
        drop(persister);
        writer.await.unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
    }
}
