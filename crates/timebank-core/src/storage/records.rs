//! Persisted record layout.
//!
//! Three JSON documents with camelCase fields live under fixed keys. Missing
//! keys and malformed payloads both read as `None`; the caller applies
//! defaults. Neither is an error from the engine's point of view.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::KeyValueStore;
use crate::error::StorageError;

pub const TIME_KEY: &str = "timebank.time";
pub const DAILY_KEY: &str = "timebank.daily";
pub const HISTORY_KEY: &str = "timebank.history";

/// Every key the engine owns, in erase order.
pub const ALL_KEYS: [&str; 3] = [TIME_KEY, DAILY_KEY, HISTORY_KEY];

/// Persisted form of the time account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecord {
    /// Balance in seconds as of `last_updated`.
    #[serde(default)]
    pub available_time: u64,
    #[serde(default)]
    pub was_tracking: bool,
    /// Epoch ms when the host entered the background.
    #[serde(default)]
    pub background_start_time: Option<u64>,
    /// Epoch ms at which `available_time` was accurate.
    #[serde(default)]
    pub last_updated: u64,
}

/// One finished day in the weekly ring buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyEntry {
    pub date: chrono::NaiveDate,
    pub score: i64,
}

/// Read and decode a record.
pub fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "storage read failed, using defaults");
            return None;
        }
    };
    match decode_record(key, &raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "using defaults");
            None
        }
    }
}

/// Decode a raw payload, naming the key on failure.
pub fn decode_record<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Encode a record for storage; failures are logged and yield `None`.
pub fn encode_record<T: Serialize>(key: &str, value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(key, error = %e, "failed to encode record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn time_record_uses_camel_case() {
        let record = TimeRecord {
            available_time: 90,
            was_tracking: true,
            background_start_time: Some(5),
            last_updated: 7,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["availableTime"], 90);
        assert_eq!(json["wasTracking"], true);
        assert_eq!(json["backgroundStartTime"], 5);
        assert_eq!(json["lastUpdated"], 7);
    }

    #[test]
    fn missing_fields_default() {
        let record: TimeRecord = serde_json::from_str(r#"{"availableTime": 12}"#).unwrap();
        assert_eq!(record.available_time, 12);
        assert!(!record.was_tracking);
        assert_eq!(record.background_start_time, None);
    }

    #[test]
    fn malformed_payload_reads_as_none() {
        let store = MemoryStore::new();
        store.set(TIME_KEY, "{not json").unwrap();
        assert!(load_record::<TimeRecord>(&store, TIME_KEY).is_none());
        assert!(load_record::<TimeRecord>(&store, DAILY_KEY).is_none());
    }

    #[test]
    fn corrupt_payload_names_its_key() {
        let err = decode_record::<TimeRecord>(TIME_KEY, "[1,2").unwrap_err();
        match err {
            StorageError::Corrupt { key, .. } => assert_eq!(key, TIME_KEY),
            other => panic!("unexpected error: {other}"),
        }
    }
}
