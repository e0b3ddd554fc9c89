//! TOML-based application configuration.
//!
//! Stores tunables for:
//! - Engine timers (tick, persist, penalty and rollover intervals)
//! - Scoring rules (base points, bonuses, penalties, rollover conversion)
//! - Reminder notifications
//!
//! Configuration is stored at `~/.config/timebank/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Timer and balance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    #[serde(default = "default_persist_interval")]
    pub persist_interval_secs: u64,
    #[serde(default = "default_penalty_check_interval")]
    pub penalty_check_interval_secs: u64,
    #[serde(default = "default_rollover_check_interval")]
    pub rollover_check_interval_secs: u64,
    /// Balance granted on a fresh install.
    #[serde(default)]
    pub initial_balance_secs: u64,
    /// Bonus suggested alongside a streak milestone.
    #[serde(default = "default_milestone_bonus")]
    pub milestone_bonus_secs: u64,
}

/// Scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_base_points")]
    pub base_points: u32,
    #[serde(default = "default_time_bonus_window")]
    pub time_bonus_window_secs: u32,
    #[serde(default = "default_half")]
    pub time_bonus_factor: f64,
    #[serde(default = "default_half")]
    pub streak_bonus_factor: f64,
    #[serde(default = "default_milestone_every")]
    pub milestone_every: u32,
    #[serde(default = "default_50")]
    pub penalty_points_per_minute: u32,
    #[serde(default = "default_50")]
    pub penalty_warning_step: u32,
    #[serde(default = "default_rollover_points_per_minute")]
    pub rollover_points_per_minute: u32,
    #[serde(default = "default_rollover_cap_minutes")]
    pub rollover_cap_minutes: u64,
    #[serde(default = "default_score_floor")]
    pub score_floor: i64,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_low_balance_warning")]
    pub low_balance_warning_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/timebank/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_tick_interval() -> u64 {
    1
}
fn default_persist_interval() -> u64 {
    30
}
fn default_penalty_check_interval() -> u64 {
    10
}
fn default_rollover_check_interval() -> u64 {
    60
}
fn default_milestone_bonus() -> u64 {
    300
}
fn default_base_points() -> u32 {
    100
}
fn default_time_bonus_window() -> u32 {
    20
}
fn default_half() -> f64 {
    0.5
}
fn default_milestone_every() -> u32 {
    5
}
fn default_50() -> u32 {
    50
}
fn default_rollover_points_per_minute() -> u32 {
    10
}
fn default_rollover_cap_minutes() -> u64 {
    120
}
fn default_score_floor() -> i64 {
    -9999
}
fn default_true() -> bool {
    true
}
fn default_low_balance_warning() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            persist_interval_secs: default_persist_interval(),
            penalty_check_interval_secs: default_penalty_check_interval(),
            rollover_check_interval_secs: default_rollover_check_interval(),
            initial_balance_secs: 0,
            milestone_bonus_secs: default_milestone_bonus(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: default_base_points(),
            time_bonus_window_secs: default_time_bonus_window(),
            time_bonus_factor: default_half(),
            streak_bonus_factor: default_half(),
            milestone_every: default_milestone_every(),
            penalty_points_per_minute: 50,
            penalty_warning_step: 50,
            rollover_points_per_minute: default_rollover_points_per_minute(),
            rollover_cap_minutes: default_rollover_cap_minutes(),
            score_floor: default_score_floor(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            low_balance_warning_secs: default_low_balance_warning(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update a value in memory by dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value has the wrong type.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    /// Update a value and save to the default location.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }
}
