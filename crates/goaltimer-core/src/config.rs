//! TOML-based application configuration.
//!
//! Stores:
//! - Countdown tick period and total-duration fallback
//! - Notification switches, minimum lead time and warning lead
//! - Storage write retry policy
//! - Start-up re-prompt behavior
//! - Optional fixed UTC offset overriding the device zone
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::LocalZone;
use crate::deadline::{DeadlineCalculator, DEFAULT_FALLBACK_DURATION_SECS};
use crate::error::ConfigError;
use crate::notify::{DEFAULT_MIN_LEAD_SECS, DEFAULT_WARNING_LEAD_SECS};
use crate::store::{data_dir, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_fallback_duration_secs")]
    pub fallback_duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Deadlines closer than this are not scheduled with the OS.
    #[serde(default = "default_min_lead_secs")]
    pub min_lead_secs: u64,
    /// Seconds before the deadline to send a heads-up. 0 turns it off.
    #[serde(default = "default_warning_lead_secs")]
    pub warning_lead_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Prompt at start-up for expired pending goals never prompted.
    #[serde(default = "default_true")]
    pub reprompt_on_launch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClockConfig {
    /// Minutes east of UTC. Absent means the device zone.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

// Default functions
fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_fallback_duration_secs() -> u64 {
    DEFAULT_FALLBACK_DURATION_SECS
}
fn default_true() -> bool {
    true
}
fn default_min_lead_secs() -> u64 {
    DEFAULT_MIN_LEAD_SECS
}
fn default_warning_lead_secs() -> u64 {
    DEFAULT_WARNING_LEAD_SECS
}
fn default_write_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    50
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            fallback_duration_secs: default_fallback_duration_secs(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_lead_secs: default_min_lead_secs(),
            warning_lead_secs: default_warning_lead_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            write_attempts: default_write_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            reprompt_on_launch: true,
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
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                // "none" or empty clears a number. Required fields then
                // fail to deserialize, so only optional ones accept it.
                let clears = value.is_empty() || value.eq_ignore_ascii_case("none");
                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Null | serde_json::Value::Number(_) if clears => serde_json::Value::Null,
                    serde_json::Value::Null | serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                        serde_json::Value::Number(n.into())
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

    /// Load from the data directory, writing defaults if no file exists.
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

    /// Persist to the data directory.
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

    /// Set a value by dot-separated key, type-checked against the current
    /// value. Does not save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: if value.eq_ignore_ascii_case("none") || value.is_empty() {
                "value is required and cannot be cleared".to_string()
            } else {
                e.to_string()
            },
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timer.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.tick_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if let Some(minutes) = self.clock.utc_offset_minutes {
            if LocalZone::from_offset_minutes(minutes).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: "clock.utc_offset_minutes".into(),
                    message: format!("{minutes} is not a valid UTC offset"),
                });
            }
        }
        Ok(())
    }

    /// Time zone goal deadlines are read in.
    pub fn zone(&self) -> LocalZone {
        self.clock
            .utc_offset_minutes
            .and_then(LocalZone::from_offset_minutes)
            .unwrap_or_default()
    }

    pub fn calculator(&self) -> DeadlineCalculator {
        DeadlineCalculator::new(self.zone(), self.timer.fallback_duration_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.storage.write_attempts,
            backoff: Duration::from_millis(self.storage.backoff_ms),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.timer.tick_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.notifications.min_lead_secs, 5);
        assert_eq!(parsed.clock.utc_offset_minutes, None);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\ntick_interval_ms = 250\n").unwrap();
        assert_eq!(parsed.timer.tick_interval_ms, 250);
        assert_eq!(parsed.timer.fallback_duration_secs, 3600);
        assert!(parsed.prompt.reprompt_on_launch);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("timer.tick_interval_ms").as_deref(), Some("1000"));
        assert_eq!(cfg.get("clock.utc_offset_minutes").as_deref(), Some("null"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("notifications.enabled", "false").unwrap();
        cfg.set("storage.write_attempts", "5").unwrap();
        cfg.set("clock.utc_offset_minutes", "540").unwrap();
        assert!(!cfg.notifications.enabled);
        assert_eq!(cfg.storage.write_attempts, 5);
        assert_eq!(cfg.zone(), LocalZone::from_offset_minutes(540).unwrap());
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.set("timer.nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(cfg.set("notifications.enabled", "maybe").is_err());
        assert!(cfg.set("timer.tick_interval_ms", "0").is_err());
        assert!(cfg.set("clock.utc_offset_minutes", "100000").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn optional_values_can_be_cleared() {
        let mut cfg = Config::default();
        cfg.set("clock.utc_offset_minutes", "540").unwrap();
        assert_eq!(cfg.clock.utc_offset_minutes, Some(540));

        cfg.set("clock.utc_offset_minutes", "none").unwrap();
        assert_eq!(cfg.clock.utc_offset_minutes, None);
        assert_eq!(cfg.zone(), LocalZone::default());

        cfg.set("clock.utc_offset_minutes", "-300").unwrap();
        cfg.set("clock.utc_offset_minutes", "").unwrap();
        assert_eq!(cfg.clock.utc_offset_minutes, None);

    }

    #[test]
    fn warning_lead_defaults_and_turns_off_with_zero() {
        let mut cfg = Config::default();
        assert_eq!(cfg.notifications.warning_lead_secs, 300);
        cfg.set("notifications.warning_lead_secs", "0").unwrap();
        assert_eq!(cfg.notifications.warning_lead_secs, 0);

        let parsed: Config = toml::from_str("[notifications]\nenabled = true\n").unwrap();
        assert_eq!(parsed.notifications.warning_lead_secs, 300);
    }

    #[test]
    fn required_values_cannot_be_cleared() {
        let mut cfg = Config::default();
        let err = cfg.set("timer.tick_interval_ms", "none").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("prompt.reprompt_on_launch", "false").unwrap();
        changed.save_to(&path).unwrap();
        assert!(!Config::load_from(&path).unwrap().prompt.reprompt_on_launch);
    }
}
