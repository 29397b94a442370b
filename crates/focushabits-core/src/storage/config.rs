//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Timer tick rate and Pomodoro bounds
//! - Pomodoro defaults (title, color)
//! - Live status broadcasting
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::live::{LiveStatusBroadcaster, StatusFileSink};
use crate::timer::CoordinatorConfig;

/// Timer coordinator tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_pomodoro_min")]
    pub default_pomodoro_min: u64,
    #[serde(default = "default_max_pomodoro_min")]
    pub max_pomodoro_min: u64,
    #[serde(default = "default_extend_step_secs")]
    pub extend_step_secs: u64,
    /// Manually stopped Pomodoros at or below this are not recorded.
    #[serde(default = "default_min_recorded_interruption_secs")]
    pub min_recorded_interruption_secs: u64,
}

/// Pomodoro presentation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroConfig {
    #[serde(default = "default_pomodoro_title")]
    pub default_title: String,
    #[serde(default = "default_pomodoro_color")]
    pub color: String,
}

/// Live status configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveStatusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_update_interval_ms")]
    pub min_update_interval_ms: u64,
    /// Snapshot file path. Defaults to `<data dir>/live_status.json`.
    #[serde(default)]
    pub status_file: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub pomodoro: PomodoroConfig,
    #[serde(default)]
    pub live_status: LiveStatusConfig,
}

// Default functions
fn default_tick_interval_ms() -> u64 {
    100
}
fn default_pomodoro_min() -> u64 {
    30
}
fn default_max_pomodoro_min() -> u64 {
    60
}
fn default_extend_step_secs() -> u64 {
    60
}
fn default_min_recorded_interruption_secs() -> u64 {
    60
}
fn default_pomodoro_title() -> String {
    "Focus".into()
}
fn default_pomodoro_color() -> String {
    crate::timer::POMODORO_COLOR.into()
}
fn default_true() -> bool {
    true
}
fn default_min_update_interval_ms() -> u64 {
    1000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            default_pomodoro_min: default_pomodoro_min(),
            max_pomodoro_min: default_max_pomodoro_min(),
            extend_step_secs: default_extend_step_secs(),
            min_recorded_interruption_secs: default_min_recorded_interruption_secs(),
        }
    }
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self {
            default_title: default_pomodoro_title(),
            color: default_pomodoro_color(),
        }
    }
}

impl Default for LiveStatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_update_interval_ms: 1000,
            status_file: None,
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
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => match value.parse::<u64>() {
                    Ok(n) => serde_json::Value::Number(n.into()),
                    Err(_) => {
                        return Err(invalid(format!(
                            "cannot parse '{value}' as a non-negative integer"
                        )))
                    }
                },
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("not a leaf key".into()))
                }
                // Strings and unset optionals.
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn collect_leaves(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    Self::collect_leaves(&key, v, out);
                }
            }
            serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
            other => out.push((prefix.to_string(), other.to_string())),
        }
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults when the file does not exist.
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
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a value in memory by dot-separated key, keeping the field's type.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// or validate.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// All leaf keys with their values, sorted by key.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            Self::collect_leaves("", &json, &mut out);
        }
        out.sort();
        out
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };
        if self.timer.tick_interval_ms == 0 {
            return invalid("timer.tick_interval_ms", "must be greater than 0");
        }
        if self.timer.max_pomodoro_min == 0 {
            return invalid("timer.max_pomodoro_min", "must be greater than 0");
        }
        if self.timer.default_pomodoro_min > self.timer.max_pomodoro_min {
            return invalid(
                "timer.default_pomodoro_min",
                "must not exceed timer.max_pomodoro_min",
            );
        }
        Ok(())
    }

    pub fn default_pomodoro_secs(&self) -> f64 {
        self.timer.default_pomodoro_min as f64 * 60.0
    }

    pub fn min_recorded_interruption_secs(&self) -> f64 {
        self.timer.min_recorded_interruption_secs as f64
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            tick_interval: Duration::from_millis(self.timer.tick_interval_ms),
            max_pomodoro_secs: self.timer.max_pomodoro_min as f64 * 60.0,
            extend_step_secs: self.timer.extend_step_secs as f64,
            pomodoro_color: self.pomodoro.color.clone(),
        }
    }

    /// Where live snapshots are written.
    pub fn status_file_path(&self) -> Result<PathBuf, ConfigError> {
        match self.live_status.status_file.as_deref() {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(data_dir()?.join("live_status.json")),
        }
    }

    /// Broadcaster for the configured live status surface.
    pub fn live_status_broadcaster(&self) -> Result<LiveStatusBroadcaster, ConfigError> {
        if !self.live_status.enabled {
            return Ok(LiveStatusBroadcaster::disabled());
        }
        let sink = StatusFileSink::new(self.status_file_path()?);
        Ok(LiveStatusBroadcaster::new(Box::new(sink)).with_min_update_interval(
            Duration::from_millis(self.live_status.min_update_interval_ms),
        ))
    }
}
