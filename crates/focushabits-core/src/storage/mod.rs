mod config;
pub mod database;
mod habit_db;
pub mod migrations;
mod task_db;

pub use config::{Config, LiveStatusConfig, PomodoroConfig, TimerConfig};
pub use database::{Database, DayStats, SessionStats, MAX_HISTORY_DAYS};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding the database, config and live status file.
///
/// `FOCUSHABITS_HOME` wins when set. Otherwise `~/.config/focushabits`, or
/// `~/.config/focushabits-dev` with `FOCUSHABITS_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSHABITS_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FOCUSHABITS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focushabits-dev")
            } else {
                base_dir.join("focushabits")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
