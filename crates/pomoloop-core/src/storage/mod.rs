mod analytics;
mod config;

pub use analytics::{AnalyticsLog, AnalyticsSummary, PeriodTotals, SessionEntry};
pub use config::{AnalyticsConfig, AudioConfig, Config, PlaybackConfig, TimerConfig};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory without touching the filesystem.
///
/// `POMOLOOP_HOME` wins when set. Otherwise `~/.config/pomoloop[-dev]/`,
/// with the `-dev` suffix selected by `POMOLOOP_ENV=dev`.
pub fn data_dir_path() -> PathBuf {
    if let Ok(home) = std::env::var("POMOLOOP_HOME") {
        let home = home.trim();
        if !home.is_empty() {
            return PathBuf::from(home);
        }
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("POMOLOOP_ENV").unwrap_or_else(|_| "production".to_string());

    if env == "dev" {
        base_dir.join("pomoloop-dev")
    } else {
        base_dir.join("pomoloop")
    }
}

/// Returns the data directory, creating it if needed.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = data_dir_path();
    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
