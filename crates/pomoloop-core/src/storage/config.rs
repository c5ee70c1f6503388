//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default work and break durations
//! - Track directories, named collections and the chime file
//! - Player override and silent/shuffle defaults
//! - Teardown grace period
//! - Session log location
//!
//! Configuration is stored at `~/.config/pomoloop/config.toml`. A handful of
//! environment variables override the file (see [`Config::apply_env`]).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{data_dir, data_dir_path};
use crate::error::ConfigError;

/// Timer defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work")]
    pub work: String,
    #[serde(rename = "break", default = "default_break")]
    pub break_: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Audio sources and player selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_break_dir")]
    pub break_dir: PathBuf,
    /// Each subdirectory is a collection holding `work/` and `break/`.
    #[serde(default = "default_collections_dir")]
    pub collections_dir: PathBuf,
    /// Transition chime. A missing file just means no chime.
    #[serde(default = "default_chime")]
    pub chime: PathBuf,
    /// Player program; empty means auto-detect.
    #[serde(default)]
    pub player: String,
    #[serde(default)]
    pub player_args: Vec<String>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub shuffle: bool,
}

/// Teardown tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_grace_attempts")]
    pub grace_attempts: u32,
    #[serde(default = "default_grace_interval_ms")]
    pub grace_interval_ms: u64,
}

/// Session log location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_analytics_log")]
    pub log: PathBuf,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomoloop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

// Default functions
fn default_work() -> String {
    "25m".into()
}
fn default_break() -> String {
    "5m".into()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_work_dir() -> PathBuf {
    data_dir_path().join("music").join("work")
}
fn default_break_dir() -> PathBuf {
    data_dir_path().join("music").join("break")
}
fn default_collections_dir() -> PathBuf {
    data_dir_path().join("collections")
}
fn default_chime() -> PathBuf {
    data_dir_path().join("chime.mp3")
}
fn default_grace_attempts() -> u32 {
    5
}
fn default_grace_interval_ms() -> u64 {
    100
}
fn default_analytics_log() -> PathBuf {
    data_dir_path().join("analytics.json")
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work: default_work(),
            break_: default_break(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            break_dir: default_break_dir(),
            collections_dir: default_collections_dir(),
            chime: default_chime(),
            player: String::new(),
            player_args: Vec::new(),
            silent: false,
            shuffle: false,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            grace_attempts: default_grace_attempts(),
            grace_interval_ms: default_grace_interval_ms(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            log: default_analytics_log(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            audio: AudioConfig::default(),
            playback: PlaybackConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
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
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
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

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Recognised names: `POMOLOOP_WORK_DIR`, `POMOLOOP_BREAK_DIR`,
    /// `POMOLOOP_CHIME`, `POMOLOOP_ANALYTICS`, `POMOLOOP_SILENT`,
    /// `POMOLOOP_PLAYER`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("POMOLOOP_WORK_DIR") {
            self.audio.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("POMOLOOP_BREAK_DIR") {
            self.audio.break_dir = PathBuf::from(dir);
        }
        if let Some(chime) = get("POMOLOOP_CHIME") {
            self.audio.chime = PathBuf::from(chime);
        }
        if let Some(log) = get("POMOLOOP_ANALYTICS") {
            self.analytics.log = PathBuf::from(log);
        }
        if let Some(silent) = get("POMOLOOP_SILENT") {
            self.audio.silent = is_truthy(&silent);
        }
        if let Some(player) = get("POMOLOOP_PLAYER") {
            self.audio.player = player;
        }
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

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.update(key, value)?;
        self.save()
    }

    fn update(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |e: serde_json::Error| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        };
        let mut json = serde_json::to_value(&*self).map_err(invalid)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(invalid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.work, "25m");
        assert_eq!(parsed.timer.break_, "5m");
        assert_eq!(parsed.playback.grace_attempts, 5);
    }

    #[test]
    fn break_key_is_spelled_break_in_toml() {
        let parsed: Config = toml::from_str("[timer]\nbreak = \"10m\"\n").unwrap();
        assert_eq!(parsed.timer.break_, "10m");
        assert_eq!(parsed.timer.work, "25m");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("audio.silent").as_deref(), Some("false"));
        assert_eq!(cfg.get("timer.work").as_deref(), Some("25m"));
        assert_eq!(cfg.get("playback.grace_interval_ms").as_deref(), Some("100"));
        assert!(cfg.get("audio.missing_key").is_none());
    }

    #[test]
    fn update_changes_nested_values() {
        let mut cfg = Config::default();
        cfg.update("audio.shuffle", "true").unwrap();
        cfg.update("playback.grace_attempts", "8").unwrap();
        cfg.update("audio.work_dir", "/srv/music/focus").unwrap();
        cfg.update("audio.player_args", "[\"--volume=50\"]").unwrap();
        assert!(cfg.audio.shuffle);
        assert_eq!(cfg.playback.grace_attempts, 8);
        assert_eq!(cfg.audio.work_dir, PathBuf::from("/srv/music/focus"));
        assert_eq!(cfg.audio.player_args, vec!["--volume=50".to_string()]);
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "audio.nonexistent", "value");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_json_value_by_path_rejects_invalid_type() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "audio.silent", "not_a_bool");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("POMOLOOP_WORK_DIR", "/tmp/work"),
            ("POMOLOOP_BREAK_DIR", "/tmp/break"),
            ("POMOLOOP_CHIME", "/tmp/ding.ogg"),
            ("POMOLOOP_ANALYTICS", "/tmp/log.json"),
            ("POMOLOOP_SILENT", "yes"),
            ("POMOLOOP_PLAYER", "mpg123"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(cfg.audio.work_dir, PathBuf::from("/tmp/work"));
        assert_eq!(cfg.audio.break_dir, PathBuf::from("/tmp/break"));
        assert_eq!(cfg.audio.chime, PathBuf::from("/tmp/ding.ogg"));
        assert_eq!(cfg.analytics.log, PathBuf::from("/tmp/log.json"));
        assert!(cfg.audio.silent);
        assert_eq!(cfg.audio.player, "mpg123");
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let mut cfg = Config::default();
        let before = cfg.audio.work_dir.clone();
        cfg.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(cfg.audio.work_dir, before);
        assert!(!cfg.audio.silent);
    }

    #[test]
    fn silent_override_accepts_common_spellings() {
        for (value, expected) in [("1", true), ("on", true), ("TRUE", true), ("0", false), ("no", false)] {
            let mut cfg = Config::default();
            cfg.apply_overrides(|name| (name == "POMOLOOP_SILENT").then(|| value.to_string()));
            assert_eq!(cfg.audio.silent, expected, "value {value}");
        }
    }
}
