//! Core error types for pomoloop-core.
//!
//! [`CoreError`] is what the binary's commands return. Process-management
//! failures never reach it: they are absorbed where they happen and logged.
//! A failed write of a completed phase is logged by the scheduler too; only
//! the `analytics` command surfaces a [`RecorderError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomoloop-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bad duration string
    #[error("{0}")]
    Duration(#[from] DurationError),

    /// Session log errors
    #[error("Session log error: {0}")]
    Recorder(#[from] RecorderError),

    /// No audio player could be found on this host
    #[error("no audio player found (tried: {tried}); install one or set POMOLOOP_PLAYER")]
    MissingPlayer { tried: String },

    /// `--collection` named a directory that does not exist
    #[error("unknown collection '{name}' (looked in {dir})")]
    UnknownCollection { name: String, dir: PathBuf },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Could not determine or create the data directory
    #[error("Cannot use data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Duration grammar errors (`1h30m`, `90s`, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration '{input}': expected <int>h, <int>m or <int>s components")]
    Invalid { input: String },

    #[error("duration '{input}' is too large")]
    Overflow { input: String },
}

/// Session log errors.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session log {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
