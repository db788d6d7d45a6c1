//! Core error types for recovery-core.
//!
//! One enum per concern, all built with thiserror and folded into
//! [`CoreError`] for callers that do not care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for recovery-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Notification scheduling errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read key '{key}': {message}")]
    ReadFailed { key: String, message: String },

    #[error("Failed to write key '{key}': {message}")]
    WriteFailed { key: String, message: String },

    /// Stored blob could not be decoded
    #[error("Stored value for '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to access data directory: {0}")]
    DataDir(String),
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
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Anchor dates must not lie ahead of the clock
    #[error("Anchor date {anchor} is later than now ({now})")]
    AnchorInFuture {
        anchor: chrono::DateTime<chrono::Utc>,
        now: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors reported by the platform notification facility.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FacilityError {
    /// The identifier is not (or no longer) scheduled
    #[error("Notification '{0}' not found")]
    NotFound(String),

    #[error("Notification permission not granted")]
    PermissionDenied,

    /// The facility refused this particular request
    #[error("Notification rejected: {0}")]
    Rejected(String),

    /// The facility could not be reached at all
    #[error("Notification facility unavailable: {0}")]
    Unavailable(String),
}

/// Whole-operation scheduler failures.
///
/// Per-entry failures are not errors; they are collected in the
/// [`ScheduleReport`](crate::notifications::ScheduleReport).
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Enumerating currently scheduled notifications failed
    #[error("Failed to list scheduled notifications: {0}")]
    ListFailed(#[source] FacilityError),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
