//! Core error types for goaltimer-core.
//!
//! Most failures inside the countdown and notification pipeline are
//! absorbed where they happen (zero remaining time, skipped schedule,
//! no-op). The variants here are what is left for callers to see.

use std::path::PathBuf;
use thiserror::Error;

use crate::goal::GoalId;

/// Core error type for goaltimer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Notification backend errors
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

/// Goal record store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored value could not be decoded
    #[error("Corrupt value under '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The stored collection could not be read at load time, so writing
    /// it back would destroy it
    #[error("Goal collection was not loaded; refusing to overwrite it")]
    NotLoaded,

    /// Write rejected (used by test doubles and exhausted retries)
    #[error("Write failed: {0}")]
    WriteFailed(String),
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors. These are the only failures surfaced to the user
/// as messages.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field missing or blank
    #[error("'{0}' is required")]
    MissingField(&'static str),

    /// Malformed calendar date
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Malformed time of day
    #[error("Invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    /// No goal with this id
    #[error("Goal not found: {0}")]
    GoalNotFound(GoalId),

    /// Constraint outcome recorded on a goal that cannot carry one
    #[error("Goal {id} cannot record a constraint outcome: {reason}")]
    ConstraintNotApplicable { id: GoalId, reason: &'static str },

    /// Prompt token no longer matches the goal it was issued for
    #[error("Prompt for goal {0} is stale")]
    StalePrompt(GoalId),
}

/// Notification backend errors.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// User or OS denied notification permission
    #[error("Notification permission denied")]
    PermissionDenied,

    /// Backend call failed
    #[error("Notification backend failed: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StorageError::Locked
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for NotificationError {
    fn from(err: rusqlite::Error) -> Self {
        NotificationError::Backend(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
