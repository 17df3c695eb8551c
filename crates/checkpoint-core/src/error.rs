//! Core error types for checkpoint-core.
//!
//! Nothing in the core is fatal: validation errors block a single form
//! action, persistence errors leave in-memory state untouched, and decoding
//! errors on load are swallowed into an empty collection by the callers.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for checkpoint-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A required form field was empty after trimming
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Update referencing an unknown log entry
    #[error("Log entry not found: {id}")]
    NotFound { id: uuid::Uuid },

    /// Durable write failed; nothing was changed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Persisted or imported data could not be decoded
    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The timer service task is no longer running
    #[error("Timer service is not running")]
    TimerUnavailable,
}

/// Log entry form validation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Project name cannot be empty")]
    EmptyProject,

    #[error("Description cannot be empty")]
    EmptyDescription,
}

/// Durable-write failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Save failed: {message}")]
    Save { message: String },

    #[error("Delete failed: {message}")]
    Delete { message: String },
}

/// Corrupt persisted data or malformed import input.
#[derive(Error, Debug)]
#[error("Failed to decode {what}: {source}")]
pub struct DecodingError {
    pub what: String,
    #[source]
    pub source: serde_json::Error,
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
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

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
