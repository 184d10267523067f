//! Result and error types for the core library
//!
//! Each pipeline stage has its own error enum so callers can tell a network
//! outage from a bad payload from a broken cache. `Error` wraps all of them
//! for code that only needs to report.

use thiserror::Error;

/// Failure while retrieving or decoding the remote profile document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Profile feed returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode profile feed: {0}")]
    Decode(String),
}

/// Failure inside the local store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage I/O failure: {0}")]
    IoFailure(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl StoreError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::IoFailure(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::ConstraintViolation(msg.into())
    }
}

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        if msg.to_lowercase().contains("constraint") {
            Self::ConstraintViolation(msg)
        } else {
            Self::IoFailure(msg)
        }
    }
}

/// Failure while converting fetched profiles into store entities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Field '{field}' of user {user_id} is out of range: {value}")]
    FieldOverflow {
        user_id: String,
        field: &'static str,
        value: i64,
    },

    #[error("Failed to persist profile batch: {0}")]
    PersistenceFailed(#[from] StoreError),
}

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
