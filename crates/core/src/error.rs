//! Error types for the Warden core crate.

use thiserror::Error;

/// Top-level error type for all Warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed input at row {row}: {reason}")]
    MalformedInput { row: usize, reason: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("remote call error: {0}")]
    RemoteCall(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience Result alias that defaults to [`WardenError`].
pub type Result<T> = std::result::Result<T, WardenError>;
