//! Error types for the shared object engine

use thiserror::Error;

/// Persistence store failures
///
/// These never abort synchronization; callers log them and carry on.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted form could not be encoded or decoded
    #[error("store encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// The object name cannot be mapped onto the store
    #[error("invalid object name: {0}")]
    InvalidName(String),
}

/// Failures of a service handler invoked through `send_message`
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler has no method of that name
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The arguments did not fit the method
    #[error("invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },

    /// The method ran and failed
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Result type using StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type using HandlerError
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;
