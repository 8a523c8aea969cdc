//! Error types for the lineup monitor
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for lineup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the lineup monitor
#[derive(Error, Debug)]
pub enum Error {
    /// The media server could not be reached or answered with an error
    #[error("Server offline: {0}")]
    ServerOffline(String),

    /// A source returned by the server does not match the expected schema
    #[error("Malformed source: {0}")]
    MalformedSource(String),

    /// Snapshot store errors
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notify(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a server offline error
    pub fn server_offline(msg: impl Into<String>) -> Self {
        Self::ServerOffline(msg.into())
    }

    /// Create a malformed source error
    pub fn malformed_source(msg: impl Into<String>) -> Self {
        Self::MalformedSource(msg.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the server is unreachable
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::ServerOffline(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{:#}", err))
    }
}
