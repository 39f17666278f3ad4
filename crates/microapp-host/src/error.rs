//! Error types for the micro-app host

use blueprint_engine::BlueprintError;
use thiserror::Error;

/// Result type alias using HostError
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors that can occur in the host layer
#[derive(Debug, Error)]
pub enum HostError {
    /// Contract violation reported by the engine (unknown operation, ...)
    #[error("Engine error: {0}")]
    Engine(#[from] BlueprintError),

    /// No app with the given id
    #[error("App not found: {0}")]
    AppNotFound(String),

    /// Generated response could not be used; the message is user-presentable
    #[error("{0}")]
    MalformedResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot compression error
    #[error("Compression error: {0}")]
    Compression(String),
}

impl HostError {
    /// Create a malformed response error with a message
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
