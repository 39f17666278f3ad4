//! Error types for the blueprint engine

use thiserror::Error;

/// Result type alias using BlueprintError
pub type Result<T> = std::result::Result<T, BlueprintError>;

/// Errors that can occur in the blueprint engine
///
/// Shape mismatches coming from generated content are recovered locally and
/// never show up here. These variants signal contract violations by the
/// calling code.
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// Action name outside the closed operation catalogue
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Blueprint could not be decoded into blocks at all
    #[error("Invalid blueprint: {0}")]
    InvalidBlueprint(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BlueprintError {
    /// Create an invalid blueprint error with a message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidBlueprint(msg.into())
    }
}
