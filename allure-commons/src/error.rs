//! Error types for lifecycle, context, and writer operations.

use thiserror::Error;

/// Result type alias used across the crate.
pub type AllureResult<T> = Result<T, AllureError>;

/// Errors produced by lifecycle operations and result sinks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AllureError {
    /// I/O error while writing result files or attachments.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error with a descriptive message.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A lifecycle operation was invoked while the execution context was in
    /// a state that forbids it. This is always a bug in the calling adapter:
    /// operations were issued out of order. Never retried.
    #[error("Invalid context state: {0}")]
    StateConflict(String),

    /// A required argument was empty or otherwise unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AllureError {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        AllureError::Configuration(message.into())
    }

    /// Creates a new state-conflict error.
    pub fn state_conflict(message: impl Into<String>) -> Self {
        AllureError::StateConflict(message.into())
    }

    /// Creates a new invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        AllureError::InvalidArgument(message.into())
    }
}
