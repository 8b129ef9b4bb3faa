//! Centralized error types for tasklive.

use thiserror::Error;

/// Main error type for tasklive operations.
#[derive(Error, Debug)]
pub enum TaskliveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for tasklive operations.
pub type TaskliveResult<T> = Result<T, TaskliveError>;

impl TaskliveError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
