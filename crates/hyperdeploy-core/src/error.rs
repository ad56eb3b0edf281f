//! Error Types

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Store read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Input rejected by validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Storage(_) | CoreError::Io(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            CoreError::Validation(_) => "The provided input was rejected.",
            CoreError::NotFound(_) => "The requested record was not found.",
            CoreError::Config(_) => "Service configuration error.",
            _ => "An internal error occurred. Please contact an administrator.",
        }
    }
}
