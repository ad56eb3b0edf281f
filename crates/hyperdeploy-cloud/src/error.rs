//! Cloud Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CloudError>;

/// Hosting-provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// Provider returned a non-success response
    #[error("Provider error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Provider unreachable or client not configured
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Input rejected before reaching the provider
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local registry failure
    #[error("Registry error: {0}")]
    Registry(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hyperdeploy_core::CoreError> for CloudError {
    fn from(err: hyperdeploy_core::CoreError) -> Self {
        CloudError::Registry(err.to_string())
    }
}

impl CloudError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            CloudError::Http(_) | CloudError::Io(_) | CloudError::Unavailable(_) => true,
            CloudError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            CloudError::Validation(_) => "The provided input was rejected.",
            CloudError::Unavailable(_) => {
                "The hosting provider is unavailable. Please try again later."
            }
            _ => "The hosting operation failed. Contact an administrator.",
        }
    }
}
