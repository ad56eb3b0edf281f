//! Payment Error Types

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Gateway returned a non-success response
    #[error("Gateway error ({status}): {body}")]
    Gateway { status: u16, body: String },

    /// Charge amount rejected client-side
    #[error("Invalid charge amount: {0}")]
    InvalidAmount(Decimal),

    /// Gateway response missing expected fields
    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// QR rendering failed
    #[error("QR rendering error: {0}")]
    Qr(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Http(_) | PaymentError::Io(_) => true,
            PaymentError::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::InvalidAmount(_) => "The charge amount is invalid.",
            PaymentError::Config(_) => "Payments are not configured. Contact an administrator.",
            _ => "Payment processing failed. Please try again or contact an administrator.",
        }
    }
}
