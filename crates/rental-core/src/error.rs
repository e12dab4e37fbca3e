//! # Rental Error Types
//!
//! Typed error handling for the storefront cart and checkout engine.
//! All fallible operations return `Result<T, RentalError>`.

use thiserror::Error;

/// Core error type for cart, checkout and backend operations
#[derive(Debug, Error)]
pub enum RentalError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A checkout step was not completed (missing dates, etc.)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Checkout started or submitted with an empty cart
    #[error("Cart is empty")]
    EmptyCart,

    /// Checkout requires a logged-in customer
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Step two reached without a selected card
    #[error("No payment method selected")]
    NoPaymentMethod,

    /// Operation not valid in the current checkout step
    #[error("Invalid checkout step: expected {expected}, found {actual}")]
    InvalidStep {
        expected: &'static str,
        actual: &'static str,
    },

    /// Catalog item not found on the backend
    #[error("Item not found: {key}")]
    ItemNotFound { key: String },

    /// The backend answered with a non-success status
    #[error("Backend error [{status}]: {message}")]
    Backend { status: u16, message: String },

    /// Network/HTTP error communicating with the backend
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Order was created but the deposit payment could not be registered
    #[error("Order {solicitud_id} created but payment not registered: {message}")]
    PaymentPending { solicitud_id: i64, message: String },

    /// Client storage read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RentalError {
    /// Returns true if repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RentalError::NetworkError(_) | RentalError::PaymentPending { .. } => true,
            RentalError::Backend { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            RentalError::Configuration(_) => 500,
            RentalError::InvalidRequest(_) => 400,
            RentalError::Validation(_) => 422,
            RentalError::EmptyCart => 409,
            RentalError::NotAuthenticated => 401,
            RentalError::NoPaymentMethod => 422,
            RentalError::InvalidStep { .. } => 409,
            RentalError::ItemNotFound { .. } => 404,
            RentalError::Backend { status, .. } => match *status {
                400..=499 => *status,
                _ => 502,
            },
            RentalError::NetworkError(_) => 503,
            RentalError::PaymentPending { .. } => 502,
            RentalError::Storage(_) => 500,
            RentalError::Serialization(_) => 500,
            RentalError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for RentalError {
    fn from(err: serde_json::Error) -> Self {
        RentalError::Serialization(err.to_string())
    }
}

/// Result type alias for rental operations
pub type RentalResult<T> = Result<T, RentalError>;
