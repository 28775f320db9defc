//! # Error Types
//!
//! Typed error handling for the storefront engine.
//! All cart operations return `Result<T, CartError>`.

use thiserror::Error;

/// A failure reported by the payment gateway, classified by kind.
///
/// Each kind carries its own user-facing message via `Display`; none of
/// them are retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The card was declined
    #[error("Payment declined: {message}")]
    CardDeclined { message: String },

    /// Too many requests made to the gateway API too quickly
    #[error("Too many requests to the payment gateway")]
    RateLimited,

    /// Invalid parameters were supplied to the gateway API
    #[error("Invalid request sent to the payment gateway")]
    InvalidRequest,

    /// Authentication with the gateway failed
    #[error("Authentication with the payment gateway failed")]
    AuthenticationFailed,

    /// Network communication with the gateway failed
    #[error("Network error reaching the payment gateway")]
    Network,

    /// Generic gateway-side error
    #[error("Payment gateway error")]
    Gateway,

    /// Something else happened, unrelated to the gateway's error envelope
    #[error("Unidentified payment error")]
    Unclassified,
}

impl GatewayError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::CardDeclined { .. } => 402,
            GatewayError::RateLimited => 429,
            GatewayError::InvalidRequest => 400,
            GatewayError::AuthenticationFailed => 401,
            GatewayError::Network => 503,
            GatewayError::Gateway => 502,
            GatewayError::Unclassified => 500,
        }
    }
}

/// Persistence store failure.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A referenced record is missing from the store
    #[error("Missing record: {0}")]
    MissingRecord(String),

    /// Backend failure (connection, corruption, ...)
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Core error type for all cart operations
#[derive(Debug, Error)]
pub enum CartError {
    /// Referenced catalog item does not exist
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// The user has no open order
    #[error("You do not have an order")]
    OrderNotFound,

    /// The open order has no line items to pay for
    #[error("Order has no items")]
    EmptyOrder,

    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Persistence store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Payment gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CartError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CartError::ItemNotFound { .. } => 404,
            CartError::OrderNotFound => 404,
            CartError::EmptyOrder => 400,
            CartError::Configuration(_) => 500,
            CartError::Store(_) => 500,
            CartError::Gateway(e) => e.status_code(),
        }
    }
}

/// Result type alias for cart operations
pub type CartResult<T> = Result<T, CartError>;
