//! Error types for orderfeed-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid order id: {0:?}")]
    InvalidOrderId(String),

    #[error("Invalid quantity for order {id}: {quantity}")]
    InvalidQuantity { id: String, quantity: u32 },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
