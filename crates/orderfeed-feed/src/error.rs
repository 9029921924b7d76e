//! Feed error types.

use orderfeed_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] CoreError),

    #[error("Feed not initialized")]
    NotReady,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
