//! Persistence error types.

use orderfeed_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid record at index {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: CoreError,
    },

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
