//! Storage error type.

use custload_core::BatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot open store: {0}")]
    Connect(String),

    #[error("schema setup failed: {0}")]
    Schema(String),

    #[error("query failed: {0}")]
    Query(String),
}

impl From<StorageError> for BatchError {
    fn from(e: StorageError) -> Self {
        BatchError::Resource(e.to_string())
    }
}
