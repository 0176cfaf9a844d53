//! Error types for the tile blob store.

use crate::lock::LockError;
use thiserror::Error;
use tilestash_storage::StorageError;

/// Blob store error type.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] tilestash_core::Error),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    /// The delete was cancelled before it finished; its registry entry is kept.
    #[error("bulk delete of {path} interrupted")]
    Interrupted { path: String },

    #[error("delete pool is shut down")]
    ShutDown,

    /// A task was run twice or in the wrong state.
    #[error("invalid task state: {0}")]
    InvalidTask(String),

    /// The pending-delete registry object could not be decoded.
    #[error("pending-delete registry is corrupt: {0}")]
    Registry(String),
}

/// Result type for blob store operations.
pub type BlobStoreResult<T> = std::result::Result<T, BlobStoreError>;
