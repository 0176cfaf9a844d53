//! Object storage abstraction and backends for tilestash.
//!
//! This crate provides:
//! - The `ObjectStore` trait: single-object reads and writes, paged listings
//!   and batched deletes with per-key outcomes
//! - Error classification into recoverable and non-recoverable failures
//! - Backends: S3-compatible and in-memory

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{memory::MemoryBackend, s3::S3Backend};
pub use error::{ErrorClass, StorageError, StorageResult};
pub use traits::{
    BatchDeleteOutcome, DeleteFailure, ListingOptions, ListingPage, ObjectMeta, ObjectStore,
    ObjectStoreListStreamExt, ObjectStream, ObjectSummary, PageStream, StoredObject,
};

use std::sync::Arc;
use tilestash_core::config::StorageConfig;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Memory { .. } => Ok(Arc::new(MemoryBackend::new())),
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
    }
}
