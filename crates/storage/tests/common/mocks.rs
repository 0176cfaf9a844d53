use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tilestash_storage::error::{StorageError, StorageResult};
use tilestash_storage::traits::{
    BatchDeleteOutcome, ListingOptions, ListingPage, ObjectMeta, ObjectStore, ObjectSummary,
    PageStream, StoredObject,
};
use tokio::time::Duration;

/// Instrumented backend that generates synthetic tile listings and counts
/// the number of pages fetched. Useful for testing cancellation and
/// backpressure behavior without allocating the listing.
#[allow(dead_code)]
pub struct InstrumentedBackend {
    pub total_keys: usize,
    pub pages_fetched: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl InstrumentedBackend {
    pub fn new(total_keys: usize) -> (Arc<Self>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(Self {
            total_keys,
            pages_fetched: counter.clone(),
        });
        (backend, counter)
    }

    /// Deterministic key at the given index: one zoom level, 256 tiles per column.
    pub fn generate_key(i: usize) -> String {
        format!("layer/EPSG:4326/png/default/12/{}/{}.png", i / 256, i % 256)
    }
}

#[async_trait]
impl ObjectStore for InstrumentedBackend {
    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, _key: &str, _data: Bytes, _content_type: Option<&str>) -> StorageResult<()> {
        Err(StorageError::InvalidKey(
            "instrumented backend is read-only".to_string(),
        ))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::InvalidKey(
            "instrumented backend is read-only".to_string(),
        ))
    }

    async fn delete_batch(&self, _keys: &[String]) -> StorageResult<BatchDeleteOutcome> {
        Err(StorageError::InvalidKey(
            "instrumented backend is read-only".to_string(),
        ))
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        let page_size = options.normalized_page_size();
        let prefix = prefix.to_string();
        let pages_counter = self.pages_fetched.clone();
        let total_keys = self.total_keys;

        Box::pin(async_stream::stream! {
            let mut index = 0;
            while index < total_keys {
                // Increment counter BEFORE yielding page (important for cancellation tests)
                pages_counter.fetch_add(1, Ordering::SeqCst);

                let end = (index + page_size).min(total_keys);
                let objects: Vec<ObjectSummary> = (index..end)
                    .map(Self::generate_key)
                    .filter(|key| key.starts_with(&prefix))
                    .map(|key| ObjectSummary {
                        key,
                        size: 1,
                        last_modified: None,
                    })
                    .collect();

                yield Ok::<_, StorageError>(ListingPage { objects });

                index = end;

                // Small delay to ensure async scheduling works properly
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    }
}
