//! Storage trait definitions.

use crate::error::{ErrorClass, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use time::OffsetDateTime;

/// A boxed stream of listing pages.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ListingPage>> + Send + 'a>>;

/// A boxed stream of object summaries, flattened from pages.
pub type ObjectStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ObjectSummary>> + Send + 'a>>;

// ===== Listing API Types =====

/// Page size constraints for listing operations.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MIN_PAGE_SIZE: usize = 1;
/// S3 never returns more than 1000 keys per `ListObjectsV2` call.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Maximum number of keys accepted by one `delete_batch` call.
pub const MAX_DELETE_BATCH: usize = 1000;

/// One listed object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    /// Last modification time. `None` when the backend did not report one.
    pub last_modified: Option<OffsetDateTime>,
}

/// A single page of listing results.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
    /// Objects in this page, in key order.
    pub objects: Vec<ObjectSummary>,
}

/// Options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// Number of objects to fetch per page.
    ///
    /// This value will be clamped to [MIN_PAGE_SIZE, MAX_PAGE_SIZE].
    pub page_size: usize,
}

impl ListingOptions {
    /// Create new listing options with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Get the normalized page size.
    pub fn normalized_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<OffsetDateTime>,
    /// Content type (if available).
    pub content_type: Option<String>,
}

/// An object's content together with its metadata.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub data: Bytes,
    pub meta: ObjectMeta,
}

/// A key the backend refused to delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    /// Backend error code, e.g. `SlowDown` or `AccessDenied`.
    pub code: Option<String>,
    pub message: String,
    pub class: ErrorClass,
}

/// Per-key outcome of a batch delete.
///
/// Keys that appear in neither list were not reported on by the backend.
#[derive(Clone, Debug, Default)]
pub struct BatchDeleteOutcome {
    pub deleted: Vec<String>,
    pub failures: Vec<DeleteFailure>,
}

/// Object store abstraction for the tile cache.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's metadata without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's content and metadata.
    async fn get(&self, key: &str) -> StorageResult<StoredObject>;

    /// Put an object, replacing any previous version.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StorageResult<()>;

    /// Delete an object. Returns `NotFound` if it does not exist.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete up to [`MAX_DELETE_BATCH`] keys in one call.
    ///
    /// Per-key failures are reported in the outcome; an `Err` means the whole
    /// call failed and nothing is known about individual keys.
    async fn delete_batch(&self, keys: &[String]) -> StorageResult<BatchDeleteOutcome>;

    /// List objects with a prefix, one page at a time, in key order.
    ///
    /// The stream fetches the next page only when polled, so a listing is never
    /// materialized in full.
    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a>;

    /// Whether at least one object exists under `prefix`.
    async fn prefix_exists(&self, prefix: &str) -> StorageResult<bool> {
        let mut pages = self.list_pages(prefix, ListingOptions::new(1));
        while let Some(page) = pages.next().await {
            if !page?.objects.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Get the name of this storage backend.
    ///
    /// Returns a static string identifier for the backend type (e.g., "s3", "memory").
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Called during server startup to ensure the storage is available before
    /// accepting requests. The default implementation returns Ok(()).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Extension trait providing a flat object stream over `list_pages()`.
///
/// Automatically implemented for every [`ObjectStore`].
pub trait ObjectStoreListStreamExt: ObjectStore {
    /// List objects with a prefix as a flat stream of summaries.
    fn list_objects<'a>(&'a self, prefix: &str, options: Option<ListingOptions>) -> ObjectStream<'a> {
        let options = options.unwrap_or_default();
        let page_stream = self.list_pages(prefix, options);

        let object_stream = page_stream.flat_map(|page_result| match page_result {
            Ok(page) => futures::stream::iter(page.objects.into_iter().map(Ok)).boxed(),
            Err(e) => futures::stream::once(async move { Err(e) }).boxed(),
        });

        Box::pin(object_stream)
    }
}

// Blanket implementation for all ObjectStore types
impl<T: ObjectStore + ?Sized> ObjectStoreListStreamExt for T {}
