//! In-process storage backend.
//!
//! Objects live in a sorted map, so listings come back in key order like S3.
//! Last-modified times are truncated to whole seconds, matching the precision
//! S3 reports.

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    BatchDeleteOutcome, ListingOptions, ListingPage, MAX_DELETE_BATCH, ObjectMeta, ObjectStore,
    ObjectSummary, PageStream, StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::instrument;

#[derive(Clone, Debug)]
struct Entry {
    data: Bytes,
    content_type: Option<String>,
    last_modified: OffsetDateTime,
}

impl Entry {
    fn meta(&self) -> ObjectMeta {
        ObjectMeta {
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
            content_type: self.content_type.clone(),
        }
    }
}

fn now_truncated() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond()))
}

/// Object store kept in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object with an explicit last-modified time.
    pub async fn put_with_last_modified(
        &self,
        key: &str,
        data: Bytes,
        last_modified: OffsetDateTime,
    ) {
        self.objects.write().await.insert(
            key.to_string(),
            Entry {
                data,
                content_type: None,
                last_modified,
            },
        );
    }

    /// All keys currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.objects
            .read()
            .await
            .get(key)
            .map(Entry::meta)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|entry| StoredObject {
                data: entry.data.clone(),
                meta: entry.meta(),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    #[instrument(skip(self, data), fields(backend = "memory", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        self.objects.write().await.insert(
            key.to_string(),
            Entry {
                data,
                content_type: content_type.map(str::to_string),
                last_modified: now_truncated(),
            },
        );
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    #[instrument(skip(self, keys), fields(backend = "memory", count = keys.len()))]
    async fn delete_batch(&self, keys: &[String]) -> StorageResult<BatchDeleteOutcome> {
        if keys.len() > MAX_DELETE_BATCH {
            return Err(StorageError::InvalidKey(format!(
                "batch of {} keys exceeds the limit of {MAX_DELETE_BATCH}",
                keys.len()
            )));
        }

        // Like S3, keys that do not exist are reported as deleted.
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(BatchDeleteOutcome {
            deleted: keys.to_vec(),
            failures: Vec::new(),
        })
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        let prefix = prefix.to_string();
        let page_size = options.normalized_page_size();

        Box::pin(async_stream::stream! {
            let mut after: Option<String> = None;
            loop {
                let objects: Vec<ObjectSummary> = {
                    let map = self.objects.read().await;
                    let start = match &after {
                        Some(key) => Bound::Excluded(key.as_str()),
                        None => Bound::Included(prefix.as_str()),
                    };
                    map.range::<str, _>((start, Bound::Unbounded))
                        .take_while(|(key, _)| key.starts_with(&prefix))
                        .take(page_size)
                        .map(|(key, entry)| ObjectSummary {
                            key: key.clone(),
                            size: entry.data.len() as u64,
                            last_modified: Some(entry.last_modified),
                        })
                        .collect()
                };

                let Some(last) = objects.last() else {
                    break;
                };
                after = Some(last.key.clone());
                let exhausted = objects.len() < page_size;
                yield Ok::<_, StorageError>(ListingPage { objects });
                if exhausted {
                    break;
                }
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
