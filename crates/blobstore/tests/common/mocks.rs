#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tilestash_blobstore::callback::Callback;
use tilestash_blobstore::listener::{TileEvent, TileStoreListener};
use tilestash_blobstore::lock::{Lock, LockError, LockProvider};
use tilestash_blobstore::statistics::{BatchStats, ResultStat, Statistics, SubStats};
use tilestash_storage::{
    BatchDeleteOutcome, DeleteFailure, ErrorClass, ListingOptions, MemoryBackend, ObjectMeta,
    ObjectStore, PageStream, StorageError, StorageResult, StoredObject,
};
use tokio::time::Duration;

/// How [`ScriptedBackend`] answers `delete_batch`.
#[derive(Clone, Debug)]
pub enum DeleteBehavior {
    /// Delete from the inner store.
    Normal,
    /// Report success without deleting or reporting any key.
    EmptyResult,
    /// Fail the whole call.
    Fail { status: u16 },
    /// Refuse keys containing the marker with the given code; delete the rest.
    RejectMatching { marker: String, code: String },
}

/// Memory backend whose batch deletes can be scripted and counted.
pub struct ScriptedBackend {
    pub inner: Arc<MemoryBackend>,
    behavior: Mutex<DeleteBehavior>,
    pub batch_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
    /// Delay before every listing page.
    list_delay: Duration,
}

impl ScriptedBackend {
    pub fn new(inner: Arc<MemoryBackend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            behavior: Mutex::new(DeleteBehavior::Normal),
            batch_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            list_delay: Duration::ZERO,
        })
    }

    pub fn with_list_delay(inner: Arc<MemoryBackend>, list_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner,
            behavior: Mutex::new(DeleteBehavior::Normal),
            batch_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            list_delay,
        })
    }

    pub fn set_behavior(&self, behavior: DeleteBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for ScriptedBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<StoredObject> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StorageResult<()> {
        self.inner.put(key, data, content_type).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn delete_batch(&self, keys: &[String]) -> StorageResult<BatchDeleteOutcome> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(keys.len());
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            DeleteBehavior::Normal => self.inner.delete_batch(keys).await,
            DeleteBehavior::EmptyResult => Ok(BatchDeleteOutcome::default()),
            DeleteBehavior::Fail { status } => Err(StorageError::Service {
                status,
                message: "scripted failure".to_string(),
            }),
            DeleteBehavior::RejectMatching { marker, code } => {
                let (rejected, accepted): (Vec<String>, Vec<String>) =
                    keys.iter().cloned().partition(|k| k.contains(&marker));
                let mut outcome = self.inner.delete_batch(&accepted).await?;
                outcome.failures = rejected
                    .into_iter()
                    .map(|key| DeleteFailure {
                        key,
                        code: Some(code.clone()),
                        message: "scripted rejection".to_string(),
                        class: ErrorClass::NonRecoverable,
                    })
                    .collect();
                Ok(outcome)
            }
        }
    }

    fn list_pages<'a>(&'a self, prefix: &str, options: ListingOptions) -> PageStream<'a> {
        if self.list_delay.is_zero() {
            return self.inner.list_pages(prefix, options);
        }
        let delay = self.list_delay;
        let mut pages = self.inner.list_pages(prefix, options);
        Box::pin(async_stream::stream! {
            use futures::StreamExt;
            loop {
                tokio::time::sleep(delay).await;
                match pages.next().await {
                    Some(page) => yield page,
                    None => break,
                }
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

/// Records every callback as a line of text.
#[derive(Clone, Default)]
pub struct CaptureCallback {
    pub events: Arc<Mutex<Vec<String>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
}

impl CaptureCallback {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Callback for CaptureCallback {
    fn task_started(&mut self, statistics: &Statistics) {
        self.push(format!("task_started {}", statistics.path));
    }

    fn sub_task_started(&mut self, sub_stats: &SubStats) {
        self.push(format!("sub_task_started {}", sub_stats.path));
    }

    fn batch_started(&mut self, batch: &BatchStats) {
        self.push(format!("batch_started {}", batch.size));
    }

    fn tile_deleted(&mut self, result: &ResultStat) {
        self.push("tile_deleted".to_string());
        self.deleted.lock().unwrap().push(result.key.clone());
    }

    fn batch_ended(&mut self, batch: &BatchStats) {
        self.push(format!("batch_ended {}", batch.counters.deleted));
    }

    fn sub_task_ended(&mut self, sub_stats: &SubStats) {
        self.push(format!("sub_task_ended {}", sub_stats.path));
    }

    fn task_ended(&mut self, statistics: &Statistics) {
        self.push(format!("task_ended {}", statistics.outcome()));
    }
}

/// Records listener events as lines of text.
#[derive(Default)]
pub struct CaptureListener {
    pub events: Mutex<Vec<String>>,
}

impl CaptureListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl TileStoreListener for CaptureListener {
    fn tile_stored(&self, event: &TileEvent) {
        self.push(format!("stored {} {}", event.layer_name, event.coord));
    }

    fn tile_updated(&self, event: &TileEvent, old_size: u64) {
        self.push(format!("updated {} {} {old_size}", event.layer_name, event.coord));
    }

    fn tile_deleted(&self, event: &TileEvent) {
        self.push(format!("deleted {} {}", event.layer_name, event.coord));
    }

    fn layer_deleted(&self, layer_name: &str) {
        self.push(format!("layer_deleted {layer_name}"));
    }

    fn layer_renamed(&self, old_name: &str, new_name: &str) {
        self.push(format!("layer_renamed {old_name} {new_name}"));
    }

    fn grid_subset_deleted(&self, layer_name: &str, grid_set_id: &str) {
        self.push(format!("grid_subset_deleted {layer_name} {grid_set_id}"));
    }

    fn parameters_deleted(&self, layer_name: &str, parameters_id: &str) {
        self.push(format!("parameters_deleted {layer_name} {parameters_id}"));
    }
}

/// Lock provider that refuses every acquisition.
pub struct FailingLockProvider;

#[async_trait]
impl LockProvider for FailingLockProvider {
    async fn acquire(&self, key: &str) -> Result<Box<dyn Lock>, LockError> {
        Err(LockError::Acquire {
            key: key.to_string(),
            reason: "lock service unavailable".to_string(),
        })
    }
}
