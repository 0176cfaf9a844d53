//! The tile blob store facade.
//!
//! Single tiles are read, written and removed directly. Everything coarser
//! (tile ranges, grid sets, parameter variants, whole layers) is scheduled as
//! a background [`BulkDeleteTask`] and recorded in the pending-delete registry
//! first, so the call returns as soon as the delete is scheduled and a restart
//! resumes any delete that had not finished.
//!
//! Objects written after a delete was scheduled survive it. Objects written
//! before it may still be listed late by an eventually consistent backend and
//! survive as well; that window is accepted.

use crate::callback::{self, StatisticsHandle};
use crate::error::{BlobStoreError, BlobStoreResult};
use crate::layers::{LayerCatalog, LayerInfo};
use crate::listener::{ListenerList, TileEvent, TileStoreListener};
use crate::lock::{InProcessLockProvider, LockProvider};
use crate::pending::{PendingDeletes, ceil_to_second};
use crate::pool::DeletePool;
use crate::statistics::Statistics;
use crate::task::BulkDeleteTask;
use bytes::Bytes;
use dashmap::DashMap;
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tilestash_core::config::BlobStoreConfig;
use tilestash_core::{
    CompositeScope, DeleteScope, LayerScope, PrefixScope, TileObject, TileRange, keys, properties,
};
use tilestash_storage::{ObjectStore, ObjectStoreListStreamExt, StorageError};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

struct Inner {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn LayerCatalog>,
    locks: Arc<dyn LockProvider>,
    registry: PendingDeletes,
    /// Statistics of the most recently ended bulk delete.
    last_statistics: StatisticsHandle,
    /// Scheduling timestamps of deletes not yet resolved, by prefix.
    pending: DashMap<String, OffsetDateTime>,
    listeners: ListenerList,
    pool: DeletePool,
    prefix: String,
    bucket: String,
    batch_size: usize,
    shutdown_grace: Duration,
}

/// Tile storage over an [`ObjectStore`]. Cheap to clone.
#[derive(Clone)]
pub struct TileBlobStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TileBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileBlobStore")
            .field("backend", &self.inner.store.backend_name())
            .field("bucket", &self.inner.bucket)
            .field("prefix", &self.inner.prefix)
            .finish_non_exhaustive()
    }
}

impl TileBlobStore {
    /// Create the store and resume deletes left in the registry.
    pub async fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn LayerCatalog>,
        bucket: &str,
        config: &BlobStoreConfig,
    ) -> BlobStoreResult<Self> {
        Self::with_lock_provider(
            store,
            catalog,
            bucket,
            config,
            Arc::new(InProcessLockProvider::new()),
        )
        .await
    }

    pub async fn with_lock_provider(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn LayerCatalog>,
        bucket: &str,
        config: &BlobStoreConfig,
        locks: Arc<dyn LockProvider>,
    ) -> BlobStoreResult<Self> {
        config.validate().map_err(BlobStoreError::Config)?;
        if bucket.trim().is_empty() {
            return Err(BlobStoreError::Config("bucket must not be blank".to_string()));
        }

        let prefix = config.prefix.trim_end_matches('/').to_string();
        let blob_store = Self {
            inner: Arc::new(Inner {
                registry: PendingDeletes::new(store.clone(), locks.clone(), &prefix),
                store,
                catalog,
                locks,
                last_statistics: StatisticsHandle::default(),
                pending: DashMap::new(),
                listeners: ListenerList::new(),
                pool: DeletePool::new(config.max_concurrent_deletes),
                prefix,
                bucket: bucket.to_string(),
                batch_size: config.batch_size,
                shutdown_grace: config.shutdown_grace(),
            }),
        };

        let resumed = blob_store.issue_pending_bulk_deletes().await?;
        if resumed > 0 {
            info!(count = resumed, "resumed pending bulk deletes");
        }
        Ok(blob_store)
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn bucket(&self) -> &str {
        &self.inner.bucket
    }

    /// The pending-delete registry.
    pub fn registry(&self) -> &PendingDeletes {
        &self.inner.registry
    }

    pub fn add_listener(&self, listener: Arc<dyn TileStoreListener>) {
        self.inner.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn TileStoreListener>) -> bool {
        self.inner.listeners.remove(listener)
    }

    fn layer(&self, name: &str) -> BlobStoreResult<LayerInfo> {
        self.inner
            .catalog
            .layer(name)
            .ok_or_else(|| BlobStoreError::UnknownLayer(name.to_string()))
    }

    fn layer_scope(&self, layer: &LayerInfo) -> BlobStoreResult<LayerScope> {
        Ok(LayerScope::new(
            &self.inner.prefix,
            &self.inner.bucket,
            &layer.id,
            &layer.name,
        )?)
    }

    fn tile_key(&self, layer: &LayerInfo, tile: &TileObject) -> String {
        keys::to_key(
            &self.inner.prefix,
            &layer.id,
            &tile.grid_set_id,
            tile.format.file_extension(),
            &tile.resolved_parameters_id(),
            tile.coord.z,
            tile.coord.x,
            tile.coord.y,
            tile.format.internal_name(),
        )
    }

    fn tile_event(&self, tile: &TileObject, size: u64) -> TileEvent {
        TileEvent {
            layer_name: tile.layer_name.clone(),
            grid_set_id: tile.grid_set_id.clone(),
            format: tile.format.file_extension().to_string(),
            parameters_id: tile.resolved_parameters_id(),
            coord: tile.coord,
            size,
        }
    }

    /// Whether `key` was last modified no later than a pending delete covering it.
    fn pending_delete_covers(&self, key: &str, last_modified: Option<OffsetDateTime>) -> bool {
        let Some(modified) = last_modified else {
            return false;
        };
        self.inner
            .pending
            .iter()
            .any(|entry| key.starts_with(entry.key().as_str()) && modified <= *entry.value())
    }

    /// Store a tile, replacing any previous version.
    pub async fn put(&self, tile: &TileObject) -> BlobStoreResult<()> {
        let layer = self.layer(&tile.layer_name)?;
        let key = self.tile_key(&layer, tile);

        let old_size = if self.inner.listeners.is_empty() {
            None
        } else {
            match self.inner.store.head(&key).await {
                Ok(meta) => Some(meta.size),
                Err(StorageError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            }
        };

        self.inner
            .store
            .put(&key, tile.blob.clone(), Some(tile.format.mime_type()))
            .await?;

        if !tile.parameters.is_empty() {
            self.put_parameters_metadata(&layer, tile).await?;
        }

        let event = self.tile_event(tile, tile.blob.len() as u64);
        match old_size {
            Some(old_size) => self.inner.listeners.send_tile_updated(&event, old_size),
            None => self.inner.listeners.send_tile_stored(&event),
        }
        Ok(())
    }

    async fn put_parameters_metadata(
        &self,
        layer: &LayerInfo,
        tile: &TileObject,
    ) -> BlobStoreResult<()> {
        let key = keys::parameters_metadata_key(
            &self.inner.prefix,
            &layer.id,
            &tile.resolved_parameters_id(),
        );
        if self.inner.store.exists(&key).await? {
            return Ok(());
        }
        let text = properties::render(&tile.parameters, None);
        self.inner
            .store
            .put(&key, Bytes::from(text), Some("text/plain"))
            .await?;
        Ok(())
    }

    /// Fill in the blob and creation time of a tile. Returns false when the
    /// tile is missing or covered by a pending delete.
    pub async fn get(&self, tile: &mut TileObject) -> BlobStoreResult<bool> {
        let layer = self.layer(&tile.layer_name)?;
        let key = self.tile_key(&layer, tile);
        let object = match self.inner.store.get(&key).await {
            Ok(object) => object,
            Err(StorageError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if self.pending_delete_covers(&key, object.meta.last_modified) {
            debug!(key = %key, "tile is pending deletion");
            return Ok(false);
        }
        tile.blob = object.data;
        tile.created = object.meta.last_modified;
        Ok(true)
    }

    /// Delete one tile. Returns whether it existed.
    pub async fn delete_tile(&self, tile: &TileObject) -> BlobStoreResult<bool> {
        let layer = self.layer(&tile.layer_name)?;
        let key = self.tile_key(&layer, tile);

        if self.inner.listeners.is_empty() {
            return match self.inner.store.delete(&key).await {
                Ok(()) => Ok(true),
                Err(StorageError::NotFound(_)) => Ok(false),
                Err(e) => Err(e.into()),
            };
        }

        let size = match self.inner.store.head(&key).await {
            Ok(meta) => meta.size,
            Err(StorageError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        match self.inner.store.delete(&key).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        self.inner
            .listeners
            .send_tile_deleted(&self.tile_event(tile, size));
        Ok(true)
    }

    /// Schedule deletion of a tile range. Returns whether anything was scheduled.
    pub async fn delete_range(&self, range: &TileRange) -> BlobStoreResult<bool> {
        let layer = self.layer(&range.layer_name)?;
        let parameters = self
            .layer_scope(&layer)?
            .grid_set(&range.grid_set_id)?
            .parameters(range.format.file_extension(), range.resolved_parameters_id())?;
        let composite = CompositeScope::tile_range(&parameters, range)?;
        self.schedule_async_delete(DeleteScope::Composite(composite))
            .await
    }

    /// Schedule deletion of a whole layer and drop its metadata. Returns
    /// whether the layer had tiles.
    pub async fn delete_layer(&self, layer_name: &str) -> BlobStoreResult<bool> {
        let layer = self.layer(layer_name)?;
        let metadata_key = keys::layer_metadata_key(&self.inner.prefix, &layer.id);
        match self.inner.store.delete(&metadata_key).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let scope = self.layer_scope(&layer)?;
        self.schedule_async_delete(DeleteScope::Layer(scope)).await
    }

    pub async fn delete_by_grid_set(
        &self,
        layer_name: &str,
        grid_set_id: &str,
    ) -> BlobStoreResult<bool> {
        let layer = self.layer(layer_name)?;
        let scope = self.layer_scope(&layer)?.grid_set(grid_set_id)?;
        self.schedule_async_delete(DeleteScope::GridSet(scope)).await
    }

    /// Schedule deletion of one parameter variant across every grid set and
    /// format of the layer.
    pub async fn delete_by_parameters_id(
        &self,
        layer_name: &str,
        parameters_id: &str,
    ) -> BlobStoreResult<bool> {
        let layer = self.layer(layer_name)?;
        let formats: Vec<&str> = layer.formats.iter().map(|f| f.file_extension()).collect();
        let composite = CompositeScope::parameters_variants(
            &self.layer_scope(&layer)?,
            &layer.grid_set_ids,
            &formats,
            parameters_id,
        )?;

        let metadata_key =
            keys::parameters_metadata_key(&self.inner.prefix, &layer.id, parameters_id);
        match self.inner.store.delete(&metadata_key).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.schedule_async_delete(DeleteScope::Composite(composite))
            .await
    }

    /// Keys are built from the layer id, so nothing moves. Listeners are told
    /// when the layer has objects.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> BlobStoreResult<bool> {
        let layer = self
            .layer(new_name)
            .or_else(|_| self.layer(old_name))?;
        let exists = self
            .inner
            .store
            .prefix_exists(&keys::to_layer_prefix(&self.inner.prefix, &layer.id))
            .await?;
        if exists {
            self.inner.listeners.send_layer_renamed(old_name, new_name);
        }
        Ok(exists)
    }

    pub async fn layer_exists(&self, layer_name: &str) -> BlobStoreResult<bool> {
        let layer = self.layer(layer_name)?;
        Ok(self
            .inner
            .store
            .prefix_exists(&keys::to_layer_prefix(&self.inner.prefix, &layer.id))
            .await?)
    }

    async fn read_properties(&self, key: &str) -> BlobStoreResult<BTreeMap<String, String>> {
        match self.inner.store.get(key).await {
            Ok(object) => {
                let text = String::from_utf8_lossy(&object.data);
                Ok(properties::parse(&text)?)
            }
            Err(StorageError::NotFound(_)) => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn layer_metadata(
        &self,
        layer_name: &str,
        key: &str,
    ) -> BlobStoreResult<Option<String>> {
        let layer = self.layer(layer_name)?;
        let metadata_key = keys::layer_metadata_key(&self.inner.prefix, &layer.id);
        Ok(self.read_properties(&metadata_key).await?.remove(key))
    }

    pub async fn put_layer_metadata(
        &self,
        layer_name: &str,
        key: &str,
        value: &str,
    ) -> BlobStoreResult<()> {
        let layer = self.layer(layer_name)?;
        let metadata_key = keys::layer_metadata_key(&self.inner.prefix, &layer.id);

        let lock = self.inner.locks.acquire(&metadata_key).await?;
        let result: BlobStoreResult<()> = async {
            let mut metadata = self.read_properties(&metadata_key).await?;
            metadata.insert(key.to_string(), value.to_string());
            let text = properties::render(&metadata, None);
            self.inner
                .store
                .put(&metadata_key, Bytes::from(text), Some("text/plain"))
                .await?;
            Ok(())
        }
        .await;
        if let Err(e) = lock.release().await {
            warn!(key = %metadata_key, error = %e, "failed to release metadata lock");
        }
        result
    }

    /// Every parameter set stored for the layer.
    pub async fn parameters(
        &self,
        layer_name: &str,
    ) -> BlobStoreResult<Vec<BTreeMap<String, String>>> {
        let layer = self.layer(layer_name)?;
        let prefix = keys::parameters_metadata_prefix(&self.inner.prefix, &layer.id);
        let summaries: Vec<_> = self
            .inner
            .store
            .list_objects(&prefix, None)
            .try_collect()
            .await?;

        let mut sets = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let parameters = self.read_properties(&summary.key).await?;
            if !parameters.is_empty() {
                sets.push(parameters);
            }
        }
        Ok(sets)
    }

    async fn has_objects(&self, scope: &DeleteScope) -> BlobStoreResult<bool> {
        let paths = match scope {
            DeleteScope::Composite(composite) => {
                composite.children().iter().map(DeleteScope::path).collect()
            }
            other => vec![other.path()],
        };
        for path in paths {
            if self.inner.store.prefix_exists(&path).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Record a delete in the registry and hand it to the pool.
    ///
    /// Returns false when the scope holds no objects or a newer delete of the
    /// same path is already pending.
    pub async fn schedule_async_delete(&self, scope: DeleteScope) -> BlobStoreResult<bool> {
        let path = scope.path();
        if path.is_empty() {
            return Ok(false);
        }
        let timestamp = ceil_to_second(OffsetDateTime::now_utc());

        let lock = self.inner.locks.acquire(&path).await?;
        let result: BlobStoreResult<bool> = async {
            if !self.has_objects(&scope).await? {
                debug!(scope = %scope, "nothing to delete");
                return Ok(false);
            }
            if let Some(current) = self.inner.pending.get(&path).map(|e| *e.value())
                && current > timestamp
            {
                debug!(scope = %scope, "a newer delete is already pending");
                return Ok(false);
            }
            self.submit(scope, timestamp).await?;
            Ok(true)
        }
        .await;
        if let Err(e) = lock.release().await {
            warn!(scope = %path, error = %e, "failed to release schedule lock");
        }
        result
    }

    async fn submit(&self, scope: DeleteScope, timestamp: OffsetDateTime) -> BlobStoreResult<()> {
        let prefixes = scope.resumable_prefixes();
        for prefix in &prefixes {
            self.inner.registry.record(prefix, timestamp).await?;
            self.inner
                .pending
                .entry(prefix.clone())
                .and_modify(|current| *current = (*current).max(timestamp))
                .or_insert(timestamp);
        }

        let callback = callback::default_chain(
            self.inner.listeners.clone(),
            self.inner.last_statistics.clone(),
        );
        let mut task = BulkDeleteTask::builder(self.inner.store.clone(), scope)
            .batch_size(self.inner.batch_size)
            .timestamp(timestamp)
            .callback(callback)
            .lock_provider(self.inner.locks.clone())
            .build()?;

        let inner = self.inner.clone();
        let name = task.scope().to_string();
        self.inner.pool.submit(name, move |cancel| async move {
            let outcome = task.run(&cancel).await;
            match outcome {
                Ok(_) => {
                    for prefix in prefixes {
                        match inner.registry.resolve(&prefix, timestamp).await {
                            Ok(_) => {
                                inner
                                    .pending
                                    .remove_if(&prefix, |_, current| *current <= timestamp);
                            }
                            Err(e) => {
                                error!(prefix = %prefix, error = %e, "failed to clear pending delete");
                            }
                        }
                    }
                }
                Err(BlobStoreError::Interrupted { path }) => {
                    info!(scope = %path, "bulk delete interrupted, will resume on next startup");
                }
                Err(e) => {
                    error!(scope = %task.scope(), error = %e, "bulk delete failed");
                }
            }
        })?;
        Ok(())
    }

    /// Resume every delete recorded in the registry. Returns how many were
    /// submitted.
    pub async fn issue_pending_bulk_deletes(&self) -> BlobStoreResult<usize> {
        let entries = self.inner.registry.entries().await?;
        let mut submitted = 0;
        for (prefix, timestamp) in entries {
            let scope = match PrefixScope::new(&self.inner.prefix, &self.inner.bucket, &prefix) {
                Ok(scope) => scope,
                Err(e) => {
                    warn!(prefix = %prefix, error = %e, "ignoring invalid pending delete");
                    continue;
                }
            };
            self.inner.pending.insert(prefix.clone(), timestamp);
            info!(prefix = %prefix, "resuming pending bulk delete");
            self.submit(DeleteScope::Prefix(scope), timestamp).await?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Statistics of the most recently ended bulk delete, interrupted or not.
    pub fn last_statistics(&self) -> Option<Statistics> {
        self.inner.last_statistics.get()
    }

    /// Wait for every scheduled delete to finish.
    pub async fn wait_idle(&self) {
        self.inner.pool.wait_idle().await;
    }

    /// Stop the delete pool. Interrupted deletes stay in the registry.
    pub async fn shutdown(&self) -> bool {
        self.inner.pool.shutdown(self.inner.shutdown_grace).await
    }
}
