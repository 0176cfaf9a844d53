//! The bulk delete task: deletes every object of one scope.
//!
//! A task is built once and run once. Running it takes the lock for the scope
//! path, walks the leaf scopes in order and deletes each one with the strategy
//! chosen by [`choose_strategy`]. Batch and per-key failures are counted in the
//! statistics and never stop the task; cancellation stops it between batches
//! and is reported as [`BlobStoreError::Interrupted`].

use crate::batch::{self, ObjectFilter};
use crate::callback::{Callback, NoopCallback};
use crate::error::{BlobStoreError, BlobStoreResult};
use crate::lock::{InProcessLockProvider, LockProvider};
use crate::statistics::{BatchStats, ResultStat, Statistics, SubStats};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tilestash_core::config::MAX_DELETE_BATCH_SIZE;
use tilestash_core::{DeleteScope, TileScope};
use tilestash_storage::{ObjectStore, ObjectSummary, StorageError};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// How a leaf scope is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Nothing to delete at this node.
    NoDeletionsRequired,
    /// One known key.
    SingleTile,
    /// A zoom level restricted to a bounding box.
    BoundedPrefix,
    /// Everything under a prefix.
    UnboundedPrefix,
    /// A prefix recovered from the pending-delete registry.
    RetryPending,
}

/// Pick the strategy for a scope. Composite scopes delete nothing themselves;
/// their leaves are run one by one.
pub fn choose_strategy(scope: &DeleteScope) -> DeleteStrategy {
    match scope {
        DeleteScope::Composite(_) => DeleteStrategy::NoDeletionsRequired,
        DeleteScope::Tile(_) => DeleteStrategy::SingleTile,
        DeleteScope::Zoom(zoom) if zoom.bounds().is_some() => DeleteStrategy::BoundedPrefix,
        DeleteScope::Zoom(_)
        | DeleteScope::Parameters(_)
        | DeleteScope::GridSet(_)
        | DeleteScope::Layer(_) => DeleteStrategy::UnboundedPrefix,
        DeleteScope::Prefix(_) => DeleteStrategy::RetryPending,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Completed,
    Aborted,
}

/// Builder for [`BulkDeleteTask`].
pub struct BulkDeleteTaskBuilder {
    store: Arc<dyn ObjectStore>,
    scope: DeleteScope,
    batch_size: usize,
    timestamp: Option<OffsetDateTime>,
    callback: Option<Box<dyn Callback>>,
    locks: Option<Arc<dyn LockProvider>>,
}

impl BulkDeleteTaskBuilder {
    /// Keys per delete call, 1 to 1000.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Objects modified after this instant survive. Defaults to the build time.
    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn callback(mut self, callback: Box<dyn Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn lock_provider(mut self, locks: Arc<dyn LockProvider>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn build(self) -> BlobStoreResult<BulkDeleteTask> {
        if !(1..=MAX_DELETE_BATCH_SIZE).contains(&self.batch_size) {
            return Err(BlobStoreError::InvalidTask(format!(
                "batch size must be between 1 and {MAX_DELETE_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        Ok(BulkDeleteTask {
            id: Uuid::new_v4(),
            store: self.store,
            scope: self.scope,
            batch_size: self.batch_size,
            timestamp: self.timestamp.unwrap_or_else(OffsetDateTime::now_utc),
            callback: self.callback.unwrap_or_else(|| Box::new(NoopCallback)),
            locks: self
                .locks
                .unwrap_or_else(|| Arc::new(InProcessLockProvider::new())),
            state: TaskState::Created,
        })
    }
}

/// Deletes everything a [`DeleteScope`] covers.
pub struct BulkDeleteTask {
    id: Uuid,
    store: Arc<dyn ObjectStore>,
    scope: DeleteScope,
    batch_size: usize,
    timestamp: OffsetDateTime,
    callback: Box<dyn Callback>,
    locks: Arc<dyn LockProvider>,
    state: TaskState,
}

impl std::fmt::Debug for BulkDeleteTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkDeleteTask")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("batch_size", &self.batch_size)
            .field("timestamp", &self.timestamp)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

enum Flow {
    Continue,
    Interrupted,
}

impl BulkDeleteTask {
    pub fn builder(store: Arc<dyn ObjectStore>, scope: DeleteScope) -> BulkDeleteTaskBuilder {
        BulkDeleteTaskBuilder {
            store,
            scope,
            batch_size: MAX_DELETE_BATCH_SIZE,
            timestamp: None,
            callback: None,
            locks: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scope(&self) -> &DeleteScope {
        &self.scope
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Run the task to completion or cancellation.
    ///
    /// `task_ended` is always reported once `task_started` was. The scope lock
    /// is released last.
    pub async fn run(&mut self, cancel: &CancellationToken) -> BlobStoreResult<Statistics> {
        if self.state != TaskState::Created {
            return Err(BlobStoreError::InvalidTask(format!(
                "task {} already ran ({:?})",
                self.id, self.state
            )));
        }
        self.state = TaskState::Running;

        let path = self.scope.path();
        let lock = match self.locks.acquire(&path).await {
            Ok(lock) => lock,
            Err(e) => {
                self.state = TaskState::Aborted;
                return Err(e.into());
            }
        };

        let mut statistics = Statistics::new(self.id, &self.scope);
        self.callback.task_started(&statistics);

        let mut interrupted = false;
        for leaf in self.scope.leaves() {
            if cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            let sub = self.run_leaf(leaf, cancel).await;
            interrupted = sub.interrupted;
            statistics.add_sub_stats(sub);
            if interrupted {
                break;
            }
        }
        statistics.interrupted |= interrupted;
        statistics.finish();
        self.callback.task_ended(&statistics);

        if let Err(e) = lock.release().await {
            warn!(scope = %path, error = %e, "failed to release bulk delete lock");
        }

        if interrupted {
            self.state = TaskState::Aborted;
            Err(BlobStoreError::Interrupted { path })
        } else {
            self.state = TaskState::Completed;
            Ok(statistics)
        }
    }

    async fn run_leaf(&mut self, leaf: DeleteScope, cancel: &CancellationToken) -> SubStats {
        let strategy = choose_strategy(&leaf);
        let mut sub = SubStats::new(leaf, strategy);
        self.callback.sub_task_started(&sub);

        let scope = sub.scope.clone();
        let flow = match (strategy, &scope) {
            (DeleteStrategy::NoDeletionsRequired, _) => Flow::Continue,
            (DeleteStrategy::SingleTile, DeleteScope::Tile(tile)) => {
                self.delete_tile(tile, &mut sub).await
            }
            (DeleteStrategy::BoundedPrefix, DeleteScope::Zoom(zoom)) => {
                let prefixes = batch::zoom_prefixes(zoom);
                let mut filter = ObjectFilter::new(self.timestamp);
                if let Some(bounds) = zoom.bounds() {
                    filter = filter.with_bounds(*bounds);
                }
                self.delete_prefixes(prefixes, filter, &mut sub, cancel)
                    .await
            }
            (_, scope) => {
                let prefixes = vec![scope.path()];
                let filter = ObjectFilter::new(self.timestamp);
                self.delete_prefixes(prefixes, filter, &mut sub, cancel)
                    .await
            }
        };
        sub.interrupted = matches!(flow, Flow::Interrupted);

        self.callback.sub_task_ended(&sub);
        sub
    }

    async fn delete_tile(&mut self, tile: &TileScope, sub: &mut SubStats) -> Flow {
        let key = tile.path();
        let mut size = 0;
        if !tile.skip_existence_check() {
            match self.store.head(&key).await {
                Ok(meta) => size = meta.size,
                Err(StorageError::NotFound(_)) => {
                    debug!(key = %key, "tile does not exist, nothing to delete");
                    return Flow::Continue;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to check tile before delete");
                    sub.counters.record_issue(e.class());
                    return Flow::Continue;
                }
            }
        }
        let object = ObjectSummary {
            key,
            size,
            last_modified: None,
        };
        self.delete_batch(vec![object], sub).await;
        Flow::Continue
    }

    async fn delete_prefixes(
        &mut self,
        prefixes: Vec<String>,
        filter: ObjectFilter,
        sub: &mut SubStats,
        cancel: &CancellationToken,
    ) -> Flow {
        let store = self.store.clone();
        let mut batches = batch::batches(store.as_ref(), prefixes, filter, self.batch_size);
        loop {
            if cancel.is_cancelled() {
                return Flow::Interrupted;
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Flow::Interrupted,
                next = batches.next() => next,
            };
            match next {
                None => return Flow::Continue,
                Some(Ok(objects)) => self.delete_batch(objects, sub).await,
                Some(Err(e)) => {
                    warn!(scope = %sub.path, error = %e, "listing failed, ending sub-task");
                    sub.counters.record_issue(e.class());
                    return Flow::Continue;
                }
            }
        }
    }

    async fn delete_batch(&mut self, objects: Vec<ObjectSummary>, sub: &mut SubStats) {
        let mut batch = BatchStats::new(objects.len());
        self.callback.batch_started(&batch);

        let keys: Vec<String> = objects.iter().map(|o| o.key.clone()).collect();
        match self.store.delete_batch(&keys).await {
            Ok(outcome) => {
                let sizes: HashMap<&str, u64> =
                    objects.iter().map(|o| (o.key.as_str(), o.size)).collect();
                let now = OffsetDateTime::now_utc();
                for key in outcome.deleted {
                    let Some(size) = sizes.get(key.as_str()).copied() else {
                        debug!(key = %key, "backend reported a key that was not requested");
                        continue;
                    };
                    let result = ResultStat::new(key, size, now);
                    self.callback.tile_deleted(&result);
                    batch.record_deleted(result);
                }
                for failure in outcome.failures {
                    debug!(
                        key = %failure.key,
                        code = failure.code.as_deref().unwrap_or("-"),
                        message = %failure.message,
                        class = failure.class.as_str(),
                        "key not deleted"
                    );
                    batch.record_issue(failure.class);
                }
            }
            Err(e) => {
                warn!(
                    scope = %sub.path,
                    keys = keys.len(),
                    class = e.class().as_str(),
                    error = %e,
                    "delete batch failed"
                );
                batch.record_issue(e.class());
            }
        }

        self.callback.batch_ended(&batch);
        sub.add_batch(&batch);
    }
}
