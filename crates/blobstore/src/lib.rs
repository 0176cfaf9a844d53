//! Tile blob store with crash-safe bulk deletion.
//!
//! This crate provides:
//! - `TileBlobStore`: tile reads and writes plus scheduled bulk deletes of
//!   layers, grid sets, parameter variants and tile ranges
//! - `BulkDeleteTask`: streams a scope's objects through the timestamp and
//!   bounds filters and deletes them in batches
//! - The callback chain reporting task progress to logs, metrics and storage
//!   listeners
//! - The pending-delete registry that lets a restart resume unfinished deletes
//! - Keyed locks and the bounded pool the deletes run on

pub mod batch;
pub mod callback;
pub mod error;
pub mod layers;
pub mod listener;
pub mod lock;
pub mod metrics;
pub mod pending;
pub mod pool;
pub mod statistics;
pub mod store;
pub mod task;

pub use callback::{
    Callback, LoggingCallback, NoopCallback, NotificationCallback, StatisticsCallback,
    StatisticsHandle, default_chain,
};
pub use error::{BlobStoreError, BlobStoreResult};
pub use layers::{LayerCatalog, LayerInfo, StaticLayerCatalog};
pub use listener::{ListenerList, TileEvent, TileStoreListener};
pub use lock::{InProcessLockProvider, Lock, LockError, LockProvider};
pub use pending::{PendingDeletes, ceil_to_second};
pub use pool::DeletePool;
pub use statistics::{BatchStats, Counters, ResultStat, Statistics, SubStats};
pub use store::TileBlobStore;
pub use task::{BulkDeleteTask, BulkDeleteTaskBuilder, DeleteStrategy, TaskState, choose_strategy};
