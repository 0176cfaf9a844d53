//! Bulk delete lifecycle callbacks.
//!
//! A task reports to one [`Callback`] in strict nesting order:
//!
//! ```text
//! task_started
//!   sub_task_started            (once per leaf scope)
//!     batch_started
//!       tile_deleted*
//!     batch_ended
//!   sub_task_ended
//! task_ended                    (always, also after interruption)
//! ```
//!
//! Behaviour is layered by decoration: [`StatisticsCallback`] wraps
//! [`LoggingCallback`] wraps [`NotificationCallback`] wraps [`NoopCallback`].
//! Each decorator does its own work and then forwards to its delegate.

use crate::listener::{ListenerList, TileEvent};
use crate::metrics;
use crate::statistics::{BatchStats, ResultStat, Statistics, SubStats};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tilestash_core::DeleteScope;
use tracing::{debug, info, warn};

#[allow(unused_variables)]
pub trait Callback: Send {
    fn task_started(&mut self, statistics: &Statistics) {}

    fn sub_task_started(&mut self, sub_stats: &SubStats) {}

    fn batch_started(&mut self, batch: &BatchStats) {}

    fn tile_deleted(&mut self, result: &ResultStat) {}

    fn batch_ended(&mut self, batch: &BatchStats) {}

    fn sub_task_ended(&mut self, sub_stats: &SubStats) {}

    fn task_ended(&mut self, statistics: &Statistics) {}
}

/// Does nothing. The end of every chain.
#[derive(Debug, Default)]
pub struct NoopCallback;

impl Callback for NoopCallback {}

/// Logs the lifecycle.
pub struct LoggingCallback {
    delegate: Box<dyn Callback>,
}

impl LoggingCallback {
    pub fn new(delegate: Box<dyn Callback>) -> Self {
        Self { delegate }
    }
}

impl Callback for LoggingCallback {
    fn task_started(&mut self, statistics: &Statistics) {
        info!(
            task_id = %statistics.task_id,
            scope = %statistics.path,
            kind = statistics.kind,
            "bulk delete started"
        );
        self.delegate.task_started(statistics);
    }

    fn sub_task_started(&mut self, sub_stats: &SubStats) {
        info!(
            scope = %sub_stats.path,
            kind = sub_stats.kind,
            strategy = ?sub_stats.strategy,
            "bulk delete sub-task started"
        );
        self.delegate.sub_task_started(sub_stats);
    }

    fn batch_started(&mut self, batch: &BatchStats) {
        debug!(size = batch.size, "delete batch started");
        self.delegate.batch_started(batch);
    }

    fn tile_deleted(&mut self, result: &ResultStat) {
        self.delegate.tile_deleted(result);
    }

    fn batch_ended(&mut self, batch: &BatchStats) {
        debug!(
            size = batch.size,
            deleted = batch.counters.deleted,
            issues = batch.counters.issues(),
            "delete batch ended"
        );
        self.delegate.batch_ended(batch);
    }

    fn sub_task_ended(&mut self, sub_stats: &SubStats) {
        if sub_stats.completed() {
            info!(
                scope = %sub_stats.path,
                processed = sub_stats.counters.processed,
                deleted = sub_stats.counters.deleted,
                "bulk delete sub-task ended"
            );
        } else {
            warn!(
                scope = %sub_stats.path,
                processed = sub_stats.counters.processed,
                deleted = sub_stats.counters.deleted,
                recoverable = sub_stats.counters.recoverable_issues,
                non_recoverable = sub_stats.counters.non_recoverable_issues,
                unknown = sub_stats.counters.unknown_issues,
                interrupted = sub_stats.interrupted,
                "bulk delete sub-task did not complete"
            );
        }
        self.delegate.sub_task_ended(sub_stats);
    }

    fn task_ended(&mut self, statistics: &Statistics) {
        let elapsed_ms = statistics.elapsed().whole_milliseconds() as i64;
        if statistics.completed() {
            info!(
                task_id = %statistics.task_id,
                scope = %statistics.path,
                deleted = statistics.counters.deleted,
                batches = statistics.counters.batches_sent,
                elapsed_ms,
                "bulk delete ended"
            );
        } else {
            warn!(
                task_id = %statistics.task_id,
                scope = %statistics.path,
                outcome = statistics.outcome(),
                deleted = statistics.counters.deleted,
                issues = statistics.counters.issues(),
                elapsed_ms,
                "bulk delete ended with issues"
            );
        }
        self.delegate.task_ended(statistics);
    }
}

/// Forwards deletions to storage listeners.
///
/// Per-tile events are sent only for single tiles and zoom levels. Layer and
/// grid set events are sent when their sub-task completes cleanly. A parameters
/// id is announced once at task end, and only if every sub-task for it
/// completed.
pub struct NotificationCallback {
    delegate: Box<dyn Callback>,
    listeners: ListenerList,
    current: Option<DeleteScope>,
    parameters: BTreeMap<(String, String), bool>,
}

impl NotificationCallback {
    pub fn new(delegate: Box<dyn Callback>, listeners: ListenerList) -> Self {
        Self {
            delegate,
            listeners,
            current: None,
            parameters: BTreeMap::new(),
        }
    }

    fn forwards_tiles(&self) -> bool {
        matches!(
            self.current,
            Some(DeleteScope::Tile(_)) | Some(DeleteScope::Zoom(_))
        )
    }
}

impl Callback for NotificationCallback {
    fn task_started(&mut self, statistics: &Statistics) {
        self.delegate.task_started(statistics);
    }

    fn sub_task_started(&mut self, sub_stats: &SubStats) {
        self.current = Some(sub_stats.scope.clone());
        self.delegate.sub_task_started(sub_stats);
    }

    fn batch_started(&mut self, batch: &BatchStats) {
        self.delegate.batch_started(batch);
    }

    fn tile_deleted(&mut self, result: &ResultStat) {
        if self.forwards_tiles()
            && !self.listeners.is_empty()
            && let (Some(tile), Some(layer_name)) = (
                &result.tile,
                self.current.as_ref().and_then(DeleteScope::layer_name),
            )
        {
            self.listeners
                .send_tile_deleted(&TileEvent::from_key(layer_name, tile, result.size));
        }
        self.delegate.tile_deleted(result);
    }

    fn batch_ended(&mut self, batch: &BatchStats) {
        self.delegate.batch_ended(batch);
    }

    fn sub_task_ended(&mut self, sub_stats: &SubStats) {
        let completed = sub_stats.completed();
        match &sub_stats.scope {
            DeleteScope::Layer(layer) if completed => {
                self.listeners.send_layer_deleted(layer.layer_name());
            }
            DeleteScope::GridSet(grid_set) if completed => {
                self.listeners
                    .send_grid_subset_deleted(grid_set.layer().layer_name(), grid_set.grid_set_id());
            }
            DeleteScope::Parameters(parameters) => {
                let entry = self
                    .parameters
                    .entry((
                        parameters.layer().layer_name().to_string(),
                        parameters.parameters_id().to_string(),
                    ))
                    .or_insert(true);
                *entry &= completed;
            }
            _ => {}
        }
        self.current = None;
        self.delegate.sub_task_ended(sub_stats);
    }

    fn task_ended(&mut self, statistics: &Statistics) {
        for ((layer_name, parameters_id), completed) in std::mem::take(&mut self.parameters) {
            if completed {
                self.listeners
                    .send_parameters_deleted(&layer_name, &parameters_id);
            }
        }
        self.delegate.task_ended(statistics);
    }
}

/// Latest statistics seen by a [`StatisticsCallback`].
#[derive(Clone, Debug, Default)]
pub struct StatisticsHandle {
    inner: Arc<Mutex<Option<Statistics>>>,
}

impl StatisticsHandle {
    /// Statistics of the finished task, `None` while it is still running.
    pub fn get(&self) -> Option<Statistics> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set(&self, statistics: &Statistics) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(statistics.clone());
    }
}

/// Publishes batch counters to Prometheus and keeps the final statistics.
pub struct StatisticsCallback {
    delegate: Box<dyn Callback>,
    handle: StatisticsHandle,
}

impl StatisticsCallback {
    /// Report into `handle`, which may be shared across tasks.
    pub fn new(delegate: Box<dyn Callback>, handle: StatisticsHandle) -> Self {
        Self { delegate, handle }
    }
}

impl Callback for StatisticsCallback {
    fn task_started(&mut self, statistics: &Statistics) {
        self.delegate.task_started(statistics);
    }

    fn sub_task_started(&mut self, sub_stats: &SubStats) {
        self.delegate.sub_task_started(sub_stats);
    }

    fn batch_started(&mut self, batch: &BatchStats) {
        self.delegate.batch_started(batch);
    }

    fn tile_deleted(&mut self, result: &ResultStat) {
        self.delegate.tile_deleted(result);
    }

    fn batch_ended(&mut self, batch: &BatchStats) {
        let counters = &batch.counters;
        metrics::BATCHES_SENT.inc();
        metrics::OBJECTS_DELETED.inc_by(counters.deleted);
        metrics::BYTES_DELETED.inc_by(counters.bytes_deleted);
        for (class, count) in [
            ("recoverable", counters.recoverable_issues),
            ("non_recoverable", counters.non_recoverable_issues),
            ("unknown", counters.unknown_issues),
        ] {
            if count > 0 {
                metrics::DELETE_ISSUES.with_label_values(&[class]).inc_by(count);
            }
        }
        self.delegate.batch_ended(batch);
    }

    fn sub_task_ended(&mut self, sub_stats: &SubStats) {
        self.delegate.sub_task_ended(sub_stats);
    }

    fn task_ended(&mut self, statistics: &Statistics) {
        metrics::BULK_DELETE_TASKS
            .with_label_values(&[statistics.outcome()])
            .inc();
        metrics::TASK_DURATION.observe(statistics.elapsed().as_seconds_f64());
        match serde_json::to_string(statistics) {
            Ok(json) => debug!(statistics = %json, "bulk delete statistics"),
            Err(e) => warn!(error = %e, "failed to serialize bulk delete statistics"),
        }
        self.handle.set(statistics);
        self.delegate.task_ended(statistics);
    }
}

/// The standard chain: statistics into `handle`, then logging and listener
/// notification.
pub fn default_chain(listeners: ListenerList, handle: StatisticsHandle) -> Box<dyn Callback> {
    let notification = NotificationCallback::new(Box::new(NoopCallback), listeners);
    let logging = LoggingCallback::new(Box::new(notification));
    Box::new(StatisticsCallback::new(Box::new(logging), handle))
}
