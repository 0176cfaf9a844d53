//! Prometheus metrics for bulk deletes.
//!
//! Metrics carry no layer names or keys, only aggregate counts by outcome.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static BULK_DELETE_TASKS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tilestash_bulk_delete_tasks_total",
            "Bulk delete tasks finished, by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static OBJECTS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tilestash_bulk_delete_objects_deleted_total",
        "Objects reported deleted by bulk deletes",
    )
    .expect("metric creation failed")
});

pub static BYTES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tilestash_bulk_delete_bytes_deleted_total",
        "Bytes of tile data removed by bulk deletes",
    )
    .expect("metric creation failed")
});

pub static BATCHES_SENT: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tilestash_bulk_delete_batches_total",
        "Delete batches sent to the storage backend",
    )
    .expect("metric creation failed")
});

pub static DELETE_ISSUES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tilestash_bulk_delete_issues_total",
            "Failed delete calls and keys, by error class",
        ),
        &["class"],
    )
    .expect("metric creation failed")
});

pub static TASK_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "tilestash_bulk_delete_duration_seconds",
            "Wall time of a bulk delete task",
        )
        .buckets(vec![
            0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0,
        ]),
    )
    .expect("metric creation failed")
});

pub static QUEUED_DELETES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "tilestash_bulk_delete_queued",
        "Bulk deletes waiting for a worker slot",
    )
    .expect("metric creation failed")
});

pub static ACTIVE_DELETES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "tilestash_bulk_delete_active",
        "Bulk deletes currently running",
    )
    .expect("metric creation failed")
});

pub static PENDING_DELETES: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "tilestash_pending_deletes",
        "Entries in the pending-delete registry",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call multiple times; registration happens once.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(BULK_DELETE_TASKS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(OBJECTS_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BATCHES_SENT.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DELETE_ISSUES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TASK_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(QUEUED_DELETES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACTIVE_DELETES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PENDING_DELETES.clone()))
            .expect("metric registration failed");
    });
}
