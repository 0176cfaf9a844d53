//! Lazy batching of listed objects.
//!
//! Listings are pulled one page at a time and cut into batches of at most
//! `batch_size` objects, so memory stays bounded by one page plus one batch no
//! matter how many objects live under a prefix.

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tilestash_core::{TileBounds, TileKey, ZoomScope};
use tilestash_storage::{
    ListingOptions, ObjectStore, ObjectStoreListStreamExt, ObjectSummary, StorageError,
};
use time::OffsetDateTime;
use tracing::warn;

/// Bounded zoom levels wider than this are listed through the zoom prefix
/// instead of one listing per column.
pub const MAX_COLUMN_PREFIXES: u64 = 1024;

pub type BatchStream<'a> =
    Pin<Box<dyn Stream<Item = Result<Vec<ObjectSummary>, StorageError>> + Send + 'a>>;

/// Excludes objects written after a delete was scheduled.
///
/// Objects without a last-modified time are kept, since nothing proves they
/// predate the delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimestampFilter {
    timestamp: OffsetDateTime,
}

impl TimestampFilter {
    pub fn new(timestamp: OffsetDateTime) -> Self {
        Self { timestamp }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn accepts(&self, object: &ObjectSummary) -> bool {
        object
            .last_modified
            .is_some_and(|modified| modified <= self.timestamp)
    }
}

/// Keeps only tiles inside a bounding box. Keys that are not tile keys are
/// logged and skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundsFilter {
    bounds: TileBounds,
}

impl BoundsFilter {
    pub fn new(bounds: TileBounds) -> Self {
        Self { bounds }
    }

    pub fn accepts(&self, object: &ObjectSummary) -> bool {
        match TileKey::parse(&object.key) {
            Ok(key) => self.bounds.contains(key.x, key.y),
            Err(e) => {
                warn!(key = %object.key, error = %e, "skipping malformed key in bounded delete");
                false
            }
        }
    }
}

/// Filters applied to every listed object before it is batched.
#[derive(Clone, Copy, Debug)]
pub struct ObjectFilter {
    pub timestamp: TimestampFilter,
    pub bounds: Option<BoundsFilter>,
}

impl ObjectFilter {
    pub fn new(timestamp: OffsetDateTime) -> Self {
        Self {
            timestamp: TimestampFilter::new(timestamp),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: TileBounds) -> Self {
        self.bounds = Some(BoundsFilter::new(bounds));
        self
    }

    pub fn accepts(&self, object: &ObjectSummary) -> bool {
        self.timestamp.accepts(object) && self.bounds.is_none_or(|b| b.accepts(object))
    }
}

/// Listing prefixes for a zoom level: one per column of its bounds when that
/// stays manageable, otherwise the whole zoom prefix.
pub fn zoom_prefixes(zoom: &ZoomScope) -> Vec<String> {
    match zoom.bounds() {
        Some(bounds) if bounds.width() <= MAX_COLUMN_PREFIXES => (bounds.min_x..=bounds.max_x)
            .map(|x| zoom.column_prefix(x))
            .collect(),
        _ => vec![zoom.path()],
    }
}

/// Stream the objects under `prefixes` that pass `filter`, in batches of at
/// most `batch_size`.
///
/// A batch may span prefixes. A listing error ends the stream after yielding
/// the error; objects collected before it are not yielded.
pub fn batches<'a>(
    store: &'a dyn ObjectStore,
    prefixes: Vec<String>,
    filter: ObjectFilter,
    batch_size: usize,
) -> BatchStream<'a> {
    let batch_size = batch_size.max(1);
    Box::pin(try_stream! {
        let mut batch = Vec::with_capacity(batch_size);
        for prefix in prefixes {
            let mut objects = store.list_objects(&prefix, Some(ListingOptions::new(batch_size)));
            while let Some(object) = objects.next().await {
                let object = object?;
                if !filter.accepts(&object) {
                    continue;
                }
                batch.push(object);
                if batch.len() == batch_size {
                    yield std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                }
            }
        }
        if !batch.is_empty() {
            yield batch;
        }
    })
}
