//! Crash-safe record of scheduled bulk deletes.
//!
//! The registry is a properties object stored next to the tiles, mapping each
//! scheduled prefix to the epoch milliseconds it was scheduled at. Entries are
//! written before a delete starts and removed after it completes, so a restart
//! finds every delete that never finished. Every read-modify-write runs under
//! the lock keyed by the registry object's own key.

use crate::error::{BlobStoreError, BlobStoreResult};
use crate::lock::LockProvider;
use crate::metrics;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tilestash_core::{keys, properties};
use tilestash_storage::{ObjectStore, StorageError};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const REGISTRY_COMMENT: &str = "pending bulk deletes, prefix=epoch millis";

pub(crate) fn to_millis(timestamp: OffsetDateTime) -> i64 {
    (timestamp.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64) -> BlobStoreResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| BlobStoreError::Registry(format!("timestamp {millis} out of range: {e}")))
}

/// Round up to the next whole second, the precision backends report
/// last-modified times at. Already whole seconds are kept.
pub fn ceil_to_second(timestamp: OffsetDateTime) -> OffsetDateTime {
    if timestamp.nanosecond() == 0 {
        return timestamp;
    }
    let whole = timestamp - time::Duration::nanoseconds(i64::from(timestamp.nanosecond()));
    whole + time::Duration::SECOND
}

/// The pending-delete registry of one cache prefix.
pub struct PendingDeletes {
    store: Arc<dyn ObjectStore>,
    locks: Arc<dyn LockProvider>,
    key: String,
}

impl PendingDeletes {
    pub fn new(store: Arc<dyn ObjectStore>, locks: Arc<dyn LockProvider>, prefix: &str) -> Self {
        Self {
            store,
            locks,
            key: keys::pending_deletes_key(prefix),
        }
    }

    /// Key of the registry object.
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn load(&self) -> BlobStoreResult<BTreeMap<String, i64>> {
        let object = match self.store.get(&self.key).await {
            Ok(object) => object,
            Err(StorageError::NotFound(_)) => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        let text = std::str::from_utf8(&object.data)
            .map_err(|e| BlobStoreError::Registry(format!("not UTF-8: {e}")))?;
        properties::parse(text)?
            .into_iter()
            .map(|(prefix, value)| {
                value
                    .trim()
                    .parse::<i64>()
                    .map(|millis| (prefix, millis))
                    .map_err(|e| {
                        BlobStoreError::Registry(format!("bad timestamp {value:?}: {e}"))
                    })
            })
            .collect()
    }

    async fn save(&self, entries: &BTreeMap<String, i64>) -> BlobStoreResult<()> {
        metrics::PENDING_DELETES.set(entries.len() as i64);
        if entries.is_empty() {
            return match self.store.delete(&self.key).await {
                Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
        let values: BTreeMap<String, String> = entries
            .iter()
            .map(|(prefix, millis)| (prefix.clone(), millis.to_string()))
            .collect();
        let text = properties::render(&values, Some(REGISTRY_COMMENT));
        self.store
            .put(&self.key, Bytes::from(text), Some("text/plain"))
            .await?;
        Ok(())
    }

    /// Run `f` on the entries while holding the registry lock.
    async fn locked<T, F, Fut>(&self, f: F) -> BlobStoreResult<T>
    where
        F: FnOnce(BTreeMap<String, i64>) -> Fut,
        Fut: Future<Output = BlobStoreResult<T>>,
    {
        let lock = self.locks.acquire(&self.key).await?;
        let result = match self.load().await {
            Ok(entries) => f(entries).await,
            Err(e) => Err(e),
        };
        if let Err(e) = lock.release().await {
            warn!(key = %self.key, error = %e, "failed to release registry lock");
        }
        result
    }

    /// All pending prefixes with their scheduling timestamps.
    pub async fn entries(&self) -> BlobStoreResult<BTreeMap<String, OffsetDateTime>> {
        self.locked(|entries| async move {
            metrics::PENDING_DELETES.set(entries.len() as i64);
            entries
                .into_iter()
                .map(|(prefix, millis)| Ok((prefix, from_millis(millis)?)))
                .collect()
        })
        .await
    }

    /// Record `prefix` as scheduled at `timestamp`. An existing newer entry is
    /// kept.
    pub async fn record(&self, prefix: &str, timestamp: OffsetDateTime) -> BlobStoreResult<()> {
        let millis = to_millis(timestamp);
        self.locked(|mut entries| async move {
            let current = entries.entry(prefix.to_string()).or_insert(millis);
            if *current < millis {
                *current = millis;
            }
            self.save(&entries).await?;
            debug!(prefix = %prefix, millis, "recorded pending delete");
            Ok(())
        })
        .await
    }

    /// Remove the entry for `prefix` unless a delete scheduled after
    /// `timestamp` owns it now. Returns whether the entry was removed.
    pub async fn resolve(&self, prefix: &str, timestamp: OffsetDateTime) -> BlobStoreResult<bool> {
        let millis = to_millis(timestamp);
        self.locked(|mut entries| async move {
            match entries.get(prefix).copied() {
                None => Ok(false),
                Some(stored) if stored > millis => {
                    info!(
                        prefix = %prefix,
                        stored,
                        finished = millis,
                        "pending delete superseded by a newer one, keeping entry"
                    );
                    Ok(false)
                }
                Some(_) => {
                    entries.remove(prefix);
                    self.save(&entries).await?;
                    debug!(prefix = %prefix, "cleared pending delete");
                    Ok(true)
                }
            }
        })
        .await
    }
}

impl std::fmt::Debug for PendingDeletes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDeletes")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
