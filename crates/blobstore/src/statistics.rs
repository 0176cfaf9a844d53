//! Counters collected while a bulk delete runs.
//!
//! A [`Statistics`] describes a whole task and holds one [`SubStats`] per leaf
//! scope. Each sub-task folds in the [`BatchStats`] of its batches, and each
//! batch carries a [`ResultStat`] per object the backend reported deleted.
//! All counters only grow; merging is plain summation.

use crate::task::DeleteStrategy;
use serde::Serialize;
use tilestash_core::{DeleteScope, TileKey};
use tilestash_storage::ErrorClass;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Objects that passed the filters and were sent in a batch.
    pub processed: u64,
    /// Objects the backend reported deleted.
    pub deleted: u64,
    pub batches_sent: u64,
    pub bytes_deleted: u64,
    pub recoverable_issues: u64,
    pub non_recoverable_issues: u64,
    pub unknown_issues: u64,
    /// Smallest batch sent, zero until one was sent.
    pub batch_low_tide: u64,
    pub batch_high_tide: u64,
}

impl Counters {
    pub fn record_issue(&mut self, class: ErrorClass) {
        match class {
            ErrorClass::Recoverable => self.recoverable_issues += 1,
            ErrorClass::NonRecoverable => self.non_recoverable_issues += 1,
            ErrorClass::Unknown => self.unknown_issues += 1,
        }
    }

    pub fn issues(&self) -> u64 {
        self.recoverable_issues + self.non_recoverable_issues + self.unknown_issues
    }

    fn record_batch_size(&mut self, size: u64) {
        self.batches_sent += 1;
        self.batch_low_tide = if self.batch_low_tide == 0 {
            size
        } else {
            self.batch_low_tide.min(size)
        };
        self.batch_high_tide = self.batch_high_tide.max(size);
    }

    pub fn merge(&mut self, other: &Counters) {
        self.processed += other.processed;
        self.deleted += other.deleted;
        self.batches_sent += other.batches_sent;
        self.bytes_deleted += other.bytes_deleted;
        self.recoverable_issues += other.recoverable_issues;
        self.non_recoverable_issues += other.non_recoverable_issues;
        self.unknown_issues += other.unknown_issues;
        if other.batch_low_tide > 0 {
            self.batch_low_tide = if self.batch_low_tide == 0 {
                other.batch_low_tide
            } else {
                self.batch_low_tide.min(other.batch_low_tide)
            };
        }
        self.batch_high_tide = self.batch_high_tide.max(other.batch_high_tide);
    }
}

/// One object the backend reported deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultStat {
    pub key: String,
    /// Parsed key, absent for objects that are not tiles (metadata files).
    pub tile: Option<TileKey>,
    pub size: u64,
    pub deleted_at: OffsetDateTime,
}

impl ResultStat {
    pub fn new(key: impl Into<String>, size: u64, deleted_at: OffsetDateTime) -> Self {
        let key = key.into();
        Self {
            tile: TileKey::parse(&key).ok(),
            key,
            size,
            deleted_at,
        }
    }
}

/// Outcome of one delete call.
#[derive(Clone, Debug, Default)]
pub struct BatchStats {
    /// Keys sent.
    pub size: u64,
    pub counters: Counters,
    pub results: Vec<ResultStat>,
}

impl BatchStats {
    pub fn new(size: usize) -> Self {
        let size = size as u64;
        let mut counters = Counters {
            processed: size,
            ..Counters::default()
        };
        counters.record_batch_size(size);
        Self {
            size,
            counters,
            results: Vec::with_capacity(size as usize),
        }
    }

    pub fn record_deleted(&mut self, result: ResultStat) {
        self.counters.deleted += 1;
        self.counters.bytes_deleted += result.size;
        self.results.push(result);
    }

    pub fn record_issue(&mut self, class: ErrorClass) {
        self.counters.record_issue(class);
    }
}

/// Progress of one leaf scope.
#[derive(Clone, Debug, Serialize)]
pub struct SubStats {
    #[serde(skip)]
    pub scope: DeleteScope,
    #[serde(rename = "scope")]
    pub path: String,
    pub kind: &'static str,
    pub strategy: DeleteStrategy,
    #[serde(flatten)]
    pub counters: Counters,
    /// Cancelled before the listing was exhausted.
    pub interrupted: bool,
}

impl SubStats {
    pub fn new(scope: DeleteScope, strategy: DeleteStrategy) -> Self {
        Self {
            path: scope.path(),
            kind: scope.kind(),
            scope,
            strategy,
            counters: Counters::default(),
            interrupted: false,
        }
    }

    pub fn add_batch(&mut self, batch: &BatchStats) {
        self.counters.merge(&batch.counters);
    }

    /// No errors of any class and not cut short.
    pub fn completed(&self) -> bool {
        self.counters.issues() == 0 && !self.interrupted
    }
}

/// Progress of a whole task.
#[derive(Clone, Debug, Serialize)]
pub struct Statistics {
    pub task_id: Uuid,
    #[serde(rename = "scope")]
    pub path: String,
    pub kind: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub counters: Counters,
    pub sub_stats: Vec<SubStats>,
    pub interrupted: bool,
}

impl Statistics {
    pub fn new(task_id: Uuid, scope: &DeleteScope) -> Self {
        Self {
            task_id,
            path: scope.path(),
            kind: scope.kind(),
            started_at: OffsetDateTime::now_utc(),
            ended_at: None,
            counters: Counters::default(),
            sub_stats: Vec::new(),
            interrupted: false,
        }
    }

    pub fn add_sub_stats(&mut self, sub: SubStats) {
        self.counters.merge(&sub.counters);
        self.interrupted |= sub.interrupted;
        self.sub_stats.push(sub);
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(OffsetDateTime::now_utc());
    }

    pub fn completed(&self) -> bool {
        self.counters.issues() == 0 && !self.interrupted
    }

    /// `completed`, `failed` or `interrupted`; used as a metric label.
    pub fn outcome(&self) -> &'static str {
        if self.interrupted {
            "interrupted"
        } else if self.counters.issues() > 0 {
            "failed"
        } else {
            "completed"
        }
    }

    pub fn elapsed(&self) -> time::Duration {
        self.ended_at.unwrap_or_else(OffsetDateTime::now_utc) - self.started_at
    }
}
