//! Keyed locks guarding bulk deletes and the pending-delete registry.
//!
//! A lock is identified by a string, usually a scope path or the registry key.
//! The provider is injected so a deployment running several servers against
//! one bucket can swap in a distributed implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to acquire lock {key}: {reason}")]
    Acquire { key: String, reason: String },

    #[error("failed to release lock {key}: {reason}")]
    Release { key: String, reason: String },
}

/// Grants exclusive locks by key.
#[async_trait]
pub trait LockProvider: Send + Sync + 'static {
    /// Wait until the lock for `key` is free and take it.
    async fn acquire(&self, key: &str) -> Result<Box<dyn Lock>, LockError>;
}

/// A held lock. Dropping it without calling `release` also frees it.
#[async_trait]
pub trait Lock: Send {
    fn key(&self) -> &str;

    async fn release(self: Box<Self>) -> Result<(), LockError>;
}

/// Per-key mutexes for a single process.
#[derive(Clone, Debug, Default)]
pub struct InProcessLockProvider {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InProcessLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a live mutex, held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[async_trait]
impl LockProvider for InProcessLockProvider {
    async fn acquire(&self, key: &str) -> Result<Box<dyn Lock>, LockError> {
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        trace!(key = %key, "lock acquired");
        Ok(Box::new(InProcessLock {
            key: key.to_string(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }))
    }
}

struct InProcessLock {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InProcessLock {
    fn unlock(&mut self) {
        if self.guard.take().is_some() {
            // Only the map's reference left means nobody is waiting.
            self.locks
                .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
            trace!(key = %self.key, "lock released");
        }
    }
}

#[async_trait]
impl Lock for InProcessLock {
    fn key(&self) -> &str {
        &self.key
    }

    async fn release(mut self: Box<Self>) -> Result<(), LockError> {
        self.unlock();
        Ok(())
    }
}

impl Drop for InProcessLock {
    fn drop(&mut self) {
        self.unlock();
    }
}
