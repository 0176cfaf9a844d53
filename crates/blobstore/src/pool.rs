//! Bounded pool running bulk deletes in the background.

use crate::error::{BlobStoreError, BlobStoreResult};
use crate::metrics;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Runs submitted work with at most `max_concurrent` jobs active at once.
///
/// Shutting down cancels the token handed to running jobs and drops jobs
/// still waiting for a slot. Running jobs are expected to stop at their next
/// batch boundary.
#[derive(Clone, Debug)]
pub struct DeletePool {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl DeletePool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Queue a job. `work` receives a token cancelled on shutdown.
    pub fn submit<F, Fut>(&self, name: String, work: F) -> BlobStoreResult<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(BlobStoreError::ShutDown);
        }

        let semaphore = self.semaphore.clone();
        let shutdown = self.shutdown.clone();
        metrics::QUEUED_DELETES.inc();
        self.tracker.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            metrics::QUEUED_DELETES.dec();
            let Some(_permit) = permit else {
                debug!(job = %name, "dropping queued bulk delete");
                return;
            };

            metrics::ACTIVE_DELETES.inc();
            work(shutdown.child_token()).await;
            metrics::ACTIVE_DELETES.dec();
        });
        Ok(())
    }

    /// Jobs queued or running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Wait until every submitted job has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stop accepting work, cancel running jobs and wait up to `grace` for
    /// them. Returns whether all jobs finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tracker.close();
        let remaining = self.tracker.len();
        if remaining > 0 {
            info!(jobs = remaining, "waiting for bulk deletes to stop");
        }
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    jobs = self.tracker.len(),
                    grace_ms = grace.as_millis() as u64,
                    "bulk deletes still running after shutdown grace period"
                );
                false
            }
        }
    }
}
