//! Application state shared across handlers.

use std::sync::Arc;
use tilestash_blobstore::TileBlobStore;
use tilestash_core::config::AppConfig;
use tilestash_storage::ObjectStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStore>,
    pub blobstore: TileBlobStore,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>, blobstore: TileBlobStore) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            blobstore,
        }
    }
}
