//! Server test utilities.

use std::sync::Arc;
use tilestash_blobstore::{StaticLayerCatalog, TileBlobStore};
use tilestash_core::MimeType;
use tilestash_core::config::{AppConfig, LayerConfig, ServerConfig};
use tilestash_server::{AppState, create_router};
use tilestash_storage::{MemoryBackend, ObjectStore};

pub const LAYER_NAME: &str = "topp:states";
pub const LAYER_ID: &str = "states";

/// A router over an in-memory store.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub memory: Arc<MemoryBackend>,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        Self::with_server_config(ServerConfig::default()).await
    }

    pub async fn with_server_config(server: ServerConfig) -> Self {
        let memory = Arc::new(MemoryBackend::new());
        let storage: Arc<dyn ObjectStore> = memory.clone();

        let config = AppConfig {
            server,
            layers: vec![LayerConfig {
                name: LAYER_NAME.to_string(),
                id: Some(LAYER_ID.to_string()),
                grid_sets: vec!["EPSG:4326".to_string()],
                formats: vec![MimeType::Png],
            }],
            ..AppConfig::for_testing()
        };

        let catalog = Arc::new(StaticLayerCatalog::from_config(&config.layers));
        let blobstore = TileBlobStore::new(
            storage.clone(),
            catalog,
            config.storage.bucket(),
            &config.blobstore,
        )
        .await
        .expect("failed to create blob store");

        let state = AppState::new(config, storage, blobstore);
        let router = create_router(state.clone());
        Self {
            router,
            state,
            memory,
        }
    }
}
