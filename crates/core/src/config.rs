//! Configuration types shared across crates.

use crate::format::MimeType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest batch accepted by the S3 `DeleteObjects` call.
pub const MAX_DELETE_BATCH_SIZE: usize = 1000;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, restrict this endpoint to the scraper at the
    /// network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-process storage, lost on restart. Intended for tests and demos.
    Memory {
        /// Bucket name reported by the backend.
        #[serde(default = "default_memory_bucket")]
        bucket: String,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (e.g., `endpoint/bucket/key` instead of `bucket.endpoint/key`).
        /// Required for MinIO and some S3-compatible services.
        /// Defaults to false (virtual-hosted style).
        #[serde(default)]
        force_path_style: bool,
    },
}

fn default_memory_bucket() -> String {
    "tiles".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory {
            bucket: default_memory_bucket(),
        }
    }
}

impl StorageConfig {
    /// Bucket the backend operates on.
    pub fn bucket(&self) -> &str {
        match self {
            Self::Memory { bucket } | Self::S3 { bucket, .. } => bucket,
        }
    }

    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket().trim().is_empty() {
            return Err("storage.bucket must not be blank".to_string());
        }
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Memory { .. } => Ok(()),
        }
    }
}

/// Tile blob store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    /// Root key prefix for all cache objects (may be empty).
    #[serde(default)]
    pub prefix: String,
    /// Keys per delete request (1..=1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Bulk deletes allowed to run at the same time.
    #[serde(default = "default_max_concurrent_deletes")]
    pub max_concurrent_deletes: usize,
    /// How long shutdown waits for running deletes to finish their batch.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_batch_size() -> usize {
    MAX_DELETE_BATCH_SIZE
}

fn default_max_concurrent_deletes() -> usize {
    4
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            batch_size: default_batch_size(),
            max_concurrent_deletes: default_max_concurrent_deletes(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl BlobStoreConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Validate blob store configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_DELETE_BATCH_SIZE).contains(&self.batch_size) {
            return Err(format!(
                "blobstore.batch_size must be between 1 and {MAX_DELETE_BATCH_SIZE}, got {}",
                self.batch_size
            ));
        }
        if self.max_concurrent_deletes == 0 {
            return Err("blobstore.max_concurrent_deletes cannot be 0".to_string());
        }
        if self.prefix.contains("//") || self.prefix.starts_with('/') {
            return Err(format!(
                "blobstore.prefix {:?} must not start with '/' or contain empty segments",
                self.prefix
            ));
        }
        Ok(())
    }
}

/// A cached layer known to the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Layer name used in requests.
    pub name: String,
    /// Stable id used in object keys; defaults to the name.
    #[serde(default)]
    pub id: Option<String>,
    /// Grid sets the layer is cached in.
    #[serde(default)]
    pub grid_sets: Vec<String>,
    /// Cached formats.
    #[serde(default)]
    pub formats: Vec<MimeType>,
}

impl LayerConfig {
    pub fn layer_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("layers[].name must not be blank".to_string());
        }
        let id = self.layer_id();
        if id.trim().is_empty() || id.contains('/') {
            return Err(format!("layer {:?} has an invalid id {id:?}", self.name));
        }
        if let Some(grid) = self.grid_sets.iter().find(|g| g.is_empty() || g.contains('/')) {
            return Err(format!(
                "layer {:?} has an invalid grid set {grid:?}",
                self.name
            ));
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Tile blob store configuration.
    #[serde(default)]
    pub blobstore: BlobStoreConfig,
    /// Cached layers.
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl AppConfig {
    /// Create a test configuration: in-memory storage, no layers.
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// Validate every section, stopping at the first error.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.blobstore.validate()?;
        for layer in &self.layers {
            layer.validate()?;
        }
        let mut names: Vec<&str> = self.layers.iter().map(|l| l.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(format!("layer {:?} is configured twice", pair[0]));
        }
        Ok(())
    }
}
