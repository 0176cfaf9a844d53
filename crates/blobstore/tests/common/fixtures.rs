#![allow(dead_code)]

use bytes::Bytes;
use std::sync::Arc;
use tilestash_blobstore::layers::{LayerInfo, StaticLayerCatalog};
use tilestash_core::config::BlobStoreConfig;
use tilestash_core::{LayerScope, MimeType, ParametersScope, TileBounds, keys};
use tilestash_storage::{MemoryBackend, ObjectStore};
use time::{Duration, OffsetDateTime};

pub const PREFIX: &str = "prefix";
pub const BUCKET: &str = "bucket";
pub const LAYER_ID: &str = "layer-id";
pub const LAYER_NAME: &str = "layer-name";
pub const GRID_SET_IDS: [&str; 2] = ["EPSG:4326", "EPSG:900913"];
pub const FORMATS: [&str; 2] = ["png", "jpeg"];
pub const PARAMETERS_ID: &str = "75595e9159afae9c4669aee57366de8c196a57e1";
pub const BATCH_SIZE: usize = 100;
pub const ZOOM: i64 = 4;

pub fn layer_scope() -> LayerScope {
    LayerScope::new(PREFIX, BUCKET, LAYER_ID, LAYER_NAME).unwrap()
}

pub fn parameters_scope(grid_set_id: &str, format: &str) -> ParametersScope {
    layer_scope()
        .grid_set(grid_set_id)
        .unwrap()
        .parameters(format, PARAMETERS_ID)
        .unwrap()
}

/// The 4x4 block at zoom 4 used by the bounded delete scenario.
pub fn bounds() -> TileBounds {
    TileBounds::new(0, 0, 3, 3).unwrap()
}

pub fn layer_info() -> LayerInfo {
    LayerInfo {
        name: LAYER_NAME.to_string(),
        id: LAYER_ID.to_string(),
        grid_set_ids: GRID_SET_IDS.iter().map(|g| g.to_string()).collect(),
        formats: vec![MimeType::Png, MimeType::Jpeg],
    }
}

pub fn catalog() -> Arc<StaticLayerCatalog> {
    Arc::new(StaticLayerCatalog::new([layer_info()]))
}

pub fn config() -> BlobStoreConfig {
    BlobStoreConfig {
        prefix: PREFIX.to_string(),
        batch_size: BATCH_SIZE,
        max_concurrent_deletes: 2,
        shutdown_grace_secs: 1,
    }
}

/// A whole second safely before anything written by the test.
pub fn past() -> OffsetDateTime {
    OffsetDateTime::now_utc().replace_nanosecond(0).unwrap() - Duration::minutes(10)
}

pub fn tile_key(grid_set_id: &str, format: &str, z: i64, x: i64, y: i64) -> String {
    keys::to_key(
        PREFIX,
        LAYER_ID,
        grid_set_id,
        format,
        PARAMETERS_ID,
        z,
        x,
        y,
        format,
    )
}

/// Write every tile of `bounds` at zoom `z`, last modified at `at`.
pub async fn seed_tiles(
    store: &MemoryBackend,
    grid_set_id: &str,
    format: &str,
    z: i64,
    bounds: TileBounds,
    at: OffsetDateTime,
) -> Vec<String> {
    let mut keys = Vec::new();
    for x in bounds.min_x..=bounds.max_x {
        for y in bounds.min_y..=bounds.max_y {
            let key = tile_key(grid_set_id, format, z, x, y);
            store
                .put_with_last_modified(&key, Bytes::from_static(b"tile"), at)
                .await;
            keys.push(key);
        }
    }
    keys
}

/// Write `count` tiles in one column of zoom `z`.
pub async fn seed_column(
    store: &MemoryBackend,
    grid_set_id: &str,
    format: &str,
    z: i64,
    count: i64,
    at: OffsetDateTime,
) -> Vec<String> {
    seed_tiles(
        store,
        grid_set_id,
        format,
        z,
        TileBounds::new(0, 0, 0, count - 1).unwrap(),
        at,
    )
    .await
}

pub async fn remaining(store: &MemoryBackend, prefix: &str) -> Vec<String> {
    store
        .keys()
        .await
        .into_iter()
        .filter(|k| k.starts_with(prefix))
        .collect()
}

pub fn as_store(store: &Arc<MemoryBackend>) -> Arc<dyn ObjectStore> {
    store.clone()
}
