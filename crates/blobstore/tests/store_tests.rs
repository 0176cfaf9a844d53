// Tile blob store facade: tile operations, scheduled bulk deletes, metadata

mod common;

use bytes::Bytes;
use common::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tilestash_blobstore::error::BlobStoreError;
use tilestash_blobstore::listener::TileStoreListener;
use tilestash_blobstore::store::TileBlobStore;
use tilestash_core::{DeleteScope, MimeType, TileBounds, TileCoord, TileObject, TileRange, keys};
use tilestash_storage::{MemoryBackend, ObjectStore};
use tokio::time::Duration as StdDuration;

async fn open(memory: &Arc<MemoryBackend>) -> (TileBlobStore, Arc<CaptureListener>) {
    let store = TileBlobStore::new(as_store(memory), catalog(), BUCKET, &config())
        .await
        .unwrap();
    let listener = Arc::new(CaptureListener::default());
    store.add_listener(listener.clone());
    (store, listener)
}

fn tile(x: i64, y: i64) -> TileObject {
    TileObject::new(LAYER_NAME, "EPSG:4326", MimeType::Png, TileCoord::new(x, y, ZOOM))
        .with_parameters_id(PARAMETERS_ID)
}

#[tokio::test]
async fn put_get_and_delete_a_tile() {
    let memory = Arc::new(MemoryBackend::new());
    let (store, listener) = open(&memory).await;

    store
        .put(&tile(1, 2).with_blob(Bytes::from_static(b"abc")))
        .await
        .unwrap();
    assert!(memory.exists(&tile_key("EPSG:4326", "png", ZOOM, 1, 2)).await.unwrap());
    store
        .put(&tile(1, 2).with_blob(Bytes::from_static(b"abcdef")))
        .await
        .unwrap();

    let mut read = tile(1, 2);
    assert!(store.get(&mut read).await.unwrap());
    assert_eq!(read.blob, Bytes::from_static(b"abcdef"));
    assert!(read.created.is_some());

    assert!(store.delete_tile(&tile(1, 2)).await.unwrap());
    assert!(!store.delete_tile(&tile(1, 2)).await.unwrap());
    assert!(!store.get(&mut tile(1, 2)).await.unwrap());

    assert_eq!(
        listener.events(),
        vec![
            "stored layer-name 4/1/2",
            "updated layer-name 4/1/2 3",
            "deleted layer-name 4/1/2",
        ]
    );
}

#[tokio::test]
async fn removed_listeners_hear_nothing() {
    let memory = Arc::new(MemoryBackend::new());
    let (store, listener) = open(&memory).await;
    let as_listener: Arc<dyn TileStoreListener> = listener.clone();
    assert!(store.remove_listener(&as_listener));
    assert!(!store.remove_listener(&as_listener));

    store
        .put(&tile(0, 0).with_blob(Bytes::from_static(b"x")))
        .await
        .unwrap();
    assert!(store.delete_tile(&tile(0, 0)).await.unwrap());
    assert!(listener.events().is_empty());
}

#[tokio::test]
async fn unknown_layers_are_rejected() {
    let memory = Arc::new(MemoryBackend::new());
    let (store, _) = open(&memory).await;
    let stray = TileObject::new("nope", "EPSG:4326", MimeType::Png, TileCoord::new(0, 0, 0));

    assert!(matches!(
        store.put(&stray).await,
        Err(BlobStoreError::UnknownLayer(name)) if name == "nope"
    ));
    assert!(matches!(
        store.delete_layer("nope").await,
        Err(BlobStoreError::UnknownLayer(_))
    ));
}

#[tokio::test]
async fn invalid_configuration_is_rejected() {
    let memory = Arc::new(MemoryBackend::new());
    let mut bad = config();
    bad.batch_size = 1001;
    let result = TileBlobStore::new(as_store(&memory), catalog(), BUCKET, &bad).await;
    assert!(matches!(result, Err(BlobStoreError::Config(_))));

    let result = TileBlobStore::new(as_store(&memory), catalog(), "  ", &config()).await;
    assert!(matches!(result, Err(BlobStoreError::Config(_))));
}

#[tokio::test]
async fn tile_parameters_are_recorded_once() {
    let memory = Arc::new(MemoryBackend::new());
    let (store, _) = open(&memory).await;
    let mut parameters = BTreeMap::new();
    parameters.insert("STYLES".to_string(), "night".to_string());
    parameters.insert("CQL_FILTER".to_string(), "a=1".to_string());

    for x in 0..3 {
        let tile = TileObject::new(LAYER_NAME, "EPSG:4326", MimeType::Png, TileCoord::new(x, 0, 2))
            .with_parameters(parameters.clone())
            .with_blob(Bytes::from_static(b"t"));
        store.put(&tile).await.unwrap();
    }

    assert_eq!(store.parameters(LAYER_NAME).await.unwrap(), vec![parameters]);
}

#[tokio::test]
async fn layer_metadata_round_trips() {
    let memory = Arc::new(MemoryBackend::new());
    let (store, _) = open(&memory).await;

    assert_eq!(store.layer_metadata(LAYER_NAME, "title").await.unwrap(), None);
    store
        .put_layer_metadata(LAYER_NAME, "title", "Roads")
        .await
        .unwrap();
    store
        .put_layer_metadata(LAYER_NAME, "bbox:4326", "a=b")
        .await
        .unwrap();

    assert_eq!(
        store.layer_metadata(LAYER_NAME, "title").await.unwrap().as_deref(),
        Some("Roads")
    );
    assert_eq!(
        store.layer_metadata(LAYER_NAME, "bbox:4326").await.unwrap().as_deref(),
        Some("a=b")
    );
    assert!(store.layer_exists(LAYER_NAME).await.unwrap());
}

#[tokio::test]
async fn delete_layer_removes_tiles_and_metadata() {
    let memory = Arc::new(MemoryBackend::new());
    for grid in GRID_SET_IDS {
        seed_column(&memory, grid, "png", ZOOM, 150, past()).await;
    }
    let (store, listener) = open(&memory).await;
    store
        .put_layer_metadata(LAYER_NAME, "title", "Roads")
        .await
        .unwrap();

    assert!(store.delete_layer(LAYER_NAME).await.unwrap());
    store.wait_idle().await;

    assert!(!store.layer_exists(LAYER_NAME).await.unwrap());
    assert_eq!(store.layer_metadata(LAYER_NAME, "title").await.unwrap(), None);
    assert!(listener.events().contains(&"layer_deleted layer-name".to_string()));
    assert!(store.registry().entries().await.unwrap().is_empty());

    // Nothing left to delete.
    assert!(!store.delete_layer(LAYER_NAME).await.unwrap());
}

#[tokio::test]
async fn delete_by_grid_set_keeps_other_grids() {
    let memory = Arc::new(MemoryBackend::new());
    seed_column(&memory, "EPSG:4326", "png", ZOOM, 20, past()).await;
    let kept = seed_column(&memory, "EPSG:900913", "png", ZOOM, 5, past()).await;
    let (store, listener) = open(&memory).await;

    assert!(store.delete_by_grid_set(LAYER_NAME, "EPSG:4326").await.unwrap());
    store.wait_idle().await;

    assert_eq!(remaining(&memory, PREFIX).await, kept);
    assert_eq!(
        listener.events(),
        vec!["grid_subset_deleted layer-name EPSG:4326"]
    );
}

#[tokio::test]
async fn delete_by_parameters_id_covers_every_grid_and_format() {
    let memory = Arc::new(MemoryBackend::new());
    for grid in GRID_SET_IDS {
        for format in FORMATS {
            seed_column(&memory, grid, format, ZOOM, 10, past()).await;
        }
    }
    let other = keys::to_key(PREFIX, LAYER_ID, "EPSG:4326", "png", "other-id", ZOOM, 0, 0, "png");
    memory
        .put_with_last_modified(&other, Bytes::from_static(b"o"), past())
        .await;
    let metadata = keys::parameters_metadata_key(PREFIX, LAYER_ID, PARAMETERS_ID);
    memory
        .put_with_last_modified(&metadata, Bytes::from_static(b"STYLES=night\n"), past())
        .await;
    let (store, listener) = open(&memory).await;

    assert!(store
        .delete_by_parameters_id(LAYER_NAME, PARAMETERS_ID)
        .await
        .unwrap());
    store.wait_idle().await;

    assert_eq!(remaining(&memory, PREFIX).await, vec![other]);
    assert_eq!(
        listener.events(),
        vec![format!("parameters_deleted layer-name {PARAMETERS_ID}")]
    );
    assert!(store.registry().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_range_honours_per_zoom_bounds() {
    let memory = Arc::new(MemoryBackend::new());
    let whole_zoom = seed_column(&memory, "EPSG:4326", "png", 3, 5, past()).await;
    let inside = seed_tiles(&memory, "EPSG:4326", "png", ZOOM, bounds(), past()).await;
    let outside = seed_tiles(
        &memory,
        "EPSG:4326",
        "png",
        ZOOM,
        TileBounds::new(4, 4, 5, 5).unwrap(),
        past(),
    )
    .await;
    let (store, listener) = open(&memory).await;

    let range = TileRange::new(LAYER_NAME, "EPSG:4326", MimeType::Png, 3, ZOOM)
        .unwrap()
        .with_bounds(ZOOM, bounds())
        .unwrap()
        .with_parameters_id(PARAMETERS_ID);
    assert!(store.delete_range(&range).await.unwrap());
    store.wait_idle().await;

    for key in whole_zoom.iter().chain(&inside) {
        assert!(!memory.exists(key).await.unwrap(), "{key} survived");
    }
    let mut left = remaining(&memory, PREFIX).await;
    left.sort();
    let mut expected = outside;
    expected.sort();
    assert_eq!(left, expected);

    let deleted = listener
        .events()
        .iter()
        .filter(|e| e.starts_with("deleted "))
        .count();
    assert_eq!(deleted, whole_zoom.len() + inside.len());
    assert!(store.registry().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn rename_reports_layers_with_objects() {
    let memory = Arc::new(MemoryBackend::new());
    let (store, listener) = open(&memory).await;
    assert!(!store.rename("old-name", LAYER_NAME).await.unwrap());

    seed_column(&memory, "EPSG:4326", "png", ZOOM, 1, past()).await;
    assert!(store.rename("old-name", LAYER_NAME).await.unwrap());
    assert_eq!(listener.events(), vec!["layer_renamed old-name layer-name"]);
}

#[tokio::test]
async fn tiles_pending_deletion_are_hidden() {
    let memory = Arc::new(MemoryBackend::new());
    seed_column(&memory, "EPSG:4326", "png", ZOOM, 300, past()).await;
    let slow = ScriptedBackend::with_list_delay(memory.clone(), StdDuration::from_millis(40));
    let store = TileBlobStore::new(slow.clone(), catalog(), BUCKET, &config())
        .await
        .unwrap();

    let mut before = tile(0, 299);
    assert!(store.get(&mut before).await.unwrap());

    assert!(store.delete_layer(LAYER_NAME).await.unwrap());
    let mut during = tile(0, 299);
    assert!(!store.get(&mut during).await.unwrap());

    store.wait_idle().await;
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn failed_deletes_do_not_notify() {
    let memory = Arc::new(MemoryBackend::new());
    seed_column(&memory, "EPSG:4326", "png", ZOOM, 10, past()).await;
    let scripted = ScriptedBackend::new(memory.clone());
    scripted.set_behavior(DeleteBehavior::Fail { status: 500 });
    let store = TileBlobStore::new(scripted.clone(), catalog(), BUCKET, &config())
        .await
        .unwrap();
    let listener = Arc::new(CaptureListener::default());
    store.add_listener(listener.clone());

    assert!(store.delete_layer(LAYER_NAME).await.unwrap());
    store.wait_idle().await;

    assert!(listener.events().is_empty());
    assert_eq!(memory.len().await, 10);
    // The task ran to the end, so the entry is cleared all the same.
    assert!(store.registry().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_scopes_are_not_scheduled() {
    let memory = Arc::new(MemoryBackend::new());
    let (store, _) = open(&memory).await;

    assert!(!store
        .schedule_async_delete(DeleteScope::Layer(layer_scope()))
        .await
        .unwrap());
    assert!(store.registry().entries().await.unwrap().is_empty());
    assert!(memory.is_empty().await);
}
