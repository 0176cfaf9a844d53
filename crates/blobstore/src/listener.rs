//! Storage event listeners.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tilestash_core::{TileCoord, TileKey};

/// A tile that was written or removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileEvent {
    pub layer_name: String,
    pub grid_set_id: String,
    /// Format segment of the key, e.g. `png8`.
    pub format: String,
    pub parameters_id: String,
    pub coord: TileCoord,
    pub size: u64,
}

impl TileEvent {
    /// Event for a parsed object key; keys carry the layer id, so the name is
    /// passed separately.
    pub fn from_key(layer_name: &str, key: &TileKey, size: u64) -> Self {
        Self {
            layer_name: layer_name.to_string(),
            grid_set_id: key.grid_set_id.clone(),
            format: key.format.clone(),
            parameters_id: key.parameters_id.clone(),
            coord: TileCoord::new(key.x, key.y, key.z),
            size,
        }
    }
}

/// Receives notifications about changes to the cache.
///
/// Called synchronously from the task that made the change; implementations
/// should return quickly.
#[allow(unused_variables)]
pub trait TileStoreListener: Send + Sync {
    fn tile_stored(&self, event: &TileEvent) {}

    fn tile_updated(&self, event: &TileEvent, old_size: u64) {}

    fn tile_deleted(&self, event: &TileEvent) {}

    fn layer_deleted(&self, layer_name: &str) {}

    fn layer_renamed(&self, old_name: &str, new_name: &str) {}

    fn grid_subset_deleted(&self, layer_name: &str, grid_set_id: &str) {}

    fn parameters_deleted(&self, layer_name: &str, parameters_id: &str) {}
}

/// Registered listeners, shared between the facade and running tasks.
#[derive(Clone, Default)]
pub struct ListenerList {
    listeners: Arc<RwLock<Vec<Arc<dyn TileStoreListener>>>>,
}

impl ListenerList {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn TileStoreListener>>> {
        self.listeners.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn TileStoreListener>>> {
        self.listeners.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add(&self, listener: Arc<dyn TileStoreListener>) {
        self.write().push(listener);
    }

    /// Remove a listener previously added. Returns whether it was registered.
    pub fn remove(&self, listener: &Arc<dyn TileStoreListener>) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    // Listeners run outside the lock so they may add or remove listeners.
    fn each(&self, f: impl Fn(&dyn TileStoreListener)) {
        let snapshot = self.read().clone();
        for listener in snapshot {
            f(listener.as_ref());
        }
    }

    pub fn send_tile_stored(&self, event: &TileEvent) {
        self.each(|l| l.tile_stored(event));
    }

    pub fn send_tile_updated(&self, event: &TileEvent, old_size: u64) {
        self.each(|l| l.tile_updated(event, old_size));
    }

    pub fn send_tile_deleted(&self, event: &TileEvent) {
        self.each(|l| l.tile_deleted(event));
    }

    pub fn send_layer_deleted(&self, layer_name: &str) {
        self.each(|l| l.layer_deleted(layer_name));
    }

    pub fn send_layer_renamed(&self, old_name: &str, new_name: &str) {
        self.each(|l| l.layer_renamed(old_name, new_name));
    }

    pub fn send_grid_subset_deleted(&self, layer_name: &str, grid_set_id: &str) {
        self.each(|l| l.grid_subset_deleted(layer_name, grid_set_id));
    }

    pub fn send_parameters_deleted(&self, layer_name: &str, parameters_id: &str) {
        self.each(|l| l.parameters_deleted(layer_name, parameters_id));
    }
}

impl std::fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.len())
            .finish()
    }
}
