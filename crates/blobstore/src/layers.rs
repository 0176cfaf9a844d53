//! Layer lookup by name.

use std::collections::BTreeMap;
use tilestash_core::MimeType;
use tilestash_core::config::LayerConfig;

/// What the blob store needs to know about a layer to address its tiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerInfo {
    pub name: String,
    /// Key segment; stays stable when the layer is renamed.
    pub id: String,
    pub grid_set_ids: Vec<String>,
    pub formats: Vec<MimeType>,
}

impl From<&LayerConfig> for LayerInfo {
    fn from(config: &LayerConfig) -> Self {
        Self {
            name: config.name.clone(),
            id: config.layer_id().to_string(),
            grid_set_ids: config.grid_sets.clone(),
            formats: config.formats.clone(),
        }
    }
}

pub trait LayerCatalog: Send + Sync {
    fn layer(&self, name: &str) -> Option<LayerInfo>;

    fn layers(&self) -> Vec<LayerInfo>;
}

/// Catalog fixed at startup.
#[derive(Clone, Debug, Default)]
pub struct StaticLayerCatalog {
    layers: BTreeMap<String, LayerInfo>,
}

impl StaticLayerCatalog {
    pub fn new(layers: impl IntoIterator<Item = LayerInfo>) -> Self {
        Self {
            layers: layers.into_iter().map(|l| (l.name.clone(), l)).collect(),
        }
    }

    pub fn from_config(layers: &[LayerConfig]) -> Self {
        Self::new(layers.iter().map(LayerInfo::from))
    }
}

impl LayerCatalog for StaticLayerCatalog {
    fn layer(&self, name: &str) -> Option<LayerInfo> {
        self.layers.get(name).cloned()
    }

    fn layers(&self) -> Vec<LayerInfo> {
        self.layers.values().cloned().collect()
    }
}
