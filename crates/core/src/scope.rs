//! Delete scopes: descriptions of the cache regions a bulk delete targets.
//!
//! Narrower scopes are derived from wider ones (`LayerScope` -> `GridSetScope`
//! -> `ParametersScope` -> `ZoomScope`/`TileScope`), so identifying fields are
//! validated once and shared by everything below them. Scopes are immutable
//! after construction.

use crate::error::{Error, Result};
use crate::keys;
use crate::tile::{TileBounds, TileCoord, TileRange};
use std::fmt;

fn require(field: &str, value: impl Into<String>) -> Result<String> {
    let value = value.into();
    if value.trim().is_empty() {
        return Err(Error::InvalidScope(format!("{field} must not be blank")));
    }
    Ok(value)
}

/// Everything stored for one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerScope {
    prefix: String,
    bucket: String,
    layer_id: String,
    layer_name: String,
}

impl LayerScope {
    /// The root `prefix` may be empty; all other fields must be non-blank.
    pub fn new(
        prefix: impl Into<String>,
        bucket: impl Into<String>,
        layer_id: impl Into<String>,
        layer_name: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            prefix: prefix.into(),
            bucket: require("bucket", bucket)?,
            layer_id: require("layer id", layer_id)?,
            layer_name: require("layer name", layer_name)?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    pub fn path(&self) -> String {
        keys::to_layer_prefix(&self.prefix, &self.layer_id)
    }

    pub fn grid_set(&self, grid_set_id: impl Into<String>) -> Result<GridSetScope> {
        Ok(GridSetScope {
            layer: self.clone(),
            grid_set_id: require("grid set id", grid_set_id)?,
        })
    }
}

/// All formats and parameter variants of a layer under one grid set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridSetScope {
    layer: LayerScope,
    grid_set_id: String,
}

impl GridSetScope {
    pub fn layer(&self) -> &LayerScope {
        &self.layer
    }

    pub fn grid_set_id(&self) -> &str {
        &self.grid_set_id
    }

    pub fn path(&self) -> String {
        keys::to_grid_set_prefix(&self.layer.prefix, &self.layer.layer_id, &self.grid_set_id)
    }

    /// Narrow to one format segment (e.g. `png8`) and parameters id.
    pub fn parameters(
        &self,
        format: impl Into<String>,
        parameters_id: impl Into<String>,
    ) -> Result<ParametersScope> {
        Ok(ParametersScope {
            grid_set: self.clone(),
            format: require("format", format)?,
            parameters_id: require("parameters id", parameters_id)?,
        })
    }
}

/// One parameter variant: layer, grid set, format and parameters id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParametersScope {
    grid_set: GridSetScope,
    format: String,
    parameters_id: String,
}

impl ParametersScope {
    pub fn layer(&self) -> &LayerScope {
        &self.grid_set.layer
    }

    pub fn grid_set_id(&self) -> &str {
        &self.grid_set.grid_set_id
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn parameters_id(&self) -> &str {
        &self.parameters_id
    }

    pub fn path(&self) -> String {
        let layer = self.layer();
        keys::to_parameters_prefix(
            &layer.prefix,
            &layer.layer_id,
            self.grid_set_id(),
            &self.format,
            &self.parameters_id,
        )
    }

    /// A whole zoom level.
    pub fn zoom(&self, zoom: i64) -> Result<ZoomScope> {
        self.zoom_with_bounds(zoom, None)
    }

    /// A zoom level, optionally restricted to a rectangle of tiles.
    pub fn zoom_with_bounds(&self, zoom: i64, bounds: Option<TileBounds>) -> Result<ZoomScope> {
        if zoom < 0 {
            return Err(Error::InvalidScope(format!(
                "zoom level must be non-negative, got {zoom}"
            )));
        }
        Ok(ZoomScope {
            parameters: self.clone(),
            zoom,
            bounds,
        })
    }

    /// A single tile stored with the given key extension.
    pub fn tile(&self, coord: TileCoord, extension: impl Into<String>) -> Result<TileScope> {
        if coord.x < 0 || coord.y < 0 || coord.z < 0 {
            return Err(Error::InvalidScope(format!(
                "tile coordinates must be non-negative, got {coord}"
            )));
        }
        Ok(TileScope {
            parameters: self.clone(),
            coord,
            extension: require("extension", extension)?,
            skip_existence_check: false,
        })
    }
}

/// One zoom level of a parameter variant, optionally bounded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoomScope {
    parameters: ParametersScope,
    zoom: i64,
    bounds: Option<TileBounds>,
}

impl ZoomScope {
    pub fn parameters(&self) -> &ParametersScope {
        &self.parameters
    }

    pub fn zoom(&self) -> i64 {
        self.zoom
    }

    pub fn bounds(&self) -> Option<&TileBounds> {
        self.bounds.as_ref()
    }

    pub fn path(&self) -> String {
        let p = &self.parameters;
        keys::to_zoom_prefix(
            &p.layer().prefix,
            &p.layer().layer_id,
            p.grid_set_id(),
            &p.format,
            &p.parameters_id,
            self.zoom,
        )
    }

    /// Listing prefix of one tile column at this zoom level.
    pub fn column_prefix(&self, x: i64) -> String {
        let p = &self.parameters;
        keys::to_column_prefix(
            &p.layer().prefix,
            &p.layer().layer_id,
            p.grid_set_id(),
            &p.format,
            &p.parameters_id,
            self.zoom,
            x,
        )
    }
}

/// A single tile addressed by its full key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileScope {
    parameters: ParametersScope,
    coord: TileCoord,
    extension: String,
    skip_existence_check: bool,
}

impl TileScope {
    pub fn parameters(&self) -> &ParametersScope {
        &self.parameters
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn skip_existence_check(&self) -> bool {
        self.skip_existence_check
    }

    /// Delete even if the tile is not known to exist.
    pub fn with_skip_existence_check(mut self, skip: bool) -> Self {
        self.skip_existence_check = skip;
        self
    }

    pub fn path(&self) -> String {
        let p = &self.parameters;
        keys::to_key(
            &p.layer().prefix,
            &p.layer().layer_id,
            p.grid_set_id(),
            &p.format,
            &p.parameters_id,
            self.coord.z,
            self.coord.x,
            self.coord.y,
            &self.extension,
        )
    }
}

/// An already computed key prefix, as recovered from the pending-delete registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixScope {
    prefix: String,
    bucket: String,
    path: String,
}

impl PrefixScope {
    /// `path` must be a valid partial key below the root `prefix`.
    pub fn new(
        prefix: impl Into<String>,
        bucket: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix.into();
        let bucket = require("bucket", bucket)?;
        let path = require("path", path)?;
        let root = prefix.trim_end_matches('/');
        if !root.is_empty() && !path.starts_with(&format!("{root}/")) {
            return Err(Error::InvalidScope(format!(
                "key prefix {path:?} is outside {root:?}"
            )));
        }
        if !keys::is_prefix_valid(&path, &prefix) {
            return Err(Error::InvalidScope(format!("invalid key prefix {path:?}")));
        }
        Ok(Self {
            prefix,
            bucket,
            path,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// What a composite scope fans out over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeKind {
    /// One parameters id across grid sets and formats.
    ParametersVariant,
    /// The zoom levels of a tile range.
    TileRange,
}

/// A scope made of child scopes sharing bucket, layer and (when set) parameters id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeScope {
    kind: CompositeKind,
    path: String,
    bucket: String,
    layer_id: String,
    layer_name: String,
    parameters_id: Option<String>,
    children: Vec<DeleteScope>,
}

impl CompositeScope {
    /// Empty parameters-variant composite rooted at the layer prefix.
    pub fn for_parameters_id(layer: &LayerScope, parameters_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            kind: CompositeKind::ParametersVariant,
            path: layer.path(),
            bucket: layer.bucket.clone(),
            layer_id: layer.layer_id.clone(),
            layer_name: layer.layer_name.clone(),
            parameters_id: Some(require("parameters id", parameters_id)?),
            children: Vec::new(),
        })
    }

    /// One `ParametersScope` child per grid set and format pair.
    pub fn parameters_variants<G, F>(
        layer: &LayerScope,
        grid_set_ids: &[G],
        formats: &[F],
        parameters_id: &str,
    ) -> Result<Self>
    where
        G: AsRef<str>,
        F: AsRef<str>,
    {
        let mut composite = Self::for_parameters_id(layer, parameters_id)?;
        for grid_set_id in grid_set_ids {
            let grid_set = layer.grid_set(grid_set_id.as_ref())?;
            for format in formats {
                let child = grid_set.parameters(format.as_ref(), parameters_id)?;
                composite.add(DeleteScope::Parameters(child))?;
            }
        }
        Ok(composite)
    }

    /// One `ZoomScope` child per zoom level of `range`, bounded where the range
    /// has bounds for that level.
    pub fn tile_range(parameters: &ParametersScope, range: &TileRange) -> Result<Self> {
        let layer = parameters.layer();
        let mut composite = Self {
            kind: CompositeKind::TileRange,
            path: parameters.path(),
            bucket: layer.bucket.clone(),
            layer_id: layer.layer_id.clone(),
            layer_name: layer.layer_name.clone(),
            parameters_id: Some(parameters.parameters_id.clone()),
            children: Vec::new(),
        };
        for zoom in range.zooms() {
            let child = parameters.zoom_with_bounds(zoom, range.bounds_at(zoom).copied())?;
            composite.add(DeleteScope::Zoom(child))?;
        }
        Ok(composite)
    }

    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    pub fn parameters_id(&self) -> Option<&str> {
        self.parameters_id.as_deref()
    }

    /// A copy of the children; mutating it does not affect the composite.
    pub fn children(&self) -> Vec<DeleteScope> {
        self.children.clone()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Add a child, checking that it belongs to the same bucket, layer and
    /// parameters id as the composite.
    pub fn add(&mut self, child: DeleteScope) -> Result<()> {
        if child.bucket() != self.bucket {
            return Err(Error::InvalidScope(format!(
                "child bucket {:?} does not match {:?}",
                child.bucket(),
                self.bucket
            )));
        }
        if child.layer_id() != Some(self.layer_id.as_str()) {
            return Err(Error::InvalidScope(format!(
                "child layer id {:?} does not match {:?}",
                child.layer_id(),
                self.layer_id
            )));
        }
        if child.layer_name() != Some(self.layer_name.as_str()) {
            return Err(Error::InvalidScope(format!(
                "child layer name {:?} does not match {:?}",
                child.layer_name(),
                self.layer_name
            )));
        }
        if let Some(expected) = &self.parameters_id
            && child.parameters_id() != Some(expected.as_str())
        {
            return Err(Error::InvalidScope(format!(
                "child parameters id {:?} does not match {expected:?}",
                child.parameters_id()
            )));
        }
        self.children.push(child);
        Ok(())
    }
}

/// A deletable region of the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteScope {
    Tile(TileScope),
    Parameters(ParametersScope),
    Zoom(ZoomScope),
    GridSet(GridSetScope),
    Layer(LayerScope),
    Prefix(PrefixScope),
    Composite(CompositeScope),
}

impl DeleteScope {
    /// Key or key prefix covered by the scope.
    pub fn path(&self) -> String {
        match self {
            Self::Tile(s) => s.path(),
            Self::Parameters(s) => s.path(),
            Self::Zoom(s) => s.path(),
            Self::GridSet(s) => s.path(),
            Self::Layer(s) => s.path(),
            Self::Prefix(s) => s.path.clone(),
            Self::Composite(s) => s.path.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tile(_) => "tile",
            Self::Parameters(_) => "parameters",
            Self::Zoom(s) if s.bounds.is_some() => "bounded-zoom",
            Self::Zoom(_) => "zoom",
            Self::GridSet(_) => "grid-set",
            Self::Layer(_) => "layer",
            Self::Prefix(_) => "prefix",
            Self::Composite(s) => match s.kind {
                CompositeKind::ParametersVariant => "parameters-composite",
                CompositeKind::TileRange => "tile-range",
            },
        }
    }

    fn layer_scope(&self) -> Option<&LayerScope> {
        match self {
            Self::Tile(s) => Some(s.parameters.layer()),
            Self::Parameters(s) => Some(s.layer()),
            Self::Zoom(s) => Some(s.parameters.layer()),
            Self::GridSet(s) => Some(&s.layer),
            Self::Layer(s) => Some(s),
            Self::Prefix(_) | Self::Composite(_) => None,
        }
    }

    pub fn bucket(&self) -> &str {
        match self {
            Self::Prefix(s) => &s.bucket,
            Self::Composite(s) => &s.bucket,
            other => other.layer_scope().map_or("", |l| l.bucket.as_str()),
        }
    }

    pub fn layer_id(&self) -> Option<&str> {
        match self {
            Self::Composite(s) => Some(&s.layer_id),
            other => other.layer_scope().map(|l| l.layer_id.as_str()),
        }
    }

    pub fn layer_name(&self) -> Option<&str> {
        match self {
            Self::Composite(s) => Some(&s.layer_name),
            other => other.layer_scope().map(|l| l.layer_name.as_str()),
        }
    }

    pub fn grid_set_id(&self) -> Option<&str> {
        match self {
            Self::Tile(s) => Some(s.parameters.grid_set_id()),
            Self::Parameters(s) => Some(s.grid_set_id()),
            Self::Zoom(s) => Some(s.parameters.grid_set_id()),
            Self::GridSet(s) => Some(&s.grid_set_id),
            _ => None,
        }
    }

    pub fn parameters_id(&self) -> Option<&str> {
        match self {
            Self::Tile(s) => Some(&s.parameters.parameters_id),
            Self::Parameters(s) => Some(&s.parameters_id),
            Self::Zoom(s) => Some(&s.parameters.parameters_id),
            Self::Composite(s) => s.parameters_id.as_deref(),
            _ => None,
        }
    }

    /// Leaf scopes in execution order; composites are expanded recursively.
    pub fn leaves(&self) -> Vec<DeleteScope> {
        match self {
            Self::Composite(c) => c.children.iter().flat_map(|c| c.leaves()).collect(),
            leaf => vec![leaf.clone()],
        }
    }

    /// Prefixes to record in the pending-delete registry so an interrupted
    /// delete can be resumed as a plain prefix delete.
    ///
    /// Single tiles and bounded zoom levels are not resumable: resuming them as
    /// a prefix would delete more than requested.
    pub fn resumable_prefixes(&self) -> Vec<String> {
        match self {
            Self::Tile(_) => Vec::new(),
            Self::Zoom(s) if s.bounds.is_some() => Vec::new(),
            Self::Composite(c) => c
                .children
                .iter()
                .flat_map(|c| c.resumable_prefixes())
                .collect(),
            other => vec![other.path()],
        }
    }
}

impl fmt::Display for DeleteScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::MimeType;

    const PREFIX: &str = "prefix";
    const BUCKET: &str = "bucket";
    const LAYER_ID: &str = "layer-id";
    const LAYER_NAME: &str = "layer-name";
    const PARAMETERS_ID: &str = "75595e9159afae9c4669aee57366de8c196a57e1";

    fn layer() -> LayerScope {
        LayerScope::new(PREFIX, BUCKET, LAYER_ID, LAYER_NAME).unwrap()
    }

    fn parameters() -> ParametersScope {
        layer()
            .grid_set("EPSG:4326")
            .unwrap()
            .parameters("png", PARAMETERS_ID)
            .unwrap()
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(matches!(
            LayerScope::new(PREFIX, " ", LAYER_ID, LAYER_NAME),
            Err(Error::InvalidScope(_))
        ));
        assert!(LayerScope::new(PREFIX, BUCKET, "", LAYER_NAME).is_err());
        assert!(LayerScope::new(PREFIX, BUCKET, LAYER_ID, "").is_err());
        assert!(layer().grid_set("").is_err());
        assert!(layer().grid_set("g").unwrap().parameters("", "p").is_err());
        assert!(layer().grid_set("g").unwrap().parameters("png", " ").is_err());
        assert!(parameters().zoom(-1).is_err());
        assert!(parameters().tile(TileCoord::new(0, 0, 0), "").is_err());
    }

    #[test]
    fn root_prefix_may_be_empty() {
        let layer = LayerScope::new("", BUCKET, LAYER_ID, LAYER_NAME).unwrap();
        assert_eq!(layer.path(), "layer-id/");
    }

    #[test]
    fn paths_per_variant() {
        let p = parameters();
        assert_eq!(DeleteScope::Layer(layer()).path(), "prefix/layer-id/");
        assert_eq!(
            DeleteScope::GridSet(layer().grid_set("EPSG:4326").unwrap()).path(),
            "prefix/layer-id/EPSG:4326/"
        );
        assert_eq!(
            DeleteScope::Parameters(p.clone()).path(),
            format!("prefix/layer-id/EPSG:4326/png/{PARAMETERS_ID}/")
        );
        assert_eq!(
            DeleteScope::Zoom(p.zoom(4).unwrap()).path(),
            format!("prefix/layer-id/EPSG:4326/png/{PARAMETERS_ID}/4/")
        );
        assert_eq!(
            DeleteScope::Tile(p.tile(TileCoord::new(1, 2, 3), "png").unwrap()).path(),
            format!("prefix/layer-id/EPSG:4326/png/{PARAMETERS_ID}/3/1/2.png")
        );
    }

    #[test]
    fn prefix_scope_validates_path() {
        assert!(PrefixScope::new(PREFIX, BUCKET, "prefix/layer-id/").is_ok());
        assert!(PrefixScope::new(PREFIX, BUCKET, "prefix//EPSG:4326/").is_err());
        assert!(PrefixScope::new(PREFIX, BUCKET, "").is_err());
    }

    #[test]
    fn prefix_scope_stays_under_the_root_prefix() {
        assert!(PrefixScope::new(PREFIX, BUCKET, "other/layer-id/").is_err());
        assert!(PrefixScope::new(PREFIX, BUCKET, "prefixfoo/layer-id/").is_err());
        assert!(PrefixScope::new(PREFIX, BUCKET, "layer-id/").is_err());
        assert!(PrefixScope::new("", BUCKET, "layer-id/").is_ok());
    }

    #[test]
    fn parameters_composite_fans_out_over_grids_and_formats() {
        let grids = ["EPSG:4326", "EPSG:900913"];
        let formats = [
            MimeType::Png.file_extension(),
            MimeType::Jpeg.file_extension(),
        ];
        let composite =
            CompositeScope::parameters_variants(&layer(), &grids, &formats, PARAMETERS_ID).unwrap();
        assert_eq!(composite.len(), grids.len() * formats.len());
        assert_eq!(composite.path(), "prefix/layer-id/");
        assert!(
            composite
                .children()
                .iter()
                .all(|c| matches!(c, DeleteScope::Parameters(_)))
        );
    }

    #[test]
    fn children_returns_a_copy() {
        let composite =
            CompositeScope::parameters_variants(&layer(), &["g"], &["png"], PARAMETERS_ID).unwrap();
        let mut children = composite.children();
        children.clear();
        assert_eq!(composite.len(), 1);
    }

    #[test]
    fn tile_range_composite_has_one_child_per_zoom() {
        let bounds = TileBounds::new(0, 0, 3, 3).unwrap();
        let range = TileRange::new(LAYER_NAME, "EPSG:4326", MimeType::Png, 2, 5)
            .unwrap()
            .with_bounds(4, bounds)
            .unwrap();
        let composite = CompositeScope::tile_range(&parameters(), &range).unwrap();
        let children = composite.children();
        assert_eq!(children.len(), 4);
        for child in &children {
            let DeleteScope::Zoom(zoom) = child else {
                panic!("expected zoom child, got {child}");
            };
            assert_eq!(zoom.bounds().is_some(), zoom.zoom() == 4);
        }
        assert_eq!(composite.path(), parameters().path());
    }

    #[test]
    fn add_rejects_mismatched_children() {
        let mut composite = CompositeScope::for_parameters_id(&layer(), PARAMETERS_ID).unwrap();

        let other_bucket = LayerScope::new(PREFIX, "other", LAYER_ID, LAYER_NAME).unwrap();
        let child = other_bucket.grid_set("g").unwrap().parameters("png", PARAMETERS_ID);
        assert!(composite.add(DeleteScope::Parameters(child.unwrap())).is_err());

        let other_layer = LayerScope::new(PREFIX, BUCKET, "other-id", LAYER_NAME).unwrap();
        let child = other_layer.grid_set("g").unwrap().parameters("png", PARAMETERS_ID);
        assert!(composite.add(DeleteScope::Parameters(child.unwrap())).is_err());

        let other_name = LayerScope::new(PREFIX, BUCKET, LAYER_ID, "other-name").unwrap();
        let child = other_name.grid_set("g").unwrap().parameters("png", PARAMETERS_ID);
        assert!(composite.add(DeleteScope::Parameters(child.unwrap())).is_err());

        let child = layer().grid_set("g").unwrap().parameters("png", "other");
        assert!(composite.add(DeleteScope::Parameters(child.unwrap())).is_err());

        let prefix = PrefixScope::new(PREFIX, BUCKET, "prefix/layer-id/").unwrap();
        assert!(composite.add(DeleteScope::Prefix(prefix)).is_err());

        assert!(composite.is_empty());
    }

    #[test]
    fn resumable_prefixes_skip_tiles_and_bounded_zooms() {
        let p = parameters();
        let bounded = p
            .zoom_with_bounds(4, Some(TileBounds::new(0, 0, 3, 3).unwrap()))
            .unwrap();
        assert!(DeleteScope::Zoom(bounded).resumable_prefixes().is_empty());
        let tile = p.tile(TileCoord::new(0, 0, 0), "png").unwrap();
        assert!(DeleteScope::Tile(tile).resumable_prefixes().is_empty());
        assert_eq!(
            DeleteScope::Layer(layer()).resumable_prefixes(),
            vec!["prefix/layer-id/".to_string()]
        );

        let composite =
            CompositeScope::parameters_variants(&layer(), &["a", "b"], &["png"], PARAMETERS_ID)
                .unwrap();
        let prefixes = DeleteScope::Composite(composite).resumable_prefixes();
        assert_eq!(
            prefixes,
            vec![
                format!("prefix/layer-id/a/png/{PARAMETERS_ID}/"),
                format!("prefix/layer-id/b/png/{PARAMETERS_ID}/"),
            ]
        );
    }

    #[test]
    fn leaves_flatten_composites() {
        let composite =
            CompositeScope::parameters_variants(&layer(), &["a", "b"], &["png", "jpeg"], "p")
                .unwrap();
        let scope = DeleteScope::Composite(composite);
        assert_eq!(scope.leaves().len(), 4);
        assert_eq!(DeleteScope::Layer(layer()).leaves().len(), 1);
    }
}
