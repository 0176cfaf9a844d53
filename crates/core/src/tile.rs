//! Tiles and tile ranges as seen by the cache.

use crate::error::{Error, Result};
use crate::format::MimeType;
use crate::parameters::resolve_parameters_id;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// Tile address within a grid: column, row and zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Inclusive rectangle of tile coordinates at one zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl TileBounds {
    /// Create bounds, rejecting inverted or negative rectangles.
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Result<Self> {
        if min_x < 0 || min_y < 0 {
            return Err(Error::InvalidTileRange(format!(
                "bounds must be non-negative, got ({min_x}, {min_y})"
            )));
        }
        if min_x > max_x || min_y > max_y {
            return Err(Error::InvalidTileRange(format!(
                "inverted bounds [{min_x}, {min_y}, {max_x}, {max_y}]"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Number of columns covered.
    pub fn width(&self) -> u64 {
        span(self.min_x, self.max_x)
    }

    /// Number of rows covered.
    pub fn height(&self) -> u64 {
        span(self.min_y, self.max_y)
    }

    /// Number of tiles covered, saturating at `u64::MAX`.
    pub fn tile_count(&self) -> u64 {
        self.width().saturating_mul(self.height())
    }
}

fn span(min: i64, max: i64) -> u64 {
    (i128::from(max) - i128::from(min) + 1) as u64
}

/// A single cached tile, with or without its content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileObject {
    pub layer_name: String,
    pub grid_set_id: String,
    pub format: MimeType,
    pub coord: TileCoord,
    /// Request parameters the tile was rendered with.
    pub parameters: BTreeMap<String, String>,
    /// Explicit parameters id; derived from `parameters` when absent.
    pub parameters_id: Option<String>,
    pub blob: Bytes,
    /// Last-modified time, filled in by reads.
    pub created: Option<OffsetDateTime>,
}

impl TileObject {
    /// A tile address with an empty blob, suitable for `get` and `delete`.
    pub fn new(
        layer_name: impl Into<String>,
        grid_set_id: impl Into<String>,
        format: MimeType,
        coord: TileCoord,
    ) -> Self {
        Self {
            layer_name: layer_name.into(),
            grid_set_id: grid_set_id.into(),
            format,
            coord,
            parameters: BTreeMap::new(),
            parameters_id: None,
            blob: Bytes::new(),
            created: None,
        }
    }

    pub fn with_blob(mut self, blob: Bytes) -> Self {
        self.blob = blob;
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_parameters_id(mut self, parameters_id: impl Into<String>) -> Self {
        self.parameters_id = Some(parameters_id.into());
        self
    }

    /// The parameters id this tile is stored under.
    pub fn resolved_parameters_id(&self) -> String {
        resolve_parameters_id(self.parameters_id.as_deref(), &self.parameters)
    }
}

/// A set of tiles of one layer, grid, format and parameter variant across zoom levels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileRange {
    pub layer_name: String,
    pub grid_set_id: String,
    pub format: MimeType,
    pub parameters_id: Option<String>,
    pub parameters: BTreeMap<String, String>,
    pub zoom_start: i64,
    pub zoom_stop: i64,
    /// Per-zoom bounds; a zoom level without an entry is covered entirely.
    pub bounds: BTreeMap<i64, TileBounds>,
}

impl TileRange {
    /// Create a range over whole zoom levels.
    pub fn new(
        layer_name: impl Into<String>,
        grid_set_id: impl Into<String>,
        format: MimeType,
        zoom_start: i64,
        zoom_stop: i64,
    ) -> Result<Self> {
        if zoom_start < 0 || zoom_start > zoom_stop {
            return Err(Error::InvalidTileRange(format!(
                "invalid zoom interval [{zoom_start}, {zoom_stop}]"
            )));
        }
        Ok(Self {
            layer_name: layer_name.into(),
            grid_set_id: grid_set_id.into(),
            format,
            parameters_id: None,
            parameters: BTreeMap::new(),
            zoom_start,
            zoom_stop,
            bounds: BTreeMap::new(),
        })
    }

    /// Restrict one zoom level of the range to a rectangle.
    pub fn with_bounds(mut self, zoom: i64, bounds: TileBounds) -> Result<Self> {
        if !self.zooms().contains(&zoom) {
            return Err(Error::InvalidTileRange(format!(
                "bounds for zoom {zoom} outside [{}, {}]",
                self.zoom_start, self.zoom_stop
            )));
        }
        self.bounds.insert(zoom, bounds);
        Ok(self)
    }

    pub fn with_parameters_id(mut self, parameters_id: impl Into<String>) -> Self {
        self.parameters_id = Some(parameters_id.into());
        self
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn zooms(&self) -> std::ops::RangeInclusive<i64> {
        self.zoom_start..=self.zoom_stop
    }

    pub fn bounds_at(&self, zoom: i64) -> Option<&TileBounds> {
        self.bounds.get(&zoom)
    }

    /// The parameters id the range's tiles are stored under.
    pub fn resolved_parameters_id(&self) -> String {
        resolve_parameters_id(self.parameters_id.as_deref(), &self.parameters)
    }
}
