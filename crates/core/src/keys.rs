//! Object key layout for cached tiles.
//!
//! Every tile lives under
//! `<prefix>/<layerId>/<gridSetId>/<format>/<parametersId>/<z>/<x>/<y>.<extension>`.
//! The layout is persisted in the bucket, so it must not change. An empty root
//! prefix is omitted instead of producing a leading `/`. Prefix builders always
//! return a trailing `/` so that zoom `1` never matches zoom `10`.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Name of the pending-delete registry object under the root prefix.
pub const PENDING_DELETES_OBJECT_NAME: &str = "_pending_deletes.properties";

/// Name of the per-layer metadata object.
pub const LAYER_METADATA_OBJECT_NAME: &str = "metadata.properties";

/// Prefix of per-layer parameters metadata objects.
pub const PARAMETERS_METADATA_OBJECT_PREFIX: &str = "parameters-";

/// Maximum number of segments below the root prefix (a full tile key).
const MAX_SEGMENTS: usize = 7;

const Z_SEGMENT: usize = 4;
const X_SEGMENT: usize = 5;
const Y_SEGMENT: usize = 6;

fn join(prefix: &str, segments: &[&str]) -> String {
    let prefix = prefix.trim_end_matches('/');
    let mut key = String::with_capacity(
        prefix.len() + segments.iter().map(|s| s.len() + 1).sum::<usize>(),
    );
    if !prefix.is_empty() {
        key.push_str(prefix);
        key.push('/');
    }
    key.push_str(&segments.join("/"));
    key
}

/// Full object key of a tile.
#[allow(clippy::too_many_arguments)]
pub fn to_key(
    prefix: &str,
    layer_id: &str,
    grid_set_id: &str,
    format: &str,
    parameters_id: &str,
    z: i64,
    x: i64,
    y: i64,
    extension: &str,
) -> String {
    let (z, x, file) = (z.to_string(), x.to_string(), format!("{y}.{extension}"));
    join(
        prefix,
        &[layer_id, grid_set_id, format, parameters_id, &z, &x, &file],
    )
}

/// `<prefix>/<layerId>/`
pub fn to_layer_prefix(prefix: &str, layer_id: &str) -> String {
    join(prefix, &[layer_id, ""])
}

/// `<prefix>/<layerId>/<gridSetId>/`
pub fn to_grid_set_prefix(prefix: &str, layer_id: &str, grid_set_id: &str) -> String {
    join(prefix, &[layer_id, grid_set_id, ""])
}

/// `<prefix>/<layerId>/<gridSetId>/<format>/<parametersId>/`, the coordinates prefix
/// of one parameter variant.
pub fn to_parameters_prefix(
    prefix: &str,
    layer_id: &str,
    grid_set_id: &str,
    format: &str,
    parameters_id: &str,
) -> String {
    join(prefix, &[layer_id, grid_set_id, format, parameters_id, ""])
}

/// `<prefix>/<layerId>/<gridSetId>/<format>/<parametersId>/<z>/`
pub fn to_zoom_prefix(
    prefix: &str,
    layer_id: &str,
    grid_set_id: &str,
    format: &str,
    parameters_id: &str,
    z: i64,
) -> String {
    let z = z.to_string();
    join(prefix, &[layer_id, grid_set_id, format, parameters_id, &z, ""])
}

/// `<prefix>/<layerId>/<gridSetId>/<format>/<parametersId>/<z>/<x>/`, one tile column.
pub fn to_column_prefix(
    prefix: &str,
    layer_id: &str,
    grid_set_id: &str,
    format: &str,
    parameters_id: &str,
    z: i64,
    x: i64,
) -> String {
    let (z, x) = (z.to_string(), x.to_string());
    join(
        prefix,
        &[layer_id, grid_set_id, format, parameters_id, &z, &x, ""],
    )
}

/// Key of the layer metadata properties object.
pub fn layer_metadata_key(prefix: &str, layer_id: &str) -> String {
    join(prefix, &[layer_id, LAYER_METADATA_OBJECT_NAME])
}

/// Key of the properties object describing one parameter set of a layer.
pub fn parameters_metadata_key(prefix: &str, layer_id: &str, parameters_id: &str) -> String {
    let name = format!("{PARAMETERS_METADATA_OBJECT_PREFIX}{parameters_id}.properties");
    join(prefix, &[layer_id, &name])
}

/// Listing prefix of all parameters metadata objects of a layer.
pub fn parameters_metadata_prefix(prefix: &str, layer_id: &str) -> String {
    join(prefix, &[layer_id, PARAMETERS_METADATA_OBJECT_PREFIX])
}

/// Key of the pending-delete registry object.
pub fn pending_deletes_key(prefix: &str) -> String {
    join(prefix, &[PENDING_DELETES_OBJECT_NAME])
}

/// A parsed tile key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub prefix: String,
    pub layer_id: String,
    pub grid_set_id: String,
    pub format: String,
    pub parameters_id: String,
    pub z: i64,
    pub x: i64,
    pub y: i64,
    pub extension: String,
}

impl TileKey {
    /// Parse a full object key back into its components.
    ///
    /// The root prefix may itself contain `/`; everything left of the last seven
    /// segments is treated as prefix.
    pub fn parse(key: &str) -> Result<Self> {
        let mut parts: Vec<&str> = key.rsplitn(MAX_SEGMENTS + 1, '/').collect();
        if parts.len() < MAX_SEGMENTS {
            return Err(Error::malformed_key(
                key,
                format!(
                    "expected at least {MAX_SEGMENTS} segments, got {}",
                    parts.len()
                ),
            ));
        }
        parts.reverse();

        let (prefix, segments) = if parts.len() > MAX_SEGMENTS {
            (parts[0], &parts[1..])
        } else {
            ("", &parts[..])
        };

        let (y, extension) = segments[Y_SEGMENT]
            .split_once('.')
            .ok_or_else(|| Error::malformed_key(key, "missing extension"))?;
        if extension.is_empty() {
            return Err(Error::malformed_key(key, "missing extension"));
        }

        for (name, value) in [
            ("layer id", segments[0]),
            ("grid set id", segments[1]),
            ("format", segments[2]),
            ("parameters id", segments[3]),
        ] {
            if value.is_empty() {
                return Err(Error::malformed_key(key, format!("empty {name}")));
            }
        }

        Ok(Self {
            prefix: prefix.to_string(),
            layer_id: segments[0].to_string(),
            grid_set_id: segments[1].to_string(),
            format: segments[2].to_string(),
            parameters_id: segments[3].to_string(),
            z: parse_coordinate(key, "z", segments[Z_SEGMENT])?,
            x: parse_coordinate(key, "x", segments[X_SEGMENT])?,
            y: parse_coordinate(key, "y", y)?,
            extension: extension.to_string(),
        })
    }

    /// Render the key back to its object key form.
    pub fn to_key(&self) -> String {
        to_key(
            &self.prefix,
            &self.layer_id,
            &self.grid_set_id,
            &self.format,
            &self.parameters_id,
            self.z,
            self.x,
            self.y,
            &self.extension,
        )
    }
}

fn parse_coordinate(key: &str, name: &str, value: &str) -> Result<i64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::malformed_key(
            key,
            format!("{name} is not numeric: {value:?}"),
        ));
    }
    value
        .parse()
        .map_err(|e| Error::malformed_key(key, format!("{name} out of range: {e}")))
}

impl FromStr for TileKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

/// Check that a partial path is a well-formed key prefix.
///
/// Depth 1 is layer only, then grid set, format, parameters, zoom, column and
/// row (optionally with extension). Every segment up to the path's depth must be
/// present and well formed; a leading root `prefix` is ignored.
pub fn is_prefix_valid(path: &str, prefix: &str) -> bool {
    if path.contains("//") || path.ends_with('.') {
        return false;
    }

    let prefix = prefix.trim_end_matches('/');
    let relative = if prefix.is_empty() {
        path
    } else if path == prefix {
        ""
    } else {
        path.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    };
    let relative = relative.strip_suffix('/').unwrap_or(relative);
    if relative.is_empty() {
        return false;
    }

    let segments: Vec<&str> = relative.split('/').collect();
    if segments.len() > MAX_SEGMENTS {
        return false;
    }

    segments
        .iter()
        .enumerate()
        .all(|(index, segment)| match index {
            Z_SEGMENT | X_SEGMENT => segment.parse::<i64>().is_ok(),
            Y_SEGMENT => match segment.split_once('.') {
                None => segment.parse::<i64>().is_ok(),
                Some((y, extension)) => {
                    y.parse::<i64>().is_ok()
                        && !extension.trim().is_empty()
                        && !extension.contains('.')
                }
            },
            _ => !segment.is_empty(),
        })
}
