//! Tile formats and their representation inside object keys.
//!
//! A tile format has three names: the request format (`image/png8`), the
//! format segment used in keys (`png8`) and the key extension (`png`). The
//! segment keeps formats that share a MIME type apart in storage.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tile format known to the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MimeType {
    Png,
    Png8,
    Png24,
    Jpeg,
    JpegPng,
    Gif,
    Tiff,
    Webp,
    MapboxVectorTile,
    GeoJson,
}

impl MimeType {
    /// All supported formats.
    pub const ALL: [MimeType; 10] = [
        MimeType::Png,
        MimeType::Png8,
        MimeType::Png24,
        MimeType::Jpeg,
        MimeType::JpegPng,
        MimeType::Gif,
        MimeType::Tiff,
        MimeType::Webp,
        MimeType::MapboxVectorTile,
        MimeType::GeoJson,
    ];

    /// Request format name, e.g. `image/png8`.
    pub fn format(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Png8 => "image/png8",
            Self::Png24 => "image/png24",
            Self::Jpeg => "image/jpeg",
            Self::JpegPng => "image/vnd.jpeg-png",
            Self::Gif => "image/gif",
            Self::Tiff => "image/tiff",
            Self::Webp => "image/webp",
            Self::MapboxVectorTile => "application/vnd.mapbox-vector-tile",
            Self::GeoJson => "application/json;type=geojson",
        }
    }

    /// Content type stored alongside the object.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png | Self::Png8 | Self::Png24 => "image/png",
            Self::MapboxVectorTile => "application/vnd.mapbox-vector-tile",
            Self::GeoJson => "application/json",
            other => other.format(),
        }
    }

    /// Format segment used in object keys.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Png8 => "png8",
            Self::Png24 => "png24",
            Self::Jpeg => "jpeg",
            Self::JpegPng => "jpeg-png",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Webp => "webp",
            Self::MapboxVectorTile => "pbf",
            Self::GeoJson => "geojson",
        }
    }

    /// Extension appended to a full tile key.
    pub fn internal_name(&self) -> &'static str {
        match self {
            Self::Png | Self::Png8 | Self::Png24 => "png",
            other => other.file_extension(),
        }
    }

    /// Look up a format by its request format name.
    pub fn from_format(format: &str) -> Result<Self> {
        let normalized = format.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.format() == normalized)
            .ok_or_else(|| Error::UnknownFormat(format.to_string()))
    }

    /// Look up a format by its key segment (`png8`, `jpeg`, ...).
    pub fn from_file_extension(extension: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.file_extension() == extension)
            .ok_or_else(|| Error::UnknownFormat(extension.to_string()))
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format())
    }
}

impl FromStr for MimeType {
    type Err = Error;

    /// Accepts either a request format or a key segment.
    fn from_str(s: &str) -> Result<Self> {
        Self::from_format(s).or_else(|_| Self::from_file_extension(s))
    }
}

impl TryFrom<String> for MimeType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MimeType> for String {
    fn from(value: MimeType) -> Self {
        value.format().to_string()
    }
}
