//! Core domain types and shared logic for tilestash.
//!
//! This crate defines the data model used across all other crates:
//! - Tile formats, coordinates and ranges
//! - The object key layout and its parser
//! - Delete scopes describing what a bulk delete covers
//! - Property list encoding for metadata and the pending-delete registry
//! - Configuration

pub mod config;
pub mod error;
pub mod format;
pub mod keys;
pub mod parameters;
pub mod properties;
pub mod scope;
pub mod tile;

pub use error::{Error, Result};
pub use format::MimeType;
pub use keys::TileKey;
pub use parameters::{DEFAULT_PARAMETERS_ID, parameters_id, resolve_parameters_id};
pub use scope::{
    CompositeKind, CompositeScope, DeleteScope, GridSetScope, LayerScope, ParametersScope,
    PrefixScope, TileScope, ZoomScope,
};
pub use tile::{TileBounds, TileCoord, TileObject, TileRange};
