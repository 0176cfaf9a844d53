//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid delete scope: {0}")]
    InvalidScope(String),

    #[error("malformed tile key {key:?}: {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("unknown tile format: {0}")]
    UnknownFormat(String),

    #[error("invalid tile range: {0}")]
    InvalidTileRange(String),

    #[error("properties parse error at line {line}: {reason}")]
    Properties { line: usize, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn malformed_key(key: &str, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
