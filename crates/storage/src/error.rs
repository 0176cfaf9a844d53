//! Storage error types.

use thiserror::Error;

/// How a failed storage call should be treated by callers that retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Service-side and transient (throttling, 5xx). Retrying may succeed.
    Recoverable,
    /// Client-side (bad request, auth, missing bucket). Retrying will not help.
    NonRecoverable,
    /// Anything the backend did not classify.
    Unknown,
}

impl ErrorClass {
    /// Stable lowercase name, used as a metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::NonRecoverable => "non_recoverable",
            Self::Unknown => "unknown",
        }
    }
}

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// The service rejected the call for a reason on its side.
    #[error("service error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// The service rejected the request itself.
    #[error("client error (status {status}): {message}")]
    Client { status: u16, message: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Classify the error for retry accounting.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Service { .. } | Self::Io(_) => ErrorClass::Recoverable,
            Self::Client { .. } | Self::InvalidKey(_) | Self::Config(_) | Self::NotFound(_) => {
                ErrorClass::NonRecoverable
            }
            Self::S3(_) => ErrorClass::Unknown,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
