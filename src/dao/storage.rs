use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No document is stored under the requested key.
    #[error("document `{key}` not found")]
    NotFound { key: String },
    /// The presented concurrency token does not match the stored one.
    #[error("version conflict on document `{key}`")]
    VersionConflict { key: String },
    /// The stored document could not be interpreted.
    #[error("invalid document `{key}`: {message}")]
    InvalidDocument { key: String, message: String },
    /// The backend could not be reached or answered unexpectedly.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Whether the failure is the store's precondition-failed signal.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StorageError::VersionConflict { .. })
    }
}

/// Opaque concurrency token attached to a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value read from (or just written to) the store with its current token.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub etag: ETag,
}

impl<T> Versioned<T> {
    pub fn new(value: T, etag: ETag) -> Self {
        Self { value, etag }
    }
}
