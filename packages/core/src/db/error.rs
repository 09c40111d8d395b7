//! Storage Error Types
//!
//! Errors raised by the two storage collaborators: the local key-value
//! cache and the remote document store. The persistence coordinator maps
//! both onto the user-facing `PersistenceError` taxonomy.

use std::path::PathBuf;
use thiserror::Error;

/// Local key-value cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure in a file-backed cache
    #[error("Cache I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the cache directory
    #[error("Failed to create cache directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// In-memory cache lock was poisoned by a panicking writer
    #[error("Cache lock poisoned")]
    LockPoisoned,

    /// Record could not be encoded
    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Remote document store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The store has no document under this uuid (HTTP 404)
    #[error("Document not found: {uuid}")]
    NotFound { uuid: String },

    /// Credential missing, expired or refused
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Network or server failure
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The store answered but refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn not_found(uuid: impl Into<String>) -> Self {
        Self::NotFound { uuid: uuid.into() }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
