//! Service Layer Error Types
//!
//! Persistence operations resolve to either a success payload or one of
//! these errors. Graph mutations never fail; see `GraphStore`.

use crate::db::{CacheError, RemoteError};
use crate::models::ValidationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Persistence operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Input rejected before any network call
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The remote store has no document under this identifier
    #[error("Document not found: {id}")]
    NotFound { id: String },

    /// Remote state could not be confirmed; the last known good state stays active
    #[error("Out of sync with remote store for {id}: {reason}")]
    SyncConflict { id: String, reason: String },

    /// Network or remote failure with no usable fallback
    #[error("Remote store failure: {0}")]
    Transport(String),

    /// No usable credential; re-authentication was requested
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// A cache entry failed to parse or to pass the shape check
    #[error("Corrupt cache entry {key}: {reason}")]
    CorruptCache { key: String, reason: String },
}

/// Error category reported to the hosting UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    NotFound,
    SyncConflict,
    Transport,
    AuthenticationRequired,
    CorruptCache,
}

/// `{kind, message}` shape handed to the hosting UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PersistenceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn sync_conflict(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SyncConflict {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn authentication_required(msg: impl Into<String>) -> Self {
        Self::AuthenticationRequired(msg.into())
    }

    pub fn corrupt_cache(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptCache {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SyncConflict { .. } => ErrorKind::SyncConflict,
            Self::Transport(_) => ErrorKind::Transport,
            Self::AuthenticationRequired(_) => ErrorKind::AuthenticationRequired,
            Self::CorruptCache { .. } => ErrorKind::CorruptCache,
        }
    }

    /// Soft errors leave the session usable and are shown as warnings
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::SyncConflict { .. } | Self::CorruptCache { .. }
        )
    }

    pub fn to_structured(&self) -> StructuredError {
        StructuredError {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<RemoteError> for PersistenceError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound { uuid } => Self::NotFound { id: uuid },
            RemoteError::Unauthorized(msg) => Self::AuthenticationRequired(msg),
            RemoteError::Transport(msg) => Self::Transport(msg),
            RemoteError::Rejected(msg) => Self::Transport(format!("rejected: {}", msg)),
        }
    }
}

impl From<CacheError> for PersistenceError {
    fn from(err: CacheError) -> Self {
        Self::Transport(format!("local cache: {}", err))
    }
}

impl From<ValidationError> for PersistenceError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
