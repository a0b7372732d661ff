//! Error types for PulseDB core.

use crate::document::DocumentKind;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in PulseDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document store error (not found, conflict, unavailable, ...).
    #[error("storage error: {0}")]
    Storage(#[from] pulsedb_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] pulsedb_codec::CodecError),

    /// Replication error.
    #[error("sync error: {0}")]
    Sync(#[from] pulsedb_sync::SyncError),

    /// Missing or invalid configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document has a different type than the caller expected.
    #[error("document {id} is a {actual} document, expected {expected}")]
    UnexpectedKind {
        /// The document id.
        id: String,
        /// The kind the caller asked for.
        expected: DocumentKind,
        /// The kind that was stored.
        actual: DocumentKind,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if a store lookup found no document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_not_found())
    }

    /// Returns true if a store rejected a stale revision.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsedb_storage::StorageError;

    #[test]
    fn classification_follows_storage_errors() {
        assert!(CoreError::from(StorageError::not_found("a")).is_not_found());
        assert!(CoreError::from(StorageError::conflict("a")).is_conflict());
        assert!(!CoreError::config("no database specified").is_not_found());
    }

    #[test]
    fn config_error_display() {
        let err = CoreError::config("no database specified");
        assert_eq!(err.to_string(), "configuration error: no database specified");
    }
}
