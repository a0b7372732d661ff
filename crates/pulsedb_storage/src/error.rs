//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No live document exists for the key.
    #[error("document not found: {id}")]
    NotFound {
        /// The document id that was looked up.
        id: String,
    },

    /// The supplied revision does not match the current revision.
    #[error("document update conflict: {id}")]
    Conflict {
        /// The document id that conflicted.
        id: String,
    },

    /// The store refused the write (permissions, validation).
    #[error("write forbidden for {id}: {reason}")]
    Forbidden {
        /// The document id that was refused.
        id: String,
        /// Why the store refused it.
        reason: String,
    },

    /// The store could not be reached or is temporarily unavailable.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// A store URL could not be resolved.
    #[error("invalid store url {url:?}: {reason}")]
    InvalidUrl {
        /// The URL that was rejected.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A revision token could not be parsed.
    #[error("invalid revision token: {value:?}")]
    InvalidRevision {
        /// The rejected token.
        value: String,
    },

    /// A replicated write arrived without a revision.
    #[error("replicated document {id} carries no revision")]
    MissingRevision {
        /// The document id.
        id: String,
    },

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}

impl StorageError {
    /// Creates a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a conflict error.
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    /// Creates a forbidden error.
    pub fn forbidden(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Forbidden {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an invalid url error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for the 404-equivalent lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for a stale-revision rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if the operation may succeed when repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
