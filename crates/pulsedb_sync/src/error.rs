//! Error types for replication.

use pulsedb_storage::StorageError;
use thiserror::Error;

/// Result type for replication operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during replication.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// A store operation failed.
    #[error("store error: {0}")]
    Storage(#[from] StorageError),

    /// The controller has already stopped.
    #[error("replication already stopped")]
    AlreadyStopped,

    /// The replication task panicked or was aborted.
    #[error("replication task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Storage(err) => err.is_retryable(),
            _ => false,
        }
    }
}
