//! Replication state and statistics.

use std::time::Instant;

/// The current state of a replication controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationState {
    /// Created but not yet replicating.
    Idle,
    /// Transferring changes.
    Active,
    /// Caught up, or waiting to retry after a transient failure.
    Paused,
    /// Ended by a non-retryable failure.
    Error,
    /// Ended by a stop request or by completing a one-shot cycle.
    Stopped,
}

impl ReplicationState {
    /// Returns true while the replication task is running.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ReplicationState::Idle | ReplicationState::Active | ReplicationState::Paused
        )
    }

    /// Returns true once the replication task has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReplicationState::Error | ReplicationState::Stopped)
    }
}

/// Statistics about replication.
#[derive(Debug, Clone, Default)]
pub struct ReplicationStats {
    /// Number of push/pull cycles completed.
    pub cycles_completed: u64,
    /// Number of changes read from either feed.
    pub docs_read: u64,
    /// Number of changes applied to either store.
    pub docs_written: u64,
    /// Number of documents refused by a target store.
    pub docs_denied: u64,
    /// Number of retries after transient failures.
    pub retries: u64,
    /// Time of the last completed cycle.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}
