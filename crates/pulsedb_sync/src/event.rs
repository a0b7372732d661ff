//! Replication lifecycle events.

use crate::state::ReplicationStats;
use std::fmt;

/// Direction of a replication pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Local store to remote store.
    Push,
    /// Remote store to local store.
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => f.write_str("push"),
            Direction::Pull => f.write_str("pull"),
        }
    }
}

/// Summary of one applied batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInfo {
    /// Which way the batch flowed.
    pub direction: Direction,
    /// Changes read from the source feed.
    pub docs_read: u64,
    /// Changes applied to the target store.
    pub docs_written: u64,
    /// Source checkpoint after the batch.
    pub last_seq: u64,
}

/// An event emitted by a running replication.
#[derive(Debug, Clone)]
pub enum ReplicationEvent {
    /// A batch of changes was applied.
    Change(ChangeInfo),
    /// Replication is idle: caught up, or offline with the failure that
    /// paused it.
    Paused {
        /// The transient failure, if any.
        error: Option<String>,
    },
    /// Replication resumed after a pause.
    Active,
    /// A target store refused a document.
    Denied {
        /// Which way the document was flowing.
        direction: Direction,
        /// The refused document id.
        id: String,
        /// Why it was refused.
        reason: String,
    },
    /// Replication ended normally.
    Complete(ReplicationStats),
    /// Replication ended with a non-retryable failure.
    Error(String),
}

impl ReplicationEvent {
    /// Returns a short name for the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicationEvent::Change(_) => "change",
            ReplicationEvent::Paused { .. } => "paused",
            ReplicationEvent::Active => "active",
            ReplicationEvent::Denied { .. } => "denied",
            ReplicationEvent::Complete(_) => "complete",
            ReplicationEvent::Error(_) => "error",
        }
    }

    /// Returns true for events after which no further events follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReplicationEvent::Complete(_) | ReplicationEvent::Error(_)
        )
    }
}
