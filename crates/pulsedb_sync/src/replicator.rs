//! One-directional change-feed replication.

use crate::error::SyncResult;
use crate::event::{ChangeInfo, Direction};
use pulsedb_storage::{DocumentStore, StorageError};
use std::sync::Arc;
use tracing::debug;

/// A document the target store refused to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedDocument {
    /// The refused document id.
    pub id: String,
    /// Why it was refused.
    pub reason: String,
}

/// Result of applying one batch of changes.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Counters for the batch.
    pub info: ChangeInfo,
    /// Documents the target refused.
    pub denied: Vec<DeniedDocument>,
    /// Whether the source feed has more changes after this batch.
    pub pending: bool,
}

/// Copies changes from a source store's feed into a target store.
///
/// The replicator remembers how far it has read the source feed. The
/// checkpoint only advances after a whole batch has been applied, so a
/// failed batch is re-read on the next attempt; replaying it is harmless
/// because replicated writes are idempotent.
pub struct Replicator {
    direction: Direction,
    source: Arc<dyn DocumentStore>,
    target: Arc<dyn DocumentStore>,
    checkpoint: u64,
    batch_size: usize,
}

impl Replicator {
    /// Creates a replicator starting at the beginning of the source feed.
    pub fn new(
        direction: Direction,
        source: Arc<dyn DocumentStore>,
        target: Arc<dyn DocumentStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            direction,
            source,
            target,
            checkpoint: 0,
            batch_size: batch_size.max(1),
        }
    }

    /// Returns the source feed checkpoint.
    pub fn checkpoint(&self) -> u64 {
        self.checkpoint
    }

    /// Returns the source store.
    pub fn source(&self) -> &Arc<dyn DocumentStore> {
        &self.source
    }

    /// Applies the next batch of source changes to the target.
    ///
    /// # Errors
    ///
    /// Returns the first store failure other than a per-document
    /// `Forbidden`, which is reported in [`BatchOutcome::denied`] instead.
    pub async fn run_batch(&mut self) -> SyncResult<BatchOutcome> {
        let batch = self.source.changes(self.checkpoint, self.batch_size).await?;

        let mut outcome = BatchOutcome {
            info: ChangeInfo {
                direction: self.direction,
                docs_read: batch.changes.len() as u64,
                docs_written: 0,
                last_seq: batch.last_seq,
            },
            denied: Vec::new(),
            pending: batch.pending,
        };

        for change in batch.changes {
            let id = change.doc.id.clone();
            match self.target.write_replicated(change.doc).await {
                Ok(write) if write.is_applied() => outcome.info.docs_written += 1,
                Ok(write) => debug!(direction = %self.direction, %id, ?write, "change skipped"),
                Err(StorageError::Forbidden { reason, .. }) => {
                    outcome.denied.push(DeniedDocument { id, reason });
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.checkpoint = batch.last_seq;
        Ok(outcome)
    }
}
