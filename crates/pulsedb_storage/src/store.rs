//! Document store trait definition.

use crate::document::{ChangeBatch, ReplicatedWrite, StoredDocument};
use crate::error::StorageResult;
use crate::revision::Revision;
use async_trait::async_trait;
use tokio::sync::watch;

/// A key-addressed document store with optimistic concurrency.
///
/// This is the minimal capability interface the recorder and the
/// replication engine are built on. Implementations may be local
/// (in-process, embedded) or remote (reached over a network); callers
/// cannot tell the difference.
///
/// # Invariants
///
/// - A write to an existing live document must carry its current revision;
///   a stale or missing revision is rejected with
///   [`StorageError::Conflict`](crate::StorageError::Conflict)
/// - Lookups of absent or deleted keys fail with
///   [`StorageError::NotFound`](crate::StorageError::NotFound), never with
///   any other variant
/// - Every accepted write is visible in [`changes`](Self::changes) under a
///   strictly increasing sequence number
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - Reference implementation
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns a human-readable name (URL or label) for logging.
    fn name(&self) -> &str;

    /// Fetches the live document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no live document for `id`.
    async fn get(&self, id: &str) -> StorageResult<StoredDocument>;

    /// Writes `doc`, which must carry the current revision of its key.
    ///
    /// A document without a revision is accepted only if no live document
    /// holds the key.
    ///
    /// Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the revision does not match.
    async fn put(&self, doc: StoredDocument) -> StorageResult<Revision>;

    /// Creates `doc`.
    ///
    /// Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a live document already holds the key.
    async fn post(&self, doc: StoredDocument) -> StorageResult<Revision>;

    /// Deletes `doc`, which must carry the current revision of its key.
    ///
    /// Leaves a tombstone and returns its revision.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if there is no live document and `Conflict` if
    /// the revision does not match.
    async fn remove(&self, doc: &StoredDocument) -> StorageResult<Revision>;

    /// Returns every live document in id order.
    async fn all_docs(&self) -> StorageResult<Vec<StoredDocument>>;

    /// Reads up to `limit` changes recorded after sequence `since`.
    async fn changes(&self, since: u64, limit: usize) -> StorageResult<ChangeBatch>;

    /// Applies a document that already carries a revision assigned by
    /// another store.
    ///
    /// The higher revision wins; ties on identical revisions are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `MissingRevision` if `doc.rev` is `None`. Stores may refuse
    /// individual documents with `Forbidden`.
    async fn write_replicated(&self, doc: StoredDocument) -> StorageResult<ReplicatedWrite>;

    /// Subscribes to the store's update sequence, if it can push updates.
    ///
    /// Stores returning `None` are polled by live replication.
    fn watch_updates(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}
