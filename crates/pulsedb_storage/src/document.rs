//! Store-level document envelope and change feed types.

use crate::revision::Revision;
use bytes::Bytes;

/// A document as seen by the store.
///
/// The store owns `rev`; `body` is opaque bytes encoded by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Unique key (`_id`).
    pub id: String,
    /// Revision token (`_rev`). `None` for documents not yet written.
    pub rev: Option<Revision>,
    /// Whether this is a deletion tombstone.
    pub deleted: bool,
    /// Encoded body.
    pub body: Bytes,
}

impl StoredDocument {
    /// Creates a new document without a revision.
    pub fn new(id: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            deleted: false,
            body: body.into(),
        }
    }

    /// Creates a tombstone for `id` at `rev`.
    pub fn tombstone(id: impl Into<String>, rev: Revision) -> Self {
        Self {
            id: id.into(),
            rev: Some(rev),
            deleted: true,
            body: Bytes::new(),
        }
    }

    /// Sets the revision.
    #[must_use]
    pub fn with_rev(mut self, rev: Revision) -> Self {
        self.rev = Some(rev);
        self
    }
}

/// One entry of a store's change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Sequence number of the write.
    pub seq: u64,
    /// The latest state of the document, tombstones included.
    pub doc: StoredDocument,
}

/// A batch read from the change feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Changes in ascending sequence order.
    pub changes: Vec<Change>,
    /// Checkpoint to pass as `since` for the next batch.
    pub last_seq: u64,
    /// Whether more changes remain after this batch.
    pub pending: bool,
}

/// Outcome of applying a replicated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicatedWrite {
    /// The incoming revision won and was stored.
    Applied,
    /// The store already holds exactly this revision.
    AlreadyPresent,
    /// The store holds a higher revision; the incoming one was discarded.
    Superseded,
}

impl ReplicatedWrite {
    /// Returns true if the target store changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, ReplicatedWrite::Applied)
    }
}
