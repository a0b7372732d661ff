//! In-memory document store.

use crate::document::{Change, ChangeBatch, ReplicatedWrite, StoredDocument};
use crate::error::{StorageError, StorageResult};
use crate::revision::Revision;
use crate::store::DocumentStore;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::watch;

/// Latest state of one key.
#[derive(Debug, Clone)]
struct Entry {
    rev: Revision,
    deleted: bool,
    body: Bytes,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    /// Sequence number -> key. Only the latest sequence of each key is kept.
    log: BTreeMap<u64, String>,
    update_seq: u64,
    closed: bool,
}

impl Inner {
    fn check_open(&self) -> StorageResult<()> {
        if self.closed {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn live(&self, id: &str) -> Option<&Entry> {
        self.entries.get(id).filter(|entry| !entry.deleted)
    }

    fn commit(&mut self, id: &str, rev: Revision, deleted: bool, body: Bytes) -> u64 {
        self.update_seq += 1;
        let seq = self.update_seq;

        if let Some(previous) = self.entries.get(id) {
            self.log.remove(&previous.seq);
        }
        self.log.insert(seq, id.to_string());
        self.entries.insert(
            id.to_string(),
            Entry {
                rev,
                deleted,
                body,
                seq,
            },
        );
        seq
    }

    /// Writes a new revision of `doc` on top of whatever the key holds.
    fn write_next(&mut self, doc: StoredDocument) -> Revision {
        let previous = self.entries.get(&doc.id).map(|entry| entry.rev.clone());
        let rev = Revision::next(previous.as_ref(), &doc.body, false);
        self.commit(&doc.id, rev.clone(), false, doc.body);
        rev
    }
}

/// An in-memory document store.
///
/// This store keeps every key in memory and is suitable for:
/// - Unit and integration tests
/// - Agents that only need a short-lived local buffer in front of a remote
///
/// Deleted keys stay behind as tombstones so that deletions show up in
/// the change feed and replicate.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks.
///
/// # Example
///
/// ```rust
/// use pulsedb_storage::InMemoryStore;
///
/// let store = InMemoryStore::new("memory://local");
/// assert!(store.is_empty());
/// assert_eq!(store.update_seq(), 0);
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    inner: RwLock<Inner>,
    updates: watch::Sender<u64>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            name: name.into(),
            inner: RwLock::new(Inner::default()),
            updates,
        }
    }

    /// Returns the number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .entries
            .values()
            .filter(|entry| !entry.deleted)
            .count()
    }

    /// Returns true if the store holds no live documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the sequence number of the latest write.
    #[must_use]
    pub fn update_seq(&self) -> u64 {
        self.inner.read().update_seq
    }

    /// Returns the current revision of `id`, tombstones included.
    #[must_use]
    pub fn revision_of(&self, id: &str) -> Option<(Revision, bool)> {
        self.inner
            .read()
            .entries
            .get(id)
            .map(|entry| (entry.rev.clone(), entry.deleted))
    }

    /// Closes the store. Every later operation fails with `Closed`.
    pub fn close(&self) {
        self.inner.write().closed = true;
    }

    fn publish(&self, seq: u64) {
        self.updates.send_replace(seq);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, id: &str) -> StorageResult<StoredDocument> {
        let inner = self.inner.read();
        inner.check_open()?;

        let entry = inner.live(id).ok_or_else(|| StorageError::not_found(id))?;
        Ok(StoredDocument {
            id: id.to_string(),
            rev: Some(entry.rev.clone()),
            deleted: false,
            body: entry.body.clone(),
        })
    }

    async fn put(&self, doc: StoredDocument) -> StorageResult<Revision> {
        let (rev, seq) = {
            let mut inner = self.inner.write();
            inner.check_open()?;

            match (inner.live(&doc.id), doc.rev.as_ref()) {
                (Some(current), Some(expected)) if current.rev == *expected => {}
                (None, None) => {}
                _ => return Err(StorageError::conflict(&doc.id)),
            }

            let rev = inner.write_next(doc);
            (rev, inner.update_seq)
        };
        self.publish(seq);
        Ok(rev)
    }

    async fn post(&self, doc: StoredDocument) -> StorageResult<Revision> {
        let (rev, seq) = {
            let mut inner = self.inner.write();
            inner.check_open()?;

            if inner.live(&doc.id).is_some() {
                return Err(StorageError::conflict(&doc.id));
            }

            let rev = inner.write_next(doc);
            (rev, inner.update_seq)
        };
        self.publish(seq);
        Ok(rev)
    }

    async fn remove(&self, doc: &StoredDocument) -> StorageResult<Revision> {
        let (rev, seq) = {
            let mut inner = self.inner.write();
            inner.check_open()?;

            let current = inner
                .live(&doc.id)
                .ok_or_else(|| StorageError::not_found(&doc.id))?;
            if doc.rev.as_ref() != Some(&current.rev) {
                return Err(StorageError::conflict(&doc.id));
            }

            let rev = Revision::next(Some(&current.rev), &[], true);
            let seq = inner.commit(&doc.id, rev.clone(), true, Bytes::new());
            (rev, seq)
        };
        self.publish(seq);
        Ok(rev)
    }

    async fn all_docs(&self) -> StorageResult<Vec<StoredDocument>> {
        let inner = self.inner.read();
        inner.check_open()?;

        Ok(inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.deleted)
            .map(|(id, entry)| StoredDocument {
                id: id.clone(),
                rev: Some(entry.rev.clone()),
                deleted: false,
                body: entry.body.clone(),
            })
            .collect())
    }

    async fn changes(&self, since: u64, limit: usize) -> StorageResult<ChangeBatch> {
        let inner = self.inner.read();
        inner.check_open()?;

        let mut batch = ChangeBatch {
            changes: Vec::new(),
            last_seq: since,
            pending: false,
        };

        for (&seq, id) in inner.log.range(since.saturating_add(1)..) {
            if batch.changes.len() >= limit {
                batch.pending = true;
                break;
            }
            // The log only keeps the latest sequence of each key.
            let Some(entry) = inner.entries.get(id) else {
                continue;
            };
            batch.changes.push(Change {
                seq,
                doc: StoredDocument {
                    id: id.clone(),
                    rev: Some(entry.rev.clone()),
                    deleted: entry.deleted,
                    body: entry.body.clone(),
                },
            });
            batch.last_seq = seq;
        }

        Ok(batch)
    }

    async fn write_replicated(&self, doc: StoredDocument) -> StorageResult<ReplicatedWrite> {
        let incoming = doc
            .rev
            .clone()
            .ok_or_else(|| StorageError::MissingRevision { id: doc.id.clone() })?;

        let seq = {
            let mut inner = self.inner.write();
            inner.check_open()?;

            if let Some(current) = inner.entries.get(&doc.id) {
                if current.rev == incoming {
                    return Ok(ReplicatedWrite::AlreadyPresent);
                }
                if current.rev > incoming {
                    return Ok(ReplicatedWrite::Superseded);
                }
            }

            inner.commit(&doc.id, incoming, doc.deleted, doc.body)
        };
        self.publish(seq);
        Ok(ReplicatedWrite::Applied)
    }

    fn watch_updates(&self) -> Option<watch::Receiver<u64>> {
        Some(self.updates.subscribe())
    }
}
