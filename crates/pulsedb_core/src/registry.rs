//! Client registry.

use crate::document::{client_id, ClientRecord, Document, DocumentBody, DocumentKind};
use crate::engine;
use crate::error::CoreResult;
use crate::factory::DocumentFactory;
use crate::locks::KeyedLocks;
use parking_lot::RwLock;
use pulsedb_storage::{DocumentStore, StoredDocument};
use std::collections::BTreeMap;
use tracing::debug;

/// In-memory index of registered clients, backed by client documents.
///
/// Uids are unique. Adding a known uid or removing an unknown one is a
/// no-op. The client document in the store decides whether a uid is
/// known, so the index repairs itself when documents are deleted or
/// replicated behind its back. Calls for the same uid are serialized so
/// the check and the store write happen as one step, and a reload waits
/// for in-flight calls.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<BTreeMap<String, ClientRecord>>,
    locks: KeyedLocks,
    reload: tokio::sync::RwLock<()>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reloads the registry from the client documents in `store`.
    ///
    /// Clients whose documents are gone are dropped. Returns the number
    /// of clients known afterwards.
    pub async fn hydrate(&self, store: &dyn DocumentStore) -> CoreResult<usize> {
        let _reload = self.reload.write().await;
        let mut loaded = BTreeMap::new();
        for stored in store.all_docs().await? {
            if !stored.id.starts_with("client:") {
                continue;
            }
            if let Some(record) = decode(stored) {
                loaded.insert(record.uid.clone(), record);
            }
        }

        let mut clients = self.clients.write();
        *clients = loaded;
        Ok(clients.len())
    }

    /// Registers `record` and persists it to `store`.
    ///
    /// Returns `true` if the client was added, `false` if a client
    /// document for the uid already exists.
    pub async fn add(
        &self,
        store: &dyn DocumentStore,
        factory: &DocumentFactory,
        record: ClientRecord,
    ) -> CoreResult<bool> {
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(&record.uid).await;
        match store.get(&client_id(&record.uid)).await {
            Ok(stored) => {
                debug!(uid = %record.uid, "client already registered");
                let known = decode(stored).unwrap_or(record);
                self.clients.write().insert(known.uid.clone(), known);
                return Ok(false);
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        engine::upsert(store, &factory.client(record.clone())).await?;
        self.clients.write().insert(record.uid.clone(), record);
        Ok(true)
    }

    /// Unregisters `uid` and deletes its document from `store`.
    ///
    /// Returns `true` if the client was removed, `false` if it had no
    /// client document.
    pub async fn remove(&self, store: &dyn DocumentStore, uid: &str) -> CoreResult<bool> {
        let _reload = self.reload.read().await;
        let _guard = self.locks.lock(uid).await;
        let existed = match store.get(&client_id(uid)).await {
            Ok(_) => true,
            Err(err) if err.is_not_found() => false,
            Err(err) => return Err(err.into()),
        };

        if existed {
            engine::remove(store, &client_id(uid)).await?;
        } else {
            debug!(uid, "client not registered");
        }
        self.clients.write().remove(uid);
        Ok(existed)
    }

    /// Returns true if `uid` is registered.
    pub fn contains(&self, uid: &str) -> bool {
        self.clients.read().contains_key(uid)
    }

    /// Returns the registered clients ordered by uid.
    pub fn list(&self) -> Vec<ClientRecord> {
        self.clients.read().values().cloned().collect()
    }

    /// Returns the number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Returns true if no client is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn decode(stored: StoredDocument) -> Option<ClientRecord> {
    match Document::from_stored(stored) {
        Ok(Document {
            body: DocumentBody::Client(record),
            ..
        }) => Some(record),
        Ok(doc) => {
            debug!(id = %doc.id, kind = %doc.kind(), expected = %DocumentKind::Client, "ignoring misfiled document");
            None
        }
        Err(err) => {
            debug!(error = %err, "skipping undecodable client document");
            None
        }
    }
}
