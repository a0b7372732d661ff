//! The recorder facade.

use crate::config::RecorderConfig;
use crate::document::{ClientRecord, Document};
use crate::engine;
use crate::error::{CoreError, CoreResult};
use crate::factory::DocumentFactory;
use crate::heartbeat::{Heartbeat, HeartbeatScheduler, HeartbeatStats};
use crate::locks::KeyedLocks;
use crate::query::{self, QueryFilter};
use crate::registry::ClientRegistry;
use crate::selector::StoreSelector;
use crate::snapshot::SnapshotProvider;
use parking_lot::Mutex;
use pulsedb_storage::{DocumentStore, Revision, StoreResolver};
use pulsedb_sync::{
    Direction, ReplicationController, ReplicationEvent, ReplicationState, ReplicationStats,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Records host status and caller data into a local store.
///
/// A recorder owns a local store, an optional remote store and, when
/// configured with both `remote` and `sync`, a live bidirectional
/// replication task between them. Writes from the recorder are serialized
/// per document id.
///
/// # Example
///
/// ```rust
/// use pulsedb_core::{MemoryResolver, Recorder, RecorderConfig, StatusSnapshot, StoreSelector};
/// use std::sync::Arc;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let config = RecorderConfig::new("memory://local").serial("SN1");
/// let recorder = Recorder::open(
///     config,
///     Arc::new(StatusSnapshot::default),
///     Arc::new(MemoryResolver::new()),
/// )
/// .await
/// .unwrap();
///
/// recorder.save(serde_json::json!({ "temp": 21 }), "probe-1").await.unwrap();
/// let doc = recorder.get("data:probe-1").await.unwrap();
/// assert_eq!(doc.serial, "SN1");
///
/// recorder.save_status(StoreSelector::Local).await.unwrap();
/// recorder.close().await.unwrap();
/// # });
/// ```
pub struct Recorder {
    config: RecorderConfig,
    factory: DocumentFactory,
    resolver: Arc<dyn StoreResolver>,
    local: Arc<dyn DocumentStore>,
    remote: Option<Arc<dyn DocumentStore>>,
    replication: Mutex<Option<ReplicationController>>,
    heartbeat: HeartbeatScheduler,
    registry: Arc<ClientRegistry>,
    client_sync: Mutex<Option<JoinHandle<()>>>,
    locks: KeyedLocks,
}

impl Recorder {
    /// Opens a recorder.
    ///
    /// Opens the local store, the remote store if one is configured, and
    /// starts replication if `sync` is also set. Known clients are loaded
    /// from the local store, and reloaded whenever replication pulls
    /// changes into it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no local store is configured, and
    /// storage errors from opening or reading the stores.
    pub async fn open(
        config: RecorderConfig,
        provider: Arc<dyn SnapshotProvider>,
        resolver: Arc<dyn StoreResolver>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let store_url = config
            .store_url
            .as_deref()
            .ok_or_else(|| CoreError::config("no database specified"))?;

        let local = resolver.open(store_url)?;
        let remote = match config.remote.as_deref() {
            Some(url) => Some(resolver.open(url)?),
            None => None,
        };

        let replication = match (&remote, config.sync) {
            (Some(remote), true) => Some(ReplicationController::start(
                Arc::clone(&local),
                Arc::clone(remote),
                config.replication_config(),
            )),
            _ => None,
        };

        let factory = DocumentFactory::new(
            config.serial.clone(),
            config.timezone.clone(),
            config.components.clone(),
            provider,
        );

        let registry = Arc::new(ClientRegistry::new());
        let client_sync = replication.as_ref().map(|controller| {
            spawn_client_sync(
                Arc::clone(&registry),
                Arc::clone(&local),
                controller.subscribe(),
            )
        });
        let clients = registry.hydrate(local.as_ref()).await?;

        info!(
            local = local.name(),
            remote = ?remote.as_ref().map(|r| r.name()),
            sync = replication.is_some(),
            clients,
            "recorder opened"
        );

        Ok(Self {
            config,
            factory,
            resolver,
            local,
            remote,
            replication: Mutex::new(replication),
            heartbeat: HeartbeatScheduler::new(),
            registry,
            client_sync: Mutex::new(client_sync),
            locks: KeyedLocks::new(),
        })
    }

    /// Returns the configuration the recorder was opened with.
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Returns the document factory.
    pub fn factory(&self) -> &DocumentFactory {
        &self.factory
    }

    /// Returns the local store.
    pub fn local(&self) -> &Arc<dyn DocumentStore> {
        &self.local
    }

    /// Returns the remote store, if configured.
    pub fn remote(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.remote.as_ref()
    }

    /// Returns true if a remote store is configured.
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Resolves a selector to a store handle.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when selecting the remote store
    /// without one configured, and `InvalidUrl` for unresolvable URLs.
    pub fn store(&self, selector: &StoreSelector) -> CoreResult<Arc<dyn DocumentStore>> {
        match selector {
            StoreSelector::Local => Ok(Arc::clone(&self.local)),
            StoreSelector::Remote => self
                .remote
                .clone()
                .ok_or_else(|| CoreError::config("no remote store configured")),
            StoreSelector::Url(url) => Ok(self.resolver.open(url)?),
        }
    }

    /// Writes one status document to the selected store.
    pub async fn save_status(&self, selector: impl Into<StoreSelector>) -> CoreResult<Revision> {
        let store = self.store(&selector.into())?;
        let doc = self.factory.status();
        let _guard = self.locks.lock(&doc.id).await;
        engine::upsert(store.as_ref(), &doc).await
    }

    /// Writes status documents to the selected store.
    ///
    /// With a zero interval one status document is written and its
    /// revision returned. Otherwise a recurring heartbeat replaces any
    /// running one; `None` uses the configured default interval.
    pub async fn heartbeat(
        &self,
        selector: impl Into<StoreSelector>,
        interval: Option<Duration>,
    ) -> CoreResult<Heartbeat> {
        let selector = selector.into();
        let interval = interval.unwrap_or_else(|| self.config.default_heartbeat_interval());
        if interval.is_zero() {
            return self.save_status(selector).await.map(Heartbeat::Once);
        }

        let store = self.store(&selector)?;
        self.heartbeat
            .start(
                store,
                self.factory.clone(),
                interval,
                self.config.retry_config(),
            )
            .await;
        Ok(Heartbeat::Scheduled { interval })
    }

    /// Stops the recurring heartbeat, returning its final counters.
    pub async fn stop_heartbeat(&self) -> Option<HeartbeatStats> {
        self.heartbeat.stop().await
    }

    /// Returns the counters of the recurring heartbeat.
    pub async fn heartbeat_stats(&self) -> Option<HeartbeatStats> {
        self.heartbeat.stats().await
    }

    /// Creates or updates the data document for `uid` in the local store.
    pub async fn save<T: Serialize>(&self, payload: T, uid: &str) -> CoreResult<Revision> {
        let doc = self.factory.data(serde_json::to_value(payload)?, uid);
        let _guard = self.locks.lock(&doc.id).await;
        engine::upsert(self.local.as_ref(), &doc).await
    }

    /// Replaces the payload of the existing data document for `uid`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` storage error if there is no such document.
    pub async fn update<T: Serialize>(&self, payload: T, uid: &str) -> CoreResult<Revision> {
        let doc = self.factory.data(serde_json::to_value(payload)?, uid);
        let _guard = self.locks.lock(&doc.id).await;
        engine::update(self.local.as_ref(), &doc).await
    }

    /// Reads a document from the local store.
    pub async fn get(&self, id: &str) -> CoreResult<Document> {
        Document::from_stored(self.local.get(id).await?)
    }

    /// Deletes a document from the local store. Absent documents are fine.
    ///
    /// Deleting a client document also unregisters the client.
    pub async fn delete(&self, id: &str) -> CoreResult<()> {
        let _guard = self.locks.lock(id).await;
        match id.strip_prefix("client:") {
            Some(uid) => self
                .registry
                .remove(self.local.as_ref(), uid)
                .await
                .map(|_| ()),
            None => engine::remove(self.local.as_ref(), id).await,
        }
    }

    /// Queries the local store.
    pub async fn query(&self, filter: &QueryFilter) -> CoreResult<Vec<Document>> {
        query::query(self.local.as_ref(), filter).await
    }

    /// Registers a client. Returns `false` if it was already registered.
    pub async fn add_client(&self, record: ClientRecord) -> CoreResult<bool> {
        self.registry
            .add(self.local.as_ref(), &self.factory, record)
            .await
    }

    /// Unregisters a client. Returns `false` if it was not registered.
    pub async fn remove_client(&self, uid: &str) -> CoreResult<bool> {
        self.registry.remove(self.local.as_ref(), uid).await
    }

    /// Returns the registered clients ordered by uid.
    pub fn clients(&self) -> Vec<ClientRecord> {
        self.registry.list()
    }

    /// Returns an empty data document for `uid` without storing it.
    pub fn new_record(&self, uid: &str) -> Document {
        self.factory.blank(uid)
    }

    /// Returns a receiver for replication events, if replication runs.
    ///
    /// The first call returns a receiver that has seen every event since
    /// the recorder opened; later calls see events from then on.
    pub fn replication_events(&self) -> Option<broadcast::Receiver<ReplicationEvent>> {
        let mut replication = self.replication.lock();
        let controller = replication.as_mut()?;
        Some(
            controller
                .take_events()
                .unwrap_or_else(|| controller.subscribe()),
        )
    }

    /// Returns the replication state, if replication runs.
    pub fn replication_state(&self) -> Option<ReplicationState> {
        self.replication.lock().as_ref().map(|c| c.state())
    }

    /// Returns the replication counters, if replication runs.
    pub fn replication_stats(&self) -> Option<ReplicationStats> {
        self.replication.lock().as_ref().map(|c| c.stats())
    }

    /// Stops the heartbeat and replication.
    ///
    /// # Errors
    ///
    /// Returns a sync error if the replication task ended abnormally.
    pub async fn close(&self) -> CoreResult<()> {
        if let Some(stats) = self.heartbeat.stop().await {
            debug!(ticks = stats.ticks, failures = stats.failures, "heartbeat closed");
        }

        let controller = self.replication.lock().take();
        if let Some(mut controller) = controller {
            let stats = controller.stop().await?;
            debug!(
                cycles = stats.cycles_completed,
                written = stats.docs_written,
                "replication closed"
            );
        }
        if let Some(task) = self.client_sync.lock().take() {
            task.abort();
        }

        info!(local = self.local.name(), "recorder closed");
        Ok(())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(task) = self.client_sync.get_mut().take() {
            task.abort();
        }
    }
}

/// Reloads the client registry each time replication pulls documents
/// into the local store.
fn spawn_client_sync(
    registry: Arc<ClientRegistry>,
    local: Arc<dyn DocumentStore>,
    mut events: broadcast::Receiver<ReplicationEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let reload = match events.recv().await {
                Ok(ReplicationEvent::Change(info)) => {
                    info.direction == Direction::Pull && info.docs_written > 0
                }
                Ok(event) if event.is_terminal() => break,
                Ok(_) => false,
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "client sync lagged behind replication events");
                    true
                }
                Err(RecvError::Closed) => break,
            };
            if reload {
                match registry.hydrate(local.as_ref()).await {
                    Ok(clients) => debug!(clients, "client registry reloaded"),
                    Err(err) => warn!(error = %err, "failed to reload client registry"),
                }
            }
        }
    })
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("local", &self.local.name())
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .field("replication", &self.replication_state())
            .field("clients", &self.registry.len())
            .finish_non_exhaustive()
    }
}
