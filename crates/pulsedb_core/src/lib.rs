//! # PulseDB Core
//!
//! Status and data recorder for device reporting agents.
//!
//! This crate provides:
//! - The typed document model (status, data and client documents)
//! - The upsert and delete engines built on a revisioned document store
//! - A heartbeat scheduler that records host snapshots on an interval
//! - A client registry with idempotent add/remove
//! - Range and filter queries over stored documents
//! - The [`Recorder`] facade that wires all of the above to a local store,
//!   an optional remote store and optional continuous replication
//!
//! ## Write protocol
//!
//! Every write goes through [`upsert`]: the current revision is always
//! fetched from the target store, never trusted from the caller, and the
//! engine decides between create and update before writing anything.
//! Concurrent writers are guarded by the store's revision check.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod document;
mod engine;
mod error;
mod factory;
mod heartbeat;
mod locks;
mod query;
mod recorder;
mod registry;
mod selector;
mod snapshot;

pub use config::RecorderConfig;
pub use document::{
    client_id, data_id, status_id, ClientRecord, Component, DataRecord, Document, DocumentBody,
    DocumentKind, StatusRecord,
};
pub use engine::{remove, update, upsert, upsert_with_retry};
pub use error::{CoreError, CoreResult};
pub use factory::DocumentFactory;
pub use heartbeat::{Heartbeat, HeartbeatHandle, HeartbeatScheduler, HeartbeatStats};
pub use locks::KeyedLocks;
pub use query::{query, QueryFilter};
pub use recorder::Recorder;
pub use registry::ClientRegistry;
pub use selector::StoreSelector;
pub use snapshot::{
    AudioChannel, AudioInput, AudioInputs, Drive, NetworkInterface, ScanResult, SnapshotProvider,
    StatusSnapshot, UsbDevice, VideoChannel, VideoInput, VideoInputs,
};

pub use pulsedb_storage::{DocumentStore, InMemoryStore, MemoryResolver, Revision, StoreResolver};
pub use pulsedb_sync::{ReplicationEvent, ReplicationState, ReplicationStats, RetryConfig};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
