//! # PulseDB Storage
//!
//! Document store adapter for PulseDB.
//!
//! This crate provides the lowest-level store abstraction used by the
//! PulseDB recorder and replication engine. Stores are **key-addressed
//! document stores** with revision-based optimistic concurrency; document
//! bodies are opaque bytes that the store never interprets.
//!
//! ## Design Principles
//!
//! - Every write is checked against the current revision of the key
//! - Lookups distinguish "not found" from every other failure
//! - Deletions leave tombstones so they can replicate
//! - Stores must be `Send + Sync` and are shared as `Arc<dyn DocumentStore>`
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - Reference store for tests and ephemeral agents
//! - [`MemoryResolver`] - Opens one shared [`InMemoryStore`] per URL
//!
//! ## Example
//!
//! ```rust
//! use pulsedb_storage::{DocumentStore, InMemoryStore, StoredDocument};
//!
//! # tokio_test_block_on(async {
//! let store = InMemoryStore::new("local");
//! let rev = store.post(StoredDocument::new("a", b"hello".to_vec())).await.unwrap();
//! let doc = store.get("a").await.unwrap();
//! assert_eq!(doc.rev, Some(rev));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod memory;
mod resolver;
mod revision;
mod store;

pub use document::{Change, ChangeBatch, ReplicatedWrite, StoredDocument};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use resolver::{MemoryResolver, StoreResolver};
pub use revision::Revision;
pub use store::DocumentStore;
