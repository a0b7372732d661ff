//! # PulseDB Sync
//!
//! Continuous bidirectional replication between two PulseDB document stores.
//!
//! This crate provides:
//! - Replication state machine (idle → active ⇄ paused → stopped)
//! - Per-direction change-feed checkpoints
//! - Deterministic revision-based conflict resolution
//! - Retry with exponential backoff
//! - A typed stream of lifecycle events
//!
//! ## Architecture
//!
//! Each replication cycle runs a **push-then-pull** pair of passes:
//! 1. Read the local change feed from the push checkpoint and apply every
//!    change to the remote store
//! 2. Read the remote change feed from the pull checkpoint and apply every
//!    change to the local store
//!
//! In live mode the controller then waits for either store to report an
//! update (or for the poll interval) and runs the next cycle.
//!
//! ## Key Invariants
//!
//! - Applying a change is idempotent; replaying a batch is harmless
//! - Both stores converge on the highest revision of every document
//! - Transient failures pause replication instead of ending it
//! - Observers never influence replication state

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod controller;
mod error;
mod event;
mod replicator;
mod state;

pub use config::{ReplicationConfig, RetryConfig};
pub use controller::ReplicationController;
pub use error::{SyncError, SyncResult};
pub use event::{ChangeInfo, Direction, ReplicationEvent};
pub use replicator::{BatchOutcome, DeniedDocument, Replicator};
pub use state::{ReplicationState, ReplicationStats};
