//! # PulseDB Testkit
//!
//! Test utilities for PulseDB.
//!
//! This crate provides:
//! - Snapshot providers with fixed or scripted output
//! - Store wrappers that count calls and inject faults
//! - Recorder fixtures backed by in-memory stores
//! - Property-based test generators using proptest
//! - Concurrent write stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulsedb_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn records_status() {
//!     let fixture = TestRecorder::open(RecorderConfig::new("memory://local")).await;
//!     fixture.recorder.save_status(StoreSelector::Local).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use pulsedb_core::{
        ClientRecord, Document, DocumentKind, Heartbeat, QueryFilter, Recorder, RecorderConfig,
        StoreSelector,
    };
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
