//! CLI command implementations.

pub mod heartbeat;
pub mod snapshot;
