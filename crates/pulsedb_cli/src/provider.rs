//! Snapshot provider backed by a file written by the host prober.

use parking_lot::Mutex;
use pulsedb_core::{SnapshotProvider, StatusSnapshot};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors reading a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotFileError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The snapshot file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid snapshot.
    #[error("invalid snapshot in {}: {source}", path.display())]
    Json {
        /// The snapshot file.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },
}

/// Re-reads a snapshot file on every capture.
///
/// When the file cannot be read or parsed the last good snapshot is
/// returned instead.
#[derive(Debug)]
pub struct FileSnapshotProvider {
    path: PathBuf,
    last_good: Mutex<Option<StatusSnapshot>>,
}

impl FileSnapshotProvider {
    /// Creates a provider for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: Mutex::new(None),
        }
    }

    /// Creates a provider and checks that `path` holds a valid snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SnapshotFileError> {
        let provider = Self::new(path);
        let snapshot = provider.read()?;
        *provider.last_good.lock() = Some(snapshot);
        Ok(provider)
    }

    /// Returns the snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StatusSnapshot, SnapshotFileError> {
        let json = std::fs::read_to_string(&self.path).map_err(|source| SnapshotFileError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SnapshotFileError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

impl SnapshotProvider for FileSnapshotProvider {
    fn capture_status(&self) -> StatusSnapshot {
        match self.read() {
            Ok(snapshot) => {
                *self.last_good.lock() = Some(snapshot.clone());
                snapshot
            }
            Err(err) => {
                warn!(error = %err, "using last good snapshot");
                self.last_good.lock().clone().unwrap_or_default()
            }
        }
    }
}
