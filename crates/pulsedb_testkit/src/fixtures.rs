//! Test fixtures and recorder helpers.
//!
//! Provides snapshot providers with predictable output and a recorder
//! wired to in-memory stores.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use pulsedb_core::{
    Drive, NetworkInterface, Recorder, RecorderConfig, ScanResult, SnapshotProvider,
    StatusSnapshot, UsbDevice,
};
use pulsedb_storage::{DocumentStore, MemoryResolver, StoreResolver};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Builds a plausible snapshot for a freshly booted host.
///
/// Each call uses a new random boot id.
pub fn sample_snapshot() -> StatusSnapshot {
    sample_snapshot_for_boot(&uuid::Uuid::new_v4().to_string())
}

/// Builds a plausible snapshot with the given boot id.
pub fn sample_snapshot_for_boot(boot_id: &str) -> StatusSnapshot {
    let now = Utc::now();
    StatusSnapshot {
        boot_id: boot_id.to_string(),
        boot_time: now - ChronoDuration::minutes(5),
        captured_at: now,
        usb_devices: vec![UsbDevice {
            dev: "/dev/bus/usb/001/004".into(),
            kind: "video".into(),
            hub: "1-1".into(),
            product: "USB Camera".into(),
            id: "046d:0825".into(),
        }],
        drives: vec![Drive {
            filesystem: "/dev/mmcblk0p2".into(),
            blocks: "15023232".into(),
            used: "3921000".into(),
            available: "10428800".into(),
            capacity: "28%".into(),
            mounted: "/".into(),
        }],
        networks: vec![NetworkInterface {
            kind: "wifi".into(),
            mac: "b8:27:eb:00:00:01".into(),
            interface: "wlan0".into(),
            essid: Some("field-net".into()),
            scan: Some(vec![ScanResult {
                essid: "field-net".into(),
                mac: "aa:bb:cc:dd:ee:ff".into(),
                signal: "-52".into(),
            }]),
            ip: Some("10.0.0.12".into()),
            gateway: Some("10.0.0.1".into()),
        }],
        ..StatusSnapshot::default()
    }
}

/// Returns the same snapshot on every capture.
#[derive(Debug, Clone)]
pub struct FixedSnapshotProvider {
    snapshot: StatusSnapshot,
}

impl FixedSnapshotProvider {
    /// Creates a provider returning `snapshot`.
    pub fn new(snapshot: StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Creates a provider returning a sample snapshot for `boot_id`.
    pub fn for_boot(boot_id: &str) -> Self {
        Self::new(sample_snapshot_for_boot(boot_id))
    }
}

impl SnapshotProvider for FixedSnapshotProvider {
    fn capture_status(&self) -> StatusSnapshot {
        let mut snapshot = self.snapshot.clone();
        snapshot.captured_at = Utc::now();
        snapshot
    }
}

/// Replays a list of snapshots, repeating the last one when exhausted.
#[derive(Debug)]
pub struct SequenceSnapshotProvider {
    snapshots: Vec<StatusSnapshot>,
    captures: AtomicU64,
}

impl SequenceSnapshotProvider {
    /// Creates a provider replaying `snapshots` in order.
    ///
    /// An empty list yields default snapshots.
    pub fn new(snapshots: Vec<StatusSnapshot>) -> Self {
        Self {
            snapshots,
            captures: AtomicU64::new(0),
        }
    }

    /// Creates a provider simulating a reboot after `beats_per_boot`
    /// captures, for each boot id in turn.
    pub fn reboots(boot_ids: &[&str], beats_per_boot: usize) -> Self {
        let snapshots = boot_ids
            .iter()
            .flat_map(|boot| std::iter::repeat(*boot).take(beats_per_boot.max(1)))
            .map(sample_snapshot_for_boot)
            .collect();
        Self::new(snapshots)
    }

    /// Returns how many snapshots were captured.
    pub fn captures(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }
}

impl SnapshotProvider for SequenceSnapshotProvider {
    fn capture_status(&self) -> StatusSnapshot {
        let index = self.captures.fetch_add(1, Ordering::SeqCst) as usize;
        let mut snapshot = self
            .snapshots
            .get(index)
            .or_else(|| self.snapshots.last())
            .cloned()
            .unwrap_or_default();
        snapshot.captured_at = Utc::now();
        snapshot
    }
}

/// A recorder over in-memory stores.
pub struct TestRecorder {
    /// The recorder instance.
    pub recorder: Recorder,
    /// The resolver backing every store URL.
    pub resolver: Arc<MemoryResolver>,
}

impl TestRecorder {
    /// Opens a recorder with serial `SN-TEST` and a fixed boot id.
    pub async fn open(config: RecorderConfig) -> Self {
        Self::open_with(
            config,
            Arc::new(FixedSnapshotProvider::for_boot("boot-test")),
            Arc::new(MemoryResolver::new()),
        )
        .await
    }

    /// Opens a recorder with an explicit provider and resolver.
    ///
    /// Stores registered with `resolver` beforehand are used as is.
    pub async fn open_with(
        config: RecorderConfig,
        provider: Arc<dyn SnapshotProvider>,
        resolver: Arc<MemoryResolver>,
    ) -> Self {
        let config = if config.serial.is_empty() {
            config.serial("SN-TEST")
        } else {
            config
        };
        let recorder = Recorder::open(config, provider, resolver.clone())
            .await
            .expect("Failed to open recorder");
        Self { recorder, resolver }
    }

    /// Opens (or reopens) the store behind `url`.
    pub fn open_store(&self, url: &str) -> Arc<dyn DocumentStore> {
        self.resolver.open(url).expect("Failed to open store")
    }
}

impl std::ops::Deref for TestRecorder {
    type Target = Recorder;

    fn deref(&self) -> &Self::Target {
        &self.recorder
    }
}

/// A JSON config file in a temporary directory.
pub struct TestConfigFile {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestConfigFile {
    /// Writes `json` to a fresh temporary file.
    pub fn new(json: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("recorder.json");
        let mut file = std::fs::File::create(&path).expect("Failed to create config file");
        file.write_all(json.as_bytes())
            .expect("Failed to write config file");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Polls `check` every 10ms until it returns true or `timeout` elapses.
///
/// Returns whether the condition was met.
pub async fn eventually<F, Fut>(timeout: std::time::Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let poll = async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.is_ok()
}

/// A provider whose snapshots share a mutable boot id.
///
/// Changing the boot id simulates a reboot between captures.
#[derive(Debug)]
pub struct RebootableProvider {
    boot_id: Mutex<String>,
}

impl RebootableProvider {
    /// Creates a provider for `boot_id`.
    pub fn new(boot_id: &str) -> Self {
        Self {
            boot_id: Mutex::new(boot_id.to_string()),
        }
    }

    /// Switches to a new boot id.
    pub fn reboot(&self, boot_id: &str) {
        *self.boot_id.lock() = boot_id.to_string();
    }
}

impl SnapshotProvider for RebootableProvider {
    fn capture_status(&self) -> StatusSnapshot {
        let boot_id = self.boot_id.lock().clone();
        sample_snapshot_for_boot(&boot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_snapshots_have_unique_boots() {
        assert_ne!(sample_snapshot().boot_id, sample_snapshot().boot_id);
    }

    #[test]
    fn sequence_repeats_last() {
        let provider = SequenceSnapshotProvider::reboots(&["a", "b"], 2);
        let boots: Vec<_> = (0..5).map(|_| provider.capture_status().boot_id).collect();
        assert_eq!(boots, ["a", "a", "b", "b", "b"]);
        assert_eq!(provider.captures(), 5);
    }

    #[test]
    fn empty_sequence_yields_defaults() {
        let provider = SequenceSnapshotProvider::new(Vec::new());
        assert!(provider.capture_status().boot_id.is_empty());
    }

    #[test]
    fn rebootable_switches_boot() {
        let provider = RebootableProvider::new("one");
        assert_eq!(provider.capture_status().boot_id, "one");
        provider.reboot("two");
        assert_eq!(provider.capture_status().boot_id, "two");
    }

    #[test]
    fn config_file_is_readable() {
        let file = TestConfigFile::new(r#"{ "store_url": "memory://x" }"#);
        let config = RecorderConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.store_url.as_deref(), Some("memory://x"));
    }
}
