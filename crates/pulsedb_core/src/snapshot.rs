//! Host status snapshots.
//!
//! Snapshots are produced by an external prober (USB, drive, network,
//! audio and video enumeration) and consumed here as plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time capture of host hardware, network and boot state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    /// Kernel boot identifier; changes on every boot.
    pub boot_id: String,
    /// When the host booted.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub boot_time: DateTime<Utc>,
    /// When this snapshot was taken.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
    /// Attached USB devices.
    pub usb_devices: Vec<UsbDevice>,
    /// Mounted drives.
    pub drives: Vec<Drive>,
    /// Network interfaces.
    pub networks: Vec<NetworkInterface>,
    /// Video capture inputs.
    pub video: VideoInputs,
    /// Audio capture inputs.
    pub audio: AudioInputs,
}

/// A USB device as reported by the prober.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbDevice {
    /// Device node.
    pub dev: String,
    /// Device class.
    #[serde(rename = "type")]
    pub kind: String,
    /// Hub the device hangs off.
    pub hub: String,
    /// Product string.
    pub product: String,
    /// Vendor:product id.
    pub id: String,
}

/// A mounted filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Drive {
    /// Filesystem device.
    pub filesystem: String,
    /// Total blocks.
    pub blocks: String,
    /// Used blocks.
    pub used: String,
    /// Available blocks.
    pub available: String,
    /// Use percentage.
    pub capacity: String,
    /// Mount point.
    pub mounted: String,
}

/// A network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    /// Link type (`wired`, `wifi`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Hardware address.
    pub mac: String,
    /// Interface name.
    pub interface: String,
    /// Connected network name, for wireless links.
    pub essid: Option<String>,
    /// Visible wireless networks.
    pub scan: Option<Vec<ScanResult>>,
    /// Assigned address.
    pub ip: Option<String>,
    /// Default gateway.
    pub gateway: Option<String>,
}

/// A visible wireless network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanResult {
    /// Network name.
    pub essid: String,
    /// Access point address.
    pub mac: String,
    /// Signal strength.
    pub signal: String,
}

/// Video inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInputs {
    /// Capture devices.
    pub inputs: Vec<VideoInput>,
}

/// A video capture device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInput {
    /// Device node.
    pub dev: String,
    /// Human-readable label.
    pub label: String,
    /// Whether the device is capturing.
    pub active: bool,
    /// Channels of the device.
    pub channels: Vec<VideoChannel>,
    /// Model id.
    pub model_id: String,
    /// Vendor id.
    pub vendor_id: String,
    /// Current resolution.
    pub resolution: String,
    /// Bus the device is attached to.
    pub bus: String,
    /// Device serial number.
    pub serial: String,
}

/// A channel of a video capture device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoChannel {
    /// Device node.
    pub dev: String,
    /// Human-readable label.
    pub label: String,
    /// Whether the channel is active.
    pub active: bool,
}

/// Audio inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioInputs {
    /// Capture devices.
    pub inputs: Vec<AudioInput>,
}

/// An audio capture device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioInput {
    /// Human-readable label.
    pub label: String,
    /// Device node.
    pub dev: String,
    /// PulseAudio source name.
    pub pulsename: String,
    /// Whether the device is capturing.
    pub active: bool,
    /// Channels of the device.
    pub channels: Vec<AudioChannel>,
}

/// A channel of an audio capture device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioChannel {
    /// Device node.
    pub dev: String,
    /// Whether the channel is active.
    pub active: bool,
}

/// Produces host snapshots on demand.
///
/// Capturing is synchronous and infallible from the recorder's point of
/// view; providers that probe hardware report what they could gather.
pub trait SnapshotProvider: Send + Sync {
    /// Captures the current host state.
    fn capture_status(&self) -> StatusSnapshot;
}

impl<F> SnapshotProvider for F
where
    F: Fn() -> StatusSnapshot + Send + Sync,
{
    fn capture_status(&self) -> StatusSnapshot {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let snapshot: StatusSnapshot = serde_json::from_str(
            r#"{
                "boot_id": "b-1",
                "boot_time": 1700000000000,
                "networks": [{ "type": "wifi", "mac": "aa:bb", "interface": "wlan0", "essid": "home" }]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.boot_id, "b-1");
        assert_eq!(snapshot.boot_time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(snapshot.networks[0].kind, "wifi");
        assert_eq!(snapshot.networks[0].essid.as_deref(), Some("home"));
        assert!(snapshot.networks[0].scan.is_none());
        assert!(snapshot.usb_devices.is_empty());
        assert!(snapshot.video.inputs.is_empty());
    }

    #[test]
    fn closures_are_providers() {
        let provider = || StatusSnapshot {
            boot_id: "closure".into(),
            ..StatusSnapshot::default()
        };
        assert_eq!(provider.capture_status().boot_id, "closure");
    }
}
