//! Recorder configuration.

use crate::document::Component;
use crate::error::{CoreError, CoreResult};
use pulsedb_sync::{ReplicationConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for opening a [`Recorder`](crate::Recorder).
///
/// Loadable from JSON; every field except `store_url` has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// URL of the local store. Required.
    #[serde(alias = "storeurl")]
    pub store_url: Option<String>,

    /// URL of the remote store.
    pub remote: Option<String>,

    /// Whether to continuously replicate between local and remote.
    pub sync: bool,

    /// Host component labels copied into every status document.
    pub components: Vec<Component>,

    /// Host serial.
    pub serial: String,

    /// Host timezone label.
    pub timezone: String,

    /// Default heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Attempts made by heartbeat ticks when a write conflicts.
    pub conflict_retry_attempts: u32,

    /// How often live replication polls stores that cannot push updates.
    pub poll_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            remote: None,
            sync: false,
            components: Vec::new(),
            serial: String::new(),
            timezone: "UTC".to_string(),
            heartbeat_interval_ms: 30_000,
            conflict_retry_attempts: 3,
            poll_interval_ms: 10_000,
        }
    }
}

impl RecorderConfig {
    /// Creates a configuration for the given local store.
    #[must_use]
    pub fn new(store_url: impl Into<String>) -> Self {
        Self {
            store_url: Some(store_url.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Sets the remote store.
    #[must_use]
    pub fn remote(mut self, url: impl Into<String>) -> Self {
        self.remote = Some(url.into());
        self
    }

    /// Enables or disables continuous replication.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    /// Sets the host serial.
    #[must_use]
    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    /// Sets the host timezone label.
    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Adds a host component label.
    #[must_use]
    pub fn component(mut self, kind: impl Into<String>, uid: impl Into<String>) -> Self {
        self.components.push(Component {
            kind: kind.into(),
            uid: uid.into(),
        });
        self
    }

    /// Sets the default heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the replication poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the number of attempts for conflicting heartbeat writes.
    #[must_use]
    pub const fn conflict_retry_attempts(mut self, attempts: u32) -> Self {
        self.conflict_retry_attempts = attempts;
        self
    }

    /// Checks that the configuration can open a recorder.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no local store is given.
    pub fn validate(&self) -> CoreResult<()> {
        match self.store_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(()),
            _ => Err(CoreError::config("no database specified")),
        }
    }

    /// Returns the default heartbeat interval.
    pub fn default_heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Returns true if a replication task should run.
    pub fn replicates(&self) -> bool {
        self.sync && self.remote.is_some()
    }

    /// Retry policy used for conflicting heartbeat writes.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.conflict_retry_attempts.max(1))
            .with_initial_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_secs(2))
    }

    /// Live replication configuration.
    pub fn replication_config(&self) -> ReplicationConfig {
        ReplicationConfig::new().with_poll_interval(Duration::from_millis(self.poll_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = RecorderConfig::default();
        assert!(config.store_url.is_none());
        assert!(!config.sync);
        assert_eq!(config.default_heartbeat_interval(), Duration::from_secs(30));
        assert!(!config.replicates());
    }

    #[test]
    fn builder_pattern() {
        let config = RecorderConfig::new("mem://local")
            .remote("mem://remote")
            .sync(true)
            .serial("SN1")
            .component("camera", "cam-0")
            .heartbeat_interval(Duration::from_secs(5));

        assert_eq!(config.store_url.as_deref(), Some("mem://local"));
        assert!(config.replicates());
        assert_eq!(config.components[0].uid, "cam-0");
        assert_eq!(config.heartbeat_interval_ms, 5_000);
        config.validate().unwrap();
    }

    #[test]
    fn remote_alone_does_not_replicate() {
        let config = RecorderConfig::new("mem://local").remote("mem://remote");
        assert!(!config.replicates());
    }

    #[test]
    fn missing_store_is_rejected() {
        let err = RecorderConfig::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "configuration error: no database specified");

        let blank = RecorderConfig::new("  ");
        assert!(matches!(blank.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn json_accepts_legacy_store_key() {
        let config = RecorderConfig::from_json_str(
            r#"{ "storeurl": "mem://local", "sync": true, "components": [{ "type": "mic", "uid": "m0" }] }"#,
        )
        .unwrap();
        assert_eq!(config.store_url.as_deref(), Some("mem://local"));
        assert!(config.sync);
        assert_eq!(config.components[0].kind, "mic");
        assert_eq!(config.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "store_url": "mem://disk", "serial": "SN7" }}"#).unwrap();

        let config = RecorderConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.serial, "SN7");

        let missing = RecorderConfig::from_json_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(CoreError::Io(_))));
    }
}
