//! Heartbeat command implementation.

use super::snapshot::PrintedDocument;
use crate::provider::FileSnapshotProvider;
use pulsedb_core::{
    DocumentKind, Heartbeat, HeartbeatStats, MemoryResolver, QueryFilter, Recorder,
    RecorderConfig, StoreSelector,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Heartbeat run summary.
#[derive(Debug, Serialize)]
pub struct HeartbeatReport {
    /// Beats attempted.
    pub ticks: u64,
    /// Beats that wrote a status document.
    pub successes: u64,
    /// Beats that failed.
    pub failures: u64,
    /// Error of the most recent failed beat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Revision of the most recent successful beat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_revision: Option<String>,
    /// Replication events observed, by kind.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replication_events: Vec<&'static str>,
}

impl From<HeartbeatStats> for HeartbeatReport {
    fn from(stats: HeartbeatStats) -> Self {
        Self {
            ticks: stats.ticks,
            successes: stats.successes,
            failures: stats.failures,
            last_error: stats.last_error,
            last_revision: stats.last_revision.map(|rev| rev.to_string()),
            replication_events: Vec::new(),
        }
    }
}

/// Runs the heartbeat command.
pub async fn run(
    config: RecorderConfig,
    input: &Path,
    interval_ms: u64,
    beats: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = FileSnapshotProvider::open(input)?;
    info!(input = %provider.path().display(), "reading snapshots");

    let recorder = Recorder::open(
        config,
        Arc::new(provider),
        Arc::new(MemoryResolver::new()),
    )
    .await?;
    let mut events = recorder.replication_events();

    let interval = Duration::from_millis(interval_ms);
    let report = match recorder.heartbeat(StoreSelector::Local, Some(interval)).await? {
        Heartbeat::Once(rev) => HeartbeatReport {
            ticks: 1,
            successes: 1,
            failures: 0,
            last_error: None,
            last_revision: Some(rev.to_string()),
            replication_events: Vec::new(),
        },
        Heartbeat::Scheduled { .. } => {
            let poll = interval.min(Duration::from_millis(50));
            loop {
                let ticks = recorder.heartbeat_stats().await.map_or(0, |s| s.ticks);
                if ticks >= beats.max(1) {
                    break;
                }
                tokio::time::sleep(poll).await;
            }
            recorder
                .stop_heartbeat()
                .await
                .map(HeartbeatReport::from)
                .ok_or("heartbeat was not running")?
        }
    };

    let statuses = recorder
        .query(&QueryFilter::new().kind(DocumentKind::Status))
        .await?;
    recorder.close().await?;

    let mut report = report;
    if let Some(events) = events.as_mut() {
        while let Ok(event) = events.try_recv() {
            report.replication_events.push(event.kind());
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    let printed: Vec<_> = statuses.iter().map(PrintedDocument::new).collect();
    println!("{}", serde_json::to_string_pretty(&printed)?);
    Ok(())
}
