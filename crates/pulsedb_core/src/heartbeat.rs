//! Heartbeat scheduling.
//!
//! A heartbeat captures a fresh host snapshot and upserts it as the
//! current boot's status document. Recurring heartbeats run on a tokio
//! task owned by a [`HeartbeatHandle`]; the [`HeartbeatScheduler`] keeps at
//! most one of them alive.

use crate::engine::upsert_with_retry;
use crate::factory::DocumentFactory;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pulsedb_storage::{DocumentStore, Revision};
use pulsedb_sync::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Outcome of a heartbeat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heartbeat {
    /// A single status document was written.
    Once(Revision),
    /// A recurring heartbeat was started.
    Scheduled {
        /// Time between beats.
        interval: Duration,
    },
}

/// Counters for a recurring heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    /// Beats attempted.
    pub ticks: u64,
    /// Beats that wrote a status document.
    pub successes: u64,
    /// Beats that failed.
    pub failures: u64,
    /// Error of the most recent failed beat.
    pub last_error: Option<String>,
    /// Revision written by the most recent successful beat.
    pub last_revision: Option<Revision>,
    /// When the most recent beat finished.
    pub last_beat: Option<DateTime<Utc>>,
}

/// Owns a running recurring heartbeat.
///
/// Dropping the handle aborts the task.
pub struct HeartbeatHandle {
    interval: Duration,
    stats: Arc<RwLock<HeartbeatStats>>,
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    /// Spawns a heartbeat writing to `store` every `interval`.
    ///
    /// The first beat happens immediately. Failed beats are logged and
    /// counted; they never end the schedule.
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        factory: DocumentFactory,
        interval: Duration,
        retry: RetryConfig,
    ) -> Self {
        let stats = Arc::new(RwLock::new(HeartbeatStats::default()));
        let (stop_tx, stop_rx) = oneshot::channel();

        info!(store = store.name(), ?interval, "starting heartbeat");
        let join_handle = tokio::spawn(run(
            store,
            factory,
            interval,
            retry,
            Arc::clone(&stats),
            stop_rx,
        ));

        Self {
            interval,
            stats,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Returns the time between beats.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns a copy of the counters.
    pub fn stats(&self) -> HeartbeatStats {
        self.stats.read().clone()
    }

    /// Returns true while the task is running.
    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the heartbeat and waits for the task to end.
    ///
    /// A beat in progress is abandoned. Returns the final counters.
    pub async fn stop(mut self) -> HeartbeatStats {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            if let Err(err) = join_handle.await {
                warn!(error = %err, "heartbeat task ended abnormally");
            }
        }
        info!(interval = ?self.interval, "heartbeat stopped");
        self.stats()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

impl std::fmt::Debug for HeartbeatHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatHandle")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run(
    store: Arc<dyn DocumentStore>,
    factory: DocumentFactory,
    interval: Duration,
    retry: RetryConfig,
    stats: Arc<RwLock<HeartbeatStats>>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {}
        }

        let doc = factory.status();
        let result = tokio::select! {
            _ = &mut stop_rx => break,
            result = upsert_with_retry(store.as_ref(), &doc, &retry) => result,
        };

        let mut current = stats.write();
        current.ticks += 1;
        current.last_beat = Some(Utc::now());
        match result {
            Ok(rev) => {
                debug!(id = %doc.id, %rev, "heartbeat written");
                current.successes += 1;
                current.last_revision = Some(rev);
            }
            Err(err) => {
                warn!(store = store.name(), id = %doc.id, error = %err, "heartbeat failed");
                current.failures += 1;
                current.last_error = Some(err.to_string());
            }
        }
    }
}

/// Keeps at most one recurring heartbeat running.
#[derive(Debug, Default)]
pub struct HeartbeatScheduler {
    current: Mutex<Option<HeartbeatHandle>>,
}

impl HeartbeatScheduler {
    /// Creates a scheduler with nothing running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a recurring heartbeat, stopping the previous one first.
    pub async fn start(
        &self,
        store: Arc<dyn DocumentStore>,
        factory: DocumentFactory,
        interval: Duration,
        retry: RetryConfig,
    ) {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            previous.stop().await;
        }
        *current = Some(HeartbeatHandle::spawn(store, factory, interval, retry));
    }

    /// Stops the running heartbeat, returning its final counters.
    pub async fn stop(&self) -> Option<HeartbeatStats> {
        let handle = self.current.lock().await.take()?;
        Some(handle.stop().await)
    }

    /// Returns the counters of the running heartbeat.
    pub async fn stats(&self) -> Option<HeartbeatStats> {
        self.current.lock().await.as_ref().map(HeartbeatHandle::stats)
    }

    /// Returns the interval of the running heartbeat.
    pub async fn interval(&self) -> Option<Duration> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(HeartbeatHandle::interval)
    }
}
