//! Continuous replication controller.

use crate::config::ReplicationConfig;
use crate::error::{SyncError, SyncResult};
use crate::event::{Direction, ReplicationEvent};
use crate::replicator::Replicator;
use crate::state::{ReplicationState, ReplicationStats};
use parking_lot::RwLock;
use pulsedb_storage::DocumentStore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// State shared between the controller handle and its task.
struct Shared {
    state: RwLock<ReplicationState>,
    stats: RwLock<ReplicationStats>,
    events: broadcast::Sender<ReplicationEvent>,
}

impl Shared {
    fn set_state(&self, state: ReplicationState) {
        *self.state.write() = state;
    }

    fn emit(&self, event: ReplicationEvent) {
        match &event {
            ReplicationEvent::Change(info) => debug!(
                direction = %info.direction,
                read = info.docs_read,
                written = info.docs_written,
                "replication change"
            ),
            ReplicationEvent::Paused { error: Some(err) } => {
                warn!(error = %err, "replication paused")
            }
            ReplicationEvent::Paused { error: None } => debug!("replication paused"),
            ReplicationEvent::Active => debug!("replication active"),
            ReplicationEvent::Denied {
                direction,
                id,
                reason,
            } => warn!(%direction, %id, %reason, "document denied"),
            ReplicationEvent::Complete(_) => info!("replication complete"),
            ReplicationEvent::Error(err) => error!(error = %err, "replication failed"),
        }
        // No receivers is fine: observers are optional.
        let _ = self.events.send(event);
    }
}

/// Runs continuous bidirectional replication between a local and a remote
/// store.
///
/// The controller spawns a tokio task on [`start`](Self::start) and owns
/// it: [`stop`](Self::stop) ends it deterministically, and dropping the
/// controller aborts it.
///
/// Lifecycle events are published on a broadcast channel. The receiver
/// returned by [`take_events`](Self::take_events) was subscribed before the
/// task started and therefore sees every event.
pub struct ReplicationController {
    shared: Arc<Shared>,
    initial_events: Option<broadcast::Receiver<ReplicationEvent>>,
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl ReplicationController {
    /// Starts replicating between `local` and `remote`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        local: Arc<dyn DocumentStore>,
        remote: Arc<dyn DocumentStore>,
        config: ReplicationConfig,
    ) -> Self {
        let (events, initial_events) = broadcast::channel(config.event_capacity);
        let shared = Arc::new(Shared {
            state: RwLock::new(ReplicationState::Idle),
            stats: RwLock::new(ReplicationStats::default()),
            events,
        });

        info!(
            local = local.name(),
            remote = remote.name(),
            live = config.live,
            "starting replication"
        );

        let worker = Worker {
            push: Replicator::new(
                Direction::Push,
                Arc::clone(&local),
                Arc::clone(&remote),
                config.batch_size,
            ),
            pull: Replicator::new(Direction::Pull, remote, local, config.batch_size),
            shared: Arc::clone(&shared),
            config,
            paused: false,
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let join_handle = tokio::spawn(worker.run(stop_rx));

        Self {
            shared,
            initial_events: Some(initial_events),
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Takes the receiver that has observed every event since start.
    ///
    /// Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<broadcast::Receiver<ReplicationEvent>> {
        self.initial_events.take()
    }

    /// Subscribes to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ReplicationEvent> {
        self.shared.events.subscribe()
    }

    /// Gets the current state.
    pub fn state(&self) -> ReplicationState {
        *self.shared.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> ReplicationStats {
        self.shared.stats.read().clone()
    }

    /// Returns true while the replication task is running.
    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops replication and waits for the task to finish.
    ///
    /// Returns the final statistics.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyStopped` if `stop` was called before, and `Task` if
    /// the replication task panicked.
    pub async fn stop(&mut self) -> SyncResult<ReplicationStats> {
        let join_handle = self.join_handle.take().ok_or(SyncError::AlreadyStopped)?;
        if let Some(stop_tx) = self.stop_tx.take() {
            // The task may already have ended on its own.
            let _ = stop_tx.send(());
        }

        join_handle
            .await
            .map_err(|err| SyncError::Task(err.to_string()))?;
        Ok(self.stats())
    }
}

impl Drop for ReplicationController {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

impl std::fmt::Debug for ReplicationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationController")
            .field("state", &self.state())
            .field("running", &self.is_running())
            .finish()
    }
}

/// The replication task.
struct Worker {
    push: Replicator,
    pull: Replicator,
    shared: Arc<Shared>,
    config: ReplicationConfig,
    /// Whether `Paused` was emitted since the last `Active`.
    paused: bool,
}

enum Wake {
    Stop,
    Work,
}

impl Worker {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut local_updates = self.push.source().watch_updates();
        let mut remote_updates = self.pull.source().watch_updates();
        let mut attempt: u32 = 0;

        self.shared.set_state(ReplicationState::Active);
        self.shared.emit(ReplicationEvent::Active);

        loop {
            let result = tokio::select! {
                _ = &mut stop_rx => return self.finish(),
                result = self.cycle() => result,
            };

            match result {
                Ok(()) => {
                    attempt = 0;
                    {
                        let mut stats = self.shared.stats.write();
                        stats.cycles_completed += 1;
                        stats.last_sync_time = Some(Instant::now());
                    }

                    if !self.config.live {
                        return self.finish();
                    }
                    self.pause(None);
                }
                Err(err) if err.is_retryable() => {
                    attempt = attempt.saturating_add(1);
                    {
                        let mut stats = self.shared.stats.write();
                        stats.retries += 1;
                        stats.last_error = Some(err.to_string());
                    }

                    if !self.config.live && attempt >= self.config.retry.max_attempts {
                        return self.fail(err);
                    }

                    self.pause(Some(err.to_string()));
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    tokio::select! {
                        _ = &mut stop_rx => return self.finish(),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                Err(err) => return self.fail(err),
            }

            let wake = tokio::select! {
                _ = &mut stop_rx => Wake::Stop,
                _ = next_update(&mut local_updates) => Wake::Work,
                _ = next_update(&mut remote_updates) => Wake::Work,
                _ = tokio::time::sleep(self.config.poll_interval) => Wake::Work,
            };
            if let Wake::Stop = wake {
                return self.finish();
            }
        }
    }

    /// Runs a push pass and then a pull pass.
    async fn cycle(&mut self) -> SyncResult<()> {
        for direction in [Direction::Push, Direction::Pull] {
            loop {
                let replicator = match direction {
                    Direction::Push => &mut self.push,
                    Direction::Pull => &mut self.pull,
                };
                let outcome = replicator.run_batch().await?;

                {
                    let mut stats = self.shared.stats.write();
                    stats.docs_read += outcome.info.docs_read;
                    stats.docs_written += outcome.info.docs_written;
                    stats.docs_denied += outcome.denied.len() as u64;
                }

                if outcome.info.docs_written > 0 {
                    self.resume();
                    self.shared.emit(ReplicationEvent::Change(outcome.info.clone()));
                }
                for denied in outcome.denied {
                    self.shared.emit(ReplicationEvent::Denied {
                        direction,
                        id: denied.id,
                        reason: denied.reason,
                    });
                }

                if !outcome.pending {
                    break;
                }
            }
        }
        Ok(())
    }

    fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.shared.set_state(ReplicationState::Active);
            self.shared.emit(ReplicationEvent::Active);
        }
    }

    fn pause(&mut self, error: Option<String>) {
        // Repeated transient failures are reported each time; an idle
        // replication reports `Paused` once.
        if self.paused && error.is_none() {
            return;
        }
        self.paused = true;
        self.shared.set_state(ReplicationState::Paused);
        self.shared.emit(ReplicationEvent::Paused { error });
    }

    fn finish(self) {
        self.shared.set_state(ReplicationState::Stopped);
        let stats = self.shared.stats.read().clone();
        self.shared.emit(ReplicationEvent::Complete(stats));
    }

    fn fail(self, err: SyncError) {
        self.shared.stats.write().last_error = Some(err.to_string());
        self.shared.set_state(ReplicationState::Error);
        self.shared.emit(ReplicationEvent::Error(err.to_string()));
    }
}

/// Resolves when `updates` reports a new sequence; never resolves if the
/// store cannot push updates.
async fn next_update(updates: &mut Option<watch::Receiver<u64>>) {
    let Some(rx) = updates.as_mut() else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_err() {
        *updates = None;
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use pulsedb_storage::{InMemoryStore, StoredDocument};
    use std::time::Duration;

    fn config() -> ReplicationConfig {
        ReplicationConfig::new()
            .with_poll_interval(Duration::from_millis(50))
            .with_retry(
                RetryConfig::new(3)
                    .with_initial_delay(Duration::from_millis(10))
                    .with_jitter(false),
            )
    }

    async fn next_event(
        rx: &mut broadcast::Receiver<ReplicationEvent>,
        kind: &str,
    ) -> ReplicationEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            if event.kind() == kind {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn one_shot_replication_completes() {
        let local = Arc::new(InMemoryStore::new("local"));
        let remote = Arc::new(InMemoryStore::new("remote"));
        local.post(StoredDocument::new("a", b"1".to_vec())).await.unwrap();
        remote.post(StoredDocument::new("b", b"2".to_vec())).await.unwrap();

        let mut controller = ReplicationController::start(
            local.clone(),
            remote.clone(),
            ReplicationConfig::one_shot(),
        );
        let mut events = controller.take_events().unwrap();
        assert!(controller.take_events().is_none());

        let ReplicationEvent::Complete(stats) = next_event(&mut events, "complete").await else {
            unreachable!()
        };
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(controller.state(), ReplicationState::Stopped);

        assert!(local.get("b").await.is_ok());
        assert!(remote.get("a").await.is_ok());
    }

    #[tokio::test]
    async fn live_replication_follows_writes_and_stops() {
        let local = Arc::new(InMemoryStore::new("local"));
        let remote = Arc::new(InMemoryStore::new("remote"));

        let mut controller = ReplicationController::start(local.clone(), remote.clone(), config());
        let mut events = controller.take_events().unwrap();
        next_event(&mut events, "paused").await;

        local.post(StoredDocument::new("x", b"1".to_vec())).await.unwrap();
        let ReplicationEvent::Change(info) = next_event(&mut events, "change").await else {
            unreachable!()
        };
        assert_eq!(info.direction, Direction::Push);
        assert_eq!(info.docs_written, 1);
        assert_eq!(remote.get("x").await.unwrap().rev, local.get("x").await.unwrap().rev);

        let stats = controller.stop().await.unwrap();
        assert!(stats.docs_written >= 1);
        assert_eq!(controller.state(), ReplicationState::Stopped);
        assert!(matches!(
            controller.stop().await,
            Err(SyncError::AlreadyStopped)
        ));
    }

    #[tokio::test]
    async fn non_retryable_failure_ends_replication() {
        let local = Arc::new(InMemoryStore::new("local"));
        let remote = Arc::new(InMemoryStore::new("remote"));
        remote.close();

        let mut controller = ReplicationController::start(local, remote, config());
        let mut events = controller.take_events().unwrap();

        let ReplicationEvent::Error(message) = next_event(&mut events, "error").await else {
            unreachable!()
        };
        assert!(message.contains("closed"));
        assert_eq!(controller.state(), ReplicationState::Error);
        assert!(controller.stop().await.is_ok());
    }
}
