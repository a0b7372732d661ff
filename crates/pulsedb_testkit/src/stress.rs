//! Concurrent write stress helpers.

use pulsedb_core::Recorder;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        Self {
            total_ops: successful + failed,
            successful_ops: successful,
            failed_ops: failed,
            duration,
        }
    }

    /// Returns operations per second.
    pub fn ops_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total_ops as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent writers.
    pub writers: usize,
    /// Saves per writer.
    pub saves_per_writer: usize,
    /// Number of distinct uids the writers share.
    pub uids: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            writers: 8,
            saves_per_writer: 25,
            uids: 4,
        }
    }
}

/// Runs concurrent saves against a shared set of uids.
///
/// Every writer saves `{ "writer": w, "n": i }` payloads round-robin over
/// the uid pool.
pub async fn concurrent_saves(recorder: Arc<Recorder>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let uids = config.uids.max(1);

    let tasks: Vec<_> = (0..config.writers)
        .map(|writer| {
            let recorder = Arc::clone(&recorder);
            let saves = config.saves_per_writer;
            tokio::spawn(async move {
                let mut ok = 0;
                let mut failed = 0;
                for n in 0..saves {
                    let uid = format!("stress-{}", (writer + n) % uids);
                    match recorder.save(json!({ "writer": writer, "n": n }), &uid).await {
                        Ok(_) => ok += 1,
                        Err(_) => failed += 1,
                    }
                }
                (ok, failed)
            })
        })
        .collect();

    let mut successful = 0;
    let mut failed = 0;
    for task in tasks {
        match task.await {
            Ok((ok, err)) => {
                successful += ok;
                failed += err;
            }
            Err(_) => failed += config.saves_per_writer,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}
