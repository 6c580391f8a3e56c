//! Timer that drives the ingestion pipeline.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{IngestError, IngestPipeline};

/// Runs an ingestion cycle every `interval`, starting immediately, until
/// `shutdown` flips to `true` or its sender is dropped.
///
/// Cycles run inline, so a slow cycle delays the next tick instead of
/// overlapping it; ticks missed meanwhile are skipped. Shutdown is noticed
/// between cycles, never in the middle of one.
pub async fn run_scheduler(
    pipeline: Arc<IngestPipeline>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = interval.as_secs(), "Schedule polling started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                // Outcomes are logged by the pipeline itself.
                if let Err(IngestError::CycleInProgress) = pipeline.run_cycle().await {
                    debug!("Another ingestion cycle is running, skipping tick");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Schedule polling stopped");
}

/// Waits up to `grace` for a scheduler task that has been told to shut down,
/// then aborts it and waits for it to unwind. Returns `true` if the task
/// stopped on its own.
///
/// An aborted cycle never leaves a partial snapshot: the store swap runs on a
/// blocking task inside one transaction and finishes regardless.
pub async fn stop_scheduler(mut task: JoinHandle<()>, grace: Duration) -> bool {
    if tokio::time::timeout(grace, &mut task).await.is_ok() {
        return true;
    }

    warn!(
        grace_secs = grace.as_secs_f64(),
        "Ingestion cycle still running after grace period, abandoning it"
    );
    task.abort();
    // Resolves once the cycle has been dropped and released the pipeline.
    let _ = task.await;
    false
}
