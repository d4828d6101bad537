//! The single consumer of the trigger queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use storyroll_stories::{StoryAggregator, Trigger, UpdateOutcome};

/// Counters returned when the worker drains and exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub runs: usize,
    pub written: usize,
    pub failures: usize,
    /// Triggers folded into a run because they queued up behind it.
    pub coalesced: usize,
}

/// Run the aggregator once per queued trigger, one run at a time.  Triggers
/// that arrive while a run is in flight are folded into the next run.  Exits
/// when every sender is dropped.
pub fn spawn_update_worker(
    aggregator: Arc<StoryAggregator>,
    mut rx: mpsc::Receiver<Trigger>,
) -> JoinHandle<WorkerStats> {
    tokio::spawn(async move {
        let mut stats = WorkerStats::default();
        while let Some(trigger) = rx.recv().await {
            while rx.try_recv().is_ok() {
                stats.coalesced += 1;
            }
            stats.runs += 1;
            match aggregator.run_today(trigger).await {
                Ok(UpdateOutcome::Written { .. }) => stats.written += 1,
                Ok(_) => {}
                Err(err) => {
                    stats.failures += 1;
                    warn!(%trigger, error = %format!("{err:#}"), "story update failed");
                }
            }
        }
        info!(
            runs = stats.runs,
            written = stats.written,
            failures = stats.failures,
            "update worker stopped"
        );
        stats
    })
}
