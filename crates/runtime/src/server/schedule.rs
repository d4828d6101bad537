//! Recurring scheduled trigger.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use storyroll_stories::Trigger;

/// One owned task that enqueues [`Trigger::Schedule`] every `interval` until
/// [`DailySchedule::stop`] is called.
pub struct DailySchedule {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DailySchedule {
    pub fn start(interval: Duration, run_on_start: bool, queue: mpsc::Sender<Trigger>) -> Self {
        let (shutdown_tx, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            if run_on_start && queue.send(Trigger::Schedule).await.is_err() {
                return;
            }
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        debug!("scheduled story update due");
                        if queue.send(Trigger::Schedule).await.is_err() {
                            break;
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        info!(interval_hours = interval.as_secs() / 3600, run_on_start, "story schedule started");
        Self {
            shutdown_tx,
            handle,
        }
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
        info!("story schedule stopped");
    }
}
