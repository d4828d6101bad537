//! Watch service: file watcher, schedule and update worker wired to one
//! trigger queue.

mod schedule;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use storyroll_config::AppConfig;
use storyroll_stories::{StoryAggregator, Trigger};

use crate::watcher::NoteWatcher;

pub use schedule::DailySchedule;
pub use worker::{WorkerStats, spawn_update_worker};

/// Trigger queue capacity.  Overflowing triggers wait; the worker coalesces
/// whatever has queued up.
const QUEUE_CAP: usize = 16;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub vault_root: PathBuf,
    pub debounce: Duration,
    /// `None` disables the recurring schedule.
    pub schedule_interval: Option<Duration>,
    pub run_on_start: bool,
}

impl WatchOptions {
    pub fn from_config(config: &AppConfig, vault_root: impl Into<PathBuf>) -> Self {
        let hours = config.schedule.interval_hours;
        Self {
            vault_root: vault_root.into(),
            debounce: Duration::from_millis(config.watch.debounce_ms),
            schedule_interval: (hours > 0).then(|| Duration::from_secs(hours * 60 * 60)),
            run_on_start: config.schedule.run_on_start,
        }
    }
}

pub struct WatchService {
    queue: mpsc::Sender<Trigger>,
    worker: JoinHandle<WorkerStats>,
    schedule: Option<DailySchedule>,
    watcher: NoteWatcher,
}

impl WatchService {
    pub fn start(aggregator: Arc<StoryAggregator>, options: WatchOptions) -> Result<Self> {
        let (queue, rx) = mpsc::channel(QUEUE_CAP);
        let worker = spawn_update_worker(aggregator.clone(), rx);
        let watcher = NoteWatcher::start(
            &options.vault_root,
            options.debounce,
            aggregator,
            queue.clone(),
        )?;

        let schedule = match options.schedule_interval {
            Some(interval) => Some(DailySchedule::start(
                interval,
                options.run_on_start,
                queue.clone(),
            )),
            None => {
                if options.run_on_start {
                    let _ = queue.try_send(Trigger::Schedule);
                }
                None
            }
        };

        info!(
            vault = %options.vault_root.display(),
            schedule = schedule.is_some(),
            "watch service started"
        );
        Ok(Self {
            queue,
            worker,
            schedule,
            watcher,
        })
    }

    /// Sender for on-demand triggers (manual command, action signal).
    pub fn trigger_sender(&self) -> mpsc::Sender<Trigger> {
        self.queue.clone()
    }

    /// Stop the schedule and watcher, let the worker drain, return its stats.
    pub async fn shutdown(self) -> Result<WorkerStats> {
        let Self {
            queue,
            worker,
            schedule,
            watcher,
        } = self;
        if let Some(schedule) = schedule {
            schedule.stop().await;
        }
        watcher.stop().await;
        drop(queue);
        let stats = worker.await?;
        info!(runs = stats.runs, "watch service stopped");
        Ok(stats)
    }
}
