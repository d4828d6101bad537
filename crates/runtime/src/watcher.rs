//! Vault file watcher: turns edits of today's daily note into debounced
//! [`Trigger::FileModified`] triggers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use storyroll_stories::{StoryAggregator, Trigger};

use crate::debounce::Debouncer;

const EVENT_CAP: usize = 256;

/// Owns the OS watcher and the debounce task.  Dropping the watcher stops
/// event delivery; [`NoteWatcher::stop`] also joins the task.
pub struct NoteWatcher {
    watcher: RecommendedWatcher,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl NoteWatcher {
    pub fn start(
        vault_root: &Path,
        debounce: Duration,
        aggregator: Arc<StoryAggregator>,
        queue: mpsc::Sender<Trigger>,
    ) -> Result<Self> {
        let root = vault_root
            .canonicalize()
            .with_context(|| format!("resolve vault root {}", vault_root.display()))?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAP);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .context("file watcher init failed")?;
        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .with_context(|| format!("watch {}", root.display()))?;
        info!(root = %root.display(), debounce_ms = debounce.as_millis() as u64, "watching vault");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(debounce_loop(
            root,
            debounce,
            aggregator,
            event_rx,
            queue,
            shutdown_rx,
        ));

        Ok(Self {
            watcher,
            shutdown_tx,
            handle,
        })
    }

    pub async fn stop(self) {
        let Self {
            watcher,
            shutdown_tx,
            handle,
        } = self;
        drop(watcher);
        let _ = shutdown_tx.send(true);
        let _ = handle.await;
    }
}

/// `true` when any of `paths` is `note` directly under `root`.
pub fn touches_note(paths: &[PathBuf], root: &Path, note: &str) -> bool {
    paths.iter().any(|path| {
        path.strip_prefix(root)
            .map(|relative| relative == Path::new(note))
            .unwrap_or(false)
    })
}

/// Writes, and the create/rename pair editors use for atomic saves.
fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Create(_))
}

async fn debounce_loop(
    root: PathBuf,
    quiet: Duration,
    aggregator: Arc<StoryAggregator>,
    mut events: mpsc::Receiver<notify::Result<Event>>,
    queue: mpsc::Sender<Trigger>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut debouncer = Debouncer::new(quiet);

    loop {
        let deadline = debouncer.deadline();

        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    Ok(event) if is_content_change(&event.kind) => {
                        // Re-evaluated per event so the watcher follows midnight.
                        let note = aggregator.today().note_path();
                        if touches_note(&event.paths, &root, &note) {
                            debouncer.record(Instant::now());
                            debug!(note = %note, pending = debouncer.pending(), "daily note changed");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(?err, "file watcher error"),
                }
            }
            () = async {
                if let Some(deadline) = deadline {
                    time::sleep_until(deadline).await;
                }
            }, if deadline.is_some() => {
                let pending = debouncer.pending();
                if debouncer.fire_if_due(Instant::now()) {
                    debug!(events = pending, "debounce window closed");
                    if queue.send(Trigger::FileModified).await.is_err() {
                        break;
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
