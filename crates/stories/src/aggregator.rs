//! The daily update run: daily note → story → aggregate note.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use storyroll_config::AppConfig;

use crate::date::{DateProvider, NoteDate};
use crate::error::StoryError;
use crate::extract::extract_section;
use crate::notice::Notifier;
use crate::upsert::{UpsertPolicy, rendered_row_count, upsert};
use crate::vault::Vault;

/// Notice shown when today's note does not exist.
pub const NO_DAILY_NOTE_NOTICE: &str = "No daily note detected";

/// What started a run.  Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    FileModified,
    Schedule,
    Manual,
    Action,
}

impl Trigger {
    pub fn label(self) -> &'static str {
        match self {
            Self::FileModified => "file-modified",
            Self::Schedule => "schedule",
            Self::Manual => "manual",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum UpdateOutcome {
    NoDailyNote { date: NoteDate },
    NoStory { date: NoteDate },
    Unchanged { date: NoteDate },
    Written { date: NoteDate, rows: usize },
}

impl UpdateOutcome {
    pub fn date(&self) -> NoteDate {
        match self {
            Self::NoDailyNote { date }
            | Self::NoStory { date }
            | Self::Unchanged { date }
            | Self::Written { date, .. } => *date,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoDailyNote { .. } => "no-daily-note",
            Self::NoStory { .. } => "no-story",
            Self::Unchanged { .. } => "unchanged",
            Self::Written { .. } => "written",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub aggregate_note: String,
    pub story_heading: String,
    pub policy: UpsertPolicy,
}

impl AggregatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            aggregate_note: config.vault.aggregate_note.clone(),
            story_heading: config.vault.story_heading.clone(),
            policy: UpsertPolicy::from_config(&config.upsert),
        }
    }
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Result of planning an update without touching the aggregate note.
enum Plan {
    Done(UpdateOutcome),
    Update { story: String },
}

pub struct StoryAggregator {
    vault: Arc<dyn Vault>,
    clock: Arc<dyn DateProvider>,
    notifier: Arc<dyn Notifier>,
    settings: AggregatorSettings,
    run_lock: Mutex<()>,
}

impl StoryAggregator {
    pub fn new(
        vault: Arc<dyn Vault>,
        clock: Arc<dyn DateProvider>,
        notifier: Arc<dyn Notifier>,
        settings: AggregatorSettings,
    ) -> Self {
        Self {
            vault,
            clock,
            notifier,
            settings,
            run_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    pub fn today(&self) -> NoteDate {
        self.clock.today()
    }

    pub async fn run_today(&self, trigger: Trigger) -> Result<UpdateOutcome> {
        self.run_for(self.today(), trigger).await
    }

    /// Update the aggregate note with `date`'s story.
    ///
    /// Runs are serialized within the process.  The aggregate note is
    /// re-read before writing; if it changed since it was read the update is
    /// recomputed once from the fresh text, and a second change is reported
    /// as [`StoryError::ConcurrentModification`].
    pub async fn run_for(&self, date: NoteDate, trigger: Trigger) -> Result<UpdateOutcome> {
        let _guard = self.run_lock.lock().await;

        let story = match self.plan(date).await? {
            Plan::Done(outcome) => {
                info!(%trigger, %date, outcome = outcome.label(), "story update skipped");
                return Ok(outcome);
            }
            Plan::Update { story } => story,
        };

        let aggregate = self.settings.aggregate_note.as_str();
        let policy = self.settings.policy;
        if !self.vault.exists(aggregate).await? {
            self.vault.create(aggregate, "").await?;
            info!(path = aggregate, "created aggregate note");
        }

        let mut base = self.vault.read(aggregate).await?.unwrap_or_default();
        let mut updated = upsert(&base, date, &story, policy);
        let mut retried = false;
        loop {
            if updated == base {
                info!(%trigger, %date, outcome = "unchanged", "aggregate note already up to date");
                return Ok(UpdateOutcome::Unchanged { date });
            }
            let latest = self.vault.read(aggregate).await?.unwrap_or_default();
            if content_hash(&latest) == content_hash(&base) {
                break;
            }
            if retried {
                return Err(StoryError::ConcurrentModification {
                    path: aggregate.to_string(),
                }
                .into());
            }
            warn!(path = aggregate, "aggregate note changed during update; recomputing");
            retried = true;
            updated = upsert(&latest, date, &story, policy);
            base = latest;
        }

        self.vault.write(aggregate, &updated).await?;
        let rows = rendered_row_count(&story, policy.render);
        info!(%trigger, %date, rows, path = aggregate, outcome = "written", "aggregate note updated");
        Ok(UpdateOutcome::Written { date, rows })
    }

    /// The aggregate note as [`run_for`](Self::run_for) would write it, or
    /// `None` when the run would not write.  Nothing is created or written.
    pub async fn preview_for(&self, date: NoteDate) -> Result<Option<String>> {
        let Plan::Update { story } = self.plan(date).await? else {
            return Ok(None);
        };
        let current = self
            .vault
            .read(&self.settings.aggregate_note)
            .await?
            .unwrap_or_default();
        let updated = upsert(&current, date, &story, self.settings.policy);
        Ok((updated != current).then_some(updated))
    }

    async fn plan(&self, date: NoteDate) -> Result<Plan> {
        let note_path = date.note_path();
        let Some(note) = self.vault.read(&note_path).await? else {
            self.notifier.notify(NO_DAILY_NOTE_NOTICE);
            return Ok(Plan::Done(UpdateOutcome::NoDailyNote { date }));
        };
        match extract_section(&note, &self.settings.story_heading) {
            Some(story) => Ok(Plan::Update { story }),
            None => {
                debug!(path = %note_path, "daily note has no story section");
                Ok(Plan::Done(UpdateOutcome::NoStory { date }))
            }
        }
    }
}

fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
