use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;

use storyroll_config::AppConfig;
use storyroll_stories::{
    AggregatorSettings, DateProvider, FixedDate, FsVault, NoteDate, Notifier, StoryAggregator,
    SystemClock, Trigger, UpdateOutcome, Vault, extract_section, parse_rows, stories_for,
};

use crate::watch;

/// Prints notices for the person at the terminal.
pub(crate) struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("notice: {message}");
    }
}

pub(crate) fn parse_date(raw: Option<&str>) -> Result<Option<NoteDate>> {
    raw.map(|value| value.parse::<NoteDate>().map_err(Into::into))
        .transpose()
}

pub(crate) fn clock_for(config: &AppConfig, date: Option<NoteDate>) -> Arc<dyn DateProvider> {
    match date {
        Some(date) => Arc::new(FixedDate(date)),
        None => Arc::new(SystemClock::from_setting(&config.vault.timezone)),
    }
}

pub(crate) fn build_aggregator(
    config: &AppConfig,
    date: Option<NoteDate>,
    notifier: Arc<dyn Notifier>,
) -> Arc<StoryAggregator> {
    Arc::new(StoryAggregator::new(
        Arc::new(FsVault::new(&config.vault.path)),
        clock_for(config, date),
        notifier,
        AggregatorSettings::from_config(config),
    ))
}

pub(crate) fn describe_outcome(outcome: &UpdateOutcome, aggregate_note: &str) -> String {
    match outcome {
        UpdateOutcome::NoDailyNote { date } => {
            format!("no daily note for {date} ({})", date.note_path())
        }
        UpdateOutcome::NoStory { date } => {
            format!("{} has no story section", date.note_path())
        }
        UpdateOutcome::Unchanged { date } => {
            format!("{aggregate_note} already has the story for {date}")
        }
        UpdateOutcome::Written { date, rows } => {
            let plural = if *rows == 1 { "" } else { "s" };
            format!("wrote {rows} row{plural} for {date} to {aggregate_note}")
        }
    }
}

pub(crate) async fn run_update(
    config: &AppConfig,
    date: Option<NoteDate>,
    dry_run: bool,
    json: bool,
) -> Result<Option<UpdateOutcome>> {
    let aggregator = build_aggregator(config, date, Arc::new(StderrNotifier));
    let date = aggregator.today();

    if dry_run {
        let preview = aggregator.preview_for(date).await?;
        if json {
            let report = serde_json::json!({ "date": date, "document": preview });
            println!("{report}");
        } else {
            match preview {
                Some(document) => println!("{document}"),
                None => println!("nothing to write for {date}"),
            }
        }
        return Ok(None);
    }

    let outcome = aggregator.run_for(date, Trigger::Manual).await?;
    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        println!(
            "{}",
            describe_outcome(&outcome, &aggregator.settings().aggregate_note)
        );
    }
    Ok(Some(outcome))
}

pub(crate) fn run_extract(config: &AppConfig, file: &Path) -> Result<()> {
    let note = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    match extract_section(&note, &config.vault.story_heading) {
        Some(story) => println!("{story}"),
        None => bail!(
            "no story found under '{}' in {}",
            config.vault.story_heading,
            file.display()
        ),
    }
    Ok(())
}

pub(crate) async fn run_show(config: &AppConfig, date: Option<NoteDate>, all: bool) -> Result<()> {
    for line in show_lines(config, date, all).await? {
        println!("{line}");
    }
    Ok(())
}

async fn show_lines(config: &AppConfig, date: Option<NoteDate>, all: bool) -> Result<Vec<String>> {
    let vault = FsVault::new(&config.vault.path);
    let aggregate = &config.vault.aggregate_note;
    let Some(document) = vault.read(aggregate).await? else {
        return Ok(vec![format!("{aggregate} does not exist yet")]);
    };

    if all {
        let rows = parse_rows(&document);
        let mut lines: Vec<String> = rows
            .iter()
            .map(|row| format!("{}  {}", row.date, row.text))
            .collect();
        lines.push(format!("({} rows)", rows.len()));
        return Ok(lines);
    }

    let date = date.unwrap_or_else(|| clock_for(config, None).today());
    let stories = stories_for(&document, date);
    if stories.is_empty() {
        return Ok(vec![format!("no rows for {date} in {aggregate}")]);
    }
    Ok(stories)
}

pub(crate) fn run_config_init(config: &AppConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    config.save_to(path)?;
    println!("config written to {}", path.display());
    Ok(())
}

pub(crate) fn run_config_show(config: &AppConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

pub(crate) async fn run_doctor(config: &AppConfig, config_path: &Path) -> Result<()> {
    let vault = FsVault::new(&config.vault.path);
    let clock = SystemClock::from_setting(&config.vault.timezone);
    let today = clock.today();
    let note = today.note_path();
    let aggregate = &config.vault.aggregate_note;
    let policy = AggregatorSettings::from_config(config).policy;

    println!("storyroll doctor");
    println!(
        "- config: {} ({})",
        config_path.display(),
        if config_path.exists() { "found" } else { "defaults" }
    );
    println!("- vault: {}", config.vault.path);
    println!(
        "- today: {today} (zone {}, local clock {})",
        clock.zone_label(),
        Local::now().format("%Y-%m-%d %H:%M")
    );
    println!(
        "- daily note: {note} ({})",
        presence(vault.exists(&note).await?)
    );
    println!(
        "- aggregate note: {aggregate} ({})",
        presence(vault.exists(aggregate).await?)
    );
    println!("- story heading: {}", config.vault.story_heading);
    println!(
        "- policy: render={:?} existing-rows={:?}",
        policy.render, policy.existing
    );
    println!("- watcher: {}", watch::watcher_status(config)?);
    Ok(())
}

fn presence(exists: bool) -> &'static str {
    if exists { "present" } else { "missing" }
}
