use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ── Upsert policy ─────────────────────────────────────────────────────────────

/// How a story is laid out as rows in the aggregate note.
///
/// | Mode         | Behaviour                                                  |
/// |--------------|------------------------------------------------------------|
/// | `single-row` | Internal newlines become spaces; one row per date.         |
/// | `multi-row`  | One row per story line, each prefixed with a newline.      |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    #[default]
    SingleRow,
    MultiRow,
}

impl RenderMode {
    /// Existing-row handling used when the config leaves it unset.
    pub fn default_existing_rows(self) -> ExistingRows {
        match self {
            Self::SingleRow => ExistingRows::Replace,
            Self::MultiRow => ExistingRows::Append,
        }
    }
}

/// What happens to rows already present for the date being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingRows {
    /// Remove the earlier row(s) for the date before appending.
    Replace,
    /// Leave earlier rows in place; the date may repeat.
    Append,
}

// ── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Root directory of the notes vault.  Daily notes live directly under it
    /// as `YYYY-MM-DD.md`.  Overridden by `STORYROLL_VAULT`.
    pub path: String,
    /// Vault-relative path of the aggregate table note.
    pub aggregate_note: String,
    /// Heading line that introduces the story section of a daily note.
    pub story_heading: String,
    /// `"local"` for the system time zone, or an IANA name such as
    /// `"Europe/Berlin"`.  Decides which calendar day counts as today.
    /// Overridden by `STORYROLL_TIMEZONE`.
    pub timezone: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: ".".to_string(),
            aggregate_note: "All 5 Minute Stories.md".to_string(),
            story_heading: "## 5 minute story".to_string(),
            timezone: "local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsertConfig {
    pub render_mode: RenderMode,
    /// Unset means "use the render mode's default" (replace for single-row,
    /// append for multi-row).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_rows: Option<ExistingRows>,
}

impl UpsertConfig {
    pub fn effective_existing_rows(&self) -> ExistingRows {
        self.existing_rows
            .unwrap_or_else(|| self.render_mode.default_existing_rows())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period after the last modify event before a run is triggered.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Hours between scheduled runs while watching.  `0` disables the schedule.
    pub interval_hours: u64,
    /// Run once as soon as the watcher starts.
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub vault: VaultConfig,
    pub upsert: UpsertConfig,
    pub watch: WatchConfig,
    pub schedule: ScheduleConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Read `path`, falling back to the defaults only when the file does
    /// not exist.  Env overrides are applied last.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw)
                .with_context(|| format!("parse config {}", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => Self::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("read config {}", path.display()));
            }
        };

        if let Ok(value) = env::var("STORYROLL_VAULT") {
            if !value.is_empty() {
                config.vault.path = value;
            }
        }

        if let Ok(value) = env::var("STORYROLL_TIMEZONE") {
            if !value.is_empty() {
                config.vault.timezone = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_reference_layout() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.vault.path, ".");
        assert_eq!(cfg.vault.aggregate_note, "All 5 Minute Stories.md");
        assert_eq!(cfg.vault.story_heading, "## 5 minute story");
        assert_eq!(cfg.vault.timezone, "local");
        assert_eq!(cfg.upsert.render_mode, RenderMode::SingleRow);
        assert!(cfg.upsert.existing_rows.is_none());
        assert_eq!(cfg.watch.debounce_ms, 500);
        assert_eq!(cfg.schedule.interval_hours, 24);
        assert!(cfg.schedule.run_on_start);
        assert_eq!(cfg.telemetry.log_level, "info");
    }

    #[test]
    fn existing_rows_follows_render_mode_when_unset() {
        let mut upsert = UpsertConfig::default();
        assert_eq!(upsert.effective_existing_rows(), ExistingRows::Replace);

        upsert.render_mode = RenderMode::MultiRow;
        assert_eq!(upsert.effective_existing_rows(), ExistingRows::Append);

        upsert.existing_rows = Some(ExistingRows::Replace);
        assert_eq!(upsert.effective_existing_rows(), ExistingRows::Replace);
    }

    // ── load_from ──────────────────────────────────────────────────────────

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(cfg.vault.aggregate_note, "All 5 Minute Stories.md");
        assert_eq!(cfg.upsert.render_mode, RenderMode::SingleRow);
    }

    #[test]
    fn load_from_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.toml");
        fs::write(
            &path,
            r###"
[vault]
aggregate_note = "Stories.md"
story_heading = "## Story"

[upsert]
render_mode = "multi-row"
existing_rows = "replace"

[watch]
debounce_ms = 1200

[schedule]
interval_hours = 0
run_on_start = false
"###,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.vault.aggregate_note, "Stories.md");
        assert_eq!(cfg.vault.story_heading, "## Story");
        assert_eq!(cfg.upsert.render_mode, RenderMode::MultiRow);
        assert_eq!(cfg.upsert.existing_rows, Some(ExistingRows::Replace));
        assert_eq!(cfg.watch.debounce_ms, 1200);
        assert_eq!(cfg.schedule.interval_hours, 0);
        assert!(!cfg.schedule.run_on_start);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.telemetry.log_level, "info");
    }

    #[test]
    fn load_from_partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            r#"
[upsert]
render_mode = "multi-row"
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.upsert.render_mode, RenderMode::MultiRow);
        assert_eq!(cfg.upsert.effective_existing_rows(), ExistingRows::Append);
        assert_eq!(cfg.watch.debounce_ms, 500);
    }

    #[test]
    fn load_from_invalid_toml_returns_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn load_from_unreadable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory exists but cannot be read as a file.
        let err = AppConfig::load_from(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("read config"));
    }

    #[test]
    fn unknown_render_mode_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mode.toml");
        fs::write(&path, "[upsert]\nrender_mode = \"sideways\"\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    // ── save_to + roundtrip ────────────────────────────────────────────────

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub/config.toml");

        let mut cfg = AppConfig::default();
        cfg.vault.aggregate_note = "Log.md".to_string();
        cfg.upsert.render_mode = RenderMode::MultiRow;
        cfg.upsert.existing_rows = Some(ExistingRows::Replace);
        cfg.schedule.interval_hours = 6;

        cfg.save_to(&path).unwrap();
        assert!(path.exists());

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.vault.aggregate_note, "Log.md");
        assert_eq!(loaded.upsert.render_mode, RenderMode::MultiRow);
        assert_eq!(loaded.upsert.existing_rows, Some(ExistingRows::Replace));
        assert_eq!(loaded.schedule.interval_hours, 6);
    }

    #[test]
    fn save_omits_unset_existing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::default().save_to(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("render_mode = \"single-row\""));
        assert!(!raw.contains("existing_rows"));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/config.toml");
        AppConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    // ── serde labels ───────────────────────────────────────────────────────

    #[test]
    fn render_mode_serde_roundtrip() {
        for (mode, label) in [
            (RenderMode::SingleRow, "\"single-row\""),
            (RenderMode::MultiRow, "\"multi-row\""),
        ] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, label);
            let back: RenderMode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, mode);
        }
    }

    // ── Env var overrides ──────────────────────────────────────────────────

    #[test]
    fn env_overrides_vault_path_and_timezone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("env.toml");
        fs::write(
            &path,
            r#"
[vault]
path = "/from/file"
timezone = "UTC"
"#,
        )
        .unwrap();

        // SAFETY: no other test reads `vault.path` or `vault.timezone`.
        unsafe {
            env::set_var("STORYROLL_VAULT", "/from/env");
            env::set_var("STORYROLL_TIMEZONE", "Asia/Tokyo");
        }
        let cfg = AppConfig::load_from(&path).unwrap();
        unsafe {
            env::remove_var("STORYROLL_VAULT");
            env::remove_var("STORYROLL_TIMEZONE");
        }
        assert_eq!(cfg.vault.path, "/from/env");
        assert_eq!(cfg.vault.timezone, "Asia/Tokyo");
    }
}
