mod commands;
mod watch;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use storyroll_config::AppConfig;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "storyroll",
    version,
    about = "Collect each daily note's 5 minute story into one table note"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Vault root directory (overrides `vault.path`).
    #[arg(long, global = true)]
    vault: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Update the aggregate note from today's daily note (the default).
    Run {
        /// Use this day's note instead of today's (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,
        /// Print the resulting aggregate note instead of writing it.
        #[arg(long)]
        dry_run: bool,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Watch the vault and update on every edit of today's note.
    Watch,
    /// Ask a running watcher to update now.
    Nudge,
    /// Print the story section of a note file.
    Extract {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the aggregate rows recorded for a day.
    Show {
        /// Day to show (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<String>,
        /// Show every dated row.
        #[arg(long, conflicts_with = "date")]
        all: bool,
    },
    #[command(
        name = "config",
        about = "Write or inspect the config file"
    )]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print resolved paths, today's date and watcher status.
    Doctor,
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Write the default config to the config path.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config (file + env + flags).
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)?;
    if let Some(vault) = &cli.vault {
        config.vault.path = vault.display().to_string();
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.unwrap_or(Commands::Run {
        date: None,
        dry_run: false,
        json: false,
    });

    match command {
        Commands::Run {
            date,
            dry_run,
            json,
        } => {
            let date = commands::parse_date(date.as_deref())?;
            commands::run_update(&config, date, dry_run, json).await?;
        }
        Commands::Watch => {
            watch::run_watch(config).await?;
        }
        Commands::Nudge => {
            watch::nudge_watcher(&config)?;
        }
        Commands::Extract { file } => {
            commands::run_extract(&config, &file)?;
        }
        Commands::Show { date, all } => {
            let date = commands::parse_date(date.as_deref())?;
            commands::run_show(&config, date, all).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => {
                commands::run_config_init(&config, &cli.config, force)?;
            }
            ConfigCommands::Show => {
                commands::run_config_show(&config)?;
            }
        },
        Commands::Doctor => {
            commands::run_doctor(&config, &cli.config).await?;
        }
    }

    Ok(())
}
