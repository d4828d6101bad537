use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use fs2::FileExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use storyroll_config::AppConfig;
use storyroll_runtime::{WatchOptions, WatchService};
use storyroll_stories::{LogNotifier, Trigger};

use crate::commands::build_aggregator;

#[derive(Debug, Clone)]
pub(crate) struct RuntimePaths {
    runtime_dir: PathBuf,
    pub(crate) pid_file: PathBuf,
    pub(crate) lock_file: PathBuf,
}

pub(crate) fn runtime_paths(vault_root: &Path) -> RuntimePaths {
    let runtime_dir = vault_root.join(".storyroll").join("runtime");
    RuntimePaths {
        pid_file: runtime_dir.join("watch.pid"),
        lock_file: runtime_dir.join("watch.lock"),
        runtime_dir,
    }
}

/// Run the watch service in the foreground until SIGTERM or SIGINT.
/// SIGUSR1 requests an immediate update.
pub(crate) async fn run_watch(config: AppConfig) -> Result<()> {
    let vault_root = PathBuf::from(&config.vault.path);
    if !vault_root.is_dir() {
        bail!("vault directory {} does not exist", vault_root.display());
    }

    let paths = runtime_paths(&vault_root);
    fs::create_dir_all(&paths.runtime_dir)?;
    let lock_file = File::create(&paths.lock_file)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| anyhow!("another watcher already holds {}", paths.lock_file.display()))?;
    fs::write(&paths.pid_file, std::process::id().to_string())?;

    let aggregator = build_aggregator(&config, None, Arc::new(LogNotifier));
    let options = WatchOptions::from_config(&config, &vault_root);
    let result = match WatchService::start(aggregator, options) {
        Ok(service) => {
            let waited = wait_for_shutdown(service.trigger_sender()).await;
            let stats = service.shutdown().await?;
            info!(
                runs = stats.runs,
                written = stats.written,
                failures = stats.failures,
                coalesced = stats.coalesced,
                "watcher exiting"
            );
            waited
        }
        Err(err) => Err(err),
    };

    let _ = fs::remove_file(&paths.pid_file);
    let _ = fs::remove_file(&paths.lock_file);
    result
}

#[cfg(unix)]
async fn wait_for_shutdown(triggers: mpsc::Sender<Trigger>) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    loop {
        tokio::select! {
            _ = sigterm.recv() => break,
            _ = sigint.recv() => break,
            _ = sigusr1.recv() => {
                info!("update requested by signal");
                if triggers.send(Trigger::Action).await.is_err() {
                    warn!("update worker is gone");
                    break;
                }
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_triggers: mpsc::Sender<Trigger>) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Ask the running watcher for this vault to update now.
pub(crate) fn nudge_watcher(config: &AppConfig) -> Result<()> {
    let paths = runtime_paths(Path::new(&config.vault.path));
    let Some(pid) = read_pid(&paths.pid_file)? else {
        bail!("no watcher is running for {}", config.vault.path);
    };
    if !is_pid_running(pid) {
        let _ = fs::remove_file(&paths.pid_file);
        bail!("watcher pid {pid} is not running (stale pid file cleaned)");
    }
    signal_update(pid)?;
    println!("update requested from watcher (pid {pid})");
    Ok(())
}

pub(crate) fn watcher_status(config: &AppConfig) -> Result<String> {
    let paths = runtime_paths(Path::new(&config.vault.path));
    Ok(match read_pid(&paths.pid_file)? {
        Some(pid) if is_pid_running(pid) => format!("running (pid {pid})"),
        Some(pid) => format!("stopped (stale pid {pid})"),
        None => "stopped".to_string(),
    })
}

pub(crate) fn read_pid(path: &Path) -> Result<Option<u32>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)?;
    Ok(raw.trim().parse::<u32>().ok())
}

pub(crate) fn is_pid_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

fn signal_update(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let status = Command::new("kill")
            .arg("-USR1")
            .arg(pid.to_string())
            .status()?;
        if !status.success() {
            bail!("failed to signal watcher pid {pid}");
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        bail!("nudge is only implemented on unix in this build")
    }
}
