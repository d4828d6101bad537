//! Access to the notes vault.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::fs;

use crate::error::StoryError;

/// Vault-relative text file store.
#[async_trait]
pub trait Vault: Send + Sync {
    /// `None` when the file does not exist.
    async fn read(&self, path: &str) -> Result<Option<String>>;
    /// Replace the whole file in one step.
    async fn write(&self, path: &str, content: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
    /// Create the file with `initial` content unless it already exists.
    async fn create(&self, path: &str, initial: &str) -> Result<()>;
}

// ── Filesystem ───────────────────────────────────────────────────────────────

/// A directory on disk.  Writes go to a sibling temp file which is then
/// renamed over the target, so readers never see a half-written note.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let inside = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !inside {
            return Err(StoryError::InvalidPath {
                path: path.to_string(),
            }
            .into());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Vault for FsVault {
    async fn read(&self, path: &str) -> Result<Option<String>> {
        let full = self.resolve(path)?;
        match fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read {}", full.display())),
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let file_name = full
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = full.with_file_name(format!(".{file_name}.storyroll.tmp"));
        fs::write(&tmp, content)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &full)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), full.display()))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        fs::try_exists(&full)
            .await
            .with_context(|| format!("stat {}", full.display()))
    }

    async fn create(&self, path: &str, initial: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let opened = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await;
        match opened {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(initial.as_bytes())
                    .await
                    .with_context(|| format!("write {}", full.display()))?;
                file.flush().await?;
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err).with_context(|| format!("create {}", full.display())),
        }
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// Map-backed vault for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: Mutex<HashMap<String, String>>,
    writes: Mutex<usize>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), content.into());
        }
        self
    }

    /// Snapshot of a file's content.
    pub fn get(&self, path: &str) -> Option<String> {
        self.files.lock().ok()?.get(path).cloned()
    }

    /// Number of `write` calls served so far (`create` not included).
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|count| *count).unwrap_or(0)
    }

    fn files(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.files
            .lock()
            .map_err(|_| anyhow!("memory vault lock poisoned"))
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn read(&self, path: &str) -> Result<Option<String>> {
        Ok(self.files()?.get(path).cloned())
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        self.files()?.insert(path.to_string(), content.to_string());
        if let Ok(mut count) = self.writes.lock() {
            *count += 1;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files()?.contains_key(path))
    }

    async fn create(&self, path: &str, initial: &str) -> Result<()> {
        self.files()?
            .entry(path.to_string())
            .or_insert_with(|| initial.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn fs_vault_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());
        assert_eq!(vault.read("2024-01-01.md").await.unwrap(), None);
        assert!(!vault.exists("2024-01-01.md").await.unwrap());
    }

    #[tokio::test]
    async fn fs_vault_write_then_read() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());
        vault.write("All 5 Minute Stories.md", "| row |").await.unwrap();
        vault.write("All 5 Minute Stories.md", "| row 2 |").await.unwrap();
        assert_eq!(
            vault.read("All 5 Minute Stories.md").await.unwrap().as_deref(),
            Some("| row 2 |")
        );
        // The temp file is renamed away.
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn fs_vault_create_does_not_clobber() {
        let dir = TempDir::new().unwrap();
        let vault = FsVault::new(dir.path());
        vault.create("sub/log.md", "").await.unwrap();
        assert_eq!(vault.read("sub/log.md").await.unwrap().as_deref(), Some(""));
        vault.write("sub/log.md", "kept").await.unwrap();
        vault.create("sub/log.md", "").await.unwrap();
        assert_eq!(vault.read("sub/log.md").await.unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn fs_vault_rejects_escaping_paths() {
        let vault = FsVault::new("/vault");
        for bad in ["", "../outside.md", "/etc/passwd", "notes/../../x.md", "./x.md"] {
            assert!(vault.resolve(bad).is_err(), "{bad:?} should be rejected");
        }
        assert_eq!(
            vault.resolve("daily/2024-01-01.md").unwrap(),
            PathBuf::from("/vault/daily/2024-01-01.md")
        );
    }

    #[tokio::test]
    async fn memory_vault_tracks_writes() {
        let vault = MemoryVault::new().with_file("a.md", "one");
        assert_eq!(vault.read("a.md").await.unwrap().as_deref(), Some("one"));
        vault.create("a.md", "").await.unwrap();
        assert_eq!(vault.get("a.md").as_deref(), Some("one"));
        vault.write("a.md", "two").await.unwrap();
        assert_eq!(vault.get("a.md").as_deref(), Some("two"));
        assert_eq!(vault.write_count(), 1);
    }
}
