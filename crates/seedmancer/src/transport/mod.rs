//! Moving snapshot directories to and from a remote store.
//!
//! [`DirectoryTransport`] mirrors the local layout under another directory
//! (a mounted share, a synced folder). Network transports plug in behind the
//! same trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, SnapshotError};
use crate::snapshot::{snapshot_dir, SCHEMA_FILE};

/// A snapshot available from a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteSnapshot {
    pub database: String,
    pub version: String,
}

/// Publish, fetch, and list snapshots.
#[async_trait]
pub trait SnapshotTransport: Send + Sync {
    /// Copy the snapshot in `local_dir` to the store.
    async fn publish(&self, database: &str, version: &str, local_dir: &Path) -> Result<()>;

    /// Copy a stored snapshot into `dest_dir`, returning the files written.
    async fn fetch(&self, database: &str, version: &str, dest_dir: &Path) -> Result<Vec<PathBuf>>;

    /// Snapshots held by the store.
    async fn list(&self) -> Result<Vec<RemoteSnapshot>>;
}

/// Transport backed by a directory using the same layout as local storage.
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    root: PathBuf,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SnapshotTransport for DirectoryTransport {
    async fn publish(&self, database: &str, version: &str, local_dir: &Path) -> Result<()> {
        if !local_dir.join(SCHEMA_FILE).is_file() {
            return Err(SnapshotError::Transport(format!(
                "{} is not a snapshot (no {})",
                local_dir.display(),
                SCHEMA_FILE
            )));
        }
        let dest = snapshot_dir(&self.root, database, Some(version))?;
        let copied = copy_files(local_dir, &dest).await?;
        info!(
            "Published {}/{} ({} files) to {}",
            database,
            version,
            copied.len(),
            dest.display()
        );
        Ok(())
    }

    async fn fetch(&self, database: &str, version: &str, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        let src = snapshot_dir(&self.root, database, Some(version))?;
        if !src.join(SCHEMA_FILE).is_file() {
            return Err(SnapshotError::Transport(format!(
                "snapshot {}/{} not found in {}",
                database,
                version,
                self.root.display()
            )));
        }
        let copied = copy_files(&src, dest_dir).await?;
        info!(
            "Fetched {}/{} ({} files) into {}",
            database,
            version,
            copied.len(),
            dest_dir.display()
        );
        Ok(copied)
    }

    async fn list(&self) -> Result<Vec<RemoteSnapshot>> {
        let root = self.root.clone();
        let found = tokio::task::spawn_blocking(move || crate::snapshot::list_local(&root))
            .await
            .map_err(|e| SnapshotError::Transport(format!("listing task failed: {}", e)))??;
        Ok(found
            .into_iter()
            .map(|s| RemoteSnapshot {
                database: s.database,
                version: s.version,
            })
            .collect())
    }
}

/// Copy the regular files of `src` (not recursive) into `dest`.
async fn copy_files(src: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| SnapshotError::Transport(format!("creating {}: {}", dest.display(), e)))?;

    let mut copied = Vec::new();
    let mut entries = tokio::fs::read_dir(src)
        .await
        .map_err(|e| SnapshotError::Transport(format!("reading {}: {}", src.display(), e)))?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let target = dest.join(entry.file_name());
        tokio::fs::copy(entry.path(), &target).await.map_err(|e| {
            SnapshotError::Transport(format!("copying {}: {}", entry.path().display(), e))
        })?;
        debug!("Copied {}", target.display());
        copied.push(target);
    }
    copied.sort();
    Ok(copied)
}
