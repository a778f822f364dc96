//! Local snapshots of the last successfully ingested dataset.
//!
//! A snapshot is the backup source of a collection and holds the fetched
//! payload byte for byte. It is replaced wholesale by writing a temporary file next to the target and renaming it over the
//! previous snapshot, so an interrupted write never leaves a truncated file.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::ReindexError;

/// Writes dataset snapshots to disk.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `dir` (the backups directory).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path of a collection.
    pub fn path_for(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{}.json", alias))
    }

    /// Create the backups directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), ReindexError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ReindexError::snapshot(format!("{}: {}", self.dir.display(), e))
        })
    }

    /// Atomically replace the snapshot at `path` with `payload`.
    pub async fn write(&self, path: &Path, payload: &[u8]) -> Result<(), ReindexError> {
        let bytes = payload.to_vec();
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes))
            .await
            .map_err(|e| ReindexError::snapshot(e.to_string()))??;

        info!(path = %path.display(), "Snapshot written");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ReindexError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| ReindexError::snapshot(format!("{}: {}", parent.display(), e)))?;

    // Same directory as the target so the rename never crosses filesystems.
    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| ReindexError::snapshot(format!("{}: {}", parent.display(), e)))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ReindexError::snapshot(e.to_string()))?;

    debug!(tmp = %tmp.path().display(), target = %path.display(), "Renaming snapshot");
    tmp.persist(path)
        .map_err(|e| ReindexError::snapshot(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}
