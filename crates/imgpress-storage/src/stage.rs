//! Local staging areas
//!
//! The inbound root receives raw uploads and the outbound root receives transcoded images.
//! Each request works inside its own `BatchStage`: a pair of unique sub-directories that are
//! removed when the stage is dropped. Outbound batch directories are registered while alive so
//! `sweep_outbound` never deletes files of an in-flight batch.

use crate::traits::{StorageError, StorageResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::fs;

type ActiveBatches = Arc<Mutex<HashSet<PathBuf>>>;

/// Inbound and outbound staging roots
#[derive(Clone, Debug)]
pub struct StageStore {
    inbound_root: PathBuf,
    outbound_root: PathBuf,
    active: ActiveBatches,
}

impl StageStore {
    pub fn new(inbound_root: impl Into<PathBuf>, outbound_root: impl Into<PathBuf>) -> Self {
        Self {
            inbound_root: inbound_root.into(),
            outbound_root: outbound_root.into(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn inbound_root(&self) -> &Path {
        &self.inbound_root
    }

    pub fn outbound_root(&self) -> &Path {
        &self.outbound_root
    }

    /// Create the outbound directory if absent. Idempotent.
    pub async fn ensure_outbound_dir(&self) -> StorageResult<()> {
        create_dir(&self.outbound_root).await
    }

    /// Create the inbound directory if absent. Idempotent.
    pub async fn ensure_inbound_dir(&self) -> StorageResult<()> {
        create_dir(&self.inbound_root).await
    }

    /// Recursively remove the outbound directory. An absent directory is not an error.
    pub async fn clear_outbound_dir(&self) -> StorageResult<()> {
        match fs::remove_dir_all(&self.outbound_root).await {
            Ok(()) => {
                tracing::debug!(path = %self.outbound_root.display(), "Outbound staging cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    /// Path inside the outbound directory for `filename`. Pure, no I/O.
    pub fn resolve_outbound_path(&self, filename: &str) -> PathBuf {
        self.outbound_root.join(staged_file_name(filename))
    }

    /// Open a per-batch staging scope under both roots
    pub async fn begin_batch(&self) -> StorageResult<BatchStage> {
        self.ensure_inbound_dir().await?;
        self.ensure_outbound_dir().await?;

        let inbound = batch_dir(&self.inbound_root)?;
        let outbound = batch_dir(&self.outbound_root)?;

        self.lock_active().insert(outbound.path().to_path_buf());

        tracing::debug!(
            inbound = %inbound.path().display(),
            outbound = %outbound.path().display(),
            "Batch staging opened"
        );

        Ok(BatchStage {
            inbound,
            outbound,
            active: self.active.clone(),
        })
    }

    /// Remove everything under the outbound root except directories of live batches.
    /// Returns the number of entries removed.
    pub async fn sweep_outbound(&self) -> StorageResult<usize> {
        let mut entries = match fs::read_dir(&self.outbound_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.lock_active().contains(&path) {
                continue;
            }

            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to sweep staged entry")
                }
            }
        }

        if removed > 0 {
            tracing::debug!(removed, path = %self.outbound_root.display(), "Outbound staging swept");
        }
        Ok(removed)
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Staging scope of one upload batch. Both directories are removed on drop.
#[derive(Debug)]
pub struct BatchStage {
    inbound: TempDir,
    outbound: TempDir,
    active: ActiveBatches,
}

impl BatchStage {
    pub fn inbound_dir(&self) -> &Path {
        self.inbound.path()
    }

    pub fn outbound_dir(&self) -> &Path {
        self.outbound.path()
    }

    /// Inbound path for the `index`-th file of the batch. The index keeps same-named files apart.
    pub fn inbound_path(&self, index: usize, name: &str) -> PathBuf {
        self.inbound
            .path()
            .join(format!("{}-{}", index, staged_file_name(name)))
    }

    /// Outbound path for a transcoded file, named after the original upload
    pub fn outbound_path(&self, name: &str) -> PathBuf {
        self.outbound.path().join(staged_file_name(name))
    }
}

impl Drop for BatchStage {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.outbound.path());
    }
}

/// Reduce a client-supplied name to its final path component.
pub fn staged_file_name(name: &str) -> String {
    Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
        .unwrap_or_else(|| "upload".to_string())
}

async fn create_dir(path: &Path) -> StorageResult<()> {
    fs::create_dir_all(path).await.map_err(|e| {
        StorageError::ConfigError(format!(
            "Failed to create staging directory {}: {}",
            path.display(),
            e
        ))
    })
}

fn batch_dir(root: &Path) -> StorageResult<TempDir> {
    tempfile::Builder::new()
        .prefix("batch-")
        .tempdir_in(root)
        .map_err(StorageError::IoError)
}
