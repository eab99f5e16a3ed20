//! Folder directory cache
//!
//! Keeps a local JSON snapshot of the asset host's folder tree: root folders followed by the
//! immediate sub-folders of each root. The snapshot is refreshed on a fixed interval and on
//! demand, and always replaced as a whole.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use futures::TryStreamExt;
use imgpress_core::{dedup_folder_entries, AppError, FolderEntry};
use imgpress_storage::{collect_all, paginate, AssetHost};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct FolderCache {
    host: Option<Arc<dyn AssetHost>>,
    snapshot_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FolderCache {
    pub fn new(host: Option<Arc<dyn AssetHost>>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            host,
            snapshot_path: snapshot_path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.host.is_some()
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Enumerate the folder tree and replace the snapshot. Returns the number of entries written.
    ///
    /// Sub-folder listings of all roots run concurrently and are all awaited before the write.
    /// A root whose sub-folders cannot be listed contributes only itself.
    #[tracing::instrument(skip(self), fields(path = %self.snapshot_path.display()))]
    pub async fn refresh(&self) -> Result<usize, AppError> {
        let Some(host) = self.host.as_ref() else {
            tracing::warn!("Folder cache disabled: Cloudinary credentials are not set");
            return Err(AppError::Configuration(
                "Folder cache requires Cloudinary credentials".to_string(),
            ));
        };

        let roots: Vec<FolderEntry> = paginate(|cursor| host.root_folders(cursor))
            .try_collect()
            .await?;

        let children = join_all(
            roots
                .iter()
                .map(|root| collect_all(|cursor| host.sub_folders(&root.path, cursor))),
        )
        .await;

        let mut entries = Vec::with_capacity(roots.len());
        let mut nested = Vec::new();
        for (root, listed) in roots.iter().zip(children) {
            match listed {
                Ok(subs) => nested.extend(subs),
                Err(e) => {
                    tracing::warn!(error = %e, folder = %root.path, "Failed to list sub-folders")
                }
            }
        }
        entries.extend(roots);
        entries.extend(nested);

        let entries = dedup_folder_entries(entries);
        self.write_snapshot(&entries).await?;

        tracing::info!(entries = entries.len(), "Folder snapshot refreshed");
        Ok(entries.len())
    }

    /// Fire-and-forget refresh. Failures are logged.
    pub fn spawn_refresh(&self) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.refresh().await {
                tracing::warn!(error = %e, "Folder snapshot refresh failed");
            }
        })
    }

    /// Read the current snapshot. A missing or unreadable snapshot yields an empty list.
    pub async fn load(&self) -> Vec<FolderEntry> {
        let bytes = match tokio::fs::read(&self.snapshot_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.snapshot_path.display(), "No folder snapshot yet");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.snapshot_path.display(),
                    "Failed to read folder snapshot"
                );
                return Vec::new();
            }
        };

        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                path = %self.snapshot_path.display(),
                "Folder snapshot is corrupt"
            );
            Vec::new()
        })
    }

    /// Refresh now, then on every `interval` tick. Returns `None` when the cache is disabled.
    pub fn start(&self, interval: Duration) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            tracing::warn!("Folder cache disabled: Cloudinary credentials are not set");
            return None;
        }

        let cache = self.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                if let Err(e) = cache.refresh().await {
                    tracing::warn!(error = %e, "Scheduled folder snapshot refresh failed");
                }
            }
        }))
    }

    /// Write to a sibling temp file, then rename over the snapshot.
    async fn write_snapshot(&self, entries: &[FolderEntry]) -> Result<(), AppError> {
        let json = serde_json::to_vec(entries)?;

        let _guard = self.write_lock.lock().await;

        let parent = match self.snapshot_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => {
                tokio::fs::create_dir_all(p)
                    .await
                    .with_context(|| format!("Failed to create {}", p.display()))?;
                p.to_path_buf()
            }
            _ => PathBuf::from("."),
        };
        let file_name = self
            .snapshot_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Snapshot path has no file name: {}",
                    self.snapshot_path.display()
                ))
            })?;
        let temp_path = parent.join(format!(".{}.tmp", file_name));

        tokio::fs::write(&temp_path, &json)
            .await
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        tokio::fs::rename(&temp_path, &self.snapshot_path)
            .await
            .with_context(|| format!("Failed to replace {}", self.snapshot_path.display()))?;
        Ok(())
    }
}
