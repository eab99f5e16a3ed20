//! Backend publishers
//!
//! Both publishers take a transcoded file on local disk and a `PublishTarget`, and hand the
//! file to their backend. A target of the other variant is rejected with `InvalidTarget`.

use crate::listing::collect_all;
use crate::traits::{AssetHost, AssetUploadOptions, BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use imgpress_core::{AccessTier, Backend, PublishTarget, PublishedAsset, TierReport};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Content type of every transcoded file
pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Make `target` ready to receive uploads. Called once per batch, before the first publish.
    async fn prepare(&self, _target: &PublishTarget) -> StorageResult<()> {
        Ok(())
    }

    async fn publish(
        &self,
        local_path: &Path,
        target: &PublishTarget,
    ) -> StorageResult<PublishedAsset>;

    fn backend(&self) -> Backend;
}

/// Publishes into folders of the asset host
#[derive(Clone)]
pub struct AssetHostPublisher {
    host: Arc<dyn AssetHost>,
}

impl AssetHostPublisher {
    pub fn new(host: Arc<dyn AssetHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Publisher for AssetHostPublisher {
    async fn publish(
        &self,
        local_path: &Path,
        target: &PublishTarget,
    ) -> StorageResult<PublishedAsset> {
        let PublishTarget::AssetHost {
            folder_path,
            use_original_filename,
            force_unique_name,
        } = target
        else {
            return Err(StorageError::InvalidTarget(format!(
                "{} target sent to the asset host publisher",
                target.backend()
            )));
        };

        let options = if *use_original_filename {
            AssetUploadOptions {
                folder: folder_path.clone(),
                public_id: None,
                use_filename: true,
                unique_filename: *force_unique_name,
            }
        } else {
            AssetUploadOptions {
                folder: folder_path.clone(),
                public_id: Some(Uuid::new_v4().to_string()),
                use_filename: false,
                unique_filename: *force_unique_name,
            }
        };

        let asset = self.host.upload(local_path, &options).await?;

        Ok(PublishedAsset {
            backend: Backend::AssetHost,
            remote_id: asset.public_id,
            url: asset.secure_url,
        })
    }

    fn backend(&self) -> Backend {
        Backend::AssetHost
    }
}

/// Publishes blobs into containers of the blob store
#[derive(Clone)]
pub struct BlobStorePublisher {
    store: Arc<dyn BlobStore>,
}

impl BlobStorePublisher {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Create `container` if it does not exist yet. Returns `true` when it was created.
    pub async fn ensure_container(&self, container: &str) -> StorageResult<bool> {
        validate_container_name(container)?;
        self.store.create_container(container).await
    }

    pub async fn list_containers(&self) -> StorageResult<Vec<String>> {
        collect_all(|marker| self.store.list_containers(marker)).await
    }

    /// Names and URLs of every blob in `container`
    pub async fn list_blobs(&self, container: &str) -> StorageResult<Vec<(String, String)>> {
        let names = collect_all(|marker| self.store.list_blobs(container, marker)).await?;
        Ok(names
            .into_iter()
            .map(|name| {
                let url = self.store.blob_url(container, &name);
                (name, url)
            })
            .collect())
    }

    /// Apply `tier` to every blob of `container`.
    ///
    /// Exactly one tier call is issued per listed blob. A failing call is recorded in the report
    /// and does not stop the remaining ones; there is no rollback.
    pub async fn set_tier(&self, container: &str, tier: AccessTier) -> StorageResult<TierReport> {
        let blobs = collect_all(|marker| self.store.list_blobs(container, marker)).await?;

        let mut report = TierReport::default();
        for blob in blobs {
            report.attempted += 1;
            match self.store.set_access_tier(container, &blob, tier).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        container = %container,
                        blob = %blob,
                        tier = %tier,
                        "Failed to set access tier"
                    );
                    report.failed.push((blob, e.to_string()));
                }
            }
        }

        tracing::info!(
            container = %container,
            tier = %tier,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "Access tier applied"
        );

        Ok(report)
    }
}

#[async_trait]
impl Publisher for BlobStorePublisher {
    async fn prepare(&self, target: &PublishTarget) -> StorageResult<()> {
        let PublishTarget::BlobStore { container_name } = target else {
            return Err(StorageError::InvalidTarget(format!(
                "{} target sent to the blob store publisher",
                target.backend()
            )));
        };

        if self.ensure_container(container_name).await? {
            tracing::info!(container = %container_name, "Container created");
        }
        Ok(())
    }

    async fn publish(
        &self,
        local_path: &Path,
        target: &PublishTarget,
    ) -> StorageResult<PublishedAsset> {
        let PublishTarget::BlobStore { container_name } = target else {
            return Err(StorageError::InvalidTarget(format!(
                "{} target sent to the blob store publisher",
                target.backend()
            )));
        };

        let blob_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StorageError::UploadFailed(format!(
                    "Staged file has no usable name: {}",
                    local_path.display()
                ))
            })?;

        let url = self
            .store
            .upload_blob(container_name, blob_name, local_path, OUTPUT_CONTENT_TYPE)
            .await?;

        Ok(PublishedAsset {
            backend: Backend::BlobStore,
            remote_id: format!("{}/{}", container_name, blob_name),
            url,
        })
    }

    fn backend(&self) -> Backend {
        Backend::BlobStore
    }
}

/// Container names: 3-63 characters of lowercase letters, digits and single hyphens,
/// starting and ending with a letter or digit.
pub fn validate_container_name(name: &str) -> StorageResult<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid = (3..=63).contains(&name.len())
        && valid_chars
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidTarget(format!(
            "Invalid container name: {:?}",
            name
        )))
    }
}
