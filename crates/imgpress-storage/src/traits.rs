//! Backend client abstractions
//!
//! The two remote backends are reached through these traits so the publishers, the folder
//! cache and the tests never depend on a concrete HTTP client.

use async_trait::async_trait;
use imgpress_core::{AccessTier, AppError, FolderEntry};
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Publish target does not match backend: {0}")]
    InvalidTarget(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::BackendError(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidTarget(msg) => AppError::InvalidInput(msg),
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
            StorageError::IoError(e) => AppError::Internal(format!("IO error: {}", e)),
            other => AppError::Backend(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the following page; `None` on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Options for a single asset-host upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUploadOptions {
    pub folder: String,
    /// Explicit remote name inside `folder`
    pub public_id: Option<String>,
    /// Derive the remote name from the uploaded file name
    pub use_filename: bool,
    pub unique_filename: bool,
}

/// Identifiers returned by the asset host after an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    pub public_id: String,
    pub secure_url: String,
}

/// Folder-oriented asset host (Cloudinary)
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// One page of the root-level folders
    async fn root_folders(&self, cursor: Option<String>) -> StorageResult<Page<FolderEntry>>;

    /// One page of the immediate sub-folders of `path`
    async fn sub_folders(
        &self,
        path: &str,
        cursor: Option<String>,
    ) -> StorageResult<Page<FolderEntry>>;

    /// Upload a local file
    async fn upload(
        &self,
        local_path: &Path,
        options: &AssetUploadOptions,
    ) -> StorageResult<RemoteAsset>;
}

/// Container-oriented blob store (Azure Blob Storage)
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list_containers(&self, marker: Option<String>) -> StorageResult<Page<String>>;

    /// Create a container. Returns `false` when it already existed.
    async fn create_container(&self, container: &str) -> StorageResult<bool>;

    /// Upload a local file as a block blob and return its URL
    async fn upload_blob(
        &self,
        container: &str,
        blob_name: &str,
        local_path: &Path,
        content_type: &str,
    ) -> StorageResult<String>;

    async fn list_blobs(&self, container: &str, marker: Option<String>)
        -> StorageResult<Page<String>>;

    async fn set_access_tier(
        &self,
        container: &str,
        blob_name: &str,
        tier: AccessTier,
    ) -> StorageResult<()>;

    /// Public URL of a blob
    fn blob_url(&self, container: &str, blob_name: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgpress_core::ErrorMetadata;

    #[test]
    fn test_storage_error_maps_to_app_error() {
        let err: AppError = StorageError::ConfigError("missing key".to_string()).into();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");

        let err: AppError = StorageError::UploadFailed("503".to_string()).into();
        assert_eq!(err.http_status_code(), 502);

        let err: AppError = StorageError::InvalidTarget("blob store".to_string()).into();
        assert_eq!(err.http_status_code(), 400);
    }
}
