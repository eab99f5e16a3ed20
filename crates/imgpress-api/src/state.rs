//! Application state shared by every handler

use crate::services::folder_cache::FolderCache;
use crate::services::pipeline::UploadPipeline;
use imgpress_core::{AppError, Config};
use imgpress_processing::IntakeValidator;
use imgpress_storage::{AssetHostPublisher, BlobStorePublisher, StageStore};

/// Backend handles. Either one is absent when its credentials are not configured; the routes
/// that need it then fail at request time with a configuration error.
#[derive(Clone)]
pub struct BackendState {
    pub asset_host: Option<AssetHostPublisher>,
    pub blob_store: Option<BlobStorePublisher>,
}

impl BackendState {
    pub fn asset_host(&self) -> Result<&AssetHostPublisher, AppError> {
        self.asset_host.as_ref().ok_or_else(|| {
            AppError::Configuration(
                "Cloudinary credentials (CLOUD_NAME, API_KEY, API_SECRET) are not set".to_string(),
            )
        })
    }

    pub fn blob_store(&self) -> Result<&BlobStorePublisher, AppError> {
        self.blob_store.as_ref().ok_or_else(|| {
            AppError::Configuration("AZURE_STORAGE_CONNECTION_STRING is not set".to_string())
        })
    }
}

pub struct AppState {
    pub config: Config,
    pub stage: StageStore,
    pub validator: IntakeValidator,
    pub pipeline: UploadPipeline,
    pub backends: BackendState,
    pub folder_cache: FolderCache,
}
