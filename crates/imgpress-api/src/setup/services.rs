//! Service initialization
//!
//! Builds the staging store, the backend clients that have credentials, the transcoder and
//! the folder cache, and assembles them into `AppState`.

use std::sync::Arc;

use anyhow::{Context, Result};
use imgpress_core::Config;
use imgpress_processing::{IntakeValidator, JpegTranscoder, Transcoder};
use imgpress_storage::{
    AssetHost, AssetHostPublisher, AzureBlobClient, BlobStore, BlobStorePublisher,
    CloudinaryClient, StageStore,
};

use crate::services::{FolderCache, UploadPipeline};
use crate::state::{AppState, BackendState};

/// Initialize every service from configuration
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let asset_host: Option<Arc<dyn AssetHost>> = match config.asset_host() {
        Some(credentials) => {
            let client = CloudinaryClient::new(credentials.clone(), config.http_client_timeout())
                .context("Failed to create Cloudinary client")?;
            tracing::info!(cloud_name = %credentials.cloud_name, "Cloudinary backend enabled");
            let host: Arc<dyn AssetHost> = Arc::new(client);
            Some(host)
        }
        None => {
            tracing::warn!("Cloudinary credentials not set, /cloudinary uploads are disabled");
            None
        }
    };

    let blob_store: Option<Arc<dyn BlobStore>> = match config.azure_connection_string() {
        Some(conn) => {
            let client = AzureBlobClient::from_connection_string(conn, config.http_client_timeout())
                .context("Failed to create Azure Blob Storage client")?;
            tracing::info!("Azure Blob Storage backend enabled");
            let store: Arc<dyn BlobStore> = Arc::new(client);
            Some(store)
        }
        None => {
            tracing::warn!("AZURE_STORAGE_CONNECTION_STRING not set, /azure routes are disabled");
            None
        }
    };

    let state = build_state(
        config.clone(),
        Arc::new(JpegTranscoder),
        asset_host,
        blob_store,
    );

    // Create both staging roots up front so the first request does not race on them
    state
        .stage
        .ensure_inbound_dir()
        .await
        .context("Failed to create inbound staging directory")?;
    state
        .stage
        .ensure_outbound_dir()
        .await
        .context("Failed to create outbound staging directory")?;

    Ok(state)
}

/// Assemble `AppState` from already built components
pub fn build_state(
    config: Config,
    transcoder: Arc<dyn Transcoder>,
    asset_host: Option<Arc<dyn AssetHost>>,
    blob_store: Option<Arc<dyn BlobStore>>,
) -> Arc<AppState> {
    let stage = StageStore::new(
        config.staging_inbound_dir().clone(),
        config.staging_outbound_dir().clone(),
    );
    let folder_cache = FolderCache::new(asset_host.clone(), config.folder_snapshot_path().clone());

    Arc::new(AppState {
        validator: IntakeValidator::new(config.max_upload_size_bytes()),
        pipeline: UploadPipeline::new(transcoder),
        backends: BackendState {
            asset_host: asset_host.map(AssetHostPublisher::new),
            blob_store: blob_store.map(BlobStorePublisher::new),
        },
        stage,
        folder_cache,
        config,
    })
}
