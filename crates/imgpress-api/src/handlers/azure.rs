//! Azure Blob Storage routes: container listing, batch upload, bulk access tier change

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::{Html, Redirect, Response},
};
use imgpress_core::{AccessTier, AppError, PublishTarget};
use imgpress_storage::BlobStorePublisher;
use serde::Deserialize;

use crate::constants::AZURE_PATH;
use crate::error::{HttpAppError, ValidatedForm};
use crate::handlers::{sweep_staging, upload_redirect};
use crate::state::AppState;
use crate::utils::upload::receive_upload_form;
use crate::views;

#[derive(Debug, Deserialize)]
pub struct TierForm {
    pub container: String,
    pub tier: String,
}

/// Listing view with every container of the account
#[tracing::instrument(skip(state))]
pub async fn azure_view(State(state): State<Arc<AppState>>) -> Result<Html<String>, HttpAppError> {
    let publisher = state.backends.blob_store()?;
    let containers = publisher.list_containers().await?;
    let page = views::azure_page(&containers);
    sweep_staging(&state).await;
    Ok(Html(page))
}

/// Upload a batch into a container, creating the container first when it does not exist
///
/// Form fields: `file` (repeated), `container`.
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_azure"))]
pub async fn upload_to_azure(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpAppError> {
    let publisher = state.backends.blob_store()?;
    let multipart = multipart?;

    let batch = state.stage.begin_batch().await?;
    let form = receive_upload_form(multipart, &batch, &state.validator).await?;

    let container = form.required_field("container")?.trim().to_string();
    let target = PublishTarget::blob_store(&container);

    let outcomes = state
        .pipeline
        .handle_batch(&batch, form.entries, publisher, &target)
        .await;
    drop(batch);

    if outcomes.iter().any(|o| o.is_published()) {
        log_container_contents(publisher, &container).await;
    }

    upload_redirect(AZURE_PATH, &outcomes)
}

/// Set the access tier of every blob in a container
///
/// One tier call per blob; individual failures are logged and do not stop the others.
#[tracing::instrument(skip(state, form), fields(container = %form.container, tier = %form.tier))]
pub async fn set_container_tier(
    State(state): State<Arc<AppState>>,
    ValidatedForm(form): ValidatedForm<TierForm>,
) -> Result<Redirect, HttpAppError> {
    let publisher = state.backends.blob_store()?;

    let tier: AccessTier = form
        .tier
        .parse()
        .map_err(|e: anyhow::Error| AppError::InvalidInput(e.to_string()))?;
    let container = form.container.trim();
    if container.is_empty() {
        return Err(AppError::InvalidInput("Missing form field `container`".to_string()).into());
    }

    let report = publisher.set_tier(container, tier).await?;
    if !report.failed.is_empty() {
        tracing::warn!(
            failed = report.failed.len(),
            attempted = report.attempted,
            "Some blobs kept their previous tier"
        );
    }

    Ok(Redirect::to(AZURE_PATH))
}

async fn log_container_contents(publisher: &BlobStorePublisher, container: &str) {
    match publisher.list_blobs(container).await {
        Ok(blobs) => {
            for (name, url) in blobs {
                tracing::info!(container = %container, blob = %name, url = %url, "Blob listed");
            }
        }
        Err(e) => tracing::warn!(error = %e, container = %container, "Failed to list blobs"),
    }
}
