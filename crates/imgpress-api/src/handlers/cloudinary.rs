//! Cloudinary routes: folder listing view, batch upload, snapshot reload

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use imgpress_core::PublishTarget;

use crate::constants::CLOUDINARY_PATH;
use crate::error::HttpAppError;
use crate::handlers::{sweep_staging, upload_redirect};
use crate::state::AppState;
use crate::utils::upload::receive_upload_form;
use crate::views;

/// Listing view fed by the folder snapshot
#[tracing::instrument(skip(state))]
pub async fn cloudinary_view(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let folders = state.folder_cache.load().await;
    let page = views::cloudinary_page(&folders);
    sweep_staging(&state).await;
    Html(page)
}

/// Upload a batch into a Cloudinary folder
///
/// Form fields: `file` (repeated), `folder`, `keepFilename` (`"true"` keeps original names).
/// Every file gets an outcome; the response is always a redirect to the listing view once the
/// batch is done.
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_cloudinary"))]
pub async fn upload_to_cloudinary(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpAppError> {
    let publisher = state.backends.asset_host()?;
    let multipart = multipart?;

    let batch = state.stage.begin_batch().await?;
    let form = receive_upload_form(multipart, &batch, &state.validator).await?;

    let target = PublishTarget::asset_host(
        form.required_field("folder")?.trim(),
        form.field("keepFilename"),
    );

    let outcomes = state
        .pipeline
        .handle_batch(&batch, form.entries, publisher, &target)
        .await;
    drop(batch);

    tokio::time::sleep(state.config.redirect_delay()).await;

    upload_redirect(CLOUDINARY_PATH, &outcomes)
}

/// Refresh the folder snapshot in the background and go back to the listing
#[tracing::instrument(skip(state))]
pub async fn reload_folders(State(state): State<Arc<AppState>>) -> Redirect {
    state.folder_cache.spawn_refresh();
    Redirect::to(CLOUDINARY_PATH)
}
