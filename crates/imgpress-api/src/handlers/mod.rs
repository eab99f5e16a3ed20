pub mod azure;
pub mod cloudinary;
pub mod health;
pub mod home;

use axum::{
    http::HeaderValue,
    response::{IntoResponse, Redirect, Response},
};
use imgpress_core::{AppError, BatchSummary, FileOutcome};

use crate::constants::UPLOAD_SUMMARY_HEADER;
use crate::error::HttpAppError;
use crate::state::AppState;

/// 303 back to a listing view, carrying the batch counts in `x-upload-summary`.
pub(crate) fn upload_redirect(
    location: &str,
    outcomes: &[FileOutcome],
) -> Result<Response, HttpAppError> {
    let summary = BatchSummary::from_outcomes(outcomes).to_string();
    let value = HeaderValue::from_str(&summary)
        .map_err(|e| AppError::Internal(format!("Invalid summary header: {}", e)))?;

    let mut response = Redirect::to(location).into_response();
    response.headers_mut().insert(UPLOAD_SUMMARY_HEADER, value);
    Ok(response)
}

/// Listing views drop leftover transcoded files. Batches still in flight are kept.
pub(crate) async fn sweep_staging(state: &AppState) {
    if let Err(e) = state.stage.sweep_outbound().await {
        tracing::warn!(error = %e, "Failed to sweep outbound staging");
    }
}
