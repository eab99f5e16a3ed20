//! Health check handler

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness: the process is up and serving requests. Backends are not contacted.
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "alive" })))
}
