//! Route configuration and setup

use crate::constants::{
    AZURE_PATH, AZURE_TIER_PATH, BATCH_BODY_LIMIT_FILES, CLOUDINARY_PATH, CLOUDINARY_RELOAD_PATH,
    HEALTH_PATH, HOME_PATH,
};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use imgpress_core::Config;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let body_limit = config
        .max_upload_size_bytes()
        .checked_mul(BATCH_BODY_LIMIT_FILES)
        .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))?;

    let app = Router::new()
        .route(HOME_PATH, get(handlers::home::home))
        .route(HEALTH_PATH, get(handlers::health::liveness_check))
        .route(
            CLOUDINARY_PATH,
            get(handlers::cloudinary::cloudinary_view)
                .post(handlers::cloudinary::upload_to_cloudinary),
        )
        .route(
            CLOUDINARY_RELOAD_PATH,
            get(handlers::cloudinary::reload_folders),
        )
        .route(
            AZURE_PATH,
            get(handlers::azure::azure_view).post(handlers::azure::upload_to_azure),
        )
        .route(AZURE_TIER_PATH, post(handlers::azure::set_container_tier))
        // Per-file limits are enforced during intake; this only caps the whole body
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(body_limit)),
        )
        .with_state(state);

    Ok(app)
}
