//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use imgpress_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.is_production())
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment(),
        cloudinary = config.asset_host().is_some(),
        azure = config.azure_connection_string().is_some(),
        "Configuration loaded and validated successfully"
    );

    // Staging directories and backend clients
    let state = services::initialize_services(&config).await?;

    // Folder snapshot: refresh now, then on a fixed interval
    state
        .folder_cache
        .start(config.folder_refresh_interval());

    // Setup routes
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
