//! imgpress API library
//!
//! Exposes the router, application state and services so integration tests can assemble the
//! server against in-memory backends.

pub mod constants;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod utils;
pub mod views;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
