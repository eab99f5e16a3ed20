//! imgpress Core Library
//!
//! This crate provides the domain models, error types and configuration that are shared
//! by the storage, processing and API crates.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use backend::Backend;
pub use config::{AssetHostCredentials, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    dedup_folder_entries, AccessTier, BatchSummary, FileOutcome, FolderEntry, OutcomeStatus,
    PublishTarget, PublishedAsset, SupportedImageType, TierReport, UploadedFile,
};
