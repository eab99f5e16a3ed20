//! imgpress Storage Library
//!
//! Local staging areas for uploads in flight, the backend client traits with their Cloudinary
//! and Azure Blob Storage implementations, and the publishers that push transcoded files to
//! either backend.

pub mod azure;
pub mod cloudinary;
pub mod listing;
pub mod publisher;
pub mod stage;
pub mod traits;

// Re-export commonly used types
pub use azure::AzureBlobClient;
pub use cloudinary::CloudinaryClient;
pub use listing::{collect_all, paginate};
pub use publisher::{AssetHostPublisher, BlobStorePublisher, Publisher, OUTPUT_CONTENT_TYPE};
pub use stage::{BatchStage, StageStore};
pub use traits::{
    AssetHost, AssetUploadOptions, BlobStore, Page, RemoteAsset, StorageError, StorageResult,
};
