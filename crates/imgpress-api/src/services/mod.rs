pub mod folder_cache;
pub mod pipeline;

pub use folder_cache::FolderCache;
pub use pipeline::{IntakeEntry, UploadPipeline};
