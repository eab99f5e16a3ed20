//! Route paths and header names shared by handlers, views and tests

pub const HOME_PATH: &str = "/";
pub const HEALTH_PATH: &str = "/health";

pub const CLOUDINARY_PATH: &str = "/cloudinary";
pub const CLOUDINARY_RELOAD_PATH: &str = "/cloudinary/reloadFolders";

pub const AZURE_PATH: &str = "/azure";
pub const AZURE_TIER_PATH: &str = "/azure/tier";

/// Response header carrying the batch summary on upload redirects
pub const UPLOAD_SUMMARY_HEADER: &str = "x-upload-summary";

/// Name of the repeated multipart field holding the images
pub const FILE_FIELD: &str = "file";

/// Request body cap, in multiples of the per-file upload limit
pub const BATCH_BODY_LIMIT_FILES: usize = 20;
