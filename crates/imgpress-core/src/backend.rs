use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Remote backend types
///
/// Defined in core because it's used by configuration, publishers and per-file outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Folder-oriented asset host (Cloudinary)
    AssetHost,
    /// Container-oriented blob storage account (Azure Blob Storage)
    BlobStore,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset_host" | "cloudinary" => Ok(Backend::AssetHost),
            "blob_store" | "azure" => Ok(Backend::BlobStore),
            _ => Err(anyhow::anyhow!("Invalid backend: {}", s)),
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Backend::AssetHost => write!(f, "cloudinary"),
            Backend::BlobStore => write!(f, "azure"),
        }
    }
}
