use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::Backend;

/// Destination for one upload batch, selected per request from form input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum PublishTarget {
    AssetHost {
        folder_path: String,
        use_original_filename: bool,
        force_unique_name: bool,
    },
    BlobStore {
        container_name: String,
    },
}

impl PublishTarget {
    /// Build an asset-host target from the upload form. Only the literal `"true"` keeps the
    /// original filename.
    pub fn asset_host(folder_path: impl Into<String>, keep_filename: Option<&str>) -> Self {
        PublishTarget::AssetHost {
            folder_path: folder_path.into(),
            use_original_filename: keep_filename == Some("true"),
            force_unique_name: true,
        }
    }

    pub fn blob_store(container_name: impl Into<String>) -> Self {
        PublishTarget::BlobStore {
            container_name: container_name.into(),
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            PublishTarget::AssetHost { .. } => Backend::AssetHost,
            PublishTarget::BlobStore { .. } => Backend::BlobStore,
        }
    }
}

/// Identifiers of a file after a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedAsset {
    pub backend: Backend,
    pub remote_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Published { remote_id: String, url: String },
    Rejected { reason: String },
    TranscodeFailed { reason: String },
    PublishFailed { reason: String },
}

/// Result of one file of a batch. A batch yields these in intake order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub original_name: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl FileOutcome {
    pub fn published(original_name: impl Into<String>, asset: PublishedAsset) -> Self {
        Self {
            original_name: original_name.into(),
            status: OutcomeStatus::Published {
                remote_id: asset.remote_id,
                url: asset.url,
            },
        }
    }

    pub fn rejected(original_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            status: OutcomeStatus::Rejected {
                reason: reason.into(),
            },
        }
    }

    pub fn transcode_failed(original_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            status: OutcomeStatus::TranscodeFailed {
                reason: reason.into(),
            },
        }
    }

    pub fn publish_failed(original_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            original_name: original_name.into(),
            status: OutcomeStatus::PublishFailed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self.status, OutcomeStatus::Published { .. })
    }
}

/// Counts of a finished batch, rendered into the `x-upload-summary` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub published: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        outcomes
            .iter()
            .fold(BatchSummary::default(), |mut acc, outcome| {
                match outcome.status {
                    OutcomeStatus::Published { .. } => acc.published += 1,
                    OutcomeStatus::Rejected { .. } => acc.rejected += 1,
                    OutcomeStatus::TranscodeFailed { .. } | OutcomeStatus::PublishFailed { .. } => {
                        acc.failed += 1
                    }
                }
                acc
            })
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "published={}; rejected={}; failed={}",
            self.published, self.rejected, self.failed
        )
    }
}

/// Blob access tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessTier {
    Hot,
    Cool,
    Cold,
    Archive,
}

impl AccessTier {
    /// Value of the `x-ms-access-tier` header
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Hot => "Hot",
            AccessTier::Cool => "Cool",
            AccessTier::Cold => "Cold",
            AccessTier::Archive => "Archive",
        }
    }
}

impl FromStr for AccessTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hot" => Ok(AccessTier::Hot),
            "cool" => Ok(AccessTier::Cool),
            "cold" => Ok(AccessTier::Cold),
            "archive" => Ok(AccessTier::Archive),
            _ => Err(anyhow::anyhow!("Invalid access tier: {}", s)),
        }
    }
}

impl Display for AccessTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Result of a bulk tier change. Every blob is attempted; failures do not stop the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<(String, String)>,
}
