use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Image types accepted at intake. Anything else is rejected before staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedImageType {
    Png,
    Jpeg,
    Webp,
    Svg,
}

impl SupportedImageType {
    /// Parse a declared MIME type. Case-insensitive; parameters after `;` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/png" => Some(SupportedImageType::Png),
            "image/jpeg" => Some(SupportedImageType::Jpeg),
            "image/webp" => Some(SupportedImageType::Webp),
            "image/svg+xml" => Some(SupportedImageType::Svg),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            SupportedImageType::Png => "image/png",
            SupportedImageType::Jpeg => "image/jpeg",
            SupportedImageType::Webp => "image/webp",
            SupportedImageType::Svg => "image/svg+xml",
        }
    }
}

impl FromStr for SupportedImageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mime(s).ok_or_else(|| anyhow::anyhow!("Unsupported image type: {}", s))
    }
}

impl Display for SupportedImageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.mime_type())
    }
}

/// A file received from a multipart `file` field and written to the batch inbound scope.
///
/// Owned by exactly one pipeline invocation; the staged bytes disappear with the batch scope.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub declared_type: SupportedImageType,
    pub staged_path: PathBuf,
    pub byte_size: u64,
}
