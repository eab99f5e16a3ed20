use imgpress_core::SupportedImageType;
use std::path::Path;

/// Intake validation errors. Each one turns into a `Rejected` outcome for that file.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Only image files are allowed: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<&'static str>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

/// Intake filter for multipart `file` fields
///
/// Decides from the declared MIME type whether a file is staged at all, and bounds its size.
#[derive(Debug, Clone)]
pub struct IntakeValidator {
    max_file_size: usize,
}

impl IntakeValidator {
    pub fn new(max_file_size: usize) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate content type
    pub fn validate_content_type(
        &self,
        content_type: &str,
    ) -> Result<SupportedImageType, ValidationError> {
        SupportedImageType::from_mime(content_type).ok_or_else(|| {
            ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: ALLOWED_CONTENT_TYPES.to_vec(),
            }
        })
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Reduce a client-supplied filename to a safe final path component
    pub fn validate_filename(&self, filename: &str) -> Result<String, ValidationError> {
        let name = Path::new(filename.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.chars().filter(|c| !c.is_control()).collect::<String>())
            .filter(|n| !n.is_empty() && n != "." && n != "..")
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if name.len() > MAX_FILENAME_LEN {
            return Err(ValidationError::InvalidFilename(format!(
                "{} characters exceeds the {} character limit",
                name.len(),
                MAX_FILENAME_LEN
            )));
        }

        Ok(name)
    }
}

const MAX_FILENAME_LEN: usize = 255;

const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "image/svg+xml"];
