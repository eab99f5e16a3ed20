//! Multipart intake for upload handlers
//!
//! Streams every `file` field into the batch inbound scope, filtering by declared MIME type
//! before anything touches the disk, and collects the remaining text fields.

use std::collections::HashMap;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use imgpress_core::{AppError, FileOutcome, UploadedFile};
use imgpress_processing::{IntakeValidator, ValidationError};
use imgpress_storage::BatchStage;
use tokio::io::AsyncWriteExt;

use crate::constants::FILE_FIELD;
use crate::error::HttpAppError;
use crate::services::IntakeEntry;

/// Parsed upload form: one intake entry per `file` field, in form order, plus text fields
#[derive(Debug, Default)]
pub struct UploadForm {
    pub entries: Vec<IntakeEntry>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// A text field that must be present. Missing is a 400.
    pub fn required_field(&self, name: &str) -> Result<&str, AppError> {
        self.field(name)
            .ok_or_else(|| AppError::InvalidInput(format!("Missing form field `{}`", name)))
    }

    pub fn staged_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, IntakeEntry::Staged(_)))
            .count()
    }
}

/// Read the whole multipart body, staging accepted files into `batch`.
///
/// Unsupported, empty, oversized or badly named files become `Rejected` entries and are never
/// kept on disk. Only a malformed multipart body is an error.
pub async fn receive_upload_form(
    mut multipart: Multipart,
    batch: &BatchStage,
    validator: &IntakeValidator,
) -> Result<UploadForm, HttpAppError> {
    let mut form = UploadForm::default();
    let mut index = 0;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if field_name == FILE_FIELD {
            let entry = stage_file(field, index, batch, validator).await?;
            form.entries.push(entry);
            index += 1;
        } else if !field_name.is_empty() {
            let value = field.text().await?;
            form.fields.insert(field_name, value);
        }
    }

    tracing::debug!(
        files = form.entries.len(),
        staged = form.staged_count(),
        "Upload form received"
    );

    Ok(form)
}

async fn stage_file(
    mut field: Field<'_>,
    index: usize,
    batch: &BatchStage,
    validator: &IntakeValidator,
) -> Result<IntakeEntry, HttpAppError> {
    let raw_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let original_name = match validator.validate_filename(&raw_name) {
        Ok(name) => name,
        Err(e) => return Ok(rejected(&raw_name, e)),
    };

    let declared_type = match validator.validate_content_type(&content_type) {
        Ok(declared) => declared,
        Err(e) => return Ok(rejected(&original_name, e)),
    };

    let staged_path = batch.inbound_path(index, &original_name);
    let mut file = tokio::fs::File::create(&staged_path)
        .await
        .map_err(AppError::from)?;

    let mut size = 0usize;
    let mut too_large = false;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len();
        if size > validator.max_file_size() {
            too_large = true;
            break;
        }
        file.write_all(&chunk).await.map_err(AppError::from)?;
    }
    file.flush().await.map_err(AppError::from)?;
    drop(file);

    let checked = if too_large {
        Err(ValidationError::FileTooLarge {
            size,
            max: validator.max_file_size(),
        })
    } else {
        validator.validate_file_size(size)
    };

    if let Err(e) = checked {
        if let Err(remove_err) = tokio::fs::remove_file(&staged_path).await {
            tracing::warn!(error = %remove_err, path = %staged_path.display(), "Failed to drop rejected upload");
        }
        return Ok(rejected(&original_name, e));
    }

    tracing::debug!(
        file = %original_name,
        content_type = %declared_type,
        size,
        "File staged"
    );

    Ok(IntakeEntry::Staged(UploadedFile {
        original_name,
        declared_type,
        staged_path,
        byte_size: size as u64,
    }))
}

fn rejected(name: &str, reason: ValidationError) -> IntakeEntry {
    IntakeEntry::Rejected(FileOutcome::rejected(name, reason.to_string()))
}
