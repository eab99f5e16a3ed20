//! Upload pipeline
//!
//! Runs one batch: transcode → drop staged original → publish, file by file, and reports a
//! `FileOutcome` for every intake entry in intake order. Per-file failures never abort the batch.

use std::sync::Arc;

use imgpress_core::{BatchSummary, FileOutcome, OutcomeStatus, PublishTarget, UploadedFile};
use imgpress_processing::Transcoder;
use imgpress_storage::{BatchStage, Publisher};

/// One multipart `file` field after intake
#[derive(Debug, Clone)]
pub enum IntakeEntry {
    /// Accepted and written to the batch inbound scope
    Staged(UploadedFile),
    /// Filtered out before staging; carried through so it shows up in the outcomes
    Rejected(FileOutcome),
}

impl IntakeEntry {
    fn is_staged(&self) -> bool {
        matches!(self, IntakeEntry::Staged(_))
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    transcoder: Arc<dyn Transcoder>,
}

impl UploadPipeline {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self { transcoder }
    }

    /// Process a whole batch sequentially.
    ///
    /// Each transcode completes before its publish starts, and each publish completes before the
    /// next transcode. The target is prepared once, before the first publish; if that fails,
    /// every staged file is recorded as `PublishFailed` without being transcoded.
    #[tracing::instrument(
        skip_all,
        fields(backend = %publisher.backend(), files = entries.len())
    )]
    pub async fn handle_batch(
        &self,
        batch: &BatchStage,
        entries: Vec<IntakeEntry>,
        publisher: &dyn Publisher,
        target: &PublishTarget,
    ) -> Vec<FileOutcome> {
        let mut prepared = Ok(());
        if entries.iter().any(IntakeEntry::is_staged) {
            if let Err(e) = tokio::fs::create_dir_all(batch.outbound_dir()).await {
                prepared = Err(format!("Outbound staging unavailable: {}", e));
            } else if let Err(e) = publisher.prepare(target).await {
                tracing::error!(error = %e, "Failed to prepare publish target");
                prepared = Err(e.to_string());
            }
        }

        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let outcome = match entry {
                IntakeEntry::Rejected(outcome) => outcome,
                IntakeEntry::Staged(file) => match &prepared {
                    Ok(()) => self.process_file(batch, file, publisher, target).await,
                    Err(reason) => {
                        discard(&file).await;
                        FileOutcome::publish_failed(file.original_name, reason.clone())
                    }
                },
            };
            log_outcome(&outcome);
            outcomes.push(outcome);
        }

        tracing::info!(
            summary = %BatchSummary::from_outcomes(&outcomes),
            "Batch finished"
        );

        outcomes
    }

    async fn process_file(
        &self,
        batch: &BatchStage,
        file: UploadedFile,
        publisher: &dyn Publisher,
        target: &PublishTarget,
    ) -> FileOutcome {
        let output = batch.outbound_path(&file.original_name);

        let transcoded = self
            .transcoder
            .transcode(&file.staged_path, file.declared_type, &output)
            .await;

        // The staged original is not needed past this point, whatever the result
        discard(&file).await;

        let report = match transcoded {
            Ok(report) => report,
            Err(e) => return FileOutcome::transcode_failed(file.original_name, e.to_string()),
        };

        tracing::debug!(
            file = %file.original_name,
            width = report.width,
            height = report.height,
            bytes_in = file.byte_size,
            bytes_out = report.bytes_written,
            "Transcoded"
        );

        let outcome = match publisher.publish(&output, target).await {
            Ok(asset) => FileOutcome::published(file.original_name, asset),
            Err(e) => FileOutcome::publish_failed(file.original_name, e.to_string()),
        };

        if let Err(e) = tokio::fs::remove_file(&output).await {
            tracing::debug!(error = %e, path = %output.display(), "Transcoded file already gone");
        }

        outcome
    }
}

async fn discard(file: &UploadedFile) {
    if let Err(e) = tokio::fs::remove_file(&file.staged_path).await {
        tracing::warn!(
            error = %e,
            path = %file.staged_path.display(),
            "Failed to remove staged upload"
        );
    }
}

fn log_outcome(outcome: &FileOutcome) {
    match &outcome.status {
        OutcomeStatus::Published { remote_id, url } => {
            tracing::info!(
                file = %outcome.original_name,
                remote_id = %remote_id,
                url = %url,
                "File published"
            );
        }
        OutcomeStatus::Rejected { reason } => {
            tracing::info!(file = %outcome.original_name, reason = %reason, "File rejected");
        }
        OutcomeStatus::TranscodeFailed { reason } => {
            tracing::warn!(file = %outcome.original_name, reason = %reason, "Transcode failed");
        }
        OutcomeStatus::PublishFailed { reason } => {
            tracing::error!(file = %outcome.original_name, reason = %reason, "Publish failed");
        }
    }
}
