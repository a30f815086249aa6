//! Object storage uploader for invoice PDFs.
//!
//! Files are written one at a time in the order given. A rejected or failed
//! file never stops the rest of the batch; the [`UploadReport`] lists every
//! file with its outcome.

use crate::models::invoice::{NewPdfs, PdfField};
use crate::services::metrics;
use crate::services::storage::Storage;
use bytes::Bytes;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;

pub const PDF_MIME: &str = "application/pdf";

/// One file received from the browser.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn pdf(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: PDF_MIME.to_string(),
            data: data.into(),
        }
    }

    /// Declared type is what decides; the bytes are not sniffed.
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .map(|mime| mime.trim().eq_ignore_ascii_case(PDF_MIME))
            .unwrap_or(false)
    }
}

/// Where in the bucket a batch goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadScope {
    Submission,
    Reupload,
}

impl UploadScope {
    fn prefix(&self) -> &'static str {
        match self {
            UploadScope::Submission => "invoices",
            UploadScope::Reupload => "invoices/reupload",
        }
    }
}

/// Strip path separators so a browser-supplied name stays one key segment.
pub fn sanitize_file_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "file.pdf".to_string(),
        name => name.to_string(),
    }
}

/// `<prefix>/<field>_<millis>_<file name>`
pub fn object_key(scope: UploadScope, field: PdfField, file_name: &str, millis: i64) -> String {
    format!(
        "{}/{}_{}_{}",
        scope.prefix(),
        field.as_str(),
        millis,
        sanitize_file_name(file_name)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Uploaded {
        file_name: String,
        url: String,
        #[serde(skip)]
        key: String,
    },
    /// Not a PDF; never sent to storage.
    Rejected { file_name: String, reason: String },
    /// Storage refused the write.
    Failed { file_name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Partial,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub field: PdfField,
    pub status: BatchStatus,
    pub outcomes: Vec<FileOutcome>,
}

impl UploadReport {
    fn new(field: PdfField, outcomes: Vec<FileOutcome>) -> Self {
        let uploaded = outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Uploaded { .. }))
            .count();
        let status = if uploaded == outcomes.len() {
            BatchStatus::Success
        } else if uploaded == 0 {
            BatchStatus::Error
        } else {
            BatchStatus::Partial
        };
        Self {
            field,
            status,
            outcomes,
        }
    }

    /// `(url, key)` of every stored file, in upload order.
    pub fn uploaded(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Uploaded { url, key, .. } => Some((url.as_str(), key.as_str())),
            _ => None,
        })
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded().count()
    }
}

/// Uploads PDFs to the configured store and removes them again.
#[derive(Clone)]
pub struct PdfUploader {
    storage: Arc<dyn Storage>,
}

impl PdfUploader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn upload_batch(
        &self,
        scope: UploadScope,
        field: PdfField,
        files: Vec<UploadFile>,
    ) -> UploadReport {
        let mut outcomes = Vec::with_capacity(files.len());

        for file in files {
            if !file.is_pdf() {
                tracing::warn!(
                    file_name = %file.file_name,
                    content_type = %file.content_type,
                    "Rejected non-PDF upload"
                );
                metrics::record_upload(field.as_str(), "rejected");
                outcomes.push(FileOutcome::Rejected {
                    reason: format!("{} is not a PDF file.", file.file_name),
                    file_name: file.file_name,
                });
                continue;
            }

            let key = object_key(scope, field, &file.file_name, chrono::Utc::now().timestamp_millis());
            match self.storage.upload(&key, file.data, PDF_MIME).await {
                Ok(()) => {
                    tracing::info!(key = %key, field = %field, "Stored PDF");
                    metrics::record_upload(field.as_str(), "uploaded");
                    outcomes.push(FileOutcome::Uploaded {
                        url: self.storage.public_url(&key),
                        file_name: file.file_name,
                        key,
                    });
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Failed to store PDF");
                    metrics::record_upload(field.as_str(), "failed");
                    outcomes.push(FileOutcome::Failed {
                        reason: format!("Failed to upload {}", file.file_name),
                        file_name: file.file_name,
                    });
                }
            }
        }

        UploadReport::new(field, outcomes)
    }

    /// Upload several fields' worth of files, returning the reports and the
    /// stored URLs grouped by field.
    pub async fn upload_fields(
        &self,
        scope: UploadScope,
        files: Vec<(PdfField, Vec<UploadFile>)>,
    ) -> (Vec<UploadReport>, NewPdfs) {
        let mut reports = Vec::new();
        let mut urls = NewPdfs::default();
        for (field, batch) in files {
            if batch.is_empty() {
                continue;
            }
            let report = self.upload_batch(scope, field, batch).await;
            for (url, _) in report.uploaded() {
                urls.push(field, url.to_string());
            }
            reports.push(report);
        }
        (reports, urls)
    }

    /// Key of a URL this store handed out.
    pub fn key_for_url(&self, url: &str) -> Result<String, AppError> {
        self.storage
            .key_for_url(url)
            .ok_or_else(|| AppError::invalid("File is not held by this portal's storage"))
    }

    /// Delete the object behind `url`; returns its key.
    pub async fn remove(&self, url: &str) -> Result<String, AppError> {
        let key = self.key_for_url(url)?;
        self.storage.delete(&key).await?;
        tracing::info!(key = %key, "Deleted PDF");
        Ok(key)
    }

    /// Best-effort delete of orphaned objects. Returns how many went away.
    pub async fn sweep<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> usize {
        let mut deleted = 0;
        for key in keys {
            match self.storage.delete(key).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "Could not delete orphaned PDF"),
            }
        }
        deleted
    }
}
