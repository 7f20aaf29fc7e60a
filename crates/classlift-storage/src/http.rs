//! reqwest-backed storage uploader

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use classlift_core::{UploadError, UploadFile, UploadPolicy};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::sync::Arc;
use std::time::Duration;

use crate::progress::{ProgressCallback, ProgressReporter, TransferProgress};
use crate::traits::StorageUploader;

/// Size of the body slices handed to the HTTP client. Progress is reported per slice.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Uploads to any storage endpoint accepting POST policy forms (S3, GCS, MinIO).
#[derive(Clone, Debug)]
pub struct HttpStorageUploader {
    client: Client,
    chunk_size: usize,
    timeout: Option<Duration>,
}

impl HttpStorageUploader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: None,
        })
    }

    /// Abort transfers that take longer than `timeout`. None by default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// File part whose body reports progress as the client pulls each slice.
    fn progress_part(
        &self,
        file: &UploadFile,
        reporter: Arc<ProgressReporter>,
    ) -> Result<Part, UploadError> {
        let total = file.size();
        let chunks: Vec<Bytes> = split_chunks(&file.data, self.chunk_size);

        let mut sent = 0u64;
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            reporter.report(TransferProgress {
                bytes_sent: sent,
                bytes_total: total,
            });
            Ok::<Bytes, std::io::Error>(chunk)
        });

        Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                UploadError::transport(format!("Invalid mime type {}: {}", file.mime_type, e))
            })
    }
}

/// Zero-copy slices of at most `chunk_size` bytes.
fn split_chunks(data: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(data.len() / chunk_size + 1);
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + chunk_size).min(data.len());
        chunks.push(data.slice(offset..end));
        offset = end;
    }
    chunks
}

#[async_trait]
impl StorageUploader for HttpStorageUploader {
    async fn upload(
        &self,
        policy: &UploadPolicy,
        file: &UploadFile,
        on_progress: ProgressCallback,
    ) -> Result<(), UploadError> {
        let reporter = Arc::new(ProgressReporter::new(on_progress));

        let mut form = Form::new();
        for (key, value) in &policy.form_fields {
            form = form.text(key.clone(), value.clone());
        }
        form = form.part("file", self.progress_part(file, reporter.clone())?);

        tracing::info!(
            filename = %file.name,
            file_size = file.size(),
            url = %policy.upload_url,
            "Uploading to storage"
        );

        let mut request = self.client.post(&policy.upload_url).multipart(form);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, filename = %file.name, "Storage transfer failed");
            UploadError::transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(
                status = %status,
                filename = %file.name,
                "Storage rejected upload"
            );
            return Err(UploadError::rejected(status.as_u16(), error_text));
        }

        reporter.complete();
        tracing::info!(filename = %file.name, status = %status, "Upload to storage successful");
        Ok(())
    }
}
