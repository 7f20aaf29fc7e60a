//! Two-phase upload orchestration
//!
//! `add_upload` → INIT → policy request → UPLOADING → storage transfer → terminal
//! state. Every step is written to the [`UploadStateStore`]; failures never reach the
//! caller.

use std::sync::Arc;

use classlift_api_client::PolicyClient;
use classlift_core::{format_size, AssetDescriptor, ErrorMetadata, UploadFile, UploadStatus};
use classlift_storage::{ProgressCallback, StorageUploader};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::{UploadSnapshot, UploadStateStore};

/// Called with the object id and file once an attempt has recorded `SUCCESS`.
pub type CompletionCallback = Box<dyn FnOnce(&str, &UploadFile) + Send + 'static>;

/// Handle on a running attempt. Dropping it does not cancel the attempt.
pub struct UploadHandle {
    object_id: String,
    attempt: u64,
    task: JoinHandle<Option<UploadStatus>>,
}

impl UploadHandle {
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the attempt to end.
    ///
    /// Returns the terminal status it recorded, or `None` if its final write was
    /// discarded because the record was reset or taken over by a newer attempt.
    pub async fn wait(self) -> Option<UploadStatus> {
        match self.task.await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    object_id = %self.object_id,
                    attempt = self.attempt,
                    "Upload attempt task failed"
                );
                None
            }
        }
    }
}

/// Entry point used by every upload-capable feature.
///
/// Must be used from within a tokio runtime: each attempt runs as a spawned task.
#[derive(Clone)]
pub struct UploadOrchestrator {
    store: Arc<UploadStateStore>,
    policy_client: Arc<dyn PolicyClient>,
    uploader: Arc<dyn StorageUploader>,
}

impl UploadOrchestrator {
    pub fn new(
        store: Arc<UploadStateStore>,
        policy_client: Arc<dyn PolicyClient>,
        uploader: Arc<dyn StorageUploader>,
    ) -> Self {
        Self {
            store,
            policy_client,
            uploader,
        }
    }

    pub fn store(&self) -> &Arc<UploadStateStore> {
        &self.store
    }

    /// Start a new attempt for `descriptor`.
    ///
    /// The `INIT` record is written before this returns; the rest of the attempt runs
    /// in the background. An existing record for the same object id is overwritten,
    /// and any attempt still in flight for it stops affecting the store.
    pub fn add_upload(
        &self,
        descriptor: AssetDescriptor,
        file: UploadFile,
        on_complete: Option<CompletionCallback>,
    ) -> UploadHandle {
        let (record, previous) = self.store.start_attempt(&descriptor, file.clone());
        let attempt = record.attempt;

        if let Some(previous) = previous.filter(|p| !p.status.is_terminal()) {
            tracing::debug!(
                object_id = %descriptor.object_id,
                previous_attempt = previous.attempt,
                attempt,
                "Superseding in-flight upload attempt"
            );
        }

        tracing::info!(
            object_id = %descriptor.object_id,
            object_type = %descriptor.object_type,
            attempt,
            filename = %file.name,
            file_size = file.size(),
            "Upload attempt started"
        );

        let object_id = descriptor.object_id.clone();
        let run = AttemptRun {
            store: self.store.clone(),
            policy_client: self.policy_client.clone(),
            uploader: self.uploader.clone(),
            descriptor,
            file,
            attempt,
        };
        let task = tokio::spawn(run.execute(on_complete));

        UploadHandle {
            object_id,
            attempt,
            task,
        }
    }

    /// Forget the record. Requests already in flight keep running; their results
    /// are discarded.
    pub fn reset_upload(&self, object_id: &str) {
        if let Some(removed) = self.store.remove_record(object_id) {
            tracing::info!(
                object_id = %object_id,
                attempt = removed.attempt,
                status = %removed.status,
                "Upload reset"
            );
        }
    }

    /// Start a new attempt with the descriptor and file of a failed one.
    ///
    /// Returns `None` unless the record exists and is in an error state.
    pub fn retry_upload(
        &self,
        object_id: &str,
        on_complete: Option<CompletionCallback>,
    ) -> Option<UploadHandle> {
        let record = self.store.get_record(object_id)?;
        if !record.status.is_retryable() {
            tracing::debug!(
                object_id = %object_id,
                status = %record.status,
                "Ignoring retry of non-failed upload"
            );
            return None;
        }
        Some(self.add_upload(record.descriptor(), record.file, on_complete))
    }

    /// Reactive snapshot of every record, for rendering.
    pub fn observe_upload_state(&self) -> watch::Receiver<UploadSnapshot> {
        self.store.observe()
    }
}

/// State moved into the background task of one attempt.
struct AttemptRun {
    store: Arc<UploadStateStore>,
    policy_client: Arc<dyn PolicyClient>,
    uploader: Arc<dyn StorageUploader>,
    descriptor: AssetDescriptor,
    file: UploadFile,
    attempt: u64,
}

impl AttemptRun {
    async fn execute(self, on_complete: Option<CompletionCallback>) -> Option<UploadStatus> {
        let object_id = self.descriptor.object_id.clone();

        let policy = match self
            .policy_client
            .request_upload_policy(&self.descriptor, &self.file.meta())
            .await
        {
            Ok(policy) => policy,
            Err(e) => {
                tracing::debug!(error = %e, object_id = %object_id, "Upload policy unavailable");
                return self.finish(e.terminal_status(), e.user_message());
            }
        };

        tracing::debug!(
            object_id = %object_id,
            attempt = self.attempt,
            url = %policy.upload_url,
            "Upload policy obtained"
        );

        if let Some(max_size) = policy.max_size_bytes {
            if !policy.allows_size(self.file.size()) {
                return self.finish(
                    UploadStatus::ErrSize,
                    Some(format!(
                        "file too large, max size allowed is {}",
                        format_size(max_size)
                    )),
                );
            }
        }

        let still_current = self.store.update_attempt(&object_id, self.attempt, |record| {
            record.status = UploadStatus::Uploading;
            record.progress = 0;
        });
        if !still_current {
            self.log_discarded(UploadStatus::Uploading);
            return None;
        }

        tracing::info!(object_id = %object_id, attempt = self.attempt, "Transfer started");

        let result = self
            .uploader
            .upload(&policy, &self.file, self.progress_callback())
            .await;

        match result {
            Ok(()) => {
                let status = self.finish(UploadStatus::Success, None)?;
                if let Some(callback) = on_complete {
                    callback(&object_id, &self.file);
                }
                Some(status)
            }
            Err(e) => {
                tracing::debug!(error = %e, object_id = %object_id, "Transfer failed");
                self.finish(e.terminal_status(), e.user_message())
            }
        }
    }

    /// Progress writes only land while this attempt is uploading, never lower the
    /// stored value and never follow the terminal write.
    fn progress_callback(&self) -> ProgressCallback {
        let store = self.store.clone();
        let object_id = self.descriptor.object_id.clone();
        let attempt = self.attempt;
        Arc::new(move |percent| {
            store.update_attempt(&object_id, attempt, |record| {
                if record.status == UploadStatus::Uploading && percent > record.progress {
                    record.progress = percent.min(100);
                }
            });
        })
    }

    /// Record the terminal state. Returns it if the write was committed.
    fn finish(&self, status: UploadStatus, message: Option<String>) -> Option<UploadStatus> {
        let committed = self
            .store
            .update_attempt(&self.descriptor.object_id, self.attempt, |record| {
                record.status = status;
                record.message = message.clone();
            });

        if !committed {
            self.log_discarded(status);
            return None;
        }

        if status.is_error() {
            tracing::warn!(
                object_id = %self.descriptor.object_id,
                object_type = %self.descriptor.object_type,
                attempt = self.attempt,
                status = %status,
                message = message.as_deref().unwrap_or(""),
                "Upload attempt failed"
            );
        } else {
            tracing::info!(
                object_id = %self.descriptor.object_id,
                object_type = %self.descriptor.object_type,
                attempt = self.attempt,
                status = %status,
                "Upload attempt finished"
            );
        }
        Some(status)
    }

    fn log_discarded(&self, status: UploadStatus) {
        tracing::debug!(
            object_id = %self.descriptor.object_id,
            attempt = self.attempt,
            status = %status,
            "Discarding write of stale upload attempt"
        );
    }
}
