//! Storage uploader abstraction

use async_trait::async_trait;
use classlift_core::{UploadError, UploadFile, UploadPolicy};

use crate::progress::ProgressCallback;

/// Transfers a file to object storage under a signed policy.
///
/// Implementations report progress as percent values that never decrease and only
/// reach 100 once storage has accepted the file. There is no internal retry.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    async fn upload(
        &self,
        policy: &UploadPolicy,
        file: &UploadFile,
        on_progress: ProgressCallback,
    ) -> Result<(), UploadError>;
}
