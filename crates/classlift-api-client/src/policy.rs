//! Upload policy negotiation.
//!
//! `POST {resource}/initiate-upload/` exchanges file metadata for a signed storage
//! policy. Failures are classified here, once, into [`PolicyError`] kinds.

use async_trait::async_trait;
use classlift_core::{AssetDescriptor, FileMeta, PolicyError, UploadPolicy};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::ApiClient;

/// Requests a signed upload authorization for one asset.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    async fn request_upload_policy(
        &self,
        descriptor: &AssetDescriptor,
        file: &FileMeta,
    ) -> Result<UploadPolicy, PolicyError>;
}

/// `/videos/{id}/initiate-upload/`, nested under the parent when one is set.
pub fn initiate_upload_path(descriptor: &AssetDescriptor) -> String {
    format!("{}/initiate-upload/", descriptor.resource_path())
}

#[derive(Debug, Deserialize)]
struct InitiateUploadResponse {
    url: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
    #[serde(default)]
    max_size_bytes: Option<u64>,
}

impl InitiateUploadResponse {
    fn into_policy(self) -> UploadPolicy {
        let form_fields = self
            .fields
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        UploadPolicy {
            upload_url: self.url,
            form_fields,
            max_size_bytes: self.max_size_bytes,
        }
    }
}

/// Classify a non-2xx initiate-upload answer by inspecting its body.
///
/// A `size` key holding a list of strings means the server rejected the file size;
/// its first entry is the user-facing message. Anything else is generic.
pub fn classify_policy_failure(status: StatusCode, body: &str) -> PolicyError {
    let size_message = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .get("size")
            .and_then(Value::as_array)
            .and_then(|messages| messages.first())
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    match size_message {
        Some(message) => PolicyError::size_exceeded(message),
        None => PolicyError::generic(format!("status {}: {}", status, body)),
    }
}

#[async_trait]
impl PolicyClient for ApiClient {
    async fn request_upload_policy(
        &self,
        descriptor: &AssetDescriptor,
        file: &FileMeta,
    ) -> Result<UploadPolicy, PolicyError> {
        let url = self.build_url(&initiate_upload_path(descriptor));
        let request = self.apply_auth(self.client().post(&url).json(file));

        tracing::debug!(
            object_id = %descriptor.object_id,
            object_type = %descriptor.object_type,
            url = %url,
            "Requesting upload policy"
        );

        let response = request.send().await.map_err(|e| {
            tracing::warn!(
                error = %e,
                object_id = %descriptor.object_id,
                "Upload policy request failed"
            );
            PolicyError::generic(format!("Failed to send request: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let error = classify_policy_failure(status, &error_text);
            tracing::warn!(
                status = %status,
                object_id = %descriptor.object_id,
                kind = ?error.kind,
                "Upload policy refused"
            );
            return Err(error);
        }

        let body: InitiateUploadResponse = response.json().await.map_err(|e| {
            PolicyError::generic(format!("Failed to parse upload policy response: {}", e))
        })?;

        Ok(body.into_policy())
    }
}
