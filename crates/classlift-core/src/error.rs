//! Error types module
//!
//! Failures are classified once, at the network boundary, into the taxonomy below.
//! The orchestrator never surfaces these to its callers: each maps onto a terminal
//! [`UploadStatus`] written into the upload store.

use std::io;

use crate::models::UploadStatus;

/// Metadata describing how an upload failure is presented and recovered from
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "FILE_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether the user can retry the upload
    fn is_recoverable(&self) -> bool;

    /// Terminal state recorded for the attempt that hit this error
    fn terminal_status(&self) -> UploadStatus;

    /// Human-readable detail worth showing next to the status, if any
    fn user_message(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorKind {
    /// Transport failure, non-2xx answer or unreadable body.
    Generic,
    /// The server refused the file because of its size.
    SizeExceeded,
}

/// Failure to obtain an upload policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Upload policy request failed ({kind:?}){}", message_suffix(.message))]
pub struct PolicyError {
    pub kind: PolicyErrorKind,
    pub message: Option<String>,
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

impl PolicyError {
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            kind: PolicyErrorKind::Generic,
            message: Some(message.into()),
        }
    }

    pub fn size_exceeded(message: impl Into<String>) -> Self {
        Self {
            kind: PolicyErrorKind::SizeExceeded,
            message: Some(message.into()),
        }
    }
}

impl ErrorMetadata for PolicyError {
    fn error_code(&self) -> &'static str {
        match self.kind {
            PolicyErrorKind::Generic => "POLICY_ERROR",
            PolicyErrorKind::SizeExceeded => "FILE_TOO_LARGE",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }

    fn terminal_status(&self) -> UploadStatus {
        match self.kind {
            PolicyErrorKind::Generic => UploadStatus::ErrPolicy,
            PolicyErrorKind::SizeExceeded => UploadStatus::ErrSize,
        }
    }

    /// Only the size message comes from the server in a user-presentable form.
    fn user_message(&self) -> Option<String> {
        match self.kind {
            PolicyErrorKind::Generic => None,
            PolicyErrorKind::SizeExceeded => self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// The request never produced a response (connection, TLS, body stream).
    TransportFailure,
    /// Storage answered with a non-2xx status.
    ServerRejected,
}

/// Failure of the direct-to-storage transfer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Upload to storage failed ({kind:?}, status {status_code:?}): {message}")]
pub struct UploadError {
    pub kind: UploadErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
}

impl UploadError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: UploadErrorKind::TransportFailure,
            status_code: None,
            message: message.into(),
        }
    }

    pub fn rejected(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: UploadErrorKind::ServerRejected,
            status_code: Some(status_code),
            message: message.into(),
        }
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self.kind {
            UploadErrorKind::TransportFailure => "UPLOAD_TRANSPORT_ERROR",
            UploadErrorKind::ServerRejected => "UPLOAD_REJECTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }

    fn terminal_status(&self) -> UploadStatus {
        UploadStatus::ErrUpload
    }

    fn user_message(&self) -> Option<String> {
        None
    }
}

/// Failure to load a local file for upload.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}
