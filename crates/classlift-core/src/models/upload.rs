use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;

use super::asset::{AssetDescriptor, ObjectType, ParentRef};
use crate::error::FileError;
use crate::files::guess_mime_type;

/// Per-attempt upload state.
///
/// `Init` and `Uploading` are transient; every other state ends the attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Init,
    Uploading,
    Success,
    ErrPolicy,
    ErrSize,
    ErrUpload,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Init | UploadStatus::Uploading)
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            UploadStatus::ErrPolicy | UploadStatus::ErrSize | UploadStatus::ErrUpload
        )
    }

    /// Every error state can be retried by starting a new attempt.
    pub fn is_retryable(&self) -> bool {
        self.is_error()
    }
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Init => write!(f, "INIT"),
            UploadStatus::Uploading => write!(f, "UPLOADING"),
            UploadStatus::Success => write!(f, "SUCCESS"),
            UploadStatus::ErrPolicy => write!(f, "ERR_POLICY"),
            UploadStatus::ErrSize => write!(f, "ERR_SIZE"),
            UploadStatus::ErrUpload => write!(f, "ERR_UPLOAD"),
        }
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(UploadStatus::Init),
            "UPLOADING" => Ok(UploadStatus::Uploading),
            "SUCCESS" => Ok(UploadStatus::Success),
            "ERR_POLICY" => Ok(UploadStatus::ErrPolicy),
            "ERR_SIZE" => Ok(UploadStatus::ErrSize),
            "ERR_UPLOAD" => Ok(UploadStatus::ErrUpload),
            _ => Err(anyhow::anyhow!("Invalid upload status: {}", s)),
        }
    }
}

/// A file selected for upload. Cloning is cheap: the content is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a local file, taking its name from the path and guessing the mime type
    /// from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| FileError::InvalidName(path.display().to_string()))?
            .to_string();

        let data = tokio::fs::read(path).await.map_err(|source| FileError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mime_type = guess_mime_type(&name).to_string();
        Ok(Self::new(name, mime_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Metadata sent to the application server when asking for a policy.
    pub fn meta(&self) -> FileMeta {
        FileMeta {
            filename: self.name.clone(),
            mimetype: self.mime_type.clone(),
            size: self.size(),
        }
    }
}

// File content is never serialized; observers only need its metadata.
impl Serialize for UploadFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("UploadFile", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("mime_type", &self.mime_type)?;
        state.serialize_field("size", &self.size())?;
        state.end()
    }
}

/// Body of the initiate-upload request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMeta {
    pub filename: String,
    pub mimetype: String,
    pub size: u64,
}

/// Authoritative state of one asset's current upload attempt.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadRecord {
    pub object_id: String,
    pub object_type: ObjectType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    pub file: UploadFile,
    pub status: UploadStatus,
    /// Percent complete, 0 to 100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Sequence number of the attempt that owns this record.
    pub attempt: u64,
    pub started_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Fresh record for a new attempt, in `Init` with no progress.
    pub fn init(descriptor: &AssetDescriptor, file: UploadFile, attempt: u64) -> Self {
        Self {
            object_id: descriptor.object_id.clone(),
            object_type: descriptor.object_type,
            parent: descriptor.parent.clone(),
            file,
            status: UploadStatus::Init,
            progress: 0,
            message: None,
            attempt,
            started_at: Utc::now(),
        }
    }

    pub fn descriptor(&self) -> AssetDescriptor {
        AssetDescriptor {
            object_type: self.object_type,
            object_id: self.object_id.clone(),
            parent: self.parent.clone(),
        }
    }

    pub fn parent_type(&self) -> Option<ObjectType> {
        self.parent.as_ref().map(|p| p.object_type)
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_ref().map(|p| p.object_id.as_str())
    }
}
