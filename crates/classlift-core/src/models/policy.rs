use serde::{Deserialize, Serialize};

/// Server-issued authorization for one direct-to-storage upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Storage endpoint receiving the multipart POST.
    pub upload_url: String,
    /// Form fields copied verbatim, in order, ahead of the file part.
    pub form_fields: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
}

impl UploadPolicy {
    pub fn new(upload_url: impl Into<String>, form_fields: Vec<(String, String)>) -> Self {
        Self {
            upload_url: upload_url.into(),
            form_fields,
            max_size_bytes: None,
        }
    }

    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = Some(max_size_bytes);
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.form_fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a file of `size` bytes fits the policy limit, if any.
    pub fn allows_size(&self, size: u64) -> bool {
        self.max_size_bytes.map_or(true, |max| size <= max)
    }
}
