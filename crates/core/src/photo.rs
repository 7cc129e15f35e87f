use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default upload limit: 5 MiB.
pub const DEFAULT_MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;

/// A photo received with a create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    /// Original file name as sent by the client.
    pub file_name: String,
    /// Declared MIME type (e.g. `"image/png"`).
    pub content_type: String,
    /// Raw file content.
    pub data: Bytes,
}

impl PhotoUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Size of the photo in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased file extension, if the file name has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Check the photo against `policy`. Both the extension and the declared
    /// content type must be on the allow-list.
    pub fn validate(&self, policy: &PhotoPolicy) -> Result<(), ValidationError> {
        if self.data.is_empty() {
            return Err(ValidationError::EmptyPhoto(self.file_name.clone()));
        }
        if self.size() > policy.max_bytes {
            return Err(ValidationError::PhotoTooLarge {
                size: self.size(),
                limit: policy.max_bytes,
            });
        }

        let content_type = self.content_type.trim().to_ascii_lowercase();
        if !policy.allowed_types.iter().any(|t| t == &content_type) {
            return Err(ValidationError::UnsupportedPhotoType(content_type));
        }

        match self.extension() {
            Some(ext) if policy.allowed_extensions.iter().any(|e| e == &ext) => Ok(()),
            _ => Err(ValidationError::UnsupportedPhotoType(self.file_name.clone())),
        }
    }
}

/// Size and type restrictions applied to uploaded photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoPolicy {
    /// Maximum accepted size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    /// Accepted MIME types, lowercase.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Accepted file extensions, lowercase and without the dot.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            allowed_types: default_allowed_types(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_PHOTO_BYTES
}

fn default_allowed_types() -> Vec<String> {
    ["image/jpeg", "image/jpg", "image/png", "image/gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_allowed_extensions() -> Vec<String> {
    ["jpeg", "jpg", "png", "gif"]
        .into_iter()
        .map(String::from)
        .collect()
}
