//! Sidecar descriptors
//!
//! A descriptor records the image reference and the full option set a
//! thumbnail path was derived from. It is written once when a thumbnail URL
//! is handed out and read back when that URL is first requested, so the
//! thumbnail can be generated from nothing but its path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache_path::{descriptor_path, publish_no_clobber};
use crate::error::ThumbError;
use crate::options::ThumbOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbDescriptor {
    pub image: String,
    pub options: ThumbOptions,
}

impl ThumbDescriptor {
    pub fn new(image: impl Into<String>, options: ThumbOptions) -> Self {
        Self {
            image: image.into(),
            options,
        }
    }

    /// Sidecar path for a thumbnail path
    pub fn path_for(thumb_path: &Path) -> PathBuf {
        descriptor_path(thumb_path)
    }

    /// Write the sidecar for `thumb_path` unless one already exists.
    ///
    /// Returns `true` if this call wrote it.
    pub async fn save(&self, thumb_path: &Path) -> Result<bool, ThumbError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| ThumbError::configuration(format!("Unserializable descriptor: {}", e)))?;
        publish_no_clobber(&Self::path_for(thumb_path), &json).await
    }

    /// Read the sidecar for `thumb_path`; `Ok(None)` if there is none.
    pub async fn load(thumb_path: &Path) -> Result<Option<Self>, ThumbError> {
        let path = Self::path_for(thumb_path);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let descriptor: ThumbDescriptor = serde_json::from_slice(&data).map_err(|e| {
            ThumbError::configuration(format!(
                "Invalid descriptor {}: {}",
                path.display(),
                e
            ))
        })?;
        descriptor.options.validate()?;
        Ok(Some(descriptor))
    }
}
