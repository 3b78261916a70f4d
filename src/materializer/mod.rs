//! Lazy thumbnail materialization for the HTTP endpoint
//!
//! A thumbnail URL handed out by [`Thumb::describe`] names a file that may
//! not exist yet. On request the materializer serves the file if present;
//! otherwise it loads the sidecar descriptor written at describe time and
//! derives the thumbnail from the recorded image reference and options.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache_path::{is_descriptor, relative_url_path, same_thumbnail_family};
use crate::descriptor::ThumbDescriptor;
use crate::error::ThumbError;
use crate::raster::sniff_content_type;
use crate::security::{check_path_traversal, SecurityError};
use crate::thumb::{Derivation, Thumb};

/// Cache-Control for served thumbnails; their paths are content-addressed
pub const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Outcome of a materialization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// Thumbnail bytes ready to send
    Served {
        path: PathBuf,
        content_type: &'static str,
        body: Vec<u8>,
        /// `true` if the file was generated for this request
        regenerated: bool,
    },
    /// The recorded source is gone; URL of a placeholder image
    Placeholder(String),
    /// No thumbnail and no descriptor
    NotFound,
    /// Request path rejected before touching the filesystem
    Rejected(SecurityError),
}

impl Materialized {
    pub fn status(&self) -> u16 {
        match self {
            Materialized::Served { .. } => 200,
            Materialized::Placeholder(_) => 302,
            Materialized::NotFound => 404,
            Materialized::Rejected(e) => e.http_status(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Materializer {
    thumb: Arc<Thumb>,
}

impl Materializer {
    pub fn new(thumb: Arc<Thumb>) -> Self {
        Self { thumb }
    }

    pub fn thumb(&self) -> &Arc<Thumb> {
        &self.thumb
    }

    /// Serve or regenerate the thumbnail at `relative_path` below the
    /// configured thumbnail root.
    pub async fn materialize(&self, relative_path: &str) -> Result<Materialized, ThumbError> {
        if let Err(e) = check_path_traversal(relative_path) {
            tracing::warn!(path = %relative_path, error = %e, "Rejected thumbnail path");
            return Ok(Materialized::Rejected(e));
        }

        let decoded = match urlencoding::decode(relative_path) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => {
                return Ok(Materialized::Rejected(SecurityError::PathTraversal {
                    path: relative_path.to_string(),
                }))
            }
        };
        let relative = decoded.trim_start_matches(|c: char| c == '/' || c == '\\');
        if relative.is_empty() {
            return Ok(Materialized::NotFound);
        }

        let thumb_path = self.thumb.config().defaults.path_thumbs.join(relative);
        if is_descriptor(&thumb_path) {
            return Ok(Materialized::NotFound);
        }

        // Full-size remote mirrors may sit below the thumbnail root
        if relative_url_path(&self.thumb.config().remote.path, &thumb_path).is_some() {
            tracing::warn!(thumb = %thumb_path.display(), "Refusing to serve remote mirror file");
            return Ok(Materialized::NotFound);
        }

        match tokio::fs::read(&thumb_path).await {
            Ok(body) => {
                tracing::debug!(thumb = %thumb_path.display(), "Serving existing thumbnail");
                return Ok(Materialized::Served {
                    content_type: sniff_content_type(&body),
                    path: thumb_path,
                    body,
                    regenerated: false,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let descriptor = match ThumbDescriptor::load(&thumb_path).await? {
            Some(descriptor) => descriptor,
            None => {
                tracing::debug!(thumb = %thumb_path.display(), "No thumbnail and no descriptor");
                return Ok(Materialized::NotFound);
            }
        };

        tracing::info!(
            thumb = %thumb_path.display(),
            image = %descriptor.image,
            "Regenerating thumbnail from descriptor"
        );

        let derivation = self
            .thumb
            .get_or_create_thumbnail(&descriptor.image, &descriptor.options)
            .await?;

        let (path, regenerated) = match derivation {
            Derivation::Existing(path) => (path, false),
            Derivation::Created(path) => (path, true),
            Derivation::Placeholder(url) => return Ok(Materialized::Placeholder(url)),
        };

        if !same_thumbnail_family(&path, &thumb_path) {
            tracing::warn!(
                requested = %thumb_path.display(),
                derived = %path.display(),
                "Descriptor derives a different thumbnail"
            );
            return Ok(Materialized::NotFound);
        }

        // The source may have changed since describe, moving the key
        if path != thumb_path {
            tracing::info!(
                requested = %thumb_path.display(),
                derived = %path.display(),
                "Source changed since describe, serving current thumbnail"
            );
        }

        let body = tokio::fs::read(&path).await?;
        Ok(Materialized::Served {
            content_type: sniff_content_type(&body),
            path,
            body,
            regenerated,
        })
    }
}
