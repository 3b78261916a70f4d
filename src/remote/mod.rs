//! Remote source mirroring
//!
//! Network images are copied to a local mirror before derivation so the
//! rest of the pipeline only ever sees files. Each URL maps to one mirror
//! file under the mirror root; the file's mtime records when it was
//! fetched, and a mirror is reused until `mtime + ttl` has passed.
//!
//! # Normalization
//!
//! `https://cdn.example.com//img/./a/../b.png?w=1` mirrors to
//! `cdn.example.com/img/b-<hash>.png`, where `<hash>` is a short SHA-256 of
//! the query string. Paths without a known image extension get `.jpg`.

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::cache_path::publish_atomic;
use crate::error::ThumbError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";
const QUERY_HASH_LEN: usize = 8;

/// Whether an image reference points at the network
pub fn is_remote(image_ref: &str) -> bool {
    let lower = image_ref.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Relative mirror path for a URL, or `None` if it has no host
pub fn normalize_url(url: &str) -> Option<PathBuf> {
    let trimmed = url.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed.trim_start_matches('/'),
    };
    let without_fragment = without_scheme.split('#').next().unwrap_or_default();
    let (path_part, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let mut segments: Vec<String> = Vec::new();
    for segment in path_part.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Never climb above the host
                if segments.len() > 1 {
                    segments.pop();
                }
            }
            other => segments.push(sanitize_segment(other)),
        }
    }

    if segments.is_empty() {
        return None;
    }
    segments[0] = segments[0].to_ascii_lowercase();
    if segments.len() == 1 {
        segments.push("index".to_string());
    }

    let file_name = segments.pop().unwrap_or_default();
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && is_image_extension(ext) => {
            (stem.to_string(), ext.to_ascii_lowercase())
        }
        _ => (file_name.clone(), DEFAULT_EXTENSION.to_string()),
    };

    let stem = match query.filter(|q| !q.is_empty()) {
        Some(query) => {
            let digest = hex::encode(Sha256::digest(query.as_bytes()));
            format!("{}-{}", stem, &digest[..QUERY_HASH_LEN])
        }
        None => stem,
    };

    let mut path: PathBuf = segments.iter().collect();
    path.push(format!("{}.{}", stem, extension));
    Some(path)
}

fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Fetches raw bytes for a URL
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, ThumbError>;
}

/// reqwest-backed source with bounded timeout and redirects
#[derive(Debug, Clone)]
pub struct HttpRemoteSource {
    client: reqwest::Client,
}

impl HttpRemoteSource {
    pub fn new(timeout: Duration, max_redirects: usize) -> Result<Self, ThumbError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()
            .map_err(|e| {
                ThumbError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, ThumbError> {
        // Scheme-relative references default to https
        let url = if url.starts_with("//") {
            format!("https:{}", url)
        } else {
            url.to_string()
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ThumbError::remote_fetch(&url, format!("HTTP fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ThumbError::remote_fetch(
                &url,
                format!("HTTP request failed with status: {}", response.status()),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| ThumbError::remote_fetch(&url, format!("Failed to read HTTP body: {}", e)))
    }
}

/// How a mirror lookup was satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorStatus {
    /// An unexpired mirror was reused without a network call
    Reused(PathBuf),
    /// The URL was fetched and the mirror replaced
    Fetched(PathBuf),
}

impl MirrorStatus {
    pub fn path(&self) -> &Path {
        match self {
            MirrorStatus::Reused(path) | MirrorStatus::Fetched(path) => path,
        }
    }
}

/// TTL-expiring local mirror of remote images
#[derive(Clone)]
pub struct RemoteFetchCache {
    root: PathBuf,
    ttl: Duration,
    source: Arc<dyn RemoteSource>,
}

impl std::fmt::Debug for RemoteFetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFetchCache")
            .field("root", &self.root)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl RemoteFetchCache {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration, source: Arc<dyn RemoteSource>) -> Self {
        Self {
            root: root.into(),
            ttl,
            source,
        }
    }

    /// Directory all mirrors live under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local mirror file for a URL
    pub fn mirror_path(&self, url: &str) -> Result<PathBuf, ThumbError> {
        normalize_url(url)
            .map(|relative| self.root.join(relative))
            .ok_or_else(|| ThumbError::SourceNotFound(url.to_string()))
    }

    /// A mirror is valid when it exists, is non-empty and is younger than the TTL
    pub async fn is_valid(&self, path: &Path) -> bool {
        let Ok(metadata) = tokio::fs::metadata(path).await else {
            return false;
        };
        if metadata.len() == 0 {
            return false;
        }
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.ttl,
            // Modified in the future: treat as fresh
            Err(_) => true,
        }
    }

    /// Return a valid mirror for `url`, fetching it if needed.
    ///
    /// An empty response body is reported as a fetch failure so callers
    /// fall back to a placeholder.
    pub async fn resolve(&self, url: &str) -> Result<MirrorStatus, ThumbError> {
        let path = self.mirror_path(url)?;

        if self.is_valid(&path).await {
            tracing::debug!(url = %url, mirror = %path.display(), "Remote mirror is fresh");
            return Ok(MirrorStatus::Reused(path));
        }

        tracing::info!(url = %url, mirror = %path.display(), "Fetching remote source");
        let bytes = self.source.fetch(url).await?;
        if bytes.is_empty() {
            return Err(ThumbError::remote_fetch(url, "empty response body"));
        }

        publish_atomic(&path, &bytes).await?;
        Ok(MirrorStatus::Fetched(path))
    }
}
