//! Derivation orchestrator
//!
//! [`Thumb`] turns an image reference plus an option set into a thumbnail
//! file. The thumbnail path is content-addressed (see [`crate::cache_path`]),
//! so deciding whether work is needed is a single existence check:
//!
//! ```text
//! image ref ──► source (local file or remote mirror) ──► thumb path
//!                    │ missing                               │ exists ──► Existing
//!                    ▼                                       ▼ missing
//!               Placeholder                  decode ─► resize? ─► watermark? ─► encode
//!                                                                                 │
//!                                                          temp file + rename ◄───┘ Created
//! ```
//!
//! Pixel work runs on the blocking thread pool. Concurrent requests for the
//! same missing thumbnail may both generate it; each publishes a complete
//! file with an atomic rename, so readers never observe a partial file.

use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache_path::{cache_key, derive_thumb_path, publish_atomic, relative_url_path, source_mtime};
use crate::compositor::{self, ResolvedWatermark};
use crate::config::Config;
use crate::descriptor::ThumbDescriptor;
use crate::error::ThumbError;
use crate::metrics::ThumbMetrics;
use crate::options::ThumbOptions;
use crate::placeholder::{placeholder_url, TEXT_NOT_FOUND, TEXT_NOT_GIVEN};
use crate::raster::{ImageBackend, OutputFormat, RasterBackend};
use crate::remote::{is_remote, HttpRemoteSource, MirrorStatus, RemoteFetchCache};

/// Outcome of [`Thumb::get_or_create_thumbnail`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// The thumbnail was already on disk
    Existing(PathBuf),
    /// The thumbnail was generated by this call
    Created(PathBuf),
    /// The source is missing; URL of a placeholder image
    Placeholder(String),
}

impl Derivation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Derivation::Existing(path) | Derivation::Created(path) => Some(path),
            Derivation::Placeholder(_) => None,
        }
    }
}

/// A source file and the root its folder structure is mirrored from
#[derive(Debug, Clone)]
struct ResolvedSource {
    path: PathBuf,
    root: PathBuf,
}

/// Thumbnail derivation engine
pub struct Thumb {
    config: Arc<Config>,
    backend: Arc<dyn RasterBackend>,
    remote: Option<RemoteFetchCache>,
    metrics: Arc<ThumbMetrics>,
}

impl std::fmt::Debug for Thumb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumb")
            .field("config", &self.config)
            .field("remote", &self.remote)
            .finish()
    }
}

impl Thumb {
    pub fn new(
        config: Config,
        backend: Arc<dyn RasterBackend>,
        remote: Option<RemoteFetchCache>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            remote,
            metrics: Arc::new(ThumbMetrics::new()),
        }
    }

    /// Build the default engine: `image` backend with the configured source
    /// limits and, when enabled, an HTTP-backed remote mirror.
    pub fn from_config(config: Config) -> Result<Self, ThumbError> {
        config.validate()?;

        let backend: Arc<dyn RasterBackend> = Arc::new(ImageBackend::new(config.limits));
        let remote = if config.remote.enabled {
            let source =
                HttpRemoteSource::new(config.remote.timeout(), config.remote.max_redirects)?;
            Some(RemoteFetchCache::new(
                config.remote.path.clone(),
                config.remote.ttl(),
                Arc::new(source),
            ))
        } else {
            None
        };

        Ok(Self::new(config, backend, remote))
    }

    pub fn with_metrics(mut self, metrics: Arc<ThumbMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ThumbMetrics> {
        &self.metrics
    }

    /// Configured defaults with `overrides` merged in
    pub fn options_with(&self, overrides: &Value) -> Result<ThumbOptions, ThumbError> {
        self.config.defaults.merged(overrides)
    }

    /// Local path for an image reference: the reference itself if it names
    /// an existing file, otherwise the reference under `path_images`.
    ///
    /// References with `..` components are refused as missing sources.
    pub async fn image_path(
        &self,
        image_ref: &str,
        options: &ThumbOptions,
    ) -> Result<PathBuf, ThumbError> {
        let given = Path::new(image_ref);
        if given.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(ThumbError::SourceNotFound(format!(
                "{} (parent directory reference)",
                image_ref
            )));
        }
        if is_file(given).await {
            return Ok(given.to_path_buf());
        }
        Ok(options
            .path_images
            .join(image_ref.trim_start_matches(|c: char| c == '/' || c == '\\')))
    }

    async fn resolve_source(
        &self,
        image_ref: &str,
        options: &ThumbOptions,
    ) -> Result<ResolvedSource, ThumbError> {
        if is_remote(image_ref) {
            let remote = self.remote.as_ref().ok_or_else(|| {
                ThumbError::SourceNotFound(format!("{} (remote sources disabled)", image_ref))
            })?;
            let status = remote.resolve(image_ref).await?;
            match &status {
                MirrorStatus::Fetched(_) => self.metrics.increment_remote_fetch(),
                MirrorStatus::Reused(_) => self.metrics.increment_remote_mirror_hit(),
            }
            return Ok(ResolvedSource {
                path: status.path().to_path_buf(),
                root: remote.root().to_path_buf(),
            });
        }

        let path = self.image_path(image_ref, options).await?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(ResolvedSource {
                path,
                root: options.path_images.clone(),
            }),
            Ok(_) => Err(ThumbError::SourceNotFound(path.display().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ThumbError::SourceNotFound(path.display().to_string()))
            }
            Err(e) => Err(ThumbError::SourceUnreadable {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn derive_path(&self, source: &ResolvedSource, options: &ThumbOptions) -> PathBuf {
        let mtime = source_mtime(&source.path).await;
        let key = cache_key(options, mtime);
        derive_thumb_path(&source.path, &source.root, &options.path_thumbs, &key)
    }

    /// Content-addressed thumbnail path for an image reference.
    ///
    /// Remote references are mirrored first so the path reflects the
    /// mirror's fetch time.
    pub async fn thumb_path(
        &self,
        image_ref: &str,
        options: &ThumbOptions,
    ) -> Result<PathBuf, ThumbError> {
        let source = self.resolve_source(image_ref, options).await?;
        Ok(self.derive_path(&source, options).await)
    }

    fn placeholder(&self, image_ref: &str, options: &ThumbOptions, text: &str) -> String {
        self.metrics.increment_placeholder();
        placeholder_url(
            &self.config.placeholder,
            image_ref,
            options.resize.requested_width(),
            options.resize.requested_height(),
            text,
        )
    }

    /// Return the thumbnail for `image_ref`, generating it if needed.
    ///
    /// Missing or unreachable sources produce a placeholder URL. Decode,
    /// encode and filesystem failures are returned and leave nothing at the
    /// thumbnail path.
    pub async fn get_or_create_thumbnail(
        &self,
        image_ref: &str,
        options: &ThumbOptions,
    ) -> Result<Derivation, ThumbError> {
        if image_ref.trim().is_empty() {
            return Ok(Derivation::Placeholder(self.placeholder(
                image_ref,
                options,
                TEXT_NOT_GIVEN,
            )));
        }

        let source = match self.resolve_source(image_ref, options).await {
            Ok(source) => source,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(image = %image_ref, error = %e, "Source unavailable, using placeholder");
                return Ok(Derivation::Placeholder(self.placeholder(
                    image_ref,
                    options,
                    TEXT_NOT_FOUND,
                )));
            }
            Err(e) => return Err(e),
        };

        let thumb_path = self.derive_path(&source, options).await;
        if is_file(&thumb_path).await {
            tracing::debug!(image = %image_ref, thumb = %thumb_path.display(), "Thumbnail cache hit");
            self.metrics.increment_cache_hit();
            return Ok(Derivation::Existing(thumb_path));
        }

        let bytes = match tokio::fs::read(&source.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    image = %image_ref,
                    source = %source.path.display(),
                    error = %e,
                    "Source unreadable, using placeholder"
                );
                return Ok(Derivation::Placeholder(self.placeholder(
                    image_ref,
                    options,
                    TEXT_NOT_FOUND,
                )));
            }
        };

        match self.generate(bytes, &thumb_path, options).await {
            Ok(()) => Ok(Derivation::Created(thumb_path)),
            Err(e) => {
                self.metrics.increment_generation_failure();
                tracing::error!(
                    image = %image_ref,
                    thumb = %thumb_path.display(),
                    error = %e,
                    "Thumbnail generation failed"
                );
                Err(e)
            }
        }
    }

    async fn generate(
        &self,
        source_bytes: Vec<u8>,
        thumb_path: &Path,
        options: &ThumbOptions,
    ) -> Result<(), ThumbError> {
        let start = Instant::now();
        tracing::info!(thumb = %thumb_path.display(), "Generating thumbnail");

        let backend = Arc::clone(&self.backend);
        let render_options = options.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            let watermark = if render_options.watermark.is_requested() {
                Some(resolve_watermark(&render_options))
            } else {
                None
            };
            render_thumbnail(backend.as_ref(), &source_bytes, &render_options, watermark.as_ref())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        publish_atomic(thumb_path, &encoded).await?;

        let elapsed = start.elapsed();
        self.metrics.increment_generated(elapsed);
        tracing::info!(
            thumb = %thumb_path.display(),
            bytes = encoded.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Thumbnail generated"
        );
        Ok(())
    }

    /// Describe phase: record how to build the thumbnail and return its URL
    /// without generating it.
    ///
    /// Writes the sidecar descriptor next to the thumbnail path (first
    /// writer wins). The returned URL is the thumbnail path relative to
    /// `path_thumbs`, under the configured URL prefix.
    pub async fn describe(
        &self,
        image_ref: &str,
        options: &ThumbOptions,
    ) -> Result<String, ThumbError> {
        if image_ref.trim().is_empty() {
            return Ok(self.placeholder(image_ref, options, TEXT_NOT_GIVEN));
        }

        let source = match self.resolve_source(image_ref, options).await {
            Ok(source) => source,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(image = %image_ref, error = %e, "Source unavailable, using placeholder");
                return Ok(self.placeholder(image_ref, options, TEXT_NOT_FOUND));
            }
            Err(e) => return Err(e),
        };

        // Must be readable now for the later regeneration to succeed
        if let Err(e) = tokio::fs::File::open(&source.path).await {
            tracing::warn!(image = %image_ref, error = %e, "Source unreadable, using placeholder");
            return Ok(self.placeholder(image_ref, options, TEXT_NOT_FOUND));
        }

        let thumb_path = self.derive_path(&source, options).await;
        let descriptor = ThumbDescriptor::new(image_ref, options.clone());
        if descriptor.save(&thumb_path).await? {
            self.metrics.increment_descriptor_written();
            tracing::debug!(thumb = %thumb_path.display(), "Descriptor written");
        }

        let relative = relative_url_path(&options.path_thumbs, &thumb_path).ok_or_else(|| {
            ThumbError::configuration(format!(
                "Thumbnail path {} is outside {}",
                thumb_path.display(),
                options.path_thumbs.display()
            ))
        })?;

        Ok(format!(
            "{}/{}",
            self.config.server.url_prefix.trim_end_matches('/'),
            relative
        ))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Resolve watermark image and font against their roots.
///
/// Touches the filesystem; call from blocking context.
fn resolve_watermark(options: &ThumbOptions) -> ResolvedWatermark {
    let spec = &options.watermark;

    let image = spec.image().map(|image| {
        let given = PathBuf::from(image);
        if given.exists() {
            given
        } else {
            options.path_watermarks.join(image)
        }
    });

    let font = {
        let given = PathBuf::from(&spec.font);
        if given.exists() {
            given
        } else {
            let under_root = options.path_fonts.join(&spec.font);
            if !under_root.exists() && under_root.extension().is_none() {
                under_root.with_extension("ttf")
            } else {
                under_root
            }
        }
    };

    ResolvedWatermark {
        spec: spec.clone(),
        image,
        font,
    }
}

/// Decode, resize, watermark and encode one thumbnail
pub fn render_thumbnail(
    backend: &dyn RasterBackend,
    source_bytes: &[u8],
    options: &ThumbOptions,
    watermark: Option<&ResolvedWatermark>,
) -> Result<Vec<u8>, ThumbError> {
    let source = backend.decode(source_bytes)?;
    let format = OutputFormat::select(source.format, options.webp);

    let mut canvas = if options.resize.is_requested() {
        compositor::resize(backend, &source, &options.resize, format)?
    } else {
        source.pixels.clone()
    };

    if let Some(watermark) = watermark {
        compositor::apply_watermark(backend, &mut canvas, watermark)?;
    }

    backend.encode(&canvas, format, options.quality)
}
