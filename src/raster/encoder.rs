//! Output encoders
//!
//! Each output format has its own encoder behind the [`ImageEncoder`]
//! trait; [`EncoderFactory`] picks one for a format. Encoders take a
//! finished RGBA canvas and return the file bytes.

use image::RgbaImage;

use crate::error::ThumbError;

/// Thumbnail output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Pick the output format for a source.
    ///
    /// Forced WebP wins; PNG sources stay PNG; everything else is JPEG.
    pub fn select(source: Option<image::ImageFormat>, force_webp: bool) -> Self {
        if force_webp {
            return OutputFormat::WebP;
        }
        match source {
            Some(image::ImageFormat::Png) => OutputFormat::Png,
            _ => OutputFormat::Jpeg,
        }
    }

    /// Whether the encoded file keeps an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        matches!(self, Self::Png | Self::WebP)
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

/// Best-effort MIME type from the leading bytes of a file
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "image/jpeg",
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Gif) => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Trait for image encoders
pub trait ImageEncoder: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Encode an RGBA canvas. `quality` is 0-100 and ignored by lossless formats.
    fn encode(&self, canvas: &RgbaImage, quality: u8) -> Result<Vec<u8>, ThumbError>;
}

/// JPEG encoder using the image crate
pub struct JpegEncoder;

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(&self, canvas: &RgbaImage, quality: u8) -> Result<Vec<u8>, ThumbError> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
        use image::ImageEncoder as _;

        // JPEG has no alpha channel
        let rgb = flatten_on_white(canvas.as_raw());

        let mut output = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
            .write_image(
                &rgb,
                canvas.width(),
                canvas.height(),
                image::ColorType::Rgb8,
            )
            .map_err(|e| ThumbError::encode("jpeg", e.to_string()))?;

        Ok(output)
    }
}

/// PNG encoder at maximum compression
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(&self, canvas: &RgbaImage, _quality: u8) -> Result<Vec<u8>, ThumbError> {
        use image::codecs::png::{CompressionType, FilterType, PngEncoder as ImagePngEncoder};
        use image::ImageEncoder as _;

        let mut output = Vec::new();
        ImagePngEncoder::new_with_quality(&mut output, CompressionType::Best, FilterType::Adaptive)
            .write_image(
                canvas.as_raw(),
                canvas.width(),
                canvas.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|e| ThumbError::encode("png", e.to_string()))?;

        Ok(output)
    }
}

/// Lossy WebP encoder backed by libwebp
pub struct WebPEncoder;

impl ImageEncoder for WebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(&self, canvas: &RgbaImage, quality: u8) -> Result<Vec<u8>, ThumbError> {
        if canvas.width() == 0 || canvas.height() == 0 {
            return Err(ThumbError::encode("webp", "empty canvas"));
        }
        let encoder = webp::Encoder::from_rgba(canvas.as_raw(), canvas.width(), canvas.height());
        let memory = encoder.encode(quality.min(100) as f32);
        Ok(memory.to_vec())
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: OutputFormat) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder),
        }
    }
}

/// Composite RGBA pixels over opaque white and drop the alpha channel.
fn flatten_on_white(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for chunk in rgba.chunks_exact(4) {
        let alpha = chunk[3] as u32;
        for &channel in &chunk[..3] {
            let value = (channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(value as u8);
        }
    }
    rgb
}
