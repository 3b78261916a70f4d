//! Raster backend
//!
//! Everything that touches pixels goes through [`RasterBackend`]: decoding
//! sources, allocating and filling canvases, resampled copies, grayscale,
//! text and overlay blending, and encoding. The derivation pipeline only
//! depends on the trait, so a backend can be swapped at construction time.
//!
//! [`ImageBackend`] is the default implementation built on `image`,
//! `fast_image_resize` (Lanczos3), `ab_glyph` and `webp`.

pub mod encoder;
pub mod limits;
pub mod text;

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::num::NonZeroU32;
use std::path::Path;

use crate::color::Color;
use crate::error::ThumbError;
use crate::geometry::Rect;

pub use encoder::{sniff_content_type, EncoderFactory, ImageEncoder, OutputFormat};
pub use limits::SourceLimits;

/// A decoded source image
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: RgbaImage,
    /// Container format the bytes were decoded from
    pub format: Option<ImageFormat>,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Pixel operations used by the derivation pipeline
///
/// Canvases are plain RGBA buffers. Rectangles may extend past the canvas;
/// implementations clip instead of failing.
pub trait RasterBackend: Send + Sync {
    /// Decode encoded bytes, enforcing source limits
    fn decode(&self, bytes: &[u8]) -> Result<SourceImage, ThumbError>;

    /// Allocate a fully transparent canvas
    fn blank(&self, width: u32, height: u32) -> RgbaImage;

    /// Fill the whole canvas with an opaque color
    fn fill_flat(&self, canvas: &mut RgbaImage, color: Color);

    /// Clear the whole canvas to transparent
    fn fill_transparent(&self, canvas: &mut RgbaImage);

    /// Resample `src` of `source` into `dst` of `canvas`
    fn resample(
        &self,
        source: &RgbaImage,
        src: Rect,
        canvas: &mut RgbaImage,
        dst: Rect,
    ) -> Result<(), ThumbError>;

    /// Convert the canvas to grayscale, keeping alpha
    fn grayscale(&self, canvas: &mut RgbaImage);

    /// Padded bounding box of `text`
    fn measure_text(&self, font: &Path, font_size: f32, text: &str)
        -> Result<(u32, u32), ThumbError>;

    /// Draw `text` with its baseline at `(x, baseline_y)`
    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        font: &Path,
        font_size: f32,
        x: i64,
        baseline_y: i64,
        color: Color,
        text: &str,
    ) -> Result<(), ThumbError>;

    /// Alpha-blend `overlay` onto `canvas` with its top-left at `(x, y)`
    fn blend(&self, canvas: &mut RgbaImage, overlay: &RgbaImage, x: i64, y: i64);

    /// Encode the finished canvas
    fn encode(
        &self,
        canvas: &RgbaImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, ThumbError>;
}

/// Default backend on the `image` crate stack
#[derive(Debug, Clone, Default)]
pub struct ImageBackend {
    limits: SourceLimits,
}

impl ImageBackend {
    pub fn new(limits: SourceLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SourceLimits {
        &self.limits
    }
}

impl RasterBackend for ImageBackend {
    fn decode(&self, bytes: &[u8]) -> Result<SourceImage, ThumbError> {
        let format = image::guess_format(bytes).ok();

        // Header dimensions first so oversized sources never get a buffer
        let (width, height) = reader(bytes, format)?
            .into_dimensions()
            .map_err(|e| ThumbError::decode(e.to_string()))?;
        self.limits.validate_dimensions(width, height)?;

        let pixels = reader(bytes, format)?
            .decode()
            .map_err(|e| ThumbError::decode(e.to_string()))?
            .to_rgba8();

        Ok(SourceImage { pixels, format })
    }

    fn blank(&self, width: u32, height: u32) -> RgbaImage {
        RgbaImage::new(width, height)
    }

    fn fill_flat(&self, canvas: &mut RgbaImage, color: Color) {
        let pixel = color.with_alpha(255);
        for p in canvas.pixels_mut() {
            *p = pixel;
        }
    }

    fn fill_transparent(&self, canvas: &mut RgbaImage) {
        for p in canvas.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    fn resample(
        &self,
        source: &RgbaImage,
        src: Rect,
        canvas: &mut RgbaImage,
        dst: Rect,
    ) -> Result<(), ThumbError> {
        if dst.width == 0 || dst.height == 0 {
            return Ok(());
        }

        let region = clip_to_source(source, src)?;
        let cropped;
        let region_pixels = if region == Rect::at_origin(source.width(), source.height()) {
            source
        } else {
            cropped = image::imageops::crop_imm(
                source,
                region.x as u32,
                region.y as u32,
                region.width,
                region.height,
            )
            .to_image();
            &cropped
        };

        if region_pixels.width() == dst.width && region_pixels.height() == dst.height {
            self.blend(canvas, region_pixels, dst.x, dst.y);
            return Ok(());
        }

        let resized = resize_lanczos3(region_pixels, dst.width, dst.height)?;
        self.blend(canvas, &resized, dst.x, dst.y);
        Ok(())
    }

    fn grayscale(&self, canvas: &mut RgbaImage) {
        for p in canvas.pixels_mut() {
            let luma = (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
                .round()
                .clamp(0.0, 255.0) as u8;
            *p = Rgba([luma, luma, luma, p[3]]);
        }
    }

    fn measure_text(
        &self,
        font: &Path,
        font_size: f32,
        text: &str,
    ) -> Result<(u32, u32), ThumbError> {
        let font = text::load_font(font)?;
        Ok(text::measure_text(&font, font_size, text))
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        font: &Path,
        font_size: f32,
        x: i64,
        baseline_y: i64,
        color: Color,
        text: &str,
    ) -> Result<(), ThumbError> {
        let font = text::load_font(font)?;
        text::draw_text(canvas, &font, font_size, x, baseline_y, color, text);
        Ok(())
    }

    fn blend(&self, canvas: &mut RgbaImage, overlay: &RgbaImage, x: i64, y: i64) {
        let canvas_width = canvas.width() as i64;
        let canvas_height = canvas.height() as i64;

        // Visible region, clamped to the canvas
        let x_start = x.max(0);
        let y_start = y.max(0);
        let x_end = (x + overlay.width() as i64).min(canvas_width);
        let y_end = (y + overlay.height() as i64).min(canvas_height);

        for ty in y_start..y_end {
            for tx in x_start..x_end {
                let top = *overlay.get_pixel((tx - x) as u32, (ty - y) as u32);
                let bottom = *canvas.get_pixel(tx as u32, ty as u32);
                canvas.put_pixel(tx as u32, ty as u32, blend_pixels(bottom, top));
            }
        }
    }

    fn encode(
        &self,
        canvas: &RgbaImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Vec<u8>, ThumbError> {
        EncoderFactory::create(format).encode(canvas, quality)
    }
}

fn reader(bytes: &[u8], format: Option<ImageFormat>) -> Result<ImageReader<Cursor<&[u8]>>, ThumbError> {
    match format {
        Some(format) => Ok(ImageReader::with_format(Cursor::new(bytes), format)),
        None => ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ThumbError::decode(e.to_string())),
    }
}

/// Intersect a source rectangle with the source bounds
fn clip_to_source(source: &RgbaImage, src: Rect) -> Result<Rect, ThumbError> {
    let left = src.x.max(0);
    let top = src.y.max(0);
    let right = (src.x + src.width as i64).min(source.width() as i64);
    let bottom = (src.y + src.height as i64).min(source.height() as i64);

    if right <= left || bottom <= top {
        return Err(ThumbError::decode(format!(
            "Source rectangle {:?} lies outside {}x{} image",
            src,
            source.width(),
            source.height()
        )));
    }

    Ok(Rect::new(
        left,
        top,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

/// Resize using fast_image_resize with the Lanczos3 filter
fn resize_lanczos3(
    source: &RgbaImage,
    target_width: u32,
    target_height: u32,
) -> Result<RgbaImage, ThumbError> {
    let resize_err = |msg: String| ThumbError::decode(format!("Resize failed: {}", msg));

    let src_width =
        NonZeroU32::new(source.width()).ok_or_else(|| resize_err("source width is 0".into()))?;
    let src_height =
        NonZeroU32::new(source.height()).ok_or_else(|| resize_err("source height is 0".into()))?;
    let dst_width =
        NonZeroU32::new(target_width).ok_or_else(|| resize_err("target width is 0".into()))?;
    let dst_height =
        NonZeroU32::new(target_height).ok_or_else(|| resize_err("target height is 0".into()))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        source.as_raw().clone(),
        PixelType::U8x4,
    )
    .map_err(|e| resize_err(format!("{:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| resize_err(format!("{:?}", e)))?;

    RgbaImage::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| resize_err("output buffer size mismatch".into()))
}

/// Porter-Duff "over": `top` composited onto `bottom`
pub(crate) fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    match top[3] {
        255 => return top,
        0 => return bottom,
        _ => {}
    }

    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;
    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(top[0], bottom[0]),
        channel(top[1], bottom[1]),
        channel(top[2], bottom[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
