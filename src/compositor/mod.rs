//! Canvas compositor
//!
//! Builds the thumbnail canvas from a decoded source and a resolved
//! [`Geometry`], then layers watermarks on top. All pixel work is delegated
//! to the [`RasterBackend`].

use image::RgbaImage;
use std::path::PathBuf;

use crate::color::parse_hex_color;
use crate::error::ThumbError;
use crate::geometry::{align_on_canvas, resolve_geometry, Background, Geometry};
use crate::options::{ResizeMethod, ResizeSpec, WatermarkSpec};
use crate::raster::{OutputFormat, RasterBackend, SourceImage};

/// Watermark with its image and font resolved to concrete files
#[derive(Debug, Clone)]
pub struct ResolvedWatermark {
    pub spec: WatermarkSpec,
    pub image: Option<PathBuf>,
    pub font: PathBuf,
}

/// Allocate the canvas, fill the background and copy the source into it.
///
/// A transparent background stays transparent only when `output` can
/// encode alpha. Otherwise the padding is white.
pub fn compose(
    backend: &dyn RasterBackend,
    source: &SourceImage,
    geometry: &Geometry,
    background: Background,
    grayscale: bool,
    output: OutputFormat,
) -> Result<RgbaImage, ThumbError> {
    let mut canvas = backend.blank(geometry.canvas_width, geometry.canvas_height);

    match background {
        Background::Solid(color) => backend.fill_flat(&mut canvas, color),
        Background::Transparent if output.supports_alpha() => {
            backend.fill_transparent(&mut canvas)
        }
        Background::Transparent => backend.fill_flat(&mut canvas, crate::color::Color::white()),
    }

    backend.resample(&source.pixels, geometry.src, &mut canvas, geometry.dst)?;

    if grayscale {
        backend.grayscale(&mut canvas);
    }

    Ok(canvas)
}

/// Resize a source according to `spec` for encoding as `output`.
pub fn resize(
    backend: &dyn RasterBackend,
    source: &SourceImage,
    spec: &ResizeSpec,
    output: OutputFormat,
) -> Result<RgbaImage, ThumbError> {
    let geometry = resolve_geometry(source.width(), source.height(), spec)?;
    compose(
        backend,
        source,
        &geometry,
        Background::parse(&spec.background),
        spec.grayscale,
        output,
    )
}

/// Draw the watermark image, then the watermark text, onto `canvas`.
///
/// Both are aligned against the canvas as it is when they are drawn.
pub fn apply_watermark(
    backend: &dyn RasterBackend,
    canvas: &mut RgbaImage,
    watermark: &ResolvedWatermark,
) -> Result<(), ThumbError> {
    let spec = &watermark.spec;

    if let Some(path) = &watermark.image {
        let bytes = std::fs::read(path).map_err(|e| ThumbError::SourceUnreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mark = backend.decode(&bytes)?;

        let box_spec = ResizeSpec {
            width: Some(spec.width),
            height: Some(spec.height),
            method: ResizeMethod::Fit,
            stretch: true,
            trim: false,
            background: "transparent".to_string(),
            grayscale: false,
            ..ResizeSpec::default()
        };
        let geometry = resolve_geometry(mark.width(), mark.height(), &box_spec)?;
        let mut overlay = backend.blank(geometry.canvas_width, geometry.canvas_height);
        backend.fill_transparent(&mut overlay);
        backend.resample(&mark.pixels, geometry.src, &mut overlay, geometry.dst)?;

        let (x, y) = align_on_canvas(
            canvas.width(),
            canvas.height(),
            overlay.width(),
            overlay.height(),
            spec.align_x,
            spec.align_y,
        );
        tracing::debug!(
            watermark = %path.display(),
            x,
            y,
            width = overlay.width(),
            height = overlay.height(),
            "Applying image watermark"
        );
        backend.blend(canvas, &overlay, x, y);
    }

    if let Some(text) = spec.text() {
        let color = parse_hex_color(&spec.color)?;
        let (text_width, text_height) =
            backend.measure_text(&watermark.font, spec.font_size, text)?;
        let (x, y) = align_on_canvas(
            canvas.width(),
            canvas.height(),
            text_width,
            text_height,
            spec.align_x,
            spec.align_y,
        );
        let baseline = y + spec.font_size as i64;
        tracing::debug!(x, baseline, text_width, text_height, "Applying text watermark");
        backend.draw_text(
            canvas,
            &watermark.font,
            spec.font_size,
            x,
            baseline,
            color,
            text,
        )?;
    }

    Ok(())
}
