//! Text watermark rendering with TrueType fonts loaded from disk.
//!
//! Measurement and drawing share one layout: glyph advances plus kerning on
//! a single line, scaled to the font size in pixels. Drawing positions the
//! baseline explicitly so callers control vertical placement.

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use std::path::Path;

use super::blend_pixels;
use crate::color::Color;
use crate::error::ThumbError;

/// Padding added to both measured text dimensions
pub const TEXT_PADDING: u32 = 5;

/// Load a TrueType/OpenType font file.
pub fn load_font(path: &Path) -> Result<FontVec, ThumbError> {
    let data = std::fs::read(path).map_err(|e| {
        ThumbError::configuration(format!("Cannot read font {}: {}", path.display(), e))
    })?;
    FontVec::try_from_vec(data).map_err(|e| {
        ThumbError::configuration(format!("Invalid font {}: {}", path.display(), e))
    })
}

/// Width and height of `text` at `font_size`, including [`TEXT_PADDING`].
pub fn measure_text(font: &FontVec, font_size: f32, text: &str) -> (u32, u32) {
    let scaled = font.as_scaled(PxScale::from(font_size));

    let mut width = 0.0f32;
    let mut prev: Option<GlyphId> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }

    (
        width.ceil().max(0.0) as u32 + TEXT_PADDING,
        scaled.height().ceil().max(0.0) as u32 + TEXT_PADDING,
    )
}

/// Draw `text` onto `canvas` with its baseline starting at `(x, baseline_y)`.
///
/// Glyph coverage is alpha-blended over the canvas; pixels outside the
/// canvas are skipped.
pub fn draw_text(
    canvas: &mut RgbaImage,
    font: &FontVec,
    font_size: f32,
    x: i64,
    baseline_y: i64,
    color: Color,
    text: &str,
) {
    let scale = PxScale::from(font_size);
    let scaled = font.as_scaled(scale);
    let canvas_width = canvas.width() as i64;
    let canvas_height = canvas.height() as i64;

    let mut cursor_x = x as f32;
    let mut prev: Option<GlyphId> = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            cursor_x += scaled.kern(prev, id);
        }

        let glyph = id.with_scale_and_position(scale, ab_glyph::point(cursor_x, baseline_y as f32));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = gx as i64 + bounds.min.x as i64;
                let py = gy as i64 + bounds.min.y as i64;
                if px < 0 || py < 0 || px >= canvas_width || py >= canvas_height {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                if alpha == 0 {
                    return;
                }
                let existing = *canvas.get_pixel(px as u32, py as u32);
                let top = Rgba([color.r, color.g, color.b, alpha]);
                canvas.put_pixel(px as u32, py as u32, blend_pixels(existing, top));
            });
        }

        cursor_x += scaled.h_advance(id);
        prev = Some(id);
    }
}
