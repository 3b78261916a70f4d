//! Geometry resolution for thumbnail canvases.
//!
//! Pure integer geometry: given the original image size and a
//! [`ResizeSpec`], compute the canvas size, the source rectangle to read
//! and the destination rectangle to draw it into.
//!
//! # Methods
//!
//! - **fit**: the whole source is scaled into the target box. With
//!   `stretch`, small sources are first pre-scaled by a whole-number
//!   multiplier so they can reach the box. With `trim` the canvas is the
//!   fitted content; otherwise the canvas is the box and the content is
//!   aligned inside it.
//! - **crop**: the box is always filled. The source rectangle is shrunk on
//!   the less constraining axis and aligned inside the original. When
//!   `stretch` is off and the box needs more pixels than the source has,
//!   the source is drawn 1:1 (undersized) and aligned on the canvas instead.
//!
//! # Example
//!
//! ```
//! use thumbsmith::geometry::{resolve_geometry, Rect};
//! use thumbsmith::options::{ResizeMethod, ResizeSpec};
//!
//! let spec = ResizeSpec {
//!     width: Some(800),
//!     height: Some(800),
//!     method: ResizeMethod::Crop,
//!     ..ResizeSpec::default()
//! };
//! let geometry = resolve_geometry(1200, 1200, &spec).unwrap();
//! assert_eq!((geometry.canvas_width, geometry.canvas_height), (800, 800));
//! assert_eq!(geometry.src, Rect::new(0, 0, 1200, 1200));
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::color::{parse_hex_color, Color};
use crate::error::ThumbError;
use crate::options::{ResizeMethod, ResizeSpec};

/// Horizontal alignment of content within a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl HorizontalAlign {
    /// Offset of `content` inside `container` along the x axis.
    pub fn offset(self, container: i64, content: i64) -> i64 {
        match self {
            HorizontalAlign::Left => 0,
            HorizontalAlign::Center => (container - content) / 2,
            HorizontalAlign::Right => container - content,
        }
    }
}

impl FromStr for HorizontalAlign {
    type Err = ThumbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(HorizontalAlign::Left),
            "center" => Ok(HorizontalAlign::Center),
            "right" => Ok(HorizontalAlign::Right),
            _ => Err(ThumbError::configuration(format!(
                "Unknown horizontal alignment: {}",
                s
            ))),
        }
    }
}

/// Vertical alignment of content within a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl VerticalAlign {
    /// Offset of `content` inside `container` along the y axis.
    pub fn offset(self, container: i64, content: i64) -> i64 {
        match self {
            VerticalAlign::Top => 0,
            VerticalAlign::Middle => (container - content) / 2,
            VerticalAlign::Bottom => container - content,
        }
    }
}

impl FromStr for VerticalAlign {
    type Err = ThumbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(VerticalAlign::Top),
            "middle" => Ok(VerticalAlign::Middle),
            "bottom" => Ok(VerticalAlign::Bottom),
            _ => Err(ThumbError::configuration(format!(
                "Unknown vertical alignment: {}",
                s
            ))),
        }
    }
}

/// Canvas background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    #[default]
    Transparent,
    Solid(Color),
}

impl Background {
    /// Resolve a background option. Anything other than `transparent` or a
    /// six digit hex color falls back to `Transparent`.
    pub fn parse(value: &str) -> Background {
        let digits = value.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Background::Transparent;
        }
        match parse_hex_color(digits) {
            Ok(color) => Background::Solid(color),
            Err(_) => Background::Transparent,
        }
    }
}

/// Integer rectangle. Destination rectangles may start at negative
/// coordinates; anything outside the canvas is clipped when drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn at_origin(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Resolved drawing plan for one resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Region of the original image to read
    pub src: Rect,
    /// Region of the canvas to draw into
    pub dst: Rect,
}

/// Compute canvas, source and destination for resizing an
/// `original_width` x `original_height` image according to `spec`.
pub fn resolve_geometry(
    original_width: u32,
    original_height: u32,
    spec: &ResizeSpec,
) -> Result<Geometry, ThumbError> {
    if original_width == 0 || original_height == 0 {
        return Err(ThumbError::decode(format!(
            "Source has empty dimensions {}x{}",
            original_width, original_height
        )));
    }

    let (target_width, target_height) = target_dimensions(
        original_width,
        original_height,
        spec.requested_width(),
        spec.requested_height(),
    );

    let geometry = match spec.method {
        ResizeMethod::Crop => resolve_crop(
            original_width,
            original_height,
            target_width,
            target_height,
            spec,
        ),
        ResizeMethod::Fit => resolve_fit(
            original_width,
            original_height,
            target_width,
            target_height,
            spec,
        ),
    };

    tracing::trace!(
        original_width,
        original_height,
        target_width,
        target_height,
        method = ?spec.method,
        geometry = ?geometry,
        "Resolved thumbnail geometry"
    );

    Ok(geometry)
}

/// Fill in a missing target dimension from the original aspect ratio.
pub fn target_dimensions(
    original_width: u32,
    original_height: u32,
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(original_height, w, original_width)),
        (None, Some(h)) => (scale(original_width, h, original_height), h),
        (None, None) => (original_width, original_height),
    }
}

fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = value as f64 * (numerator as f64 / denominator as f64);
    (scaled as u32).max(1)
}

fn resolve_crop(
    original_width: u32,
    original_height: u32,
    target_width: u32,
    target_height: u32,
    spec: &ResizeSpec,
) -> Geometry {
    let compare_width = original_width as f64 / target_width as f64;
    let compare_height = original_height as f64 / target_height as f64;

    let mut src_width = original_width;
    let mut src_height = original_height;
    if compare_width > compare_height {
        src_width = ((original_width as f64 / compare_width * compare_height).round() as u32).max(1);
    } else if compare_height > compare_width {
        src_height =
            ((original_height as f64 / compare_height * compare_width).round() as u32).max(1);
    }

    let undersized = !spec.stretch && (target_width > src_width || target_height > src_height);

    if undersized {
        // Draw 1:1 and never let the canvas grow past the source
        let canvas_width = target_width.min(original_width);
        let canvas_height = target_height.min(original_height);
        let dst_x = spec
            .align_x
            .offset(canvas_width as i64, original_width as i64);
        let dst_y = spec
            .align_y
            .offset(canvas_height as i64, original_height as i64);

        return Geometry {
            canvas_width,
            canvas_height,
            src: Rect::at_origin(original_width, original_height),
            dst: Rect::new(dst_x, dst_y, original_width, original_height),
        };
    }

    let src_x = spec
        .align_x
        .offset(original_width as i64, src_width as i64);
    let src_y = spec
        .align_y
        .offset(original_height as i64, src_height as i64);

    Geometry {
        canvas_width: target_width,
        canvas_height: target_height,
        src: Rect::new(src_x, src_y, src_width, src_height),
        dst: Rect::at_origin(target_width, target_height),
    }
}

fn resolve_fit(
    original_width: u32,
    original_height: u32,
    target_width: u32,
    target_height: u32,
    spec: &ResizeSpec,
) -> Geometry {
    let multiplier = if spec.stretch
        && (target_width > original_width || target_height > original_height)
    {
        upscale_multiplier(original_width, original_height, target_width, target_height)
    } else {
        1
    };

    let scaled_width = (original_width as u64 * multiplier).min(u32::MAX as u64) as u32;
    let scaled_height = (original_height as u64 * multiplier).min(u32::MAX as u64) as u32;
    let (fit_width, fit_height) =
        constrain_dimensions(scaled_width, scaled_height, target_width, target_height);
    let fit_width = fit_width.max(1);
    let fit_height = fit_height.max(1);

    let src = Rect::at_origin(original_width, original_height);

    if spec.trim {
        return Geometry {
            canvas_width: fit_width,
            canvas_height: fit_height,
            src,
            dst: Rect::at_origin(fit_width, fit_height),
        };
    }

    let dst_x = spec
        .align_x
        .offset(target_width as i64, fit_width as i64);
    let dst_y = spec
        .align_y
        .offset(target_height as i64, fit_height as i64);

    Geometry {
        canvas_width: target_width,
        canvas_height: target_height,
        src,
        dst: Rect::new(dst_x, dst_y, fit_width, fit_height),
    }
}

/// Whole-number pre-scale factor that lets a small source reach the box.
fn upscale_multiplier(
    original_width: u32,
    original_height: u32,
    target_width: u32,
    target_height: u32,
) -> u64 {
    let by_width = (target_width as f64 / original_width as f64).ceil() as u64;
    let by_height = (target_height as f64 / original_height as f64).ceil() as u64;
    by_width.max(by_height).max(1)
}

/// Scale `(current_width, current_height)` down to fit inside
/// `(max_width, max_height)` preserving aspect ratio. A zero maximum leaves
/// that axis unconstrained; both zero returns the input unchanged.
///
/// Results that land one pixel short of a maximum are bumped to it, so
/// constraining an already constrained size reproduces the same size.
pub fn constrain_dimensions(
    current_width: u32,
    current_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if max_width == 0 && max_height == 0 {
        return (current_width, current_height);
    }

    let mut width_ratio = 1.0f64;
    let mut height_ratio = 1.0f64;
    let mut did_width = false;
    let mut did_height = false;

    if max_width > 0 && current_width > 0 && current_width > max_width {
        width_ratio = max_width as f64 / current_width as f64;
        did_width = true;
    }

    if max_height > 0 && current_height > 0 && current_height > max_height {
        height_ratio = max_height as f64 / current_height as f64;
        did_height = true;
    }

    let smaller_ratio = width_ratio.min(height_ratio);
    let larger_ratio = width_ratio.max(height_ratio);

    let overflows = (current_width as f64 * larger_ratio) as u64 > max_width as u64
        || (current_height as f64 * larger_ratio) as u64 > max_height as u64;
    let ratio = if overflows { smaller_ratio } else { larger_ratio };

    let mut width = (current_width as f64 * ratio) as u32;
    let mut height = (current_height as f64 * ratio) as u32;

    // 465x700 into 177x177 truncates to 117x176
    if did_width && width + 1 == max_width {
        width = max_width;
    }
    if did_height && height + 1 == max_height {
        height = max_height;
    }

    (width, height)
}

/// Top-left position of a `width` x `height` box aligned on a canvas.
pub fn align_on_canvas(
    canvas_width: u32,
    canvas_height: u32,
    width: u32,
    height: u32,
    align_x: HorizontalAlign,
    align_y: VerticalAlign,
) -> (i64, i64) {
    (
        align_x.offset(canvas_width as i64, width as i64),
        align_y.offset(canvas_height as i64, height as i64),
    )
}
