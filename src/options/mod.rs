//! Thumbnail option documents
//!
//! `ThumbOptions` is the full, serializable description of one derivation:
//! resize geometry, watermark, output quality and the filesystem roots the
//! derivation reads from and writes to. The serialized form is part of the
//! cache key, so field order and names are stable.
//!
//! Options are plain data. Process-wide defaults come from configuration and
//! per-call changes are applied with [`ThumbOptions::merged`], which returns
//! a new value and never touches the defaults.
//!
//! ```
//! use thumbsmith::options::{ResizeMethod, ThumbOptions};
//!
//! let defaults = ThumbOptions::default();
//! let options = defaults
//!     .merged(&serde_json::json!({"resize": {"width": 200, "method": "crop"}}))
//!     .unwrap();
//! assert_eq!(options.resize.width, Some(200));
//! assert_eq!(options.resize.method, ResizeMethod::Crop);
//! assert_eq!(defaults.resize.width, Some(500));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ThumbError;
use crate::geometry::{HorizontalAlign, VerticalAlign};

/// Resize strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMethod {
    /// Keep the whole source, scaled into the box
    #[default]
    Fit,
    /// Fill the whole box, discarding source outside the crop rectangle
    Crop,
}

impl FromStr for ResizeMethod {
    type Err = ThumbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fit" => Ok(ResizeMethod::Fit),
            "crop" => Ok(ResizeMethod::Crop),
            _ => Err(ThumbError::configuration(format!(
                "Unknown resize method: {}",
                s
            ))),
        }
    }
}

/// Resize options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeSpec {
    /// Target width (unset to derive from height and aspect ratio)
    pub width: Option<u32>,
    /// Target height (unset to derive from width and aspect ratio)
    pub height: Option<u32>,
    pub method: ResizeMethod,
    /// Allow enlarging sources smaller than the target
    pub stretch: bool,
    /// Shrink the canvas to the fitted content (fit only)
    pub trim: bool,
    pub align_x: HorizontalAlign,
    pub align_y: VerticalAlign,
    /// `transparent` or `#RRGGBB`
    pub background: String,
    pub grayscale: bool,
}

impl Default for ResizeSpec {
    fn default() -> Self {
        Self {
            width: Some(500),
            height: Some(500),
            method: ResizeMethod::Fit,
            stretch: true,
            trim: false,
            align_x: HorizontalAlign::Center,
            align_y: VerticalAlign::Middle,
            background: "transparent".to_string(),
            grayscale: false,
        }
    }
}

impl ResizeSpec {
    /// Requested width, treating zero as unset
    pub fn requested_width(&self) -> Option<u32> {
        self.width.filter(|w| *w > 0)
    }

    /// Requested height, treating zero as unset
    pub fn requested_height(&self) -> Option<u32> {
        self.height.filter(|h| *h > 0)
    }

    pub fn is_requested(&self) -> bool {
        self.requested_width().is_some() || self.requested_height().is_some()
    }
}

/// Watermark options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkSpec {
    /// Image to overlay, absolute or relative to the watermark root
    pub image: Option<String>,
    /// Box the watermark image is fitted into
    pub width: u32,
    pub height: u32,
    pub text: Option<String>,
    /// TrueType font file, absolute or relative to the font root
    pub font: String,
    pub font_size: f32,
    /// Text color (`#RGB` or `#RRGGBB`)
    pub color: String,
    pub align_x: HorizontalAlign,
    pub align_y: VerticalAlign,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            image: None,
            width: 100,
            height: 100,
            text: None,
            font: "Arial".to_string(),
            font_size: 10.0,
            color: "#FFFFFF".to_string(),
            align_x: HorizontalAlign::Center,
            align_y: VerticalAlign::Middle,
        }
    }
}

impl WatermarkSpec {
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().filter(|s| !s.is_empty())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_requested(&self) -> bool {
        self.image().is_some() || self.text().is_some()
    }
}

/// Complete option set for one thumbnail derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbOptions {
    /// Root for images given with a relative path
    pub path_images: PathBuf,
    /// Root thumbnails are written under
    pub path_thumbs: PathBuf,
    /// Root for watermark images given with a relative path
    pub path_watermarks: PathBuf,
    /// Root for fonts given with a relative path
    pub path_fonts: PathBuf,
    pub resize: ResizeSpec,
    pub watermark: WatermarkSpec,
    /// Output quality for lossy formats (0-100)
    pub quality: u8,
    /// Always encode WebP regardless of source format
    pub webp: bool,
}

impl Default for ThumbOptions {
    fn default() -> Self {
        Self {
            path_images: PathBuf::from("./images"),
            path_thumbs: PathBuf::from("./thumbs"),
            path_watermarks: PathBuf::from("./watermarks"),
            path_fonts: PathBuf::from("./fonts"),
            resize: ResizeSpec::default(),
            watermark: WatermarkSpec::default(),
            quality: 80,
            webp: false,
        }
    }
}

impl ThumbOptions {
    /// Parse an option document, mapping unknown values to configuration errors
    pub fn from_value(value: Value) -> Result<Self, ThumbError> {
        let options: ThumbOptions = serde_json::from_value(value)
            .map_err(|e| ThumbError::configuration(format!("Invalid thumbnail options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Return a copy with `overrides` recursively replacing fields
    ///
    /// Objects merge key by key; every other value replaces the current one.
    pub fn merged(&self, overrides: &Value) -> Result<Self, ThumbError> {
        let mut base = serde_json::to_value(self)
            .map_err(|e| ThumbError::configuration(format!("Unserializable options: {}", e)))?;
        replace_recursive(&mut base, overrides);
        Self::from_value(base)
    }

    pub fn validate(&self) -> Result<(), ThumbError> {
        if self.quality > 100 {
            return Err(ThumbError::configuration(format!(
                "Invalid quality {}: must be 0-100",
                self.quality
            )));
        }
        if !(self.watermark.font_size.is_finite() && self.watermark.font_size > 0.0) {
            return Err(ThumbError::configuration(format!(
                "Invalid watermark font size {}",
                self.watermark.font_size
            )));
        }
        Ok(())
    }

    /// Stable serialized form used as cache-key input
    pub fn fingerprint_source(&self) -> String {
        // Serializing plain data with string keys cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn replace_recursive(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        replace_recursive(existing, value)
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}
