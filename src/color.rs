//! Hex color parsing shared by background fills and text watermarks.

use crate::error::ThumbError;
use serde::{Deserialize, Serialize};

/// Parsed RGB color from a hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// RGBA pixel with the given alpha.
    pub fn with_alpha(self, alpha: u8) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, alpha])
    }
}

/// Parse a hex color string into RGB components.
///
/// Supports `#RGB` and `#RRGGBB`; the leading `#` is optional.
///
/// ```
/// use thumbsmith::color::{parse_hex_color, Color};
///
/// assert_eq!(parse_hex_color("#FFF").unwrap(), Color::new(255, 255, 255));
/// assert_eq!(parse_hex_color("ff0000").unwrap(), Color::new(255, 0, 0));
/// ```
pub fn parse_hex_color(hex: &str) -> Result<Color, ThumbError> {
    let digits = hex.trim().trim_start_matches('#');

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ThumbError::configuration(format!(
            "Invalid hex color '{}'",
            hex
        )));
    }

    let channel = |s: &str| {
        u8::from_str_radix(s, 16)
            .map_err(|_| ThumbError::configuration(format!("Invalid hex color '{}'", hex)))
    };

    match digits.len() {
        // #RGB - each digit doubled: 0xF -> 0xFF
        3 => Ok(Color::new(
            channel(&digits[0..1])? * 17,
            channel(&digits[1..2])? * 17,
            channel(&digits[2..3])? * 17,
        )),
        6 => Ok(Color::new(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        n => Err(ThumbError::configuration(format!(
            "Color must be #RGB or #RRGGBB format, got {} digits",
            n
        ))),
    }
}
