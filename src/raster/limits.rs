//! Image bomb protection for decoded sources

use serde::{Deserialize, Serialize};

use crate::error::ThumbError;

/// Upper bounds on source images accepted for decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLimits {
    pub max_source_width: u32,
    pub max_source_height: u32,
    pub max_source_pixels: u64,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            max_source_width: 10000,
            max_source_height: 10000,
            max_source_pixels: 100_000_000, // 100 megapixels
        }
    }
}

impl SourceLimits {
    /// Reject sources whose header dimensions exceed the limits
    pub fn validate_dimensions(&self, width: u32, height: u32) -> Result<(), ThumbError> {
        let pixels = width as u64 * height as u64;
        if width > self.max_source_width
            || height > self.max_source_height
            || pixels > self.max_source_pixels
        {
            return Err(ThumbError::decode(format!(
                "Image bomb detected: {}x{} ({} pixels) exceeds limits {}x{} ({} pixels)",
                width,
                height,
                pixels,
                self.max_source_width,
                self.max_source_height,
                self.max_source_pixels
            )));
        }
        Ok(())
    }
}
