//! Placeholder image URLs for missing sources

use serde::{Deserialize, Serialize};

/// Fallback size when the requested dimension is unset
const DEFAULT_PLACEHOLDER_SIZE: u32 = 500;

pub const TEXT_NOT_GIVEN: &str = "Image not given";
pub const TEXT_NOT_FOUND: &str = "Image not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    /// Text-image service the placeholder URL points at
    pub base_url: String,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://placeholdit.imgix.net/~text".to_string(),
        }
    }
}

/// Build a placeholder URL showing `text` at the requested size.
///
/// `original` is passed through so the placeholder service (and logs)
/// can see which reference failed.
pub fn placeholder_url(
    config: &PlaceholderConfig,
    original: &str,
    width: Option<u32>,
    height: Option<u32>,
    text: &str,
) -> String {
    let width = width.filter(|w| *w > 0).unwrap_or(DEFAULT_PLACEHOLDER_SIZE);
    let height = height.filter(|h| *h > 0).unwrap_or(DEFAULT_PLACEHOLDER_SIZE);

    format!(
        "{}?w={}&h={}&txt={}&bg=ECECEC&txtclr=444444&txttrack=0&txtsize=60&original={}",
        config.base_url,
        width,
        height,
        urlencoding::encode(text),
        urlencoding::encode(original)
    )
}
