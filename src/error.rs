// Error types module

use thiserror::Error;

/// Centralized error type for thumbnail derivation
///
/// Categorizes failures so callers can decide between falling back to a
/// placeholder (missing or unreachable sources) and failing the request
/// (configuration, decode and encode problems).
#[derive(Error, Debug)]
pub enum ThumbError {
    /// Invalid option values (unknown alignment, malformed option document, bad config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source image does not exist
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Source image exists but cannot be read
    #[error("Source unreadable: {path}: {message}")]
    SourceUnreadable { path: String, message: String },

    /// Remote source could not be mirrored (timeout, non-2xx, empty body)
    #[error("Remote fetch failed for {url}: {message}")]
    RemoteFetch { url: String, message: String },

    /// Image bytes are corrupt, unsupported or exceed safety limits
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Encoding the output image failed
    #[error("Failed to encode to {format}: {message}")]
    Encode { format: String, message: String },

    /// Filesystem error while reading or publishing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThumbError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ThumbError::Configuration(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ThumbError::Decode(message.into())
    }

    pub fn encode(format: impl Into<String>, message: impl Into<String>) -> Self {
        ThumbError::Encode {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn remote_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        ThumbError::RemoteFetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether the caller should answer with a placeholder instead of failing
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ThumbError::SourceNotFound(_)
                | ThumbError::SourceUnreadable { .. }
                | ThumbError::RemoteFetch { .. }
        )
    }

    /// Maps errors to HTTP status codes
    ///
    /// - Configuration, Encode, Io → 500
    /// - SourceNotFound, SourceUnreadable → 404
    /// - RemoteFetch → 502
    /// - Decode → 415
    pub fn to_http_status(&self) -> u16 {
        match self {
            ThumbError::SourceNotFound(_) | ThumbError::SourceUnreadable { .. } => 404,
            ThumbError::RemoteFetch { .. } => 502,
            ThumbError::Decode(_) => 415,
            ThumbError::Configuration(_) | ThumbError::Encode { .. } | ThumbError::Io(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ThumbError>;
