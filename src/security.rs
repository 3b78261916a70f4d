//! Request path validation for the thumbnail endpoint
//!
//! Thumbnail URLs map directly onto files below the thumbnail root, so the
//! request path must never be able to leave it.
//!
//! Returns appropriate HTTP status codes:
//! - 400 Bad Request - Path traversal or NUL bytes
//! - 414 URI Too Long - Request path exceeds limit

/// Default maximum request URI length in bytes
pub const DEFAULT_MAX_URI_LENGTH: usize = 8192;

/// Security validation error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Path traversal attempt detected (400)
    PathTraversal { path: String },
    /// URI too long (414)
    UriTooLong { length: usize, limit: usize },
}

impl SecurityError {
    pub fn http_status(&self) -> u16 {
        match self {
            SecurityError::PathTraversal { .. } => 400,
            SecurityError::UriTooLong { .. } => 414,
        }
    }
}

impl std::fmt::Display for SecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityError::PathTraversal { path } => {
                write!(f, "Path traversal attempt detected: {}", path)
            }
            SecurityError::UriTooLong { length, limit } => {
                write!(f, "URI length {} exceeds limit {}", length, limit)
            }
        }
    }
}

impl std::error::Error for SecurityError {}

/// Validate URI length
pub fn validate_uri_length(uri: &str, limit: usize) -> Result<(), SecurityError> {
    let length = uri.len();
    if length > limit {
        return Err(SecurityError::UriTooLong { length, limit });
    }
    Ok(())
}

/// Check for path traversal attempts
///
/// Detects patterns like:
/// - `..` as a path segment (either separator)
/// - %2e%2e (URL-encoded `..`), including mixed case and partial encoding
/// - %2f / %5c (encoded separators that could smuggle a segment)
/// - NUL bytes, raw or encoded
pub fn check_path_traversal(path: &str) -> Result<(), SecurityError> {
    let traversal = || SecurityError::PathTraversal {
        path: path.to_string(),
    };

    if path.contains('\0') {
        return Err(traversal());
    }

    let lower = path.to_ascii_lowercase();
    if lower.contains("%2e%2e")
        || lower.contains("%2e.")
        || lower.contains(".%2e")
        || lower.contains("%2f")
        || lower.contains("%5c")
        || lower.contains("%00")
    {
        return Err(traversal());
    }

    if path.split(|c: char| c == '/' || c == '\\').any(|segment| segment == "..") {
        return Err(traversal());
    }

    Ok(())
}
