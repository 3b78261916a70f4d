//! Response generators for the built-in endpoints.
//!
//! Handlers return an [`EndpointResponse`] instead of writing to the Pingora
//! session, so routing and response bodies can be tested without a
//! listener. The service writes the response to the session.

use bytes::Bytes;
use std::time::Instant;

use crate::error::ThumbError;
use crate::materializer::{Materialized, THUMBNAIL_CACHE_CONTROL};
use crate::metrics::ThumbMetrics;

/// Response from an endpoint handler.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: &'static str,
    /// Headers beyond Content-Type and Content-Length
    pub headers: Vec<(&'static str, String)>,
    /// Response body
    pub body: Bytes,
}

impl EndpointResponse {
    /// Create a JSON response with the given status and body.
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Create a plain text response (for Prometheus metrics).
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// JSON error body in the `{error, message, status}` shape.
    pub fn error(status: u16, error: &str, message: impl std::fmt::Display) -> Self {
        let body = serde_json::json!({
            "error": error,
            "message": message.to_string(),
            "status": status
        })
        .to_string();
        Self::json(status, body)
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant) -> EndpointResponse {
    let uptime_seconds = start_time.elapsed().as_secs();
    let version = env!("CARGO_PKG_VERSION");

    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": uptime_seconds,
        "version": version
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// Generate response for /metrics endpoint.
pub fn handle_metrics(metrics: &ThumbMetrics) -> EndpointResponse {
    EndpointResponse::prometheus(metrics.export_prometheus())
}

/// Map a materialization outcome to a response.
pub fn materialized_response(result: Result<Materialized, ThumbError>) -> EndpointResponse {
    match result {
        Ok(Materialized::Served {
            content_type, body, ..
        }) => EndpointResponse {
            status: 200,
            content_type,
            headers: vec![("Cache-Control", THUMBNAIL_CACHE_CONTROL.to_string())],
            body: body.into(),
        },
        Ok(Materialized::Placeholder(url)) => {
            EndpointResponse::error(302, "Found", "Source image not found")
                .with_header("Location", url)
                .with_header("Cache-Control", "no-cache")
        }
        Ok(Materialized::NotFound) => {
            EndpointResponse::error(404, "Not Found", "Thumbnail not found")
        }
        Ok(Materialized::Rejected(e)) => EndpointResponse::error(e.http_status(), "Bad Request", e),
        Err(e) => {
            let status = e.to_http_status();
            let label = match status {
                404 => "Not Found",
                415 => "Unsupported Media Type",
                502 => "Bad Gateway",
                _ => "Internal Server Error",
            };
            EndpointResponse::error(status, label, e)
        }
    }
}
