// Server module - Pingora service answering every request locally
//
// Thumbnails, /health and /metrics are produced in request_filter; no
// request is ever proxied upstream.

pub mod endpoints;

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::Instant;

use crate::materializer::Materializer;
use crate::security::{self, DEFAULT_MAX_URI_LENGTH};
use crate::thumb::Thumb;
use endpoints::{handle_health, handle_metrics, materialized_response, EndpointResponse};

/// Where a request path is dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Health,
    Metrics,
    /// Path below the thumbnail URL prefix
    Thumbnail(String),
    NotFound,
}

/// Dispatch a request path against the thumbnail URL prefix
pub fn route(path: &str, url_prefix: &str) -> Route {
    match path {
        "/health" => return Route::Health,
        "/metrics" => return Route::Metrics,
        _ => {}
    }

    let prefix = url_prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) if rest.starts_with('/') || prefix.is_empty() => {
            Route::Thumbnail(rest.trim_start_matches('/').to_string())
        }
        _ => Route::NotFound,
    }
}

/// ThumbService implements the Pingora ProxyHttp trait
pub struct ThumbService {
    materializer: Materializer,
    start_time: Instant,
}

impl ThumbService {
    pub fn new(thumb: Arc<Thumb>) -> Self {
        Self {
            materializer: Materializer::new(thumb),
            start_time: Instant::now(),
        }
    }

    fn thumb(&self) -> &Thumb {
        self.materializer.thumb()
    }

    /// Produce the response for one request
    pub async fn respond(&self, method: &str, uri: &str, path: &str) -> EndpointResponse {
        if let Err(e) = security::validate_uri_length(uri, DEFAULT_MAX_URI_LENGTH) {
            return EndpointResponse::error(e.http_status(), "URI Too Long", e);
        }

        if method != "GET" && method != "HEAD" {
            return EndpointResponse::error(
                405,
                "Method Not Allowed",
                format!("Method {} is not allowed", method),
            )
            .with_header("Allow", "GET, HEAD");
        }

        match route(path, &self.thumb().config().server.url_prefix) {
            Route::Health => handle_health(self.start_time),
            Route::Metrics => handle_metrics(self.thumb().metrics()),
            Route::Thumbnail(relative) => {
                let result = self.materializer.materialize(&relative).await;
                let response = materialized_response(result);
                self.thumb()
                    .metrics()
                    .record_materializer_status(response.status);
                response
            }
            Route::NotFound => EndpointResponse::error(404, "Not Found", format!("No route for {}", path)),
        }
    }
}

#[async_trait]
impl ProxyHttp for ThumbService {
    type CTX = ();

    fn new_ctx(&self) -> Self::CTX {}

    /// Never reached: request_filter answers every request
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "thumbsmith does not proxy upstream",
        ))
    }

    async fn request_filter(&self, session: &mut Session, _ctx: &mut Self::CTX) -> Result<bool> {
        let start = Instant::now();
        let request_id = uuid::Uuid::new_v4();

        let req = session.req_header();
        let method = req.method.as_str().to_string();
        let uri = req.uri.to_string();
        let path = req.uri.path().to_string();

        let response = self.respond(&method, &uri, &path).await;

        let mut header = ResponseHeader::build(response.status, None)?;
        header.insert_header("Content-Type", response.content_type)?;
        header.insert_header("Content-Length", response.body.len().to_string())?;
        for (name, value) in &response.headers {
            header.insert_header(*name, value.as_str())?;
        }

        if method == "HEAD" {
            session
                .write_response_header(Box::new(header), true)
                .await?;
        } else {
            session
                .write_response_header(Box::new(header), false)
                .await?;
            session
                .write_response_body(Some(response.body.clone()), true)
                .await?;
        }

        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status,
            bytes = response.body.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );

        Ok(true)
    }
}
