// Describe-then-serve flow through the HTTP service

use super::support::{thumb_in, write_png};
use serde_json::json;
use std::sync::Arc;
use thumbsmith::materializer::THUMBNAIL_CACHE_CONTROL;
use thumbsmith::server::ThumbService;

async fn get(service: &ThumbService, path: &str) -> thumbsmith::server::endpoints::EndpointResponse {
    service.respond("GET", path, path).await
}

/// Test: a described URL is generated on first request and served after
#[tokio::test]
async fn test_described_url_is_materialized_on_first_request() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/products/shoe.png"), 120, 80);
    let thumb = Arc::new(thumb_in(dir.path()));
    let options = thumb
        .options_with(&json!({"resize": {"width": 60, "height": 60, "method": "crop"}}))
        .unwrap();
    let url = thumb.describe("products/shoe.png", &options).await.unwrap();
    assert!(url.starts_with("/thumbnails/products/shoe-"));

    let service = ThumbService::new(Arc::clone(&thumb));

    let response = get(&service, &url).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/png");
    assert!(response
        .headers
        .contains(&("Cache-Control", THUMBNAIL_CACHE_CONTROL.to_string())));
    let decoded = image::load_from_memory(&response.body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (60, 60));

    let again = get(&service, &url).await;
    assert_eq!(again.status, 200);
    assert_eq!(again.body, response.body);

    assert_eq!(thumb.metrics().thumbnails_generated(), 1);
    assert_eq!(thumb.metrics().materializer_status_count(200), 2);
}

#[tokio::test]
async fn test_undescribed_thumbnail_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let thumb = Arc::new(thumb_in(dir.path()));
    let service = ThumbService::new(Arc::clone(&thumb));

    let response = get(&service, "/thumbnails/products/shoe-deadbeef.png").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.content_type, "application/json");
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_encoded_traversal_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let service = ThumbService::new(Arc::new(thumb_in(dir.path())));

    for path in [
        "/thumbnails/%2e%2e/%2e%2e/etc/passwd",
        "/thumbnails/a/..%2f..%2fsecret.png",
        "/thumbnails/a%00.png",
    ] {
        assert_eq!(get(&service, path).await.status, 400, "{}", path);
    }
}

#[tokio::test]
async fn test_metrics_endpoint_reports_counters() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("images/cat.png"), 10, 10);
    let thumb = Arc::new(thumb_in(dir.path()));
    let options = thumb.config().defaults.clone();
    thumb.get_or_create_thumbnail("cat.png", &options).await.unwrap();

    let service = ThumbService::new(Arc::clone(&thumb));
    let response = get(&service, "/metrics").await;
    let text = String::from_utf8(response.body.to_vec()).unwrap();
    assert!(text.contains("thumbnails_generated_total 1"));
}
