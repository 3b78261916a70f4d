// Remote sources through the derivation engine, backed by an in-test source

use super::support::{png_bytes, thumb_with_remote, CountingSource};
use serde_json::json;
use thumbsmith::thumb::Derivation;

#[tokio::test]
async fn test_remote_source_is_mirrored_once() {
    let dir = tempfile::tempdir().unwrap();
    let source = CountingSource::serving(png_bytes(64, 48));
    let thumb = thumb_with_remote(dir.path(), source.clone());
    let options = thumb
        .options_with(&json!({"resize": {"width": 32, "height": 32}}))
        .unwrap();

    let url = "https://cdn.example.com/photos/cat.png";
    let first = thumb.get_or_create_thumbnail(url, &options).await.unwrap();
    let path = match &first {
        Derivation::Created(path) => path.clone(),
        other => panic!("expected created, got {:?}", other),
    };
    assert!(path.starts_with(dir.path().join("thumbs/cdn.example.com/photos")));
    assert!(dir.path().join("remote/cdn.example.com/photos/cat.png").exists());

    let second = thumb.get_or_create_thumbnail(url, &options).await.unwrap();
    assert_eq!(second, Derivation::Existing(path));

    assert_eq!(source.calls(), 1);
    assert_eq!(thumb.metrics().remote_fetches(), 1);
    assert_eq!(thumb.metrics().remote_mirror_hits(), 1);
}

#[tokio::test]
async fn test_failed_fetch_yields_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let source = CountingSource::failing();
    let thumb = thumb_with_remote(dir.path(), source.clone());
    let options = thumb
        .options_with(&json!({"resize": {"width": 120, "height": 90}}))
        .unwrap();

    let url = "https://cdn.example.com/missing.jpg";
    match thumb.get_or_create_thumbnail(url, &options).await.unwrap() {
        Derivation::Placeholder(placeholder) => {
            assert!(placeholder.contains("w=120"));
            assert!(placeholder.contains("h=90"));
            assert!(placeholder.contains("txt=Image%20not%20found"));
        }
        other => panic!("expected placeholder, got {:?}", other),
    }
    assert_eq!(source.calls(), 1);
    assert_eq!(thumb.metrics().placeholders_served(), 1);
    assert!(!dir.path().join("remote/cdn.example.com/missing.jpg").exists());
}

#[tokio::test]
async fn test_remote_describe_returns_thumbnail_url() {
    let dir = tempfile::tempdir().unwrap();
    let source = CountingSource::serving(png_bytes(10, 10));
    let thumb = thumb_with_remote(dir.path(), source.clone());
    let options = thumb.config().defaults.clone();

    let url = thumb
        .describe("https://cdn.example.com/a/b.png?v=2", &options)
        .await
        .unwrap();
    assert!(url.starts_with("/thumbnails/cdn.example.com/a/b-"));
    assert!(url.ends_with(".png"));
    assert_eq!(source.calls(), 1);
}
