// Configuration loading and engine construction

use std::io::Write;
use thumbsmith::config::Config;
use thumbsmith::error::ThumbError;
use thumbsmith::thumb::Thumb;

#[test]
fn test_can_load_full_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r##"
server:
  address: "127.0.0.1"
  port: 9000
  url_prefix: /thumbs
defaults:
  path_images: /srv/images
  path_thumbs: /srv/thumbs
  quality: 65
  webp: true
  resize:
    width: 320
    height: 240
    method: crop
    align_x: left
    align_y: bottom
    background: "#FF0000"
  watermark:
    text: "(c) example"
    font_size: 14
remote:
  enabled: false
  ttl_seconds: 60
placeholder:
  base_url: https://placeholder.example.com/render
limits:
  max_source_width: 4000
"##
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.listen_address(), "127.0.0.1:9000");
    assert_eq!(config.server.url_prefix, "/thumbs");
    assert_eq!(config.defaults.quality, 65);
    assert!(config.defaults.webp);
    assert_eq!(config.defaults.resize.width, Some(320));
    assert_eq!(config.defaults.resize.background, "#FF0000");
    assert_eq!(config.defaults.watermark.text.as_deref(), Some("(c) example"));
    assert_eq!(config.defaults.watermark.font_size, 14.0);
    assert!(!config.remote.enabled);
    assert_eq!(config.remote.ttl_seconds, 60);
    assert_eq!(
        config.placeholder.base_url,
        "https://placeholder.example.com/render"
    );
    assert_eq!(config.limits.max_source_width, 4000);
    assert_eq!(config.limits.max_source_height, 10000);
}

#[test]
fn test_missing_config_file_is_configuration_error() {
    let err = Config::from_file("/nonexistent/thumbsmith.yaml").unwrap_err();
    assert!(matches!(err, ThumbError::Configuration(_)));
}

#[test]
fn test_malformed_yaml_is_configuration_error() {
    let err = Config::from_yaml_with_env("server: [unclosed").unwrap_err();
    assert!(matches!(err, ThumbError::Configuration(_)));
}

#[test]
fn test_quality_above_100_is_rejected() {
    let config = Config::from_yaml_with_env("defaults:\n  quality: 101\n").unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("quality"));
}

#[test]
fn test_engine_refuses_invalid_config() {
    let mut config = Config::default();
    config.server.port = 0;
    assert!(Thumb::from_config(config).is_err());
}

#[test]
fn test_engine_builds_from_default_config() {
    let thumb = Thumb::from_config(Config::default()).unwrap();
    assert_eq!(thumb.config().server.url_prefix, "/thumbnails");
    assert_eq!(thumb.metrics().thumbnails_generated(), 0);
}
