// Error categorization as seen by callers

use thumbsmith::error::ThumbError;

#[test]
fn test_http_status_mapping() {
    let cases = [
        (ThumbError::configuration("bad"), 500),
        (ThumbError::SourceNotFound("a.jpg".into()), 404),
        (
            ThumbError::SourceUnreadable {
                path: "a.jpg".into(),
                message: "permission denied".into(),
            },
            404,
        ),
        (ThumbError::remote_fetch("https://x/a.jpg", "timeout"), 502),
        (ThumbError::decode("truncated"), 415),
        (ThumbError::encode("webp", "failed"), 500),
        (
            ThumbError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")),
            500,
        ),
    ];
    for (error, status) in cases {
        assert_eq!(error.to_http_status(), status, "{}", error);
    }
}

#[test]
fn test_io_errors_convert() {
    fn read() -> Result<Vec<u8>, ThumbError> {
        Ok(std::fs::read("/nonexistent/thumbsmith/source.jpg")?)
    }
    let err = read().unwrap_err();
    assert!(matches!(err, ThumbError::Io(_)));
    assert!(!err.is_recoverable());
}
