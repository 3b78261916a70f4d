// Logging subscriber initialization

use thumbsmith::logging::init_subscriber;

/// Test: initialization is idempotent from the caller's point of view
///
/// The first call installs the global JSON subscriber; any later call
/// reports an error instead of panicking.
#[test]
fn test_second_initialization_reports_error() {
    let _ = init_subscriber();
    tracing::info!(component = "logging_tests", "subscriber installed");
    assert!(init_subscriber().is_err());
}
