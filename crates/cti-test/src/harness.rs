//! Test harness helpers.

use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test writer so it is captured per
/// test and shown only on failure.
///
/// Safe to call from every test; only the first call installs a subscriber.
///
/// ```rust,ignore
/// #[test]
/// fn my_test() {
///     setup_test_logging("cti_sdk=debug");
///     // ... test code
/// }
/// ```
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with the default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}
