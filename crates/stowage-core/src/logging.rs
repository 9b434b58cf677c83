use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Install a fmt subscriber filtered by `RUST_LOG` (falling back to [`DEFAULT_FILTER`]).
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Like [`init`], but with a custom fallback filter.
pub fn init_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Subscriber for tests: output is captured by the test harness and the
/// fallback filter is `debug`.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
