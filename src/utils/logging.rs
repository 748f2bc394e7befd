use tracing_subscriber::{EnvFilter, fmt};

/// Initialize tracing/logging for the application.
///
/// `RUST_LOG` wins when set; otherwise `default_level` is used, falling back
/// to `info` if it cannot be parsed.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init so tests and libraries can call this multiple times without panicking
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
