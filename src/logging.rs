//! Console logging setup using `tracing-subscriber`.
//!
//! Both commands are one-shot, so there is a single mode: human-readable
//! output on stderr, leaving stdout for command results.

use tracing_subscriber::EnvFilter;

/// Build the filter from `RUST_LOG`, falling back to `default_level`.
///
/// An unparsable `default_level` falls back to `warn`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialise console logging on stderr.
///
/// Controlled by `RUST_LOG`, defaulting to `default_level`.
pub fn init_cli(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .init();
}
