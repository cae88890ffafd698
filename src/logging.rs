//! Log subscriber setup.
//!
//! `RUST_LOG` picks the filter (default `info`), for example
//! `RUST_LOG=pack_advisor=debug`.

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Call once, before the server starts.
///
/// # Examples
/// ```no_run
/// use pack_advisor::{config::LoggingConfig, logging};
/// logging::init(&LoggingConfig::from_env());
/// ```
pub fn init(config: &LoggingConfig) {
    match config.format {
        LogFormat::Pretty => fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .with_line_number(true)
            .init(),
        LogFormat::Json => fmt()
            .with_env_filter(env_filter())
            .with_target(true)
            .json()
            .init(),
    }
}

/// Debug-level subscriber writing to the test harness. Safe to call from
/// every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
