//! Tracing subscriber setup.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so they never mix with
/// assistant output on stdout.
///
/// `RUST_LOG` wins over the configured level; `debug` forces `debug`.
/// Calling this twice is harmless.
pub fn init_logging(cfg: &LoggingConfig, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level))
    };

    let result = match cfg.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
