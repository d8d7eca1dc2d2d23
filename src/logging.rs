use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber. Logs go to stderr; `RUST_LOG` overrides
/// the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    // A second init (tests, embedding callers) keeps the first subscriber.
    let _ = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.compact().with_target(false).try_init(),
    };
}
