//! Structured logging setup for the CLI

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::domain::CacheError;

/// Installs the global subscriber, writing to stderr
///
/// Directives from `RUST_LOG` take precedence over the configured level.
/// Fails when the directives cannot be parsed or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), CacheError> {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    installed.map_err(|e| CacheError::configuration(format!("Failed to install logger: {}", e)))
}

fn log_filter(env_directives: Option<&str>, level: &str) -> Result<EnvFilter, CacheError> {
    let directives = env_directives
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .unwrap_or(level);

    EnvFilter::try_new(directives).map_err(|e| {
        CacheError::configuration(format!("Invalid log directives '{}': {}", directives, e))
    })
}
