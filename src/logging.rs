//! Tracing subscriber setup.
//!
//! Logs go to stderr so that stdout stays reserved for JSON responses.

use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;

/// Builds the filter: `RUST_LOG` wins, otherwise the configured level for this crate.
pub fn env_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,etl_lib={level},etl={level}",
            level = settings.level.to_ascii_lowercase()
        ))
    })
}

/// Installs the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init(settings: &LogSettings) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(settings))
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = result {
        tracing::debug!("tracing subscriber already installed: {err}");
    }
}
