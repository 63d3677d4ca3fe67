//! Logging initialization for topowatch-daemon.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `TopowatchConfig`. Output goes to stderr so stdout stays free for
//! `--validate` reports.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use topowatch_core::config::GeneralConfig;

/// Build the level filter. `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &GeneralConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default for production)
/// * `"pretty"` - Human-readable multi-line output (for development)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = env_filter(config);

    match config.log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)),
        "pretty" => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)),
        other => Err(anyhow::anyhow!(
            "unknown log format '{}', expected 'json' or 'pretty'",
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..GeneralConfig::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("xml"));
    }
}
