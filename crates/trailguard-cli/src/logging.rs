//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout carries only command output.

use crate::config::{LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Map a configured level name to a tracing level, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(parse_level(&config.level).to_string()),
    }
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_filter(config);

    match config.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    #[serial_test::serial]
    fn test_rust_log_wins() {
        unsafe {
            std::env::set_var("RUST_LOG", "trailguard_egress=trace");
        }

        let filter = build_filter(&LoggingConfig::default());
        assert_eq!(filter.to_string().to_lowercase(), "trailguard_egress=trace");

        unsafe {
            std::env::remove_var("RUST_LOG");
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_configured_level_used_without_rust_log() {
        unsafe {
            std::env::remove_var("RUST_LOG");
        }

        let config = LoggingConfig {
            level: "error".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(build_filter(&config).to_string().to_lowercase(), "error");
    }
}
