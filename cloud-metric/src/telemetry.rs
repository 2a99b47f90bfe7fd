//! Tracing setup for binaries that embed the publisher.
//!
//! # Configuration
//!
//! ```bash
//! # Log format: json (Cloud Logging) or pretty (local development)
//! export CLOUD_METRIC_LOG_FORMAT=json
//!
//! # Service name attached to the startup log line
//! export CLOUD_METRIC_SERVICE_NAME=pinpoint
//!
//! # Standard filter directives
//! export RUST_LOG=cloud_metric=debug
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "cloud_metric=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Configuration for log output.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: LogFormat,
    pub service_name: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::from_environment()
    }
}

impl TracingConfig {
    /// Load configuration from environment variables.
    ///
    /// - `CLOUD_METRIC_LOG_FORMAT`: `json` (default) or `pretty`
    /// - `CLOUD_METRIC_SERVICE_NAME`: defaults to `cloud-metric`
    pub fn from_environment() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup("CLOUD_METRIC_LOG_FORMAT")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            Some("pretty") | Some("text") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Self {
            format,
            service_name: lookup("CLOUD_METRIC_SERVICE_NAME")
                .unwrap_or_else(|| "cloud-metric".to_string()),
        }
    }
}

/// Install the global subscriber.
///
/// JSON output matches what Cloud Logging parses into structured entries.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(
    config: &TracingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?,
    }

    tracing::info!(service_name = %config.service_name, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TracingConfig::from_lookup(|_| None);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.service_name, "cloud-metric");
    }

    #[test]
    fn test_pretty_format_and_service_name() {
        let config = TracingConfig::from_lookup(|key| match key {
            "CLOUD_METRIC_LOG_FORMAT" => Some("PRETTY".to_string()),
            "CLOUD_METRIC_SERVICE_NAME" => Some("pinpoint".to_string()),
            _ => None,
        });
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.service_name, "pinpoint");
    }
}
