//! Publisher configuration loading and validation.

use crate::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://monitoring.googleapis.com";
pub const DEFAULT_METRIC_TYPE_PREFIX: &str = "custom.googleapis.com/";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_NAMESPACE: &str = "Prod";
/// `generic_task` requires a task id; one constant placeholder is shared by all writers
pub const DEFAULT_TASK_ID: &str = "task_id";

/// What the scoped API timer does with an error returned by the timed work
///
/// Either way a `failed` point is published first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the error and hand the caller `Ok(None)`
    #[default]
    Suppress,
    /// Return the error to the caller unchanged
    Propagate,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suppress" => Ok(Self::Suppress),
            "propagate" => Ok(Self::Propagate),
            other => Err(Error::Config(format!(
                "failure_policy must be 'suppress' or 'propagate', got '{}'",
                other
            ))),
        }
    }
}

/// Configuration for publishing to Cloud Monitoring
#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    /// Cloud Monitoring API base URL
    pub endpoint: String,
    pub metric_type_prefix: String,
    pub location: String,
    pub namespace: String,
    pub task_id: String,
    /// Per-request timeout; `None` leaves the HTTP client's defaults in place
    pub request_timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
    /// When false every publish is skipped
    pub enabled: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            metric_type_prefix: DEFAULT_METRIC_TYPE_PREFIX.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            task_id: DEFAULT_TASK_ID.to_string(),
            request_timeout: None,
            failure_policy: FailurePolicy::default(),
            enabled: true,
        }
    }
}

impl PublisherConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables (all optional):
    /// - `CLOUD_METRIC_ENDPOINT`
    /// - `CLOUD_METRIC_TYPE_PREFIX`
    /// - `CLOUD_METRIC_LOCATION`
    /// - `CLOUD_METRIC_NAMESPACE`
    /// - `CLOUD_METRIC_TASK_ID`
    /// - `CLOUD_METRIC_TIMEOUT_SECS`
    /// - `CLOUD_METRIC_FAILURE_POLICY`: `suppress` | `propagate`
    /// - `CLOUD_METRIC_ENABLED`: `true` | `false`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let request_timeout = match lookup("CLOUD_METRIC_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: f64 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!("CLOUD_METRIC_TIMEOUT_SECS is not a number: {}", raw))
                })?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(Error::Config(
                        "CLOUD_METRIC_TIMEOUT_SECS must be positive".into(),
                    ));
                }
                let timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
                    Error::Config(format!("CLOUD_METRIC_TIMEOUT_SECS out of range: {}", e))
                })?;
                Some(timeout)
            }
            None => None,
        };

        let failure_policy = match lookup("CLOUD_METRIC_FAILURE_POLICY") {
            Some(raw) => raw.parse()?,
            None => defaults.failure_policy,
        };

        let enabled = match lookup("CLOUD_METRIC_ENABLED") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(Error::Config(format!(
                        "CLOUD_METRIC_ENABLED must be a boolean, got '{}'",
                        raw
                    )))
                }
            },
            None => defaults.enabled,
        };

        let cfg = Self {
            endpoint: lookup("CLOUD_METRIC_ENDPOINT").unwrap_or(defaults.endpoint),
            metric_type_prefix: lookup("CLOUD_METRIC_TYPE_PREFIX")
                .unwrap_or(defaults.metric_type_prefix),
            location: lookup("CLOUD_METRIC_LOCATION").unwrap_or(defaults.location),
            namespace: lookup("CLOUD_METRIC_NAMESPACE").unwrap_or(defaults.namespace),
            task_id: lookup("CLOUD_METRIC_TASK_ID").unwrap_or(defaults.task_id),
            request_timeout,
            failure_policy,
            enabled,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            return Err(Error::Config("endpoint must be a valid HTTP(S) URL".into()));
        }
        if self.metric_type_prefix.trim().is_empty() {
            return Err(Error::Config("metric_type_prefix cannot be empty".into()));
        }
        if !self.metric_type_prefix.ends_with('/') {
            return Err(Error::Config("metric_type_prefix must end with '/'".into()));
        }
        if self.location.trim().is_empty() {
            return Err(Error::Config("location cannot be empty".into()));
        }
        if self.namespace.trim().is_empty() {
            return Err(Error::Config("namespace cannot be empty".into()));
        }
        if self.task_id.trim().is_empty() {
            return Err(Error::Config("task_id cannot be empty".into()));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Config("request_timeout must be positive".into()));
        }
        Ok(())
    }

    /// Fully-qualified metric type for a suffix such as `pinpoint/job/run_time`
    pub fn metric_type(&self, suffix: &str) -> String {
        format!("{}{}", self.metric_type_prefix, suffix)
    }
}
