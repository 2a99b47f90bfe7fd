//! # Cloud Metric
//!
//! Publishes application metrics (job status, run time, API call outcomes)
//! to Google Cloud Monitoring as custom `generic_task` time series.
//!
//! Publishing is best-effort: a failed send is logged at warn level and
//! never surfaces to the caller. See [`MetricPublisher`] for the job helpers
//! and [`timer`] for the scoped API-call timer.

pub mod auth;
pub mod client;
pub mod config;
pub mod identity;
pub mod metrics;
pub mod publisher;
pub mod series;
pub mod telemetry;
pub mod timer;

// Re-export commonly used types
pub use auth::{GcpAuth, StaticToken, TokenSource};
pub use client::{CloudMonitoringClient, MetricSink};
pub use config::{FailurePolicy, PublisherConfig};
pub use identity::{IdentityProvider, StaticIdentity};
pub use publisher::{JobDetailCounts, JobMetric, MetricPublisher, DEFAULT_METRIC_VALUE};
pub use series::{LabelMap, TimeSeries, Timestamp};
pub use timer::{api_metric, ApiMetricGuard, ApiMetricScope, InstrumentedFn, RequestStatus};

/// Result type for metric publishing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for metric publishing operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cloud Monitoring API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
