//! Prometheus self-metrics for the publisher
//!
//! These describe the publisher's own behavior (how many writes reached Cloud
//! Monitoring, how long they took). They are registered in the default
//! registry so a host service exposing `/metrics` picks them up.

use prometheus::{register_histogram, register_histogram_vec, register_int_counter_vec};
use prometheus::{Histogram, HistogramVec, IntCounterVec};
use std::sync::LazyLock;

/// Publish attempts by outcome.
///
/// Labels:
/// - `status`: success | failure | skipped
pub static PUBLISH_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "cloud_metric_publish_total",
        "Number of time series publish attempts by outcome",
        &["status"]
    )
    .expect("cloud_metric_publish_total metric registration")
});

/// Duration of one `timeSeries.create` round trip, token acquisition included.
///
/// Buckets: 10ms to 30s
pub static PUBLISH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "cloud_metric_publish_duration_seconds",
        "Duration of Cloud Monitoring publish calls",
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("cloud_metric_publish_duration_seconds metric registration")
});

/// Duration of OAuth2 access token acquisition.
///
/// Labels:
/// - `cache_hit`: true | false
pub static TOKEN_ACQUISITION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "cloud_metric_token_acquisition_duration_seconds",
        "Duration of OAuth2 token acquisition",
        &["cache_hit"],
        vec![0.001, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("cloud_metric_token_acquisition_duration_seconds metric registration")
});

pub(crate) fn record_publish(status: &str) {
    PUBLISH_TOTAL.with_label_values(&[status]).inc();
}
