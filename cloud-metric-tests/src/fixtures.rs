//! Test data factories for publisher tests
//!
//! Pre-built jobs, configs and publishers with sensible defaults.

use crate::mocks::{FailingIdentity, FailingSink, RecordingSink};
use cloud_metric::{FailurePolicy, MetricPublisher, PublisherConfig, StaticIdentity};
use std::sync::Arc;

/// Project the scoped timer reports under in fixtures
pub const APP_PROJECT: &str = "chromeperf-test";

/// Job fixture factories
pub mod job {
    use cloud_metric::JobMetric;

    pub fn frozen() -> JobMetric {
        JobMetric::new("job42", "perf", "FROZEN")
    }

    pub fn completed() -> JobMetric {
        JobMetric::new("job43", "bisect", "COMPLETED")
    }

    pub fn with_status(status: &str) -> JobMetric {
        JobMetric::new("job44", "perf", status)
    }
}

/// Config fixture factories
pub mod config {
    use super::*;

    pub fn with_policy(policy: FailurePolicy) -> PublisherConfig {
        PublisherConfig {
            failure_policy: policy,
            ..PublisherConfig::default()
        }
    }

    pub fn disabled() -> PublisherConfig {
        PublisherConfig {
            enabled: false,
            ..PublisherConfig::default()
        }
    }
}

/// Publisher fixture factories
pub mod publisher {
    use super::*;

    /// Publisher writing into a fresh [`RecordingSink`]
    pub fn recording() -> (MetricPublisher, Arc<RecordingSink>) {
        recording_with(PublisherConfig::default())
    }

    pub fn recording_with(config: PublisherConfig) -> (MetricPublisher, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let publisher = MetricPublisher::new(
            config,
            sink.clone(),
            Arc::new(StaticIdentity::new(APP_PROJECT)),
        );
        (publisher, sink)
    }

    /// Publisher whose every send fails
    pub fn failing() -> MetricPublisher {
        MetricPublisher::new(
            PublisherConfig::default(),
            Arc::new(FailingSink),
            Arc::new(StaticIdentity::new(APP_PROJECT)),
        )
    }

    /// Recording publisher that cannot resolve its own project id
    pub fn without_identity() -> (MetricPublisher, Arc<RecordingSink>) {
        without_identity_with(PublisherConfig::default())
    }

    pub fn without_identity_with(config: PublisherConfig) -> (MetricPublisher, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        let publisher = MetricPublisher::new(config, sink.clone(), Arc::new(FailingIdentity));
        (publisher, sink)
    }
}
