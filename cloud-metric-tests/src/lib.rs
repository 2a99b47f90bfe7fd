//! Shared test utilities for the cloud-metric crates
//!
//! This crate provides:
//! - **Fixtures**: Pre-built jobs, configs and publishers
//! - **Mocks**: Stand-ins for Cloud Monitoring, the metadata server, and sinks
//! - **Assertions**: Chained checks over published series, plus log capture
//!
//! # Example
//!
//! ```ignore
//! use cloud_metric_tests::{assertions::SeriesAssertions, fixtures, mocks};
//!
//! #[tokio::test]
//! async fn test_frozen_job() {
//!     let server = mocks::MockMonitoringServer::start().await;
//!     let publisher = server.publisher(fixtures::APP_PROJECT);
//!
//!     publisher
//!         .publish_frozen_job_metric("proj1", &fixtures::job::frozen(), 1.0)
//!         .await;
//!
//!     let series = server.received_series().await;
//!     SeriesAssertions::new(&series[0]).assert_value(1.0);
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use assertions::{assert_unique_uuids, CapturedLogs, SeriesAssertions};
pub use fixtures::{job, publisher, APP_PROJECT};
pub use mocks::{MockMetadataServer, MockMonitoringServer, RecordingSink};
