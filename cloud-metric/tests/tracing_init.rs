//! Global subscriber installation
//!
//! Kept in its own test binary so the installed subscriber does not leak
//! into other tests.

use cloud_metric::telemetry::{init_tracing, LogFormat, TracingConfig};

#[test]
fn test_second_init_is_an_error_not_a_panic() {
    let config = TracingConfig {
        format: LogFormat::Pretty,
        service_name: "cloud-metric-test".to_string(),
    };

    assert!(init_tracing(&config).is_ok());
    assert!(init_tracing(&config).is_err());
}
