//! Custom assertions for published series and captured logs
//!
//! Assertion helpers that give better error messages than bare `assert_eq!`
//! on nested label maps.

use cloud_metric::config::DEFAULT_METRIC_TYPE_PREFIX;
use cloud_metric::series::labels;
use cloud_metric::TimeSeries;
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Chained assertions over one series
pub struct SeriesAssertions<'a> {
    series: &'a TimeSeries,
}

impl<'a> SeriesAssertions<'a> {
    pub fn new(series: &'a TimeSeries) -> Self {
        Self { series }
    }

    /// Assert the metric type equals the default prefix plus `suffix`
    pub fn assert_metric_type(self, suffix: &str) -> Self {
        let expected = format!("{}{}", DEFAULT_METRIC_TYPE_PREFIX, suffix);
        assert_eq!(
            self.series.metric.metric_type, expected,
            "Expected metric type {} but got {}",
            expected, self.series.metric.metric_type
        );
        self
    }

    /// Assert the metric labels are exactly `expected`
    pub fn assert_labels_exact(self, expected: &[(&str, &str)]) -> Self {
        let actual: Vec<(&str, &str)> = self
            .series
            .metric
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let mut expected = expected.to_vec();
        expected.sort_unstable();
        assert_eq!(actual, expected, "Metric labels differ");
        self
    }

    /// Assert the metric carries exactly these label keys
    pub fn assert_label_keys(self, expected: &[&str]) -> Self {
        let actual: HashSet<&str> = self.series.metric.labels.keys().map(String::as_str).collect();
        let expected: HashSet<&str> = expected.iter().copied().collect();
        assert_eq!(actual, expected, "Metric label keys differ");
        self
    }

    pub fn assert_metric_label(self, key: &str, value: &str) -> Self {
        assert_eq!(
            self.series.metric_label(key),
            Some(value),
            "Metric label {} mismatch",
            key
        );
        self
    }

    pub fn assert_resource_label(self, key: &str, value: &str) -> Self {
        assert_eq!(
            self.series.resource_label(key),
            Some(value),
            "Resource label {} mismatch",
            key
        );
        self
    }

    pub fn assert_request_status(self, status: &str) -> Self {
        self.assert_metric_label(labels::REQUEST_STATUS, status)
    }

    /// Assert exactly one point with this value
    pub fn assert_value(self, expected: f64) -> Self {
        assert_eq!(self.series.points.len(), 1, "Expected exactly one point");
        assert_eq!(self.series.value(), Some(expected), "Point value mismatch");
        self
    }

    /// Assert exactly one point whose value lies in `[low, high]`
    pub fn assert_value_between(self, low: f64, high: f64) -> Self {
        assert_eq!(self.series.points.len(), 1, "Expected exactly one point");
        let value = self.series.value().unwrap_or(f64::NAN);
        assert!(
            (low..=high).contains(&value),
            "Point value {} outside [{}, {}]",
            value,
            low,
            high
        );
        self
    }
}

/// Assert every series carries a `uuid` label and no two share one
pub fn assert_unique_uuids(series: &[TimeSeries]) {
    let mut seen = HashSet::new();
    for s in series {
        let uuid = s
            .metric_label(labels::UUID)
            .unwrap_or_else(|| panic!("series {} has no uuid label", s.metric.metric_type));
        assert!(
            uuid::Uuid::parse_str(uuid).is_ok(),
            "uuid label {} is not a UUID",
            uuid
        );
        assert!(seen.insert(uuid.to_string()), "duplicate uuid label {}", uuid);
    }
}

/// `request_status` labels in order
pub fn request_statuses(series: &[TimeSeries]) -> Vec<String> {
    series
        .iter()
        .filter_map(|s| s.metric_label(labels::REQUEST_STATUS).map(str::to_string))
        .collect()
}

/// In-memory log sink for asserting on emitted events
///
/// # Example
///
/// ```ignore
/// let logs = CapturedLogs::default();
/// let _guard = logs.set_default();
/// publisher.publish_job_status_metric("p", &job, 1.0).await;
/// logs.assert_contains("WARN");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Route this thread's events here until the guard drops
    pub fn set_default(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().expect("log lock poisoned")).into_owned()
    }

    pub fn assert_contains(&self, needle: &str) {
        let contents = self.contents();
        assert!(
            contents.contains(needle),
            "Expected logs to contain {:?}, got:\n{}",
            needle,
            contents
        );
    }

    /// Lines containing `level` (e.g. `"WARN"`) and `needle`
    pub fn count_lines(&self, level: &str, needle: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(level) && line.contains(needle))
            .count()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .expect("log lock poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
