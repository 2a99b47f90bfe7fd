//! Time series data model for the Cloud Monitoring v3 REST API
//!
//! Mirrors the subset of `projects.timeSeries.create` used here: one metric
//! descriptor, one `generic_task` resource, and a single double-valued point
//! per series. Field names serialize in the API's camelCase JSON form.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Metric or resource labels. Keys are unique; order carries no meaning.
pub type LabelMap = BTreeMap<String, String>;

/// Monitored resource type for every series published by this crate
pub const RESOURCE_TYPE: &str = "generic_task";

/// Resource `job` label used by the job metric helpers
pub const PINPOINT_SERVICE: &str = "pinpoint";

/// Label keys
pub mod labels {
    pub const JOB_ID: &str = "job_id";
    pub const JOB_TYPE: &str = "job_type";
    pub const JOB_STATUS: &str = "job_status";
    pub const API_NAME: &str = "api_name";
    pub const REQUEST_STATUS: &str = "request_status";
    pub const UUID: &str = "uuid";

    // Resource labels required by `generic_task`
    pub const PROJECT_ID: &str = "project_id";
    pub const LOCATION: &str = "location";
    pub const NAMESPACE: &str = "namespace";
    pub const JOB: &str = "job";
    pub const TASK_ID: &str = "task_id";
}

/// Metric type suffixes, appended to the configured prefix
pub mod metric_types {
    pub const FROZEN_JOB: &str = "pinpoint/job/frozen_job";
    pub const JOB_STATUS_CHANGE: &str = "pinpoint/job/status_change";
    pub const JOB_RUN_TIME: &str = "pinpoint/job/run_time";
    pub const CHANGE_COUNT_PER_JOB: &str = "pinpoint/job/change_count_per_job";
    pub const ATTEMPT_COUNT_PER_JOB: &str = "pinpoint/job/attempt_count_per_job";
    pub const DIFFERENCE_COUNT_PER_JOB: &str = "pinpoint/job/difference_count_per_job";
    pub const API_METRICS: &str = "api/metrics";
}

/// Wall-clock instant split into whole seconds and the nanosecond remainder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Convert a `SystemTime`; instants before the Unix epoch clamp to it
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            seconds: i64::try_from(since_epoch.as_secs()).unwrap_or(i64::MAX),
            nanos: since_epoch.subsec_nanos(),
        }
    }

    /// RFC 3339 rendering in UTC with nanosecond precision, as the REST API expects
    pub fn to_rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.seconds, self.nanos)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Parse an RFC 3339 timestamp
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        let parsed = DateTime::parse_from_rfc3339(value).ok()?;
        Some(Self {
            seconds: parsed.timestamp(),
            nanos: parsed.timestamp_subsec_nanos(),
        })
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_rfc3339(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC 3339 timestamp: {raw}")))
    }
}

/// Metric descriptor: fully-qualified type plus metric labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default)]
    pub labels: LabelMap,
}

/// The reporting entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub labels: LabelMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    pub end_time: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    pub double_value: f64,
}

/// One (timestamp, value) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub interval: TimeInterval,
    pub value: TypedValue,
}

impl Point {
    pub fn new(end_time: Timestamp, value: f64) -> Self {
        Self {
            interval: TimeInterval { end_time },
            value: TypedValue {
                double_value: value,
            },
        }
    }
}

/// A labeled series carrying the points of one write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub metric: Metric,
    pub resource: MonitoredResource,
    pub points: Vec<Point>,
}

impl TimeSeries {
    /// Label value on the metric, if present
    pub fn metric_label(&self, key: &str) -> Option<&str> {
        self.metric.labels.get(key).map(String::as_str)
    }

    /// Label value on the resource, if present
    pub fn resource_label(&self, key: &str) -> Option<&str> {
        self.resource.labels.get(key).map(String::as_str)
    }

    /// Value of the first point
    pub fn value(&self) -> Option<f64> {
        self.points.first().map(|p| p.value.double_value)
    }
}

/// Request body for `projects.timeSeries.create`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimeSeriesRequest<'a> {
    pub time_series: &'a [TimeSeries],
}

/// Decoded form of [`CreateTimeSeriesRequest`], for inspecting captured requests
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimeSeriesBody {
    pub time_series: Vec<TimeSeries>,
}
