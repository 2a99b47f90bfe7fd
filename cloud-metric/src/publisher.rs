//! Metric publisher and job metric helpers
//!
//! Every operation here builds one `generic_task` series per point and sends
//! it with a single `timeSeries.create` call. Failures are logged and
//! swallowed: instrumentation must never break the code it observes.

use crate::auth::GcpAuth;
use crate::client::{CloudMonitoringClient, MetricSink};
use crate::config::PublisherConfig;
use crate::identity::{AutoIdentity, IdentityProvider};
use crate::metrics::{record_publish, PUBLISH_DURATION};
use crate::series::{
    labels, metric_types, LabelMap, Metric, MonitoredResource, Point, TimeSeries, Timestamp,
    PINPOINT_SERVICE, RESOURCE_TYPE,
};
use crate::timer::{ApiMetricScope, RequestStatus};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Value used for event-style metrics that only count occurrences
pub const DEFAULT_METRIC_VALUE: f64 = 1.0;

/// Labels identifying a job for the `pinpoint/job/*` series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMetric {
    pub job_id: String,
    pub job_type: String,
    pub job_status: String,
}

impl JobMetric {
    pub fn new(
        job_id: impl Into<String>,
        job_type: impl Into<String>,
        job_status: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_type: job_type.into(),
            job_status: job_status.into(),
        }
    }

    pub fn labels(&self) -> LabelMap {
        LabelMap::from([
            (labels::JOB_ID.to_string(), self.job_id.clone()),
            (labels::JOB_TYPE.to_string(), self.job_type.clone()),
            (labels::JOB_STATUS.to_string(), self.job_status.clone()),
        ])
    }
}

/// Per-job counters published by [`MetricPublisher::publish_job_detail_metrics`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobDetailCounts {
    pub change_count: f64,
    pub attempt_count: f64,
    pub difference_count: f64,
}

impl JobDetailCounts {
    /// `difference_count` defaults to 1
    pub fn new(change_count: f64, attempt_count: f64) -> Self {
        Self {
            change_count,
            attempt_count,
            difference_count: DEFAULT_METRIC_VALUE,
        }
    }

    pub fn with_difference_count(mut self, difference_count: f64) -> Self {
        self.difference_count = difference_count;
        self
    }
}

/// Publishes labeled points to Cloud Monitoring
///
/// Cheap to clone; clones share the sink and identity provider.
#[derive(Clone)]
pub struct MetricPublisher {
    config: Arc<PublisherConfig>,
    sink: Arc<dyn MetricSink>,
    identity: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for MetricPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricPublisher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetricPublisher {
    pub fn new(
        config: PublisherConfig,
        sink: Arc<dyn MetricSink>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sink,
            identity,
        }
    }

    /// Build a publisher for the real Cloud Monitoring API
    ///
    /// Configuration comes from the environment, credentials from
    /// [`GcpAuth::auto`], and the project id from [`AutoIdentity`].
    ///
    /// # Errors
    ///
    /// Construction failures (bad config, no credentials, HTTP client) are
    /// returned to the caller. Only sends are best-effort.
    pub async fn from_env() -> Result<Self> {
        let config = PublisherConfig::from_env()?;
        let auth = Arc::new(GcpAuth::auto().await?);
        let client = CloudMonitoringClient::from_config(&config, auth)?;
        let identity = AutoIdentity::new()?;
        Ok(Self::new(config, Arc::new(client), Arc::new(identity)))
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Point on `pinpoint/job/frozen_job`
    pub async fn publish_frozen_job_metric(&self, project_id: &str, job: &JobMetric, value: f64) {
        self.publish_job_metric(project_id, metric_types::FROZEN_JOB, job, value).await;
    }

    /// Point on `pinpoint/job/status_change`
    pub async fn publish_job_status_metric(&self, project_id: &str, job: &JobMetric, value: f64) {
        self.publish_job_metric(project_id, metric_types::JOB_STATUS_CHANGE, job, value).await;
    }

    /// Point on `pinpoint/job/run_time`; `run_time_seconds` is the job's duration
    pub async fn publish_job_run_time_metric(
        &self,
        project_id: &str,
        job: &JobMetric,
        run_time_seconds: f64,
    ) {
        self.publish_job_metric(project_id, metric_types::JOB_RUN_TIME, job, run_time_seconds)
            .await;
    }

    /// Three points sharing the job labels: change, attempt and difference counts
    pub async fn publish_job_detail_metrics(
        &self,
        project_id: &str,
        job: &JobMetric,
        counts: JobDetailCounts,
    ) {
        let detail = [
            (metric_types::CHANGE_COUNT_PER_JOB, counts.change_count),
            (metric_types::ATTEMPT_COUNT_PER_JOB, counts.attempt_count),
            (metric_types::DIFFERENCE_COUNT_PER_JOB, counts.difference_count),
        ];
        for (metric_type, value) in detail {
            self.publish_job_metric(project_id, metric_type, job, value).await;
        }
    }

    async fn publish_job_metric(
        &self,
        project_id: &str,
        metric_type: &str,
        job: &JobMetric,
        value: f64,
    ) {
        self.publish_metric(project_id, PINPOINT_SERVICE, metric_type, job.labels(), value).await;
    }

    /// Scoped timer for one API call of `service_name`
    pub fn api_scope(
        &self,
        service_name: impl Into<String>,
        api_name: impl Into<String>,
    ) -> ApiMetricScope {
        ApiMetricScope::new(self.clone(), service_name, api_name)
    }

    /// Point on `api/metrics` under the application's own project
    ///
    /// A fresh `uuid` label keeps every write distinct; Cloud Monitoring
    /// accepts one write per 5s for a given label tuple.
    pub(crate) async fn publish_api_metric(
        &self,
        service_name: &str,
        api_name: &str,
        status: RequestStatus,
        value: f64,
    ) {
        if !self.config.enabled {
            record_publish("skipped");
            debug!(api = %api_name, "Metric publishing disabled, skipping");
            return;
        }

        let project_id = match self.identity.project_id().await {
            Ok(project_id) => project_id,
            Err(e) => {
                record_publish("failure");
                warn!(
                    error = %e,
                    service = %service_name,
                    api = %api_name,
                    "Publish data to Cloud Monitoring failed: project id unavailable"
                );
                return;
            }
        };

        let labels = LabelMap::from([
            (labels::API_NAME.to_string(), api_name.to_string()),
            (
                labels::REQUEST_STATUS.to_string(),
                status.as_str().to_string(),
            ),
            (labels::UUID.to_string(), Uuid::new_v4().to_string()),
        ]);

        self.publish_metric(
            &project_id,
            service_name,
            metric_types::API_METRICS,
            labels,
            value,
        )
        .await;
    }

    /// Publish one point on `{prefix}{metric_type}`
    ///
    /// Never fails: send errors are logged at warn level and dropped.
    pub async fn publish_metric(
        &self,
        project_id: &str,
        service_name: &str,
        metric_type: &str,
        labels: LabelMap,
        value: f64,
    ) {
        if !self.config.enabled {
            record_publish("skipped");
            debug!(metric_type = %metric_type, "Metric publishing disabled, skipping");
            return;
        }

        let project_name = format!("projects/{}", project_id);
        let series = self.build_series(
            project_id,
            service_name,
            metric_type,
            labels,
            value,
            Timestamp::now(),
        );

        let timer = PUBLISH_DURATION.start_timer();
        let result = self
            .sink
            .create_time_series(&project_name, std::slice::from_ref(&series))
            .await;
        timer.observe_duration();

        match result {
            Ok(()) => {
                record_publish("success");
                debug!(
                    metric_type = %series.metric.metric_type,
                    project = %project_id,
                    value,
                    "Published metric point"
                );
            }
            Err(e) => {
                record_publish("failure");
                warn!(
                    error = %e,
                    metric_type = %series.metric.metric_type,
                    project = %project_id,
                    "Publish data to Cloud Monitoring failed"
                );
            }
        }
    }

    /// Assemble the single-point series for one write
    pub fn build_series(
        &self,
        project_id: &str,
        service_name: &str,
        metric_type: &str,
        labels: LabelMap,
        value: f64,
        end_time: Timestamp,
    ) -> TimeSeries {
        let resource_labels = LabelMap::from([
            (labels::PROJECT_ID.to_string(), project_id.to_string()),
            (labels::LOCATION.to_string(), self.config.location.clone()),
            (labels::NAMESPACE.to_string(), self.config.namespace.clone()),
            (labels::JOB.to_string(), service_name.to_string()),
            (labels::TASK_ID.to_string(), self.config.task_id.clone()),
        ]);

        TimeSeries {
            metric: Metric {
                metric_type: self.config.metric_type(metric_type),
                labels,
            },
            resource: MonitoredResource {
                resource_type: RESOURCE_TYPE.to_string(),
                labels: resource_labels,
            },
            points: vec![Point::new(end_time, value)],
        }
    }
}
