//! Mock implementations of the external services the publisher talks to
//!
//! - [`MockMonitoringServer`]: wiremock stand-in for `monitoring.googleapis.com`
//! - [`MockMetadataServer`]: wiremock stand-in for the GCE metadata server
//! - [`RecordingSink`] / [`FailingSink`]: in-process [`MetricSink`]s
//! - [`FailingIdentity`]: an [`IdentityProvider`] that always errors

use async_trait::async_trait;
use cloud_metric::series::CreateTimeSeriesBody;
use cloud_metric::{
    CloudMonitoringClient, Error, IdentityProvider, MetricPublisher, MetricSink, PublisherConfig,
    Result, StaticIdentity, StaticToken, TimeSeries,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::{
    matchers::{header, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

/// Bearer token the mock monitoring server expects
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

const TIME_SERIES_PATH: &str = r"^/v3/projects/[^/]+/timeSeries$";

/// One series as received by a sink or mock server
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedWrite {
    /// `projects/{project_id}`
    pub project_name: String,
    pub series: TimeSeries,
}

/// Mock Cloud Monitoring API
///
/// # Example
///
/// ```ignore
/// let server = MockMonitoringServer::start().await;
/// let publisher = server.publisher("app-project");
/// publisher.publish_job_status_metric("proj", &job, 1.0).await;
/// assert_eq!(server.received().await.len(), 1);
/// ```
pub struct MockMonitoringServer {
    server: MockServer,
}

impl MockMonitoringServer {
    /// Accepts every authorized `timeSeries.create` call with 200
    pub async fn start() -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path_regex(TIME_SERIES_PATH))
            .and(header(
                "authorization",
                format!("Bearer {}", TEST_ACCESS_TOKEN).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        Self { server }
    }

    /// Answers every `timeSeries.create` call with `status`
    pub async fn start_failing(status: u16) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path_regex(TIME_SERIES_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"code": status, "message": "mock failure"}
            })))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Publisher wired to this server, reporting API metrics under `app_project`
    pub fn publisher(&self, app_project: &str) -> MetricPublisher {
        self.publisher_with(PublisherConfig::default(), app_project)
    }

    /// Same as [`publisher`](Self::publisher) with `config.endpoint` pointed here
    pub fn publisher_with(&self, config: PublisherConfig, app_project: &str) -> MetricPublisher {
        let config = PublisherConfig {
            endpoint: self.uri(),
            ..config
        };
        let client = CloudMonitoringClient::from_config(
            &config,
            Arc::new(StaticToken::new(TEST_ACCESS_TOKEN)),
        )
        .expect("Failed to build monitoring client");
        MetricPublisher::new(
            config,
            Arc::new(client),
            Arc::new(StaticIdentity::new(app_project)),
        )
    }

    /// Every series received so far, in arrival order
    pub async fn received(&self) -> Vec<ReceivedWrite> {
        let requests = self.server.received_requests().await.unwrap_or_default();

        requests
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .flat_map(|request| {
                let project_name = request
                    .url
                    .path()
                    .trim_start_matches("/v3/")
                    .trim_end_matches("/timeSeries")
                    .to_string();
                let body: CreateTimeSeriesBody = request
                    .body_json()
                    .expect("Request body is not a timeSeries.create payload");
                body.time_series
                    .into_iter()
                    .map(move |series| ReceivedWrite {
                        project_name: project_name.clone(),
                        series,
                    })
            })
            .collect()
    }

    /// Series only, in arrival order
    pub async fn received_series(&self) -> Vec<TimeSeries> {
        self.received().await.into_iter().map(|w| w.series).collect()
    }
}

/// Mock GCE metadata server
pub struct MockMetadataServer {
    server: MockServer,
}

impl MockMetadataServer {
    /// Serves `project_id`, a service account email, and an access token
    pub async fn start(project_id: &str) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/computeMetadata/v1/project/project-id"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_string(project_id))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(
                "/computeMetadata/v1/instance/service-accounts/default/email",
            ))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("metrics@{}.iam.gserviceaccount.com", project_id)),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(
                "/computeMetadata/v1/instance/service-accounts/default/token",
            ))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TEST_ACCESS_TOKEN,
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }
}

/// Sink that keeps every write in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<ReceivedWrite>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> Vec<ReceivedWrite> {
        self.writes.lock().expect("sink lock poisoned").clone()
    }

    pub fn series(&self) -> Vec<TimeSeries> {
        self.writes().into_iter().map(|w| w.series).collect()
    }

    pub fn len(&self) -> usize {
        self.writes.lock().expect("sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn create_time_series(&self, project_name: &str, series: &[TimeSeries]) -> Result<()> {
        let mut writes = self.writes.lock().expect("sink lock poisoned");
        writes.extend(series.iter().cloned().map(|series| ReceivedWrite {
            project_name: project_name.to_string(),
            series,
        }));
        Ok(())
    }
}

/// Sink whose every write fails with an API error
#[derive(Debug, Default)]
pub struct FailingSink;

#[async_trait]
impl MetricSink for FailingSink {
    async fn create_time_series(&self, _project_name: &str, _series: &[TimeSeries]) -> Result<()> {
        Err(Error::Api(
            "Cloud Monitoring API returned 503 Service Unavailable".to_string(),
        ))
    }
}

/// Identity provider with no project to offer
#[derive(Debug, Default)]
pub struct FailingIdentity;

#[async_trait]
impl IdentityProvider for FailingIdentity {
    async fn project_id(&self) -> Result<String> {
        Err(Error::Identity("project id not set".to_string()))
    }
}
