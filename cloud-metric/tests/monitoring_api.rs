//! HTTP-level tests for the Cloud Monitoring client, auth and identity
//!
//! Each test stands up a wiremock server in place of the Google endpoint.

use cloud_metric::auth::{GcpAuth, StaticToken, TokenSource};
use cloud_metric::client::{CloudMonitoringClient, MetricSink};
use cloud_metric::identity::{AutoIdentity, IdentityProvider, MetadataIdentity};
use cloud_metric::series::CreateTimeSeriesBody;
use cloud_metric::{Error, JobMetric, MetricPublisher, PublisherConfig, StaticIdentity};
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn publisher_for(server: &MockServer) -> anyhow::Result<MetricPublisher> {
    let config = PublisherConfig {
        endpoint: server.uri(),
        ..PublisherConfig::default()
    };
    let client =
        CloudMonitoringClient::from_config(&config, Arc::new(StaticToken::new("test-token")))?;
    Ok(MetricPublisher::new(
        config,
        Arc::new(client),
        Arc::new(StaticIdentity::new("app-project")),
    ))
}

#[tokio::test]
async fn test_create_time_series_request_shape() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/projects/proj1/timeSeries"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = publisher_for(&server)?;
    publisher
        .publish_frozen_job_metric("proj1", &JobMetric::new("job42", "perf", "FROZEN"), 1.0)
        .await;

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);

    let raw: serde_json::Value = requests[0].body_json()?;
    let series = &raw["timeSeries"][0];
    assert_eq!(
        series["metric"]["type"],
        "custom.googleapis.com/pinpoint/job/frozen_job"
    );
    assert_eq!(
        series["metric"]["labels"],
        json!({"job_id": "job42", "job_type": "perf", "job_status": "FROZEN"})
    );
    assert_eq!(series["resource"]["type"], "generic_task");
    assert_eq!(
        series["resource"]["labels"],
        json!({
            "project_id": "proj1",
            "location": "us-central1",
            "namespace": "Prod",
            "job": "pinpoint",
            "task_id": "task_id"
        })
    );
    assert_eq!(series["points"][0]["value"]["doubleValue"], 1.0);
    assert!(series["points"][0]["interval"]["endTime"]
        .as_str()
        .is_some_and(|t| t.ends_with('Z')));

    let decoded: CreateTimeSeriesBody = requests[0].body_json()?;
    assert_eq!(decoded.time_series.len(), 1);
    assert_eq!(decoded.time_series[0].points.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_non_success_status_is_api_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let client = CloudMonitoringClient::new(server.uri(), Arc::new(StaticToken::new("t")), None)?;
    let result = client.create_time_series("projects/p", &[]).await;

    match result {
        Err(Error::Api(msg)) => {
            assert!(msg.contains("429"));
            assert!(msg.contains("quota exceeded"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_publisher_swallows_backend_errors_without_retry() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = publisher_for(&server)?;
    publisher
        .publish_job_status_metric("proj1", &JobMetric::new("j", "t", "FAILED"), 1.0)
        .await;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_backend_is_swallowed() -> anyhow::Result<()> {
    let config = PublisherConfig {
        // Port 9 (discard) is closed on test machines
        endpoint: "http://127.0.0.1:9".to_string(),
        ..PublisherConfig::default()
    };
    let client = CloudMonitoringClient::from_config(&config, Arc::new(StaticToken::new("t")))?;
    let publisher =
        MetricPublisher::new(config, Arc::new(client), Arc::new(StaticIdentity::new("p")));

    publisher
        .publish_job_run_time_metric("p", &JobMetric::new("j", "t", "COMPLETED"), 3.0)
        .await;
    Ok(())
}

#[tokio::test]
async fn test_metadata_auth_fetches_and_caches_token() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/computeMetadata/v1/instance/service-accounts/default/email",
        ))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("metrics@proj.iam.gserviceaccount.com"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/computeMetadata/v1/instance/service-accounts/default/token",
        ))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = GcpAuth::from_metadata_server_at(&server.uri()).await?;
    assert_eq!(
        auth.service_account_email(),
        "metrics@proj.iam.gserviceaccount.com"
    );
    assert_eq!(auth.access_token().await?, "ya29.token");
    // Second call is served from the cache; the mock expects exactly one hit
    assert_eq!(auth.access_token().await?, "ya29.token");
    Ok(())
}

#[tokio::test]
async fn test_metadata_auth_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = GcpAuth::from_metadata_server_at(&server.uri()).await;
    assert!(matches!(result, Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_metadata_identity_resolves_project() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/project/project-id"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_string("chromeperf\n"))
        .mount(&server)
        .await;

    let identity = MetadataIdentity::with_base_url(&server.uri())?;
    assert_eq!(identity.project_id().await?, "chromeperf");
    Ok(())
}

#[tokio::test]
async fn test_metadata_identity_error_status() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let identity = MetadataIdentity::with_base_url(&server.uri())?;
    assert!(matches!(identity.project_id().await, Err(Error::Identity(_))));
    Ok(())
}

async fn metadata_project_server(project_id: &str, expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/project/project-id"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_string(project_id))
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_auto_identity_falls_back_to_metadata() -> anyhow::Result<()> {
    let server = metadata_project_server("chromeperf", 1).await;

    let identity = AutoIdentity::with_metadata(MetadataIdentity::with_base_url(&server.uri())?)
        .with_env_lookup(|_| None);
    assert_eq!(identity.project_id().await?, "chromeperf");
    Ok(())
}

#[tokio::test]
async fn test_auto_identity_prefers_environment() -> anyhow::Result<()> {
    let server = metadata_project_server("chromeperf", 0).await;

    let identity = AutoIdentity::with_metadata(MetadataIdentity::with_base_url(&server.uri())?)
        .with_env_lookup(|key| (key == "GCP_PROJECT_ID").then(|| "from-env".to_string()));
    assert_eq!(identity.project_id().await?, "from-env");
    Ok(())
}

#[tokio::test]
async fn test_auto_identity_errors_when_both_sources_fail() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let identity = AutoIdentity::with_metadata(MetadataIdentity::with_base_url(&server.uri())?)
        .with_env_lookup(|_| None);
    assert!(matches!(identity.project_id().await, Err(Error::Identity(_))));
    Ok(())
}
