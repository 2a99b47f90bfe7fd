//! Cloud Monitoring `timeSeries.create` client

use crate::auth::TokenSource;
use crate::config::PublisherConfig;
use crate::series::{CreateTimeSeriesRequest, TimeSeries};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Delivers one batch of series to a monitoring backend
///
/// `project_name` is the fully-qualified `projects/{project_id}` resource name.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn create_time_series(&self, project_name: &str, series: &[TimeSeries]) -> Result<()>;
}

/// REST client for the Cloud Monitoring v3 API
///
/// Sends exactly one request per call. There is no retry: a failed write is
/// reported to the caller, which decides whether to care.
pub struct CloudMonitoringClient {
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
    http_client: reqwest::Client,
}

impl CloudMonitoringClient {
    /// Create a client for `endpoint` (e.g. `https://monitoring.googleapis.com`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        endpoint: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
            http_client,
        })
    }

    pub fn from_config(config: &PublisherConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        Self::new(config.endpoint.clone(), tokens, config.request_timeout)
    }

    /// URL of the `timeSeries.create` method for a project resource name
    pub fn time_series_url(&self, project_name: &str) -> String {
        format!("{}/v3/{}/timeSeries", self.endpoint, project_name)
    }
}

#[async_trait]
impl MetricSink for CloudMonitoringClient {
    async fn create_time_series(&self, project_name: &str, series: &[TimeSeries]) -> Result<()> {
        let access_token = self.tokens.access_token().await?;
        let api_url = self.time_series_url(project_name);

        let response = self
            .http_client
            .post(&api_url)
            .bearer_auth(access_token)
            .json(&CreateTimeSeriesRequest {
                time_series: series,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                project = %project_name,
                series = series.len(),
                "Cloud Monitoring accepted time series"
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Api(format!(
            "Cloud Monitoring API returned {}: {}",
            status, body
        )))
    }
}
