//! Scoped API-call timer
//!
//! Reports each API call as two points on `api/metrics`: `started` when the
//! work begins, then `completed` (value = elapsed seconds) or `failed`
//! (value = 1) when it ends.
//!
//! # Failure handling
//!
//! By default ([`FailurePolicy::Suppress`]) an error returned by the timed
//! work is logged and **swallowed**: [`ApiMetricScope::run`] returns
//! `Ok(None)` and the caller never sees the error. Use
//! [`FailurePolicy::Propagate`] (per scope, or `CLOUD_METRIC_FAILURE_POLICY`)
//! to get the error back.
//!
//! ```ignore
//! let rows = publisher
//!     .api_scope("pinpoint", "jobs.list")
//!     .run(async { fetch_jobs().await })
//!     .await?;
//! ```

use crate::config::FailurePolicy;
use crate::publisher::{MetricPublisher, DEFAULT_METRIC_VALUE};
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// `request_status` label values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Started,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enter/exit timer for one API call
///
/// [`start`](Self::start) publishes `started`; [`complete`](Self::complete)
/// or [`fail`](Self::fail) publishes the outcome. A guard dropped without
/// either (early `?` return, panic) publishes `failed` from a task spawned on
/// the current tokio runtime.
#[must_use = "an unfinished guard reports the call as failed when dropped"]
pub struct ApiMetricGuard {
    publisher: MetricPublisher,
    service_name: String,
    api_name: String,
    started_at: Instant,
    finished: bool,
}

impl ApiMetricGuard {
    pub async fn start(
        publisher: MetricPublisher,
        service_name: impl Into<String>,
        api_name: impl Into<String>,
    ) -> Self {
        let guard = Self {
            publisher,
            service_name: service_name.into(),
            api_name: api_name.into(),
            started_at: Instant::now(),
            finished: false,
        };
        guard
            .publisher
            .publish_api_metric(
                &guard.service_name,
                &guard.api_name,
                RequestStatus::Started,
                DEFAULT_METRIC_VALUE,
            )
            .await;
        guard
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Publish `completed` with the elapsed seconds and return them
    pub async fn complete(mut self) -> f64 {
        self.finished = true;
        let seconds = self.elapsed().as_secs_f64();
        info!(
            service = %self.service_name,
            api = %self.api_name,
            seconds,
            "{}:{}={:.6}",
            self.service_name,
            self.api_name,
            seconds
        );
        self.publisher
            .publish_api_metric(
                &self.service_name,
                &self.api_name,
                RequestStatus::Completed,
                seconds,
            )
            .await;
        seconds
    }

    /// Publish `failed`
    pub async fn fail(mut self) {
        self.finished = true;
        self.publisher
            .publish_api_metric(
                &self.service_name,
                &self.api_name,
                RequestStatus::Failed,
                DEFAULT_METRIC_VALUE,
            )
            .await;
    }
}

impl Drop for ApiMetricGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let publisher = self.publisher.clone();
                let service_name = std::mem::take(&mut self.service_name);
                let api_name = std::mem::take(&mut self.api_name);
                handle.spawn(async move {
                    publisher
                        .publish_api_metric(
                            &service_name,
                            &api_name,
                            RequestStatus::Failed,
                            DEFAULT_METRIC_VALUE,
                        )
                        .await;
                });
            }
            Err(_) => {
                warn!(
                    service = %self.service_name,
                    api = %self.api_name,
                    "API metric guard dropped outside a tokio runtime; failed point not published"
                );
            }
        }
    }
}

/// Closure form of [`ApiMetricGuard`], created by [`MetricPublisher::api_scope`]
#[derive(Debug, Clone)]
pub struct ApiMetricScope {
    publisher: MetricPublisher,
    service_name: String,
    api_name: String,
    policy: FailurePolicy,
}

impl ApiMetricScope {
    /// Uses the publisher's configured failure policy
    pub fn new(
        publisher: MetricPublisher,
        service_name: impl Into<String>,
        api_name: impl Into<String>,
    ) -> Self {
        let policy = publisher.config().failure_policy;
        Self {
            publisher,
            service_name: service_name.into(),
            api_name: api_name.into(),
            policy,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Time `work`, publishing exactly two points
    ///
    /// Returns `Ok(Some(value))` on success. On failure returns `Ok(None)`
    /// under [`FailurePolicy::Suppress`] and `Err(e)` under
    /// [`FailurePolicy::Propagate`].
    pub async fn run<Fut, T, E>(self, work: Fut) -> Result<Option<T>, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let guard = ApiMetricGuard::start(
            self.publisher.clone(),
            self.service_name.clone(),
            self.api_name.clone(),
        )
        .await;

        match work.await {
            Ok(value) => {
                guard.complete().await;
                Ok(Some(value))
            }
            Err(e) => {
                guard.fail().await;
                match self.policy {
                    FailurePolicy::Suppress => {
                        warn!(
                            service = %self.service_name,
                            api = %self.api_name,
                            error = %e,
                            "Timed API call failed; error suppressed"
                        );
                        Ok(None)
                    }
                    FailurePolicy::Propagate => Err(e),
                }
            }
        }
    }
}

/// An async callable wrapped in an [`ApiMetricScope`] per call
///
/// Built by [`api_metric`].
#[derive(Debug, Clone)]
pub struct InstrumentedFn<F> {
    publisher: MetricPublisher,
    service_name: String,
    api_name: String,
    policy: FailurePolicy,
    inner: F,
}

/// Wrap `f` so every call is timed under `service_name`/`api_name`
///
/// ```ignore
/// let get_job = api_metric(publisher, "pinpoint", "jobs.get", |id: String| async move {
///     store.load_job(&id).await
/// });
/// let job = get_job.call("job42".to_string()).await?;
/// ```
pub fn api_metric<F>(
    publisher: MetricPublisher,
    service_name: impl Into<String>,
    api_name: impl Into<String>,
    f: F,
) -> InstrumentedFn<F> {
    let policy = publisher.config().failure_policy;
    InstrumentedFn {
        publisher,
        service_name: service_name.into(),
        api_name: api_name.into(),
        policy,
        inner: f,
    }
}

impl<F> InstrumentedFn<F> {
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Invoke the wrapped callable with `arg`; see [`ApiMetricScope::run`]
    pub async fn call<A, Fut, T, E>(&self, arg: A) -> Result<Option<T>, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        ApiMetricScope::new(
            self.publisher.clone(),
            self.service_name.clone(),
            self.api_name.clone(),
        )
        .with_failure_policy(self.policy)
        .run((self.inner)(arg))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MetricSink;
    use crate::config::PublisherConfig;
    use crate::identity::StaticIdentity;
    use crate::series::TimeSeries;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        series: Mutex<Vec<TimeSeries>>,
    }

    impl RecordingSink {
        fn statuses(&self) -> Vec<String> {
            self.series
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| s.metric_label("request_status").map(str::to_string))
                .collect()
        }

        fn values(&self) -> Vec<f64> {
            self.series
                .lock()
                .unwrap()
                .iter()
                .filter_map(TimeSeries::value)
                .collect()
        }
    }

    #[async_trait]
    impl MetricSink for RecordingSink {
        async fn create_time_series(
            &self,
            _project_name: &str,
            series: &[TimeSeries],
        ) -> crate::Result<()> {
            self.series.lock().unwrap().extend_from_slice(series);
            Ok(())
        }
    }

    fn publisher(sink: Arc<RecordingSink>, policy: FailurePolicy) -> MetricPublisher {
        let config = PublisherConfig {
            failure_policy: policy,
            ..PublisherConfig::default()
        };
        MetricPublisher::new(config, sink, Arc::new(StaticIdentity::new("app")))
    }

    #[test]
    fn test_request_status_labels() {
        assert_eq!(RequestStatus::Started.as_str(), "started");
        assert_eq!(RequestStatus::Completed.to_string(), "completed");
        assert_eq!(RequestStatus::Failed.as_str(), "failed");
    }

    #[tokio::test]
    async fn test_success_emits_started_then_completed() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);

        let result: Result<Option<u32>, String> = publisher
            .api_scope("dashboard", "alerts")
            .run(async { Ok(7) })
            .await;

        assert_eq!(result, Ok(Some(7)));
        assert_eq!(sink.statuses(), vec!["started", "completed"]);
    }

    #[tokio::test]
    async fn test_completed_value_is_elapsed_seconds() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);

        let _: Result<Option<()>, String> = publisher
            .api_scope("dashboard", "alerts")
            .run(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            })
            .await;

        let values = sink.values();
        assert_eq!(values[0], 1.0);
        assert!(values[1] >= 0.05, "elapsed {} shorter than the sleep", values[1]);
        assert!(values[1] < 0.3, "elapsed {} far above the sleep", values[1]);
    }

    #[tokio::test]
    async fn test_failure_is_suppressed_by_default() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);

        let result: Result<Option<u32>, String> = publisher
            .api_scope("dashboard", "alerts")
            .run(async { Err("backend exploded".to_string()) })
            .await;

        assert_eq!(result, Ok(None));
        assert_eq!(sink.statuses(), vec!["started", "failed"]);
        assert_eq!(sink.values(), vec![1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_failure_propagates_when_configured() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Propagate);

        let result: Result<Option<u32>, String> = publisher
            .api_scope("dashboard", "alerts")
            .run(async { Err("backend exploded".to_string()) })
            .await;

        assert_eq!(result, Err("backend exploded".to_string()));
        assert_eq!(sink.statuses(), vec!["started", "failed"]);
    }

    #[tokio::test]
    async fn test_scope_policy_override() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);

        let scope = publisher
            .api_scope("dashboard", "alerts")
            .with_failure_policy(FailurePolicy::Propagate);
        assert_eq!(scope.failure_policy(), FailurePolicy::Propagate);

        let result: Result<Option<u32>, &str> = scope.run(async { Err("nope") }).await;
        assert_eq!(result, Err("nope"));
    }

    #[tokio::test]
    async fn test_guard_explicit_complete() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);

        let guard = ApiMetricGuard::start(publisher, "dashboard", "alerts").await;
        let seconds = guard.complete().await;

        assert!(seconds >= 0.0);
        assert_eq!(sink.statuses(), vec!["started", "completed"]);
        assert_eq!(sink.values()[1], seconds);
    }

    #[tokio::test]
    async fn test_dropped_guard_reports_failure() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);

        let guard = ApiMetricGuard::start(publisher, "dashboard", "alerts").await;
        drop(guard);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(sink.statuses(), vec!["started", "failed"]);
    }

    #[test]
    fn test_dropped_guard_outside_runtime_does_not_panic() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);
        let guard = ApiMetricGuard {
            publisher,
            service_name: "dashboard".to_string(),
            api_name: "alerts".to_string(),
            started_at: Instant::now(),
            finished: false,
        };
        drop(guard);
        assert!(sink.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_instrumented_fn_returns_result() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = publisher(sink.clone(), FailurePolicy::Suppress);

        let double = api_metric(publisher, "dashboard", "double", |x: u32| async move {
            if x == 0 {
                Err("zero")
            } else {
                Ok(x * 2)
            }
        });

        assert_eq!(double.call(21).await, Ok(Some(42)));
        assert_eq!(double.call(0).await, Ok(None));
        assert_eq!(
            sink.statuses(),
            vec!["started", "completed", "started", "failed"]
        );

        let strict = double.with_failure_policy(FailurePolicy::Propagate);
        assert_eq!(strict.call(0).await, Err("zero"));
    }
}
