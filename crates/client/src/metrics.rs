use std::time::Duration;

use async_trait::async_trait;
use derive_more::Debug;
use primitives::Monitor;
use reqwest::{Client as HttpClient, Url};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{error::FetchError, retry::retry_once};

/// Hard per-request timeout, independent of the polling interval.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed wait before the single retry attempt.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Capability interface for fetching the current monitor list.
///
/// Concrete variants: the live [`HttpMetricsClient`], the fixture-backed
/// [`FixtureMetricsClient`] and the always-failing [`FailingMetricsClient`].
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetches and reconstructs the current monitor list.
    async fn monitors(&self) -> Result<Vec<Monitor>, FetchError>;
}

/// Live HTTP client speaking the metrics exposition format.
#[derive(Clone, Debug)]
pub struct HttpMetricsClient {
    #[debug(skip)]
    http: HttpClient,
    endpoint: String,
    username: String,
    #[debug(skip)]
    password: String,
    request_timeout: Duration,
    retry_backoff: Duration,
}

impl HttpMetricsClient {
    /// Creates a new client for the given endpoint and credentials.
    /// Credentials are only attached when both username and password are
    /// non-empty.
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            request_timeout: REQUEST_TIMEOUT,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    /// Overrides the request timeout and retry backoff.
    #[must_use]
    pub const fn with_timing(mut self, request_timeout: Duration, retry_backoff: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.retry_backoff = retry_backoff;
        self
    }

    async fn fetch_once(&self) -> Result<Vec<Monitor>, FetchError> {
        let url = Url::parse(self.endpoint.trim()).map_err(|_| FetchError::InvalidUrl)?;

        let mut request = self.http.get(url);
        if !self.username.is_empty() && !self.password.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::from_transport)?;
        FetchError::check_status(response.status())?;

        let text = response.text().await.map_err(|_| FetchError::InvalidResponse)?;
        let monitors = exposition::parse_monitors(&text);
        debug!(count = monitors.len(), "fetched monitors");
        Ok(monitors)
    }
}

#[async_trait]
impl MetricsProvider for HttpMetricsClient {
    async fn monitors(&self) -> Result<Vec<Monitor>, FetchError> {
        let mut attempts = 0u32;
        retry_once(self.retry_backoff, || {
            attempts += 1;
            if attempts > 1 {
                warn!(endpoint = %self.endpoint, "retrying metrics fetch after transient failure");
            }
            self.fetch_once()
        })
        .await
    }
}

/// Provider returning a fixed monitor list; stands in for the live client
/// in tests and previews.
#[derive(Debug, Clone, Default)]
pub struct FixtureMetricsClient {
    monitors: Vec<Monitor>,
}

impl FixtureMetricsClient {
    /// Creates a provider that always returns `monitors`.
    pub const fn new(monitors: Vec<Monitor>) -> Self {
        Self { monitors }
    }
}

#[async_trait]
impl MetricsProvider for FixtureMetricsClient {
    async fn monitors(&self) -> Result<Vec<Monitor>, FetchError> {
        Ok(self.monitors.clone())
    }
}

/// Provider that always fails with the error produced by its factory.
pub struct FailingMetricsClient {
    make_error: Box<dyn Fn() -> FetchError + Send + Sync>,
}

impl FailingMetricsClient {
    /// Creates a provider that fails every fetch with `make_error()`.
    pub fn new<F>(make_error: F) -> Self
    where
        F: Fn() -> FetchError + Send + Sync + 'static,
    {
        Self { make_error: Box::new(make_error) }
    }
}

impl std::fmt::Debug for FailingMetricsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingMetricsClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl MetricsProvider for FailingMetricsClient {
    async fn monitors(&self) -> Result<Vec<Monitor>, FetchError> {
        Err((self.make_error)())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use primitives::MonitorStatus;

    const FAST: Duration = Duration::from_millis(200);
    const NO_BACKOFF: Duration = Duration::from_millis(0);

    const BODY: &str = "\
# HELP monitor_status Monitor Status
monitor_status{monitor_id=\"1\",monitor_name=\"Jellyfin\",monitor_url=\"https://jelly/\"} 1
monitor_response_time{monitor_id=\"1\",monitor_name=\"Jellyfin\",monitor_url=\"https://jelly/\"} 842
";

    #[tokio::test]
    async fn fetches_and_parses_monitors() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let client = HttpMetricsClient::new(format!("{}/metrics", server.url()), "", "");
        let monitors = client.monitors().await.unwrap();

        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].name, "Jellyfin");
        assert_eq!(monitors[0].status, Some(MonitorStatus::Up));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn attaches_basic_credentials_when_both_configured() {
        let mut server = Server::new_async().await;
        // base64("user:pass")
        let mock = server
            .mock("GET", "/metrics")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let client = HttpMetricsClient::new(format!("{}/metrics", server.url()), "user", "pass");
        client.monitors().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sends_unauthenticated_when_password_missing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let client = HttpMetricsClient::new(format!("{}/metrics", server.url()), "user", "");
        client.monitors().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_is_retried_exactly_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let client = HttpMetricsClient::new(format!("{}/metrics", server.url()), "", "")
            .with_timing(FAST, NO_BACKOFF);
        let result = client.monitors().await;

        assert!(matches!(result, Err(FetchError::ServerError(500))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn authentication_failure_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let client = HttpMetricsClient::new(format!("{}/metrics", server.url()), "user", "pass")
            .with_timing(FAST, NO_BACKOFF);
        let result = client.monitors().await;

        assert!(matches!(result, Err(FetchError::AuthenticationFailed)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_maps_to_authentication_failure() {
        let mut server = Server::new_async().await;
        let _mock =
            server.mock("GET", "/metrics").with_status(403).create_async().await;

        let client = HttpMetricsClient::new(format!("{}/metrics", server.url()), "", "")
            .with_timing(FAST, NO_BACKOFF);
        assert!(matches!(client.monitors().await, Err(FetchError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn invalid_endpoint_fails_before_any_request() {
        let client = HttpMetricsClient::new("not a url", "", "");
        assert!(matches!(client.monitors().await, Err(FetchError::InvalidUrl)));
    }

    #[tokio::test]
    async fn connection_failure_maps_to_network_error() {
        // Port 9 (discard) refuses connections on loopback.
        let client = HttpMetricsClient::new("http://127.0.0.1:9/metrics", "", "")
            .with_timing(FAST, NO_BACKOFF);
        assert!(matches!(client.monitors().await, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn fixture_provider_returns_its_monitors() {
        let monitors = vec![Monitor {
            id: 1,
            name: "Svc".to_owned(),
            url: "http://svc".to_owned(),
            status: Some(MonitorStatus::Up),
            response_time_ms: None,
        }];
        let provider = FixtureMetricsClient::new(monitors.clone());
        assert_eq!(provider.monitors().await.unwrap(), monitors);
    }

    #[tokio::test]
    async fn failing_provider_always_fails() {
        let provider = FailingMetricsClient::new(|| FetchError::Timeout);
        assert!(matches!(provider.monitors().await, Err(FetchError::Timeout)));
        assert!(matches!(provider.monitors().await, Err(FetchError::Timeout)));
    }
}
