//! HTTP client for collector delivery with bounded timeouts.
//!
//! Handles request construction against the collector's tracker-protocol
//! endpoint, response processing, and failure categorisation.

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::Response;
use s3mon_core::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};
use url::Url;

use crate::error::DeliveryFailure;

/// Path segments of the POST endpoint for the tracker protocol.
pub const TP2_PATH: [&str; 2] = ["com.snowplowanalytics.snowplow", "tp2"];

const CONTENT_TYPE: &str = "application/json; charset=utf-8";

const MAX_RESPONSE_BODY_SIZE: usize = 64 * 1024;
const MAX_LOGGED_BODY_SIZE: usize = 1024;

/// Configuration for the collector client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Time allowed to establish the connection.
    pub connect_timeout: Duration,
    /// Time allowed for each read, so a slow but progressing response
    /// does not fail.
    pub read_timeout: Duration,
    /// Ceiling on the whole request, covering the write.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECONDS),
            read_timeout: Duration::from_secs(crate::DEFAULT_READ_TIMEOUT_SECONDS),
            timeout: Duration::from_secs(crate::DEFAULT_REQUEST_TIMEOUT_SECONDS),
            user_agent: concat!("s3mon/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Response from a successful collector request.
#[derive(Debug, Clone)]
pub struct CollectorResponse {
    /// HTTP status code (always 2xx).
    pub status_code: u16,
    /// Total duration of the request.
    pub duration: Duration,
}

/// HTTP client bound to one collector.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct CollectorClient {
    client: reqwest::Client,
    endpoint: Url,
    config: ClientConfig,
}

impl CollectorClient {
    /// Creates a client posting to `collector`'s tracker endpoint.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ConfigurationError` if the collector URL cannot
    /// carry a path or the HTTP client cannot be built.
    pub fn new(collector: &Url, config: ClientConfig) -> Result<Self> {
        let endpoint = tracker_endpoint(collector)?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| MonitorError::configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint, config })
    }

    /// The URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts an encoded payload carrying `event_count` events.
    ///
    /// # Errors
    ///
    /// - `Timeout` when a read or the whole request exceeds its timeout
    /// - `Network` for connection failures
    /// - `Rejected` for any non-2xx response
    pub async fn deliver(
        &self,
        body: Bytes,
        event_count: usize,
    ) -> std::result::Result<CollectorResponse, DeliveryFailure> {
        let span = info_span!("collector_request", url = %self.endpoint, events = event_count);

        async move {
            let start_time = Instant::now();
            tracing::debug!(bytes = body.len(), "posting events to collector");

            let response = match self
                .client
                .post(self.endpoint.clone())
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
                .body(body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    let duration = start_time.elapsed();
                    tracing::warn!(duration_ms = duration.as_millis(), "request failed: {}", e);

                    if e.is_timeout() {
                        let limit = if duration >= self.config.timeout {
                            self.config.timeout
                        } else {
                            self.config.read_timeout
                        };
                        return Err(DeliveryFailure::timeout(
                            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        ));
                    }
                    if e.is_connect() {
                        return Err(DeliveryFailure::network(format!("connection failed: {e}")));
                    }
                    return Err(DeliveryFailure::network(e.to_string()));
                },
            };

            let duration = start_time.elapsed();
            let status = response.status();

            tracing::debug!(
                status = status.as_u16(),
                duration_ms = duration.as_millis(),
                "received response"
            );

            if status.is_success() {
                return Ok(CollectorResponse { status_code: status.as_u16(), duration });
            }

            let body = read_body(response).await;
            tracing::warn!(status = status.as_u16(), body = %body, "collector rejected events");
            Err(DeliveryFailure::rejected(status.as_u16(), body))
        }
        .instrument(span)
        .await
    }
}

/// Appends the tracker-protocol path to the collector base URL.
///
/// `https://collector.example.com` and `https://collector.example.com/` both
/// become `https://collector.example.com/com.snowplowanalytics.snowplow/tp2`.
pub fn tracker_endpoint(collector: &Url) -> Result<Url> {
    let mut endpoint = collector.clone();
    endpoint
        .path_segments_mut()
        .map_err(|()| {
            MonitorError::configuration(format!("collector URL '{collector}' cannot carry a path"))
        })?
        .pop_if_empty()
        .extend(TP2_PATH);
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    Ok(endpoint)
}

/// Reads a response body for logging, truncating oversized bodies.
async fn read_body(response: Response) -> String {
    match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_RESPONSE_BODY_SIZE => {
            let suffix = "... (truncated)";
            let truncated = String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY_SIZE - suffix.len()]);
            format!("{truncated}{suffix}")
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("failed to read response body: {}", e);
            format!("[failed to read response body: {e}]")
        },
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> CollectorClient {
        let url = Url::parse(&server.uri()).unwrap();
        CollectorClient::new(&url, ClientConfig::default()).unwrap()
    }

    #[test]
    fn tracker_endpoint_appends_path() {
        let cases = [
            ("https://collector.example.com", "https://collector.example.com/"),
            ("https://collector.example.com/", "https://collector.example.com/"),
            ("http://10.0.0.1:8080/prefix/", "http://10.0.0.1:8080/prefix/"),
            ("https://c.example.com/?q=1#frag", "https://c.example.com/"),
        ];

        for (base, prefix) in cases {
            let endpoint = tracker_endpoint(&Url::parse(base).unwrap()).unwrap();
            let expected = format!("{prefix}com.snowplowanalytics.snowplow/tp2");
            assert_eq!(endpoint.as_str(), expected, "base {base}");
        }
    }

    #[test]
    fn non_hierarchical_url_rejected() {
        let url = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(tracker_endpoint(&url), Err(MonitorError::ConfigurationError { .. })));
    }

    #[tokio::test]
    async fn successful_delivery() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/com.snowplowanalytics.snowplow/tp2"))
            .and(matchers::header("content-type", CONTENT_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let response = client.deliver(Bytes::from_static(b"{}"), 1).await.unwrap();

        assert_eq!(response.status_code, 200);
    }

    #[tokio::test]
    async fn server_error_is_rejection() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let failure = client.deliver(Bytes::from_static(b"{}"), 3).await.unwrap_err();

        assert_eq!(failure, DeliveryFailure::rejected(503, "Service Unavailable"));
    }

    #[tokio::test]
    async fn slow_collector_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&mock_server.uri()).unwrap();
        let config = ClientConfig { timeout: Duration::from_millis(100), ..Default::default() };
        let client = CollectorClient::new(&url, config).unwrap();

        let failure = client.deliver(Bytes::from_static(b"{}"), 1).await.unwrap_err();
        assert_eq!(failure, DeliveryFailure::timeout(100));
    }

    #[tokio::test]
    async fn stalled_read_times_out_before_request_ceiling() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&mock_server.uri()).unwrap();
        let config =
            ClientConfig { read_timeout: Duration::from_millis(100), ..Default::default() };
        let client = CollectorClient::new(&url, config).unwrap();

        let started = Instant::now();
        let failure = client.deliver(Bytes::from_static(b"{}"), 1).await.unwrap_err();

        assert_eq!(failure, DeliveryFailure::timeout(100));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn default_timeouts_bound_reads_separately_from_the_request() {
        let config = ClientConfig::default();

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert!(config.timeout > config.read_timeout);
    }

    #[tokio::test]
    async fn connection_refused_is_network_failure() {
        let url = Url::parse("http://127.0.0.1:1").unwrap();
        let client = CollectorClient::new(&url, ClientConfig::default()).unwrap();

        let failure = client.deliver(Bytes::from_static(b"{}"), 1).await.unwrap_err();
        assert!(matches!(failure, DeliveryFailure::Network { .. }));
    }
}
