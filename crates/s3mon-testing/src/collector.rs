//! Mock Snowplow collector built on wiremock.

use std::time::Duration;

use http::StatusCode;
use s3mon_delivery::{
    client::TP2_PATH,
    wire::{SelfDescribing, TrackerEvent},
};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// HTTP collector double that records and decodes tracker payloads.
pub struct MockCollector {
    server: MockServer,
}

impl MockCollector {
    /// Starts a collector on a random port with no routes mounted.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Base URL, as it would appear in the function description.
    ///
    /// # Panics
    ///
    /// Panics if wiremock hands out an unparsable URI.
    pub fn url(&self) -> Url {
        Url::parse(&self.server.uri()).expect("mock server URI is a valid URL")
    }

    /// Tracker endpoint path.
    pub fn tp2_path() -> String {
        format!("/{}", TP2_PATH.join("/"))
    }

    /// Accepts every POST with 200.
    pub async fn accept_all(&self) {
        self.respond(ResponseTemplate::new(200).set_body_string("ok")).await;
    }

    /// Answers every POST with `status`.
    pub async fn reject_all(&self, status: StatusCode) {
        self.respond(ResponseTemplate::new(status.as_u16())).await;
    }

    /// Accepts every POST after `delay`.
    pub async fn accept_after(&self, delay: Duration) {
        self.respond(ResponseTemplate::new(200).set_delay(delay)).await;
    }

    /// Answers the first `times` POSTs with `status`, then accepts.
    pub async fn reject_first(&self, times: u64, status: StatusCode) {
        Mock::given(method("POST"))
            .and(path(Self::tp2_path()))
            .respond_with(ResponseTemplate::new(status.as_u16()))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(Self::tp2_path()))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(2)
            .mount(&self.server)
            .await;
    }

    async fn respond(&self, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(Self::tp2_path()))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Number of POSTs received.
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.map_or(0, |requests| requests.len())
    }

    /// Events per received request, in arrival order.
    ///
    /// # Panics
    ///
    /// Panics if a request body is not a tracker `payload_data` document.
    pub async fn received_batches(&self) -> Vec<Vec<TrackerEvent>> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| {
                let body: SelfDescribing<Vec<TrackerEvent>> =
                    serde_json::from_slice(&request.body).expect("request body is payload_data");
                body.data
            })
            .collect()
    }

    /// All received events, flattened.
    pub async fn received_events(&self) -> Vec<TrackerEvent> {
        self.received_batches().await.into_iter().flatten().collect()
    }

    /// Asserts that exactly `expected` requests were received.
    pub async fn assert_request_count(&self, expected: usize) {
        let received = self.request_count().await;
        assert_eq!(received, expected, "expected {expected} requests, received {received}");
    }
}
