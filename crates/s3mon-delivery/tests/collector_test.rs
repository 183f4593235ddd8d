//! Integration tests for the collector transport against a mock collector.
//!
//! Each test runs the real coordinator over HTTP so the sink, the spawned
//! request tasks and the wire encoding are exercised together.

use std::{sync::Arc, time::Duration};

use s3mon_core::{MonitorError, TestClock};
use s3mon_delivery::{
    wire::{PLATFORM, UNSTRUCT_EVENT_SCHEMA},
    ClientConfig, CollectorTransport, EmissionCoordinator, TrackerIdentity,
};
use s3mon_testing::{batch, MockCollector, StatusCode};

fn identity() -> TrackerIdentity {
    TrackerIdentity { namespace: "s3-monitor-lambda".into(), app_id: "s3-monitor-lambda".into() }
}

fn transport(collector: &MockCollector, max_events: Option<usize>) -> CollectorTransport {
    CollectorTransport::new(
        &collector.url(),
        ClientConfig::default(),
        identity(),
        Arc::new(TestClock::new()),
    )
    .unwrap()
    .with_max_events_per_request(max_events)
}

#[tokio::test]
async fn accepted_batch_is_fully_delivered_in_one_request() {
    let collector = MockCollector::start().await;
    collector.accept_all().await;

    let outcome = EmissionCoordinator::new(Arc::new(transport(&collector, None)))
        .emit(batch(4))
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 4);
    collector.assert_request_count(1).await;

    let events = collector.received_events().await;
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|event| event.p == PLATFORM && event.e == "ue"));

    let keys: Vec<_> = events
        .iter()
        .map(|event| {
            let unstruct = event.unstruct_payload().unwrap();
            assert_eq!(unstruct.schema, UNSTRUCT_EVENT_SCHEMA);
            unstruct.data.data.s3.object.key.unwrap()
        })
        .collect();
    assert_eq!(keys, vec!["object-0", "object-1", "object-2", "object-3"]);
}

#[tokio::test]
async fn server_error_fails_every_event() {
    let collector = MockCollector::start().await;
    collector.reject_all(StatusCode::SERVICE_UNAVAILABLE).await;

    let err = EmissionCoordinator::new(Arc::new(transport(&collector, None)))
        .emit(batch(3))
        .await
        .unwrap_err();

    assert_eq!(err, MonitorError::transport_failure(3, 3));
}

#[tokio::test]
async fn client_error_fails_every_event() {
    let collector = MockCollector::start().await;
    collector.reject_all(StatusCode::BAD_REQUEST).await;

    let err = EmissionCoordinator::new(Arc::new(transport(&collector, None)))
        .emit(batch(2))
        .await
        .unwrap_err();

    assert_eq!(err, MonitorError::transport_failure(2, 2));
}

#[tokio::test]
async fn sub_batching_issues_one_request_per_chunk() {
    let collector = MockCollector::start().await;
    collector.accept_all().await;

    let outcome = EmissionCoordinator::new(Arc::new(transport(&collector, Some(3))))
        .emit(batch(10))
        .await
        .unwrap();

    assert_eq!(outcome.succeeded, 10);
    collector.assert_request_count(4).await;

    let mut sizes: Vec<_> =
        collector.received_batches().await.iter().map(Vec::len).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 3, 3, 3]);
}

#[tokio::test]
async fn one_rejected_sub_batch_fails_only_its_events() {
    let collector = MockCollector::start().await;
    collector.reject_first(1, StatusCode::INTERNAL_SERVER_ERROR).await;

    let err = EmissionCoordinator::new(Arc::new(transport(&collector, Some(2))))
        .emit(batch(6))
        .await
        .unwrap_err();

    assert_eq!(err, MonitorError::transport_failure(2, 6));
    collector.assert_request_count(3).await;
}

#[tokio::test]
async fn slow_collector_hits_emission_deadline() {
    let collector = MockCollector::start().await;
    collector.accept_after(Duration::from_secs(2)).await;

    let err = EmissionCoordinator::new(Arc::new(transport(&collector, None)))
        .with_deadline(Duration::from_millis(100))
        .emit(batch(2))
        .await
        .unwrap_err();

    assert_eq!(err, MonitorError::deadline_exceeded(100, 0, 2));
}

#[tokio::test]
async fn request_timeout_is_reported_as_failure() {
    let collector = MockCollector::start().await;
    collector.accept_after(Duration::from_secs(2)).await;

    let config = ClientConfig { timeout: Duration::from_millis(100), ..ClientConfig::default() };
    let transport =
        CollectorTransport::new(&collector.url(), config, identity(), Arc::new(TestClock::new()))
            .unwrap();

    let err = EmissionCoordinator::new(Arc::new(transport))
        .with_deadline(Duration::from_secs(5))
        .emit(batch(2))
        .await
        .unwrap_err();

    assert_eq!(err, MonitorError::transport_failure(2, 2));
}
