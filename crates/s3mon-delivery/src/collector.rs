//! Collector transport: the production [`Transport`].
//!
//! Splits a submitted batch into sub-batches, posts each one to the
//! collector on its own task and reports every sub-batch's outcome through
//! the sink. A non-2xx response, a network error or an encoding error fails
//! every envelope of that sub-batch. No retries happen here.

use std::sync::Arc;

use s3mon_core::{Batch, Clock, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};
use url::Url;

use crate::{
    client::{ClientConfig, CollectorClient},
    error::DeliveryFailure,
    transport::{OutcomeSink, Transport},
    wire::{PayloadEncoder, TrackerIdentity},
};

/// Posts envelopes to a Snowplow-compatible collector.
#[derive(Debug, Clone)]
pub struct CollectorTransport {
    client: CollectorClient,
    encoder: PayloadEncoder,
    max_events_per_request: Option<usize>,
}

impl CollectorTransport {
    /// Creates a transport for `collector`.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ConfigurationError` if the client cannot be
    /// built for this URL.
    pub fn new(
        collector: &Url,
        config: ClientConfig,
        identity: TrackerIdentity,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            client: CollectorClient::new(collector, config)?,
            encoder: PayloadEncoder::new(identity, clock),
            max_events_per_request: None,
        })
    }

    /// Caps the number of events per HTTP request. `None` sends the whole
    /// batch in one request.
    pub fn with_max_events_per_request(mut self, max: Option<usize>) -> Self {
        self.max_events_per_request = max.filter(|max| *max > 0);
        self
    }

    async fn post(&self, chunk: &Batch) -> std::result::Result<(), DeliveryFailure> {
        let body = self.encoder.encode_batch(chunk)?;
        self.client.deliver(body, chunk.len()).await.map(|_| ())
    }
}

impl Transport for CollectorTransport {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn submit(&self, batch: Batch, sink: OutcomeSink, cancel: CancellationToken) {
        let chunks = batch.split(self.max_events_per_request.unwrap_or(0));
        debug!(
            events = batch.len(),
            requests = chunks.len(),
            endpoint = %self.client.endpoint(),
            "submitting batch to collector"
        );

        for (index, chunk) in chunks.into_iter().enumerate() {
            let transport = self.clone();
            let sink = sink.clone();
            let cancel = cancel.clone();
            let span = tracing::debug_span!("collector_chunk", chunk = index, events = chunk.len());

            tokio::spawn(
                async move {
                    tokio::select! {
                        () = cancel.cancelled() => {
                            debug!("request cancelled before an outcome was known");
                        }
                        result = transport.post(&chunk) => match result {
                            Ok(()) => sink.on_success(chunk.len()),
                            Err(failure) => {
                                warn!(
                                    error = %failure,
                                    category = %failure.category(),
                                    "failed to deliver events to collector"
                                );
                                sink.on_failure(0, chunk.envelopes());
                            },
                        },
                    }
                }
                .instrument(span),
            );
        }
    }
}
