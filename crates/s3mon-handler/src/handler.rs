//! S3 notification handler.
//!
//! One invocation: map records to envelopes, find the collector from the
//! function's own metadata, and emit the batch before the Lambda deadline.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use aws_lambda_events::event::s3::S3Event;
use chrono::{DateTime, Utc};
use s3mon_core::{
    map_records, resolve_region, Clock, EmissionOutcome, RealClock, Result, SchemaUri,
};
use s3mon_delivery::{ClientConfig, CollectorTransport, EmissionCoordinator, TrackerIdentity};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::{
    config::Config,
    endpoint::{EndpointResolver, FunctionMetadata},
};

/// Facts about the running invocation the handler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Request id, for log correlation.
    pub request_id: String,
    /// ARN the function was invoked through.
    pub function_arn: String,
    /// Function name used for the metadata lookup.
    pub function_name: String,
    /// When the platform will stop the invocation.
    pub deadline: Option<SystemTime>,
}

impl From<&lambda_runtime::Context> for Invocation {
    fn from(context: &lambda_runtime::Context) -> Self {
        Self {
            request_id: context.request_id.clone(),
            function_arn: context.invoked_function_arn.clone(),
            function_name: context.env_config.function_name.clone(),
            deadline: (context.deadline > 0)
                .then(|| UNIX_EPOCH + Duration::from_millis(context.deadline)),
        }
    }
}

impl Invocation {
    /// Name passed to the metadata lookup. The ARN is an accepted
    /// identifier when the runtime did not report a name.
    fn lookup_name(&self) -> &str {
        if self.function_name.trim().is_empty() {
            &self.function_arn
        } else {
            &self.function_name
        }
    }
}

/// Forwards S3 notifications to the collector named in function metadata.
pub struct NotificationHandler {
    schema: SchemaUri,
    identity: TrackerIdentity,
    client_config: ClientConfig,
    max_events_per_request: Option<usize>,
    deadline_margin: Duration,
    resolver: EndpointResolver,
    clock: Arc<dyn Clock>,
    interrupt: CancellationToken,
}

impl NotificationHandler {
    /// Creates a handler from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ConfigurationError` if the configured schema
    /// is not an Iglu URI.
    pub fn new(config: &Config, metadata: Arc<dyn FunctionMetadata>) -> Result<Self> {
        Ok(Self {
            schema: config.schema()?,
            identity: config.tracker_identity(),
            client_config: config.to_client_config(),
            max_events_per_request: config.max_events_per_request,
            deadline_margin: config.deadline_margin(),
            resolver: EndpointResolver::new(metadata),
            clock: Arc::new(RealClock::new()),
            interrupt: CancellationToken::new(),
        })
    }

    /// Uses `clock` for deadlines and event timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Aborts in-flight emissions when `token` is cancelled.
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    /// Handles one notification batch.
    ///
    /// Configuration is resolved even for an empty batch, so a broken
    /// deployment fails on its first invocation rather than its first
    /// upload.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a malformed function ARN
    /// - `MetadataLookup` / `ConfigurationError` when the collector cannot
    ///   be discovered
    /// - `TransportFailure`, `DeadlineExceeded` or `InterruptedWait` from
    ///   the emission
    pub async fn handle(&self, event: S3Event, invocation: Invocation) -> Result<EmissionOutcome> {
        let span = info_span!(
            "handle_notification",
            request_id = %invocation.request_id,
            records = event.records.len()
        );

        async move {
            let batch = map_records(&self.schema, event.records.into_iter().map(Arc::new));

            let region = resolve_region(Some(invocation.function_arn.as_str()))?;
            let collector = self.resolver.resolve(&region, invocation.lookup_name()).await?;

            if batch.is_empty() {
                info!("notification carried no records");
                return Ok(EmissionOutcome::default());
            }

            let transport = CollectorTransport::new(
                &collector,
                self.client_config.clone(),
                self.identity.clone(),
                self.clock.clone(),
            )?
            .with_max_events_per_request(self.max_events_per_request);

            let mut coordinator = EmissionCoordinator::new(Arc::new(transport))
                .with_interrupt(self.interrupt.child_token())
                .with_clock(self.clock.clone());

            if let Some(deadline) = invocation.deadline {
                let budget = self.emission_budget(deadline);
                debug!(
                    deadline = %DateTime::<Utc>::from(deadline).to_rfc3339(),
                    budget_ms = budget.as_millis(),
                    "bounding emission by invocation deadline"
                );
                coordinator = coordinator.with_deadline(budget);
            }

            let outcome = coordinator.emit(batch).await?;
            info!(region = %region, succeeded = outcome.succeeded, "notification forwarded");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    /// Time left before `deadline` minus the reporting margin. When less
    /// than the margin is left, the whole remainder is used.
    fn emission_budget(&self, deadline: SystemTime) -> Duration {
        match self.clock.remaining_until(deadline) {
            Some(remaining) if remaining > self.deadline_margin => remaining - self.deadline_margin,
            Some(remaining) => remaining,
            None => Duration::ZERO,
        }
    }
}

impl std::fmt::Debug for NotificationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHandler")
            .field("schema", &self.schema)
            .field("identity", &self.identity)
            .field("max_events_per_request", &self.max_events_per_request)
            .field("deadline_margin", &self.deadline_margin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use s3mon_core::{MonitorError, Region, TestClock};

    use super::*;

    struct NoMetadata;

    #[async_trait]
    impl FunctionMetadata for NoMetadata {
        async fn description(&self, _: &Region, _: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn invocation(arn: &str) -> Invocation {
        Invocation {
            request_id: "req-1".to_string(),
            function_arn: arn.to_string(),
            function_name: "s3-monitor".to_string(),
            deadline: None,
        }
    }

    fn handler_with_clock(clock: TestClock) -> NotificationHandler {
        NotificationHandler::new(&Config::default(), Arc::new(NoMetadata))
            .unwrap()
            .with_clock(Arc::new(clock))
    }

    #[test]
    fn budget_reserves_margin() {
        let clock = TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(1_000));
        let handler = handler_with_clock(clock.clone());

        let deadline = UNIX_EPOCH + Duration::from_secs(1_003);
        assert_eq!(handler.emission_budget(deadline), Duration::from_millis(2_500));

        clock.advance(Duration::from_millis(2_800));
        assert_eq!(handler.emission_budget(deadline), Duration::from_millis(200));

        clock.advance(Duration::from_secs(1));
        assert_eq!(handler.emission_budget(deadline), Duration::ZERO);
    }

    #[test]
    fn lookup_name_falls_back_to_arn() {
        let mut invocation = invocation("arn:aws:lambda:us-east-1:123456789012:function:f");
        assert_eq!(invocation.lookup_name(), "s3-monitor");

        invocation.function_name.clear();
        assert_eq!(invocation.lookup_name(), "arn:aws:lambda:us-east-1:123456789012:function:f");
    }

    #[test]
    fn invocation_from_runtime_context() {
        let mut context = lambda_runtime::Context::default();
        context.request_id = "abc".to_string();
        context.invoked_function_arn =
            "arn:aws:lambda:us-east-1:123456789012:function:f".to_string();
        context.deadline = 1_700_000_000_000;

        let invocation = Invocation::from(&context);

        assert_eq!(invocation.request_id, "abc");
        assert_eq!(invocation.function_arn, context.invoked_function_arn);
        assert_eq!(
            invocation.deadline,
            Some(UNIX_EPOCH + Duration::from_millis(1_700_000_000_000))
        );
    }

    #[tokio::test]
    async fn malformed_arn_fails_before_metadata_lookup() {
        let handler = handler_with_clock(TestClock::new());
        let event = S3Event::default();

        let err = handler.handle(event, invocation("not-an-arn")).await.unwrap_err();

        assert!(matches!(err, MonitorError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn empty_batch_still_requires_collector_url() {
        let handler = handler_with_clock(TestClock::new());
        let event = S3Event::default();

        let err = handler
            .handle(event, invocation("arn:aws:lambda:us-east-1:123456789012:function:f"))
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::ConfigurationError { .. }));
    }
}
