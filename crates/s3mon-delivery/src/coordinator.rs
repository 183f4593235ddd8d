//! Batch emission coordinator.
//!
//! Turns an asynchronous, callback-reporting [`Transport`] into one awaited
//! call that resolves only once every envelope in the batch has been
//! reported delivered or failed.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──emit()──▶ Submitted ──all reported, none failed──▶ CompletedSuccess
//!   │                  │
//!   │                  └──any failed / sink abandoned──────▶ CompletedWithFailures
//!   └──empty batch──────────────────────────────────────────▶ CompletedSuccess
//! ```
//!
//! `emit` consumes the coordinator, so one instance serves exactly one batch
//! and its completion signal can never leak into another invocation.

use std::{fmt, sync::Arc, time::Duration};

use s3mon_core::{Batch, Clock, EmissionOutcome, MonitorError, RealClock, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::transport::{Completion, OutcomeSink, Transport};

/// Coordinator lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionState {
    /// Created, nothing submitted yet.
    Idle,
    /// Batch handed to the transport, awaiting outcomes.
    Submitted,
    /// Every envelope delivered.
    CompletedSuccess,
    /// At least one envelope failed or went unreported.
    CompletedWithFailures,
}

impl fmt::Display for EmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Submitted => write!(f, "submitted"),
            Self::CompletedSuccess => write!(f, "completed_success"),
            Self::CompletedWithFailures => write!(f, "completed_with_failures"),
        }
    }
}

/// Delivers one batch through a transport and waits for every outcome.
///
/// # Example
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use s3mon_core::Batch;
/// use s3mon_delivery::{EmissionCoordinator, Transport};
///
/// # async fn example(transport: Arc<dyn Transport>, batch: Batch) -> s3mon_core::Result<()> {
/// let outcome = EmissionCoordinator::new(transport)
///     .with_deadline(Duration::from_secs(10))
///     .emit(batch)
///     .await?;
/// assert!(outcome.is_success());
/// # Ok(())
/// # }
/// ```
pub struct EmissionCoordinator {
    transport: Arc<dyn Transport>,
    deadline: Option<Duration>,
    interrupt: CancellationToken,
    clock: Arc<dyn Clock>,
    state: EmissionState,
}

enum WaitResult {
    Signalled(Result<Completion>),
    DeadlineExpired(Duration),
    Interrupted,
}

impl EmissionCoordinator {
    /// Creates a coordinator with no wait deadline.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            deadline: None,
            interrupt: CancellationToken::new(),
            clock: Arc::new(RealClock::new()),
            state: EmissionState::Idle,
        }
    }

    /// Bounds the wait for outcomes; expiry cancels outstanding transport work.
    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(budget);
        self
    }

    /// Aborts the wait with `InterruptedWait` when `token` is cancelled.
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    /// Uses `clock` to measure wait duration.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Submits `batch` and waits until every envelope has an outcome.
    ///
    /// An empty batch returns immediately without touching the transport.
    ///
    /// # Errors
    ///
    /// - `TransportFailure` when any envelope failed or was never reported
    /// - `DeadlineExceeded` when the configured budget runs out first
    /// - `InterruptedWait` when the interrupt token fires while waiting
    pub async fn emit(mut self, batch: Batch) -> Result<EmissionOutcome> {
        let total = batch.len();
        let span = info_span!("emit_batch", transport = self.transport.name(), total);

        async move {
            if batch.is_empty() {
                debug!("empty batch, nothing to emit");
                self.transition(EmissionState::CompletedSuccess);
                return Ok(EmissionOutcome::default());
            }

            // Armed before submission so no report can precede the wait.
            let (sink, signal) = OutcomeSink::arm(total);
            let probe = sink.probe();
            // Not linked to the interrupt: the transport must not release the
            // sink before the interrupt arm has won the select.
            let cancel = CancellationToken::new();
            let _abort_leftovers = cancel.clone().drop_guard();

            let started = self.clock.now();
            self.transport.submit(batch, sink, cancel.clone());
            self.transition(EmissionState::Submitted);

            let budget = self.deadline;
            let interrupt = self.interrupt.clone();
            let expiry = async move {
                match budget {
                    Some(budget) => {
                        tokio::time::sleep(budget).await;
                        budget
                    },
                    None => std::future::pending().await,
                }
            };

            let result = tokio::select! {
                biased;
                completion = signal.wait() => WaitResult::Signalled(completion),
                () = interrupt.cancelled() => WaitResult::Interrupted,
                budget = expiry => WaitResult::DeadlineExpired(budget),
            };

            let completion = match result {
                WaitResult::Signalled(completion) => completion?,
                WaitResult::Interrupted => {
                    cancel.cancel();
                    self.transition(EmissionState::CompletedWithFailures);
                    warn!("interrupted while awaiting delivery outcomes");
                    return Err(MonitorError::interrupted(
                        "caller cancelled while awaiting delivery outcomes",
                    ));
                },
                WaitResult::DeadlineExpired(budget) => {
                    cancel.cancel();
                    self.transition(EmissionState::CompletedWithFailures);
                    let reported = probe.snapshot().map_or(0, |outcome| outcome.reported());
                    warn!(
                        budget_ms = budget.as_millis(),
                        reported, "deadline expired before all outcomes were reported"
                    );
                    return Err(MonitorError::deadline_exceeded(
                        u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                        reported,
                        total,
                    ));
                },
            };

            let elapsed = self.clock.now().saturating_duration_since(started);
            let Completion { outcome, complete } = completion;

            if !complete {
                let unreported = total - outcome.reported();
                self.transition(EmissionState::CompletedWithFailures);
                warn!(
                    unreported,
                    failed = outcome.failed,
                    "transport released outcome sink before reporting every event"
                );
                return Err(MonitorError::transport_failure(outcome.failed + unreported, total));
            }

            if outcome.failed > 0 {
                self.transition(EmissionState::CompletedWithFailures);
                warn!(
                    succeeded = outcome.succeeded,
                    failed = outcome.failed,
                    elapsed_ms = elapsed.as_millis(),
                    "batch emitted with failures"
                );
                return Err(MonitorError::transport_failure(outcome.failed, total));
            }

            self.transition(EmissionState::CompletedSuccess);
            info!(
                succeeded = outcome.succeeded,
                discarded = outcome.discarded,
                elapsed_ms = elapsed.as_millis(),
                "batch emitted"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    fn transition(&mut self, next: EmissionState) {
        debug!(from = %self.state, to = %next, "emission state change");
        self.state = next;
    }
}

impl fmt::Debug for EmissionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmissionCoordinator")
            .field("transport", &self.transport.name())
            .field("deadline", &self.deadline)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
