//! Transport capability and the outcome sink it reports through.
//!
//! A [`Transport`] accepts a whole batch in one call and reports per-item
//! results asynchronously, possibly from several tasks and possibly in
//! several partial reports. The [`OutcomeSink`] it is handed turns those
//! reports into a single completion signal.
//!
//! # Completion protocol
//!
//! ```text
//!  coordinator                 sink (Arc<Tally>)               transport tasks
//!  ───────────                 ─────────────────               ───────────────
//!  arm(total) ───────────────▶ counters + oneshot::Sender
//!  submit(batch, sink) ──────────────────────────────────────▶ on_success(n)
//!  await CompletionSignal                                      on_failure(s, items)
//!        ▲                     lock → add → sum == total?
//!        └──────────────────── send(outcome) exactly once
//! ```
//!
//! Counters and the sender live behind one mutex, and the signal is armed
//! before the batch is submitted, so a report can neither be lost nor fire
//! the signal twice.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use s3mon_core::{Batch, EmissionOutcome, EventEnvelope, MonitorError, Result};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Delivery mechanism that reports outcomes asynchronously.
///
/// # Implementation Requirements
///
/// - `submit` must not block; delivery happens on tasks the transport owns
/// - every envelope should eventually be reported exactly once through the
///   sink, via `on_success` or `on_failure`
/// - once `cancel` fires, outstanding work should stop; unreported envelopes
///   may simply be dropped along with the sink
pub trait Transport: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Starts delivering `batch`, reporting through `sink`.
    fn submit(&self, batch: Batch, sink: OutcomeSink, cancel: CancellationToken);
}

/// Final state handed from the sink to the waiting coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Counts at the time the signal fired.
    pub outcome: EmissionOutcome,
    /// `false` when every sink was dropped before all outcomes were reported.
    pub complete: bool,
}

/// Receiving half of the one-shot completion signal.
#[derive(Debug)]
pub struct CompletionSignal {
    receiver: oneshot::Receiver<Completion>,
}

impl CompletionSignal {
    /// Waits until all outcomes are reported or every sink is gone.
    pub async fn wait(self) -> Result<Completion> {
        self.receiver
            .await
            .map_err(|_| MonitorError::interrupted("completion signal dropped without a result"))
    }

    /// Takes the completion if it has already fired.
    pub fn try_completion(&mut self) -> Option<Completion> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
struct Tally {
    expected: usize,
    state: Mutex<TallyState>,
}

#[derive(Debug)]
struct TallyState {
    outcome: EmissionOutcome,
    signal: Option<oneshot::Sender<Completion>>,
}

impl Drop for Tally {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(signal) = state.signal.take() {
            let _ = signal.send(Completion { outcome: state.outcome, complete: false });
        }
    }
}

/// Cloneable callback handle a transport reports outcomes through.
///
/// Reports are deltas: each call adds to the running totals. Any clone may
/// be called any number of times from any thread.
#[derive(Debug, Clone)]
pub struct OutcomeSink {
    tally: Arc<Tally>,
}

impl OutcomeSink {
    /// Arms a fresh completion signal expecting `expected` outcomes.
    ///
    /// With `expected == 0` the signal fires immediately.
    pub fn arm(expected: usize) -> (Self, CompletionSignal) {
        let (sender, receiver) = oneshot::channel();
        let mut signal = Some(sender);

        if expected == 0 {
            if let Some(sender) = signal.take() {
                let completion = Completion { outcome: EmissionOutcome::default(), complete: true };
                let _ = sender.send(completion);
            }
        }

        let tally = Tally {
            expected,
            state: Mutex::new(TallyState { outcome: EmissionOutcome::default(), signal }),
        };

        (Self { tally: Arc::new(tally) }, CompletionSignal { receiver })
    }

    /// Reports `count` newly delivered envelopes.
    pub fn on_success(&self, count: usize) {
        self.record(count, 0);
    }

    /// Reports `success_count` newly delivered envelopes and `failed` newly
    /// failed ones.
    pub fn on_failure(&self, success_count: usize, failed: &[EventEnvelope]) {
        self.record(success_count, failed.len());
    }

    /// Number of outcomes that completes the batch.
    pub fn expected(&self) -> usize {
        self.tally.expected
    }

    /// Current running totals.
    pub fn snapshot(&self) -> EmissionOutcome {
        self.tally.state.lock().outcome
    }

    pub(crate) fn probe(&self) -> SinkProbe {
        SinkProbe { tally: Arc::downgrade(&self.tally) }
    }

    fn record(&self, succeeded: usize, failed: usize) {
        if succeeded == 0 && failed == 0 {
            return;
        }

        let expected = self.tally.expected;
        let mut state = self.tally.state.lock();

        // Failures win when a report overshoots, so clamping never hides one.
        let remaining = expected - state.outcome.reported();
        let counted_failed = failed.min(remaining);
        let counted_succeeded = succeeded.min(remaining - counted_failed);
        let discarded = succeeded + failed - counted_failed - counted_succeeded;

        state.outcome.failed += counted_failed;
        state.outcome.succeeded += counted_succeeded;
        state.outcome.discarded += discarded;

        debug!(
            succeeded = state.outcome.succeeded,
            failed = state.outcome.failed,
            expected,
            "outcome reported"
        );

        if discarded > 0 {
            warn!(
                reported_succeeded = succeeded,
                reported_failed = failed,
                discarded,
                expected,
                "outcome report exceeds remaining events, extra outcomes discarded"
            );
        }

        if state.outcome.reported() == expected {
            if let Some(signal) = state.signal.take() {
                let _ = signal.send(Completion { outcome: state.outcome, complete: true });
            }
        }
    }
}

/// Non-owning view of a sink's totals.
///
/// Lets the coordinator read progress on deadline expiry without keeping
/// the sink alive.
#[derive(Debug)]
pub(crate) struct SinkProbe {
    tally: Weak<Tally>,
}

impl SinkProbe {
    pub(crate) fn snapshot(&self) -> Option<EmissionOutcome> {
        self.tally.upgrade().map(|tally| tally.state.lock().outcome)
    }
}
