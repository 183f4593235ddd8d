//! Scripted transports for exercising the emission coordinator.
//!
//! A [`ScriptedTransport`] replays a fixed list of reports, each from its own
//! spawned task, so tests control exactly how outcomes are split across
//! callbacks without touching the network.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use s3mon_core::Batch;
use s3mon_delivery::{OutcomeSink, Transport};
use tokio_util::sync::CancellationToken;

/// One callback invocation a scripted transport performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// `on_success(count)`.
    Success(usize),
    /// `on_failure(succeeded, <failed envelopes>)`.
    Failure {
        /// Envelopes confirmed in the same report.
        succeeded: usize,
        /// Envelopes reported failed.
        failed: usize,
    },
}

impl Report {
    fn width(self) -> usize {
        match self {
            Self::Success(count) => count,
            Self::Failure { succeeded, failed } => succeeded + failed,
        }
    }
}

#[derive(Debug, Clone)]
enum Plan {
    Reports(Vec<Report>),
    Chunks { size: usize, failing: Vec<usize> },
    Silent,
}

/// Transport that reports a predetermined script.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    plan: Plan,
    spacing: Duration,
    submissions: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
    batches: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedTransport {
    fn with_plan(plan: Plan) -> Self {
        Self {
            plan,
            spacing: Duration::ZERO,
            submissions: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replays `reports` in order, one task per report. A script whose
    /// reports sum to less than the batch abandons the sink.
    pub fn reports(reports: impl IntoIterator<Item = Report>) -> Self {
        Self::with_plan(Plan::Reports(reports.into_iter().collect()))
    }

    /// Splits the batch into chunks of `size` and reports each as delivered.
    pub fn chunked(size: usize) -> Self {
        Self::with_plan(Plan::Chunks { size, failing: Vec::new() })
    }

    /// Like [`chunked`](Self::chunked) but reports chunks at the given
    /// indices as failed.
    pub fn chunked_with_failures(size: usize, failing: impl IntoIterator<Item = usize>) -> Self {
        Self::with_plan(Plan::Chunks { size, failing: failing.into_iter().collect() })
    }

    /// Never reports; holds the sink until cancelled.
    pub fn silent() -> Self {
        Self::with_plan(Plan::Silent)
    }

    /// Delays the n-th report by `n * spacing`.
    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Number of `submit` calls.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::Acquire)
    }

    /// Number of tasks that observed cancellation before reporting.
    pub fn cancellations(&self) -> usize {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sizes of the submitted batches.
    pub fn submitted_batches(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    fn script_for(&self, batch: &Batch) -> Vec<Report> {
        match &self.plan {
            Plan::Reports(reports) => reports.clone(),
            Plan::Chunks { size, failing } => batch
                .split(*size)
                .iter()
                .enumerate()
                .map(|(index, chunk)| {
                    if failing.contains(&index) {
                        Report::Failure { succeeded: 0, failed: chunk.len() }
                    } else {
                        Report::Success(chunk.len())
                    }
                })
                .collect(),
            Plan::Silent => Vec::new(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn submit(&self, batch: Batch, sink: OutcomeSink, cancel: CancellationToken) {
        self.submissions.fetch_add(1, Ordering::AcqRel);
        self.batches.lock().push(batch.len());

        if matches!(self.plan, Plan::Silent) {
            let cancelled = self.cancelled.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                cancelled.fetch_add(1, Ordering::AcqRel);
                drop(sink);
            });
            return;
        }

        let mut offset = 0;
        for (index, report) in self.script_for(&batch).into_iter().enumerate() {
            let start = offset.min(batch.len());
            offset += report.width();

            let failed = match report {
                Report::Success(_) => Vec::new(),
                Report::Failure { succeeded, failed } => {
                    let from = (start + succeeded).min(batch.len());
                    let to = (from + failed).min(batch.len());
                    batch.envelopes()[from..to].to_vec()
                },
            };

            let sink = sink.clone();
            let cancel = cancel.clone();
            let cancelled = self.cancelled.clone();
            let delay = self.spacing * u32::try_from(index).unwrap_or(u32::MAX);

            tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => {
                        cancelled.fetch_add(1, Ordering::AcqRel);
                    }
                    () = tokio::time::sleep(delay) => match report {
                        Report::Success(count) => sink.on_success(count),
                        Report::Failure { succeeded, .. } => sink.on_failure(succeeded, &failed),
                    },
                }
            });
        }
    }
}
