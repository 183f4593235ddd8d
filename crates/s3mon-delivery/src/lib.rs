//! Batch emission to a remote collector.
//!
//! This crate owns the only part of the handler with real concurrency
//! hazards: turning a callback-reporting transport into a single awaited
//! call with exactly-once completion detection.
//!
//! # Architecture
//!
//! 1. **Coordinator** - arms a one-shot completion signal, submits the batch
//!    and waits (bounded by an optional deadline) for every outcome
//! 2. **Outcome sink** - the callback handle transports report through;
//!    aggregates partial success/failure reports under one lock
//! 3. **Collector transport** - posts sub-batches over HTTP on spawned
//!    tasks and reports each sub-batch's result
//! 4. **Wire encoding** - Snowplow tracker-protocol payloads
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use s3mon_core::{Batch, RealClock};
//! use s3mon_delivery::{ClientConfig, CollectorTransport, EmissionCoordinator, TrackerIdentity};
//! use url::Url;
//!
//! # async fn example(batch: Batch) -> s3mon_core::Result<()> {
//! let collector = Url::parse("https://collector.example.com/").expect("valid URL");
//! let identity =
//!     TrackerIdentity { namespace: "s3-monitor".into(), app_id: "s3-monitor".into() };
//! let config = ClientConfig::default();
//! let transport = CollectorTransport::new(&collector, config, identity, Arc::new(RealClock))?;
//!
//! EmissionCoordinator::new(Arc::new(transport)).emit(batch).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod collector;
pub mod coordinator;
pub mod error;
pub mod transport;
pub mod wire;

pub use client::{ClientConfig, CollectorClient};
pub use collector::CollectorTransport;
pub use coordinator::{EmissionCoordinator, EmissionState};
pub use error::{DeliveryFailure, FailureCategory};
pub use transport::{Completion, CompletionSignal, OutcomeSink, Transport};
pub use wire::{PayloadEncoder, TrackerEvent, TrackerIdentity};

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Default timeout for each read from the collector, in seconds.
pub const DEFAULT_READ_TIMEOUT_SECONDS: u64 = 5;

/// Default ceiling on a whole request, in seconds. Bounds the write of a
/// large body, which reqwest has no separate timeout for.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
