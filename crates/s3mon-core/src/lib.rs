//! Core domain models for the S3 notification monitor.
//!
//! Provides the schema-tagged envelope types that flow from the Lambda
//! handler to the collector, the region resolver, the event mapper, the
//! shared error taxonomy and a clock abstraction. Every other crate in the
//! workspace builds on these types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mapper;
pub mod models;
pub mod region;
pub mod time;

pub use error::{ErrorCategory, MonitorError, Result};
pub use mapper::{map_records, to_envelope};
pub use models::{
    Batch, EmissionOutcome, EventEnvelope, NotificationRecord, Region, SchemaUri, DEFAULT_SCHEMA,
};
pub use region::resolve_region;
pub use time::{Clock, RealClock, TestClock};
