//! Test infrastructure shared by the s3mon crates.
//!
//! Provides notification fixtures, scripted transports for driving the
//! emission coordinator, a wiremock-backed collector, and in-memory function
//! metadata.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod collector;
pub mod fixtures;
pub mod metadata;
pub mod transport;

pub use collector::MockCollector;
pub use fixtures::{
    batch, invocation, records, s3_event, RecordBuilder, FUNCTION_ARN, FUNCTION_NAME,
};
pub use http::StatusCode;
pub use metadata::StaticMetadata;
pub use s3mon_core::{Clock, TestClock};
pub use transport::{Report, ScriptedTransport};
