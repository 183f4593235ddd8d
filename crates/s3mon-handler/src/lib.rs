//! Lambda-facing half of s3mon.
//!
//! Wires configuration, collector discovery and the emission coordinator
//! into a single [`NotificationHandler::handle`] call per invocation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod endpoint;
pub mod handler;

pub use config::Config;
pub use endpoint::{parse_collector_url, EndpointResolver, FunctionMetadata, LambdaMetadata};
pub use handler::{Invocation, NotificationHandler};
