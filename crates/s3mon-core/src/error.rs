//! Error taxonomy for notification forwarding.
//!
//! Every failure a handler invocation can hit maps onto one variant here.
//! None of them are retried internally: they propagate out of the Lambda
//! function so the platform marks the invocation failed and its own redrive
//! policy applies.

use std::fmt;

use thiserror::Error;

/// Result type alias using `MonitorError`.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors surfaced by a handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Malformed or empty execution identity.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the input
        message: String,
    },

    /// Collector URL missing or unusable.
    #[error("configuration error: {message}")]
    ConfigurationError {
        /// What was wrong with the configuration
        message: String,
    },

    /// The function metadata query itself failed.
    #[error("function metadata lookup failed: {message}")]
    MetadataLookup {
        /// Error reported by the metadata service
        message: String,
    },

    /// One or more events were not confirmed delivered.
    #[error("failed to send {failed} of {total} events to collector")]
    TransportFailure {
        /// Events reported failed or never reported
        failed: usize,
        /// Size of the submitted batch
        total: usize,
    },

    /// The wait for delivery outcomes was aborted.
    #[error("interrupted while waiting for delivery outcomes: {reason}")]
    InterruptedWait {
        /// Why the wait was aborted
        reason: String,
    },

    /// The wait budget ran out before every outcome was reported.
    #[error("delivery deadline of {budget_ms}ms exceeded with {reported} of {total} outcomes reported")]
    DeadlineExceeded {
        /// Wait budget in milliseconds
        budget_ms: u64,
        /// Outcomes reported before expiry
        reported: usize,
        /// Size of the submitted batch
        total: usize,
    },
}

impl MonitorError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Creates a metadata lookup error.
    pub fn metadata_lookup(message: impl Into<String>) -> Self {
        Self::MetadataLookup { message: message.into() }
    }

    /// Creates a transport failure for `failed` of `total` events.
    pub fn transport_failure(failed: usize, total: usize) -> Self {
        Self::TransportFailure { failed, total }
    }

    /// Creates an interrupted wait error.
    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::InterruptedWait { reason: reason.into() }
    }

    /// Creates a deadline exceeded error.
    pub fn deadline_exceeded(budget_ms: u64, reported: usize, total: usize) -> Self {
        Self::DeadlineExceeded { budget_ms, reported, total }
    }

    /// Whether the host environment may be tearing down around this error.
    ///
    /// Fatal errors mean the invocation was cut short rather than completed
    /// with a known result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InterruptedWait { .. } | Self::DeadlineExceeded { .. })
    }
}

/// Category of monitor error for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input from the platform.
    Input,
    /// Deployment or metadata problems.
    Configuration,
    /// Events not delivered.
    Delivery,
    /// Wait cut short.
    Aborted,
}

impl From<&MonitorError> for ErrorCategory {
    fn from(error: &MonitorError) -> Self {
        match error {
            MonitorError::InvalidArgument { .. } => Self::Input,
            MonitorError::ConfigurationError { .. } | MonitorError::MetadataLookup { .. } => {
                Self::Configuration
            },
            MonitorError::TransportFailure { .. } => Self::Delivery,
            MonitorError::InterruptedWait { .. } | MonitorError::DeadlineExceeded { .. } => {
                Self::Aborted
            },
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Configuration => write!(f, "configuration"),
            Self::Delivery => write!(f, "delivery"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_identified_correctly() {
        assert!(MonitorError::interrupted("runtime shutting down").is_fatal());
        assert!(MonitorError::deadline_exceeded(500, 1, 3).is_fatal());

        assert!(!MonitorError::invalid_argument("empty").is_fatal());
        assert!(!MonitorError::configuration("bad url").is_fatal());
        assert!(!MonitorError::metadata_lookup("access denied").is_fatal());
        assert!(!MonitorError::transport_failure(1, 10).is_fatal());
    }

    #[test]
    fn error_categories_mapped_correctly() {
        assert_eq!(ErrorCategory::from(&MonitorError::invalid_argument("x")), ErrorCategory::Input);
        assert_eq!(
            ErrorCategory::from(&MonitorError::metadata_lookup("x")),
            ErrorCategory::Configuration
        );
        assert_eq!(
            ErrorCategory::from(&MonitorError::transport_failure(2, 4)),
            ErrorCategory::Delivery
        );
        assert_eq!(ErrorCategory::from(&MonitorError::interrupted("x")), ErrorCategory::Aborted);
    }

    #[test]
    fn error_display_format() {
        let error = MonitorError::transport_failure(3, 10);
        assert_eq!(error.to_string(), "failed to send 3 of 10 events to collector");

        let deadline = MonitorError::deadline_exceeded(1500, 4, 9);
        assert_eq!(
            deadline.to_string(),
            "delivery deadline of 1500ms exceeded with 4 of 9 outcomes reported"
        );
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
    }
}
