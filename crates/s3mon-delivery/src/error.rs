//! Per-request failure types for collector delivery.
//!
//! A failed request never surfaces to the caller on its own: the transport
//! logs it with its category and reports every envelope in the request as
//! failed through the outcome sink. The coordinator then aggregates those
//! counts into a single `MonitorError::TransportFailure`.

use std::fmt;

use thiserror::Error;

/// Why a single collector request did not deliver its events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// Request did not complete within the configured timeout.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured request timeout in milliseconds
        timeout_ms: u64,
    },

    /// Collector answered with a non-2xx status.
    #[error("collector rejected request: HTTP {status_code}")]
    Rejected {
        /// HTTP status code
        status_code: u16,
        /// Response body content (truncated)
        body: String,
    },

    /// Events could not be encoded into the tracker payload.
    #[error("failed to encode tracker payload: {message}")]
    Encoding {
        /// Serializer error message
        message: String,
    },
}

impl DeliveryFailure {
    /// Creates a network failure from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout failure.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Creates a rejection from an HTTP response.
    pub fn rejected(status_code: u16, body: impl Into<String>) -> Self {
        Self::Rejected { status_code, body: body.into() }
    }

    /// Creates an encoding failure.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding { message: message.into() }
    }

    /// Category label used in structured logs.
    pub fn category(&self) -> FailureCategory {
        FailureCategory::from(self)
    }
}

/// Category of delivery failure for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Connection or timeout issues.
    Network,
    /// Collector returned 4xx.
    Client,
    /// Collector returned 5xx or an unexpected status.
    Server,
    /// Local serialization problem.
    Encoding,
}

impl From<&DeliveryFailure> for FailureCategory {
    fn from(failure: &DeliveryFailure) -> Self {
        match failure {
            DeliveryFailure::Network { .. } | DeliveryFailure::Timeout { .. } => Self::Network,
            DeliveryFailure::Rejected { status_code, .. } if (400..500).contains(status_code) => {
                Self::Client
            },
            DeliveryFailure::Rejected { .. } => Self::Server,
            DeliveryFailure::Encoding { .. } => Self::Encoding,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
            Self::Encoding => write!(f, "encoding"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_categories_mapped_correctly() {
        assert_eq!(DeliveryFailure::network("refused").category(), FailureCategory::Network);
        assert_eq!(DeliveryFailure::timeout(5000).category(), FailureCategory::Network);
        assert_eq!(DeliveryFailure::rejected(400, "bad").category(), FailureCategory::Client);
        assert_eq!(DeliveryFailure::rejected(503, "down").category(), FailureCategory::Server);
        assert_eq!(DeliveryFailure::rejected(302, "").category(), FailureCategory::Server);
        assert_eq!(DeliveryFailure::encoding("nan").category(), FailureCategory::Encoding);
    }

    #[test]
    fn failure_display_format() {
        assert_eq!(DeliveryFailure::timeout(5000).to_string(), "request timeout after 5000ms");
        assert_eq!(
            DeliveryFailure::rejected(502, "bad gateway").to_string(),
            "collector rejected request: HTTP 502"
        );
        assert_eq!(FailureCategory::Client.to_string(), "client");
    }
}
