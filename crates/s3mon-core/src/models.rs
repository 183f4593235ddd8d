//! Domain models for schema-tagged notification events.
//!
//! An S3 notification record is wrapped into an [`EventEnvelope`] tagged with
//! the Iglu schema that describes it. Envelopes are collected into a
//! [`Batch`] whose length fixes how many delivery outcomes the coordinator
//! waits for. Payloads are shared by reference, never copied.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// A single S3 change notification as delivered by the Lambda platform.
pub type NotificationRecord = aws_lambda_events::event::s3::S3EventRecord;

/// Schema used for S3 notification events unless configured otherwise.
pub const DEFAULT_SCHEMA: &str = "iglu:com.amazon.aws.lambda/s3_notification_event/jsonschema/1-0-0";

const IGLU_PREFIX: &str = "iglu:";

/// Validated Iglu schema identifier.
///
/// Cheap to clone; every envelope in a batch shares the same allocation.
///
/// # Example
///
/// ```
/// use s3mon_core::SchemaUri;
/// let schema = SchemaUri::parse("iglu:com.acme/object_created/jsonschema/1-0-0").unwrap();
/// assert_eq!(schema.as_str(), "iglu:com.acme/object_created/jsonschema/1-0-0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaUri(Arc<str>);

impl SchemaUri {
    /// Parses a schema URI, requiring the `iglu:` prefix and a vendor path.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim();
        match value.strip_prefix(IGLU_PREFIX) {
            Some(path) if !path.is_empty() => Ok(Self(Arc::from(value))),
            _ => Err(MonitorError::configuration(format!(
                "schema '{value}' is not an Iglu URI (expected '{IGLU_PREFIX}vendor/name/format/version')"
            ))),
        }
    }

    /// Returns the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SchemaUri {
    fn default() -> Self {
        Self(Arc::from(DEFAULT_SCHEMA))
    }
}

impl fmt::Display for SchemaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchemaUri {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<SchemaUri> for String {
    fn from(schema: SchemaUri) -> Self {
        schema.0.to_string()
    }
}

/// AWS region code, e.g. `us-east-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region(String);

impl Region {
    pub(crate) fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the region code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A notification record tagged with the schema that describes it.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    schema: SchemaUri,
    payload: Arc<NotificationRecord>,
}

impl EventEnvelope {
    /// Wraps a shared record with a schema.
    pub fn new(schema: SchemaUri, payload: Arc<NotificationRecord>) -> Self {
        Self { schema, payload }
    }

    /// Schema identifying the payload.
    pub fn schema(&self) -> &SchemaUri {
        &self.schema
    }

    /// The wrapped notification record.
    pub fn payload(&self) -> &NotificationRecord {
        &self.payload
    }

    /// Whether both envelopes wrap the very same record allocation.
    pub fn shares_payload_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

/// Ordered set of envelopes submitted together in one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    envelopes: Vec<EventEnvelope>,
}

impl Batch {
    /// Number of envelopes, which is also the number of expected outcomes.
    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    /// Whether the batch holds no envelopes.
    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Envelopes in submission order.
    pub fn envelopes(&self) -> &[EventEnvelope] {
        &self.envelopes
    }

    /// Iterates envelopes in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, EventEnvelope> {
        self.envelopes.iter()
    }

    /// Splits into ordered sub-batches of at most `size` envelopes.
    ///
    /// A `size` of zero yields the whole batch as a single chunk.
    pub fn split(&self, size: usize) -> Vec<Batch> {
        if size == 0 || self.envelopes.len() <= size {
            return vec![self.clone()];
        }
        self.envelopes.chunks(size).map(|chunk| Batch::from(chunk.to_vec())).collect()
    }
}

impl From<Vec<EventEnvelope>> for Batch {
    fn from(envelopes: Vec<EventEnvelope>) -> Self {
        Self { envelopes }
    }
}

impl FromIterator<EventEnvelope> for Batch {
    fn from_iter<I: IntoIterator<Item = EventEnvelope>>(iter: I) -> Self {
        Self { envelopes: iter.into_iter().collect() }
    }
}

impl IntoIterator for Batch {
    type Item = EventEnvelope;
    type IntoIter = std::vec::IntoIter<EventEnvelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.envelopes.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a EventEnvelope;
    type IntoIter = std::slice::Iter<'a, EventEnvelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.envelopes.iter()
    }
}

/// Aggregated delivery outcome for one batch.
///
/// `succeeded + failed` never exceeds the batch length. Reports that would
/// push past it are counted in `discarded` instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmissionOutcome {
    /// Envelopes confirmed delivered.
    pub succeeded: usize,
    /// Envelopes reported failed.
    pub failed: usize,
    /// Reported outcomes dropped by clamping.
    pub discarded: usize,
}

impl EmissionOutcome {
    /// Outcomes counted towards completion.
    pub fn reported(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Whether no envelope failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_iglu_prefix() {
        assert!(SchemaUri::parse(DEFAULT_SCHEMA).is_ok());
        assert!(SchemaUri::parse("  iglu:com.acme/x/jsonschema/1-0-0 ").is_ok());

        assert!(matches!(
            SchemaUri::parse("http://example.com/schema"),
            Err(MonitorError::ConfigurationError { .. })
        ));
        assert!(SchemaUri::parse("iglu:").is_err());
        assert!(SchemaUri::parse("").is_err());
    }

    #[test]
    fn schema_serde_round_trip_validates() {
        let schema: SchemaUri = serde_json::from_str(&format!("\"{DEFAULT_SCHEMA}\"")).unwrap();
        assert_eq!(schema, SchemaUri::default());
        assert_eq!(serde_json::to_string(&schema).unwrap(), format!("\"{DEFAULT_SCHEMA}\""));

        let invalid: std::result::Result<SchemaUri, _> = serde_json::from_str("\"not-iglu\"");
        assert!(invalid.is_err());
    }

    #[test]
    fn batch_split_preserves_order() {
        let schema = SchemaUri::default();
        let batch: Batch = (0..5)
            .map(|_| EventEnvelope::new(schema.clone(), Arc::new(NotificationRecord::default())))
            .collect();

        let chunks = batch.split(2);
        assert_eq!(chunks.iter().map(Batch::len).collect::<Vec<_>>(), vec![2, 2, 1]);

        let rejoined: Vec<&EventEnvelope> = chunks.iter().flat_map(Batch::iter).collect();
        for (original, rejoined) in batch.iter().zip(rejoined) {
            assert!(original.shares_payload_with(rejoined));
        }

        assert_eq!(batch.split(0).len(), 1);
        assert_eq!(batch.split(10).len(), 1);
    }

    #[test]
    fn outcome_counts() {
        let outcome = EmissionOutcome { succeeded: 3, failed: 1, discarded: 2 };
        assert_eq!(outcome.reported(), 4);
        assert!(!outcome.is_success());
        assert!(EmissionOutcome::default().is_success());
    }
}
