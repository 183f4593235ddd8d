//! Wraps notification records into schema-tagged envelopes.

use std::sync::Arc;

use crate::models::{Batch, EventEnvelope, NotificationRecord, SchemaUri};

/// Tags one record with `schema`.
pub fn to_envelope(schema: &SchemaUri, record: Arc<NotificationRecord>) -> EventEnvelope {
    EventEnvelope::new(schema.clone(), record)
}

/// Tags every record with `schema`, preserving input order.
///
/// Records are shared, not copied: mapping the same `Arc`s twice produces
/// batches whose envelopes point at the same payloads.
pub fn map_records<I>(schema: &SchemaUri, records: I) -> Batch
where
    I: IntoIterator<Item = Arc<NotificationRecord>>,
{
    records.into_iter().map(|record| to_envelope(schema, record)).collect()
}
