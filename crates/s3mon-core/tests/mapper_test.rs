//! Integration tests for envelope mapping.
//!
//! Covers order preservation, schema tagging and the guarantee that mapping
//! the same records twice yields equal batches sharing payload references.

use std::sync::Arc;

use proptest::prelude::*;
use s3mon_core::{map_records, to_envelope, NotificationRecord, SchemaUri};
use serde_json::json;

fn record(key: &str, size: i64) -> Arc<NotificationRecord> {
    let value = json!({
        "eventVersion": "2.1",
        "eventSource": "aws:s3",
        "awsRegion": "us-east-1",
        "eventTime": "2024-01-01T00:00:00.000Z",
        "eventName": "ObjectCreated:Put",
        "userIdentity": { "principalId": "AWS:EXAMPLE" },
        "requestParameters": { "sourceIPAddress": "127.0.0.1" },
        "responseElements": {
            "x-amz-request-id": "C3D13FE58DE4C810",
            "x-amz-id-2": "FMyUVURIY8/IgAtTv8xRjskZQpcIZ9KG4V5Wp6S7S/JRWeUWerMUE5JgHvANOjpD"
        },
        "s3": {
            "s3SchemaVersion": "1.0",
            "configurationId": "monitor",
            "bucket": {
                "name": "uploads",
                "ownerIdentity": { "principalId": "A3NL1KOZZKExample" },
                "arn": "arn:aws:s3:::uploads"
            },
            "object": {
                "key": key,
                "size": size,
                "eTag": "d41d8cd98f00b204e9800998ecf8427e",
                "sequencer": "0055AED6DCD90281E5"
            }
        }
    });
    Arc::new(serde_json::from_value(value).expect("valid S3 event record"))
}

#[test]
fn envelope_carries_schema_and_payload() {
    let schema = SchemaUri::default();
    let record = record("photos/cat.jpg", 2048);

    let envelope = to_envelope(&schema, record.clone());

    assert_eq!(envelope.schema(), &schema);
    assert_eq!(envelope.payload(), record.as_ref());
    assert_eq!(envelope.payload().s3.object.key.as_deref(), Some("photos/cat.jpg"));
}

#[test]
fn mapping_preserves_input_order() {
    let schema = SchemaUri::parse("iglu:com.acme/upload/jsonschema/1-0-0").unwrap();
    let records: Vec<_> = (0..4).map(|i| record(&format!("object-{i}"), i)).collect();

    let batch = map_records(&schema, records.iter().cloned());

    assert_eq!(batch.len(), 4);
    let keys: Vec<_> =
        batch.iter().map(|envelope| envelope.payload().s3.object.key.clone().unwrap()).collect();
    assert_eq!(keys, vec!["object-0", "object-1", "object-2", "object-3"]);
    assert!(batch.iter().all(|envelope| envelope.schema() == &schema));
}

#[test]
fn empty_input_maps_to_empty_batch() {
    let batch = map_records(&SchemaUri::default(), Vec::new());
    assert!(batch.is_empty());
    assert_eq!(batch.len(), 0);
}

proptest! {
    /// Mapping is deterministic and shares payloads instead of copying.
    #[test]
    fn mapping_twice_is_structurally_equal(
        keys in prop::collection::vec("[a-z0-9/._-]{1,40}", 0..32),
    ) {
        let schema = SchemaUri::default();
        let records: Vec<_> =
            keys.iter().enumerate().map(|(i, key)| record(key, i as i64)).collect();

        let first = map_records(&schema, records.iter().cloned());
        let second = map_records(&schema, records.iter().cloned());

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), records.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert!(a.shares_payload_with(b));
            prop_assert_eq!(a.schema(), b.schema());
        }
    }
}
