//! Test data builders for S3 notifications and Lambda invocations.
//!
//! Records are built from the canonical notification JSON so they match
//! what the Lambda runtime actually deserializes.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use aws_lambda_events::event::s3::S3Event;
use s3mon_core::{map_records, Batch, NotificationRecord, SchemaUri};
use s3mon_handler::Invocation;
use serde_json::{json, Value};

/// Function ARN used throughout the tests.
pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:s3-monitor";

/// Function name matching [`FUNCTION_ARN`].
pub const FUNCTION_NAME: &str = "s3-monitor";

/// Builder for a single S3 notification record.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    event_name: String,
    region: String,
    bucket: String,
    key: String,
    size: i64,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self {
            event_name: "ObjectCreated:Put".to_string(),
            region: "us-east-1".to_string(),
            bucket: "uploads".to_string(),
            key: "incoming/report.csv".to_string(),
            size: 1024,
        }
    }
}

impl RecordBuilder {
    /// Creates a builder with an `ObjectCreated:Put` record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event name, e.g. `ObjectRemoved:Delete`.
    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    /// Sets the record's AWS region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the bucket name.
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Sets the object key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the object size in bytes.
    pub fn size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    /// The record as notification JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "awsRegion": self.region,
            "eventTime": "2024-01-01T00:00:00.000Z",
            "eventName": self.event_name,
            "userIdentity": { "principalId": "AWS:AIDAEXAMPLE" },
            "requestParameters": { "sourceIPAddress": "203.0.113.7" },
            "responseElements": {
                "x-amz-request-id": "C3D13FE58DE4C810",
                "x-amz-id-2": "FMyUVURIY8/IgAtTv8xRjskZQpcIZ9KG4V5Wp6S7S/JRWeUWerMUE5JgHvANOjpD"
            },
            "s3": {
                "s3SchemaVersion": "1.0",
                "configurationId": "s3-monitor",
                "bucket": {
                    "name": self.bucket,
                    "ownerIdentity": { "principalId": "A3NL1KOZZKExample" },
                    "arn": format!("arn:aws:s3:::{}", self.bucket)
                },
                "object": {
                    "key": self.key,
                    "size": self.size,
                    "eTag": "d41d8cd98f00b204e9800998ecf8427e",
                    "sequencer": "0055AED6DCD90281E5"
                }
            }
        })
    }

    /// Builds the record.
    ///
    /// # Panics
    ///
    /// Panics if the notification JSON no longer matches the record type.
    pub fn build(&self) -> NotificationRecord {
        serde_json::from_value(self.to_json()).expect("fixture must be a valid S3 event record")
    }
}

/// `count` distinct records with keys `object-0`, `object-1`, ...
pub fn records(count: usize) -> Vec<Arc<NotificationRecord>> {
    (0..count)
        .map(|i| {
            let size = i64::try_from(i).unwrap_or(i64::MAX);
            Arc::new(RecordBuilder::new().key(format!("object-{i}")).size(size).build())
        })
        .collect()
}

/// A batch of `count` envelopes tagged with the default schema.
pub fn batch(count: usize) -> Batch {
    map_records(&SchemaUri::default(), records(count))
}

/// An S3 event carrying `count` records.
pub fn s3_event(count: usize) -> S3Event {
    let records: Vec<Value> =
        (0..count).map(|i| RecordBuilder::new().key(format!("object-{i}")).to_json()).collect();
    serde_json::from_value(json!({ "Records": records })).expect("fixture must be a valid S3 event")
}

/// An invocation of [`FUNCTION_ARN`] with `remaining` time left.
pub fn invocation(remaining: Option<Duration>) -> Invocation {
    Invocation {
        request_id: "8476a536-e9f4-11e8-9739-2dfe598c3fcd".to_string(),
        function_arn: FUNCTION_ARN.to_string(),
        function_name: FUNCTION_NAME.to_string(),
        deadline: remaining.map(|remaining| SystemTime::now() + remaining),
    }
}
