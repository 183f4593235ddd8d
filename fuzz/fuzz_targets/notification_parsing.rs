#![no_main]

//! Fuzz target for S3 notification parsing and mapping.
//!
//! Arbitrary payloads must either fail to deserialize or map to exactly one
//! envelope per record, never panic.

use std::sync::Arc;

use aws_lambda_events::event::s3::S3Event;
use libfuzzer_sys::fuzz_target;
use s3mon_core::{map_records, SchemaUri};

fuzz_target!(|data: &[u8]| {
    let Ok(event) = serde_json::from_slice::<S3Event>(data) else {
        return;
    };

    let count = event.records.len();
    let batch = map_records(&SchemaUri::default(), event.records.into_iter().map(Arc::new));
    assert_eq!(batch.len(), count);

    for chunk_size in [1, 7] {
        let chunks = batch.split(chunk_size);
        assert_eq!(chunks.iter().map(|chunk| chunk.len()).sum::<usize>(), count);
    }
});
