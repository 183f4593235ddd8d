#![no_main]

//! Fuzz target for region extraction from execution identities.
//!
//! Any byte string that is valid UTF-8 must resolve to a region or fail with
//! `InvalidArgument`, and a resolved region must be a non-empty ARN field
//! without colons.

use libfuzzer_sys::fuzz_target;
use s3mon_core::{resolve_region, MonitorError};

fuzz_target!(|data: &[u8]| {
    let Ok(identity) = std::str::from_utf8(data) else {
        return;
    };

    match resolve_region(Some(identity)) {
        Ok(region) => {
            assert!(!region.as_str().is_empty());
            assert!(!region.as_str().contains(':'));
            assert_eq!(identity.trim().split(':').nth(3), Some(region.as_str()));
        },
        Err(MonitorError::InvalidArgument { .. }) => {},
        Err(other) => panic!("unexpected error kind: {other}"),
    }
});
