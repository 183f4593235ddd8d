//! Region extraction from execution identities.

use crate::{
    error::{MonitorError, Result},
    models::Region,
};

/// Zero-based position of the region in an ARN
/// (`arn:partition:service:region:account:resource`).
pub const REGION_FIELD_INDEX: usize = 3;

/// Extracts the region code from a function ARN.
///
/// # Errors
///
/// Returns `MonitorError::InvalidArgument` when the identity is absent,
/// blank, has fewer than four colon-delimited fields, or carries an empty
/// region field.
///
/// # Example
///
/// ```
/// use s3mon_core::resolve_region;
/// let region =
///     resolve_region(Some("arn:aws:lambda:us-east-1:123456789012:function:my-function")).unwrap();
/// assert_eq!(region.as_str(), "us-east-1");
/// ```
pub fn resolve_region(identity: Option<&str>) -> Result<Region> {
    let identity = identity
        .map(str::trim)
        .filter(|arn| !arn.is_empty())
        .ok_or_else(|| MonitorError::invalid_argument("cannot extract region from empty ARN"))?;

    match identity.split(':').nth(REGION_FIELD_INDEX) {
        Some(region) if !region.is_empty() => Ok(Region::new(region)),
        Some(_) => Err(MonitorError::invalid_argument(format!(
            "ARN '{identity}' has an empty region field"
        ))),
        None => Err(MonitorError::invalid_argument(format!(
            "couldn't get region from ARN '{identity}': expected at least {} colon-delimited fields",
            REGION_FIELD_INDEX + 1
        ))),
    }
}
