//! In-memory function metadata.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use s3mon_core::{MonitorError, Region, Result};
use s3mon_handler::FunctionMetadata;

/// Returns a fixed description and records every lookup.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    description: Option<String>,
    failure: Option<String>,
    lookups: Arc<Mutex<Vec<(String, String)>>>,
}

impl StaticMetadata {
    /// Describes every function with `description`.
    pub fn describing(description: impl Into<String>) -> Self {
        Self { description: Some(description.into()), ..Self::default() }
    }

    /// Functions without a description.
    pub fn undescribed() -> Self {
        Self::default()
    }

    /// Every lookup fails with `MetadataLookup`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Self::default() }
    }

    /// `(region, function_name)` pairs looked up so far.
    pub fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl FunctionMetadata for StaticMetadata {
    async fn description(&self, region: &Region, function_name: &str) -> Result<Option<String>> {
        self.lookups.lock().push((region.as_str().to_string(), function_name.to_string()));

        match &self.failure {
            Some(message) => Err(MonitorError::metadata_lookup(message.clone())),
            None => Ok(self.description.clone()),
        }
    }
}
