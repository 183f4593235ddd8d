//! Collector endpoint discovery.
//!
//! The collector URL is not configured directly. Operators put it in the
//! function's own description, which is read back from the Lambda control
//! plane in the region the function runs in.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_lambda::error::DisplayErrorContext;
use s3mon_core::{MonitorError, Region, Result};
use tracing::{debug, info_span, Instrument};
use url::Url;

/// Read-only view of function metadata.
#[async_trait]
pub trait FunctionMetadata: Send + Sync {
    /// Free-text description of `function_name` in `region`, if it has one.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::MetadataLookup` when the query itself fails.
    async fn description(&self, region: &Region, function_name: &str) -> Result<Option<String>>;
}

/// [`FunctionMetadata`] backed by `lambda:GetFunctionConfiguration`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LambdaMetadata;

impl LambdaMetadata {
    /// Creates a metadata source using the default credential chain.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FunctionMetadata for LambdaMetadata {
    async fn description(&self, region: &Region, function_name: &str) -> Result<Option<String>> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.as_str().to_owned()))
            .load()
            .await;
        let client = aws_sdk_lambda::Client::new(&sdk_config);

        let output = client
            .get_function_configuration()
            .function_name(function_name)
            .send()
            .await
            .map_err(|e| {
                MonitorError::metadata_lookup(format!(
                    "GetFunctionConfiguration for '{function_name}' in {region} failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(output.description().map(str::to_owned))
    }
}

/// Resolves the collector URL for the running function.
#[derive(Clone)]
pub struct EndpointResolver {
    metadata: Arc<dyn FunctionMetadata>,
}

impl EndpointResolver {
    /// Creates a resolver reading descriptions from `metadata`.
    pub fn new(metadata: Arc<dyn FunctionMetadata>) -> Self {
        Self { metadata }
    }

    /// Looks up `function_name` in `region` and parses its description as
    /// the collector URL.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `function_name` is blank
    /// - `MetadataLookup` if the metadata query fails
    /// - `ConfigurationError` if the description is not a usable URL
    pub async fn resolve(&self, region: &Region, function_name: &str) -> Result<Url> {
        if function_name.trim().is_empty() {
            return Err(MonitorError::invalid_argument("function name is empty"));
        }

        let span = info_span!("resolve_endpoint", region = %region, function = function_name);
        async move {
            let description = self.metadata.description(region, function_name).await?;
            let url = parse_collector_url(description.as_deref())?;
            debug!(collector = %url, "resolved collector endpoint");
            Ok(url)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointResolver").finish_non_exhaustive()
    }
}

/// Interprets a function description as an absolute `http(s)` URL.
///
/// # Errors
///
/// Returns `MonitorError::ConfigurationError` when the description is
/// missing, blank, unparsable, or uses another scheme.
pub fn parse_collector_url(description: Option<&str>) -> Result<Url> {
    let raw = description
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| MonitorError::configuration("function description holds no collector URL"))?;

    let url = Url::parse(raw).map_err(|e| {
        MonitorError::configuration(format!("function description '{raw}' is not a valid URL: {e}"))
    })?;

    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        "http" | "https" => {
            Err(MonitorError::configuration(format!("collector URL '{raw}' has no host")))
        },
        scheme => Err(MonitorError::configuration(format!(
            "collector URL '{raw}' uses unsupported scheme '{scheme}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use s3mon_core::resolve_region;

    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl FunctionMetadata for Fixed {
        async fn description(&self, _: &Region, _: &str) -> Result<Option<String>> {
            Ok(self.0.map(str::to_owned))
        }
    }

    struct Broken;

    #[async_trait]
    impl FunctionMetadata for Broken {
        async fn description(&self, _: &Region, _: &str) -> Result<Option<String>> {
            Err(MonitorError::metadata_lookup("AccessDeniedException"))
        }
    }

    fn region() -> Region {
        resolve_region(Some("arn:aws:lambda:eu-west-1:123456789012:function:s3-monitor")).unwrap()
    }

    #[test]
    fn accepts_http_and_https() {
        let descriptions =
            ["https://collector.example.com/", "http://10.0.0.5:8080", " https://c.example.com "];
        for raw in descriptions {
            let url = parse_collector_url(Some(raw)).unwrap();
            assert!(matches!(url.scheme(), "http" | "https"), "{raw}");
        }
    }

    #[test]
    fn rejects_unusable_descriptions() {
        let descriptions = [
            None,
            Some(""),
            Some("   "),
            Some("not a url"),
            Some("collector.example.com"),
            Some("ftp://x.example.com"),
        ];
        for description in descriptions {
            assert!(
                matches!(
                    parse_collector_url(description),
                    Err(MonitorError::ConfigurationError { .. })
                ),
                "{description:?}"
            );
        }
    }

    #[tokio::test]
    async fn resolves_description_to_url() {
        let metadata = Fixed(Some("https://collector.example.com/"));
        let resolver = EndpointResolver::new(Arc::new(metadata));

        let url = resolver.resolve(&region(), "s3-monitor").await.unwrap();

        assert_eq!(url.as_str(), "https://collector.example.com/");
    }

    #[tokio::test]
    async fn invalid_description_is_configuration_error() {
        let resolver = EndpointResolver::new(Arc::new(Fixed(Some("not a url"))));

        let err = resolver.resolve(&region(), "s3-monitor").await.unwrap_err();

        assert!(matches!(err, MonitorError::ConfigurationError { .. }));
    }

    #[tokio::test]
    async fn lookup_failure_propagates() {
        let resolver = EndpointResolver::new(Arc::new(Broken));

        let err = resolver.resolve(&region(), "s3-monitor").await.unwrap_err();

        assert!(matches!(err, MonitorError::MetadataLookup { .. }));
    }

    #[tokio::test]
    async fn blank_function_name_is_invalid_argument() {
        let resolver = EndpointResolver::new(Arc::new(Fixed(Some("https://c.example.com"))));

        let err = resolver.resolve(&region(), " ").await.unwrap_err();

        assert!(matches!(err, MonitorError::InvalidArgument { .. }));
    }
}
