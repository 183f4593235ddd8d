//! Configuration for the s3mon Lambda handler.

use std::time::Duration;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use s3mon_core::{SchemaUri, DEFAULT_SCHEMA};
use s3mon_delivery::{
    ClientConfig, TrackerIdentity, DEFAULT_CONNECT_TIMEOUT_SECONDS, DEFAULT_READ_TIMEOUT_SECONDS,
    DEFAULT_REQUEST_TIMEOUT_SECONDS,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "s3mon.toml";
const ENV_PREFIX: &str = "S3MON_";

/// Handler configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables prefixed `S3MON_` (highest priority)
/// 2. Configuration file (`s3mon.toml`, optional)
/// 3. Built-in defaults (lowest priority)
///
/// The collector URL is deliberately absent: it is discovered per
/// invocation from the function's own description.
///
/// # Example
///
/// ```no_run
/// use s3mon_handler::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
/// println!("tracking as {}", config.app_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // Events
    /// Iglu schema every envelope is tagged with.
    ///
    /// Environment variable: `S3MON_SCHEMA_URI`
    #[serde(default = "default_schema_uri")]
    pub schema_uri: String,
    /// Application id sent with every event.
    ///
    /// Environment variable: `S3MON_APP_ID`
    #[serde(default = "default_tracker_name")]
    pub app_id: String,
    /// Tracker namespace sent with every event.
    ///
    /// Environment variable: `S3MON_NAMESPACE`
    #[serde(default = "default_tracker_name")]
    pub namespace: String,

    // Client
    /// Collector connect timeout in seconds.
    ///
    /// Environment variable: `S3MON_CONNECT_TIMEOUT_SECS`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Collector per-read timeout in seconds.
    ///
    /// Environment variable: `S3MON_READ_TIMEOUT_SECS`
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Whole-request collector timeout in seconds.
    ///
    /// Environment variable: `S3MON_REQUEST_TIMEOUT_SECS`
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Upper bound on events per collector request; unset sends each batch
    /// in one request.
    ///
    /// Environment variable: `S3MON_MAX_EVENTS_PER_REQUEST`
    #[serde(default)]
    pub max_events_per_request: Option<usize>,
    /// User agent for collector requests.
    ///
    /// Environment variable: `S3MON_USER_AGENT`
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // Invocation
    /// Time reserved before the Lambda deadline for reporting the result.
    ///
    /// Environment variable: `S3MON_DEADLINE_MARGIN_MS`
    #[serde(default = "default_deadline_margin")]
    pub deadline_margin_ms: u64,

    // Logging
    /// Log filter used when `RUST_LOG` is unset.
    ///
    /// Environment variable: `S3MON_RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl Config {
    /// Loads configuration from defaults, `s3mon.toml`, and `S3MON_*`
    /// environment variables, then validates it.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack [`load`](Self::load) extracts from.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extracts and validates configuration from `figment`.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed event schema.
    pub fn schema(&self) -> s3mon_core::Result<SchemaUri> {
        SchemaUri::parse(&self.schema_uri)
    }

    /// Convert to client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Convert to the tracker identity stamped on events.
    pub fn tracker_identity(&self) -> TrackerIdentity {
        TrackerIdentity { namespace: self.namespace.clone(), app_id: self.app_id.clone() }
    }

    /// Time reserved before the invocation deadline.
    pub fn deadline_margin(&self) -> Duration {
        Duration::from_millis(self.deadline_margin_ms)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if let Err(e) = self.schema() {
            anyhow::bail!("schema_uri is invalid: {e}");
        }

        if self.app_id.trim().is_empty() {
            anyhow::bail!("app_id must not be empty");
        }

        if self.namespace.trim().is_empty() {
            anyhow::bail!("namespace must not be empty");
        }

        if self.connect_timeout_secs == 0 {
            anyhow::bail!("connect_timeout_secs must be greater than 0");
        }

        if self.read_timeout_secs == 0 {
            anyhow::bail!("read_timeout_secs must be greater than 0");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.max_events_per_request == Some(0) {
            anyhow::bail!("max_events_per_request must be greater than 0 when set");
        }

        if self.user_agent.trim().is_empty() {
            anyhow::bail!("user_agent must not be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_uri: default_schema_uri(),
            app_id: default_tracker_name(),
            namespace: default_tracker_name(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            request_timeout_secs: default_request_timeout(),
            max_events_per_request: None,
            user_agent: default_user_agent(),
            deadline_margin_ms: default_deadline_margin(),
            rust_log: default_log_level(),
        }
    }
}

fn default_schema_uri() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_tracker_name() -> String {
    "s3-monitor-lambda".to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECONDS
}

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_SECONDS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_user_agent() -> String {
    ClientConfig::default().user_agent
}

fn default_deadline_margin() -> u64 {
    500
}

fn default_log_level() -> String {
    "info,s3mon=debug".to_string()
}
