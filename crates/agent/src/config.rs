//! Agent configuration

use anyhow::{bail, Context, Result};
use device_health_lib::api::ClientConfig;
use device_health_lib::collector::Family;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Prefix of every environment variable read by the agent
pub const ENV_PREFIX: &str = "DEVICE_HEALTH";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Dashboard API root
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Dashboard API key sent as a bearer token
    #[serde(default)]
    pub api_key: String,

    /// Organizations collected on every pass
    #[serde(default, deserialize_with = "string_list")]
    pub organization_ids: Vec<String>,

    /// Pause between collection passes in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    #[serde(default = "default_jitter")]
    pub jitter_secs: u64,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Concurrent per-device/per-network requests within a family
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Enabled families; empty means all
    #[serde(default, deserialize_with = "string_list")]
    pub families: Vec<String>,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_api_base_url() -> String {
    "https://api.meraki.com".to_string()
}

fn default_collection_interval() -> u64 {
    300
}

fn default_jitter() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    4
}

fn default_api_port() -> u16 {
    8080
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListItem {
    Text(String),
    Integer(i64),
    Unsigned(u64),
}

impl From<ListItem> for String {
    fn from(item: ListItem) -> Self {
        match item {
            ListItem::Text(s) => s,
            ListItem::Integer(n) => n.to_string(),
            ListItem::Unsigned(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListValue {
    Many(Vec<ListItem>),
    One(ListItem),
}

/// Reads a list given as a sequence, a comma separated string or a single
/// number. The environment source turns a lone numeric id into an integer.
fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListValue::deserialize(deserializer)? {
        ListValue::Many(items) => items.into_iter().map(String::from).collect(),
        ListValue::One(ListItem::Text(s)) => s.split(',').map(str::to_string).collect(),
        ListValue::One(item) => vec![String::from(item)],
    })
}

/// `DEVICE_HEALTH_*` variables; list keys are comma separated
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("organization_ids")
        .with_list_parse_key("families")
}

impl AgentConfig {
    /// Load configuration from `DEVICE_HEALTH_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_source(environment())
    }

    /// Load and validate configuration from any `config` source
    pub fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: AgentConfig = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            bail!("{}_API_KEY is required", ENV_PREFIX);
        }
        if self.organization_ids.iter().all(|id| id.trim().is_empty()) {
            bail!("{}_ORGANIZATION_IDS must name at least one organization", ENV_PREFIX);
        }
        if self.max_attempts == 0 {
            bail!("{}_MAX_ATTEMPTS must be at least 1", ENV_PREFIX);
        }
        self.enabled_families()?;
        Ok(())
    }

    /// Organization ids with blanks removed
    pub fn organizations(&self) -> Vec<String> {
        self.organization_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Families to collect, in collection order
    pub fn enabled_families(&self) -> Result<Vec<Family>> {
        let requested = self
            .families
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| name.parse::<Family>().map_err(anyhow::Error::msg))
            .collect::<Result<Vec<_>>>()?;

        if requested.is_empty() {
            return Ok(Family::ALL.to_vec());
        }
        Ok(Family::ALL
            .into_iter()
            .filter(|family| requested.contains(family))
            .collect())
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_secs(self.jitter_secs)
    }

    /// Settings for the retrying dashboard client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_key: self.api_key.clone(),
            max_attempts: self.max_attempts,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}
