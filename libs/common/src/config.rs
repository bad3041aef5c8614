//! Application configuration (§6): store endpoint/credentials, publisher
//! endpoint, and the retention/TTL/execution defaults the core reads through
//! an injected config rather than touching the environment directly.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default = "default_database_name")]
    pub database_name: String,
}

fn default_store_endpoint() -> String {
    "memory://local".to_string()
}

fn default_database_name() -> String {
    "strata".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_store_endpoint(),
            credential: None,
            database_name: default_database_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublisherConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            key: None,
        }
    }
}

/// The configuration surface named in §6: retention/TTL/execution defaults
/// plus the store and publisher connection details.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrataConfig {
    pub store: StoreConfig,
    pub publisher: PublisherConfig,
    /// Default instance TTL in seconds (§6: 90 days).
    pub instance_ttl_seconds: i64,
    /// Default approval TTL in seconds (§6: 7 days).
    pub approval_ttl_seconds: i64,
    /// Default `maxExecutionDurationSeconds` ceiling (§6: 86,400).
    pub max_execution_seconds: i64,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            publisher: PublisherConfig::default(),
            instance_ttl_seconds: 7_776_000,
            approval_ttl_seconds: 604_800,
            max_execution_seconds: 86_400,
        }
    }
}

impl StrataConfig {
    /// Load configuration by layering defaults, an optional `config/*.toml`
    /// file, and `STRATA_`-prefixed environment variables. `.env` is loaded
    /// first (if present) so local development can set those variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("store.endpoint", defaults.store.endpoint)?
            .set_default("store.databaseName", defaults.store.database_name)?
            .set_default("instanceTtlSeconds", defaults.instance_ttl_seconds)?
            .set_default("approvalTtlSeconds", defaults.approval_ttl_seconds)?
            .set_default("maxExecutionSeconds", defaults.max_execution_seconds)?
            .add_source(config::File::with_name("config/strata").required(false))
            .add_source(config::Environment::with_prefix("STRATA").separator("__"));

        let settled = builder.build()?;
        Ok(settled.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = StrataConfig::default();
        assert_eq!(cfg.instance_ttl_seconds, 7_776_000);
        assert_eq!(cfg.approval_ttl_seconds, 604_800);
        assert_eq!(cfg.max_execution_seconds, 86_400);
    }
}
