use std::time::Duration;

use serde::{Deserialize, Serialize};

use storefront_cache::RedisConfig;
use storefront_db_postgres::PostgresConfig;
use storefront_storage::ProductKey;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RefreshConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    /// Redis configuration. When enabled, refreshed keys are published so
    /// running servers can re-warm their cache.
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RefreshConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.refresh.products.is_empty() {
            return Err("refresh.products must not be empty".into());
        }
        if self.refresh.timeout_ms == 0 {
            return Err("refresh.timeout_ms must be > 0".into());
        }
        if self.refresh.upstream.base_url.is_empty() {
            return Err("refresh.upstream.base_url must be set".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.storage.postgres.validate()?;
        self.redis.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Product keys, refreshed in list order. Empty keys fail to deserialize.
    #[serde(default = "default_products")]
    pub products: Vec<ProductKey>,
    /// Delay between consecutive fetch start times
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
    /// Hard deadline for the whole run, measured from start
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

fn default_products() -> Vec<ProductKey> {
    ["beanies", "facemasks", "gloves"]
        .into_iter()
        .filter_map(|p| ProductKey::new(p).ok())
        .collect()
}
fn default_base_interval_ms() -> u64 {
    5000
}
fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            products: default_products(),
            base_interval_ms: default_base_interval_ms(),
            timeout_ms: default_timeout_ms(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl RefreshSettings {
    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream product API
    #[serde(default = "default_upstream_url")]
    pub base_url: String,
    /// Per-request timeout for upstream calls
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_upstream_url() -> String {
    "http://localhost:8080".into()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::RefreshConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "storefront.toml";

    /// Loads the refresh job's sections from the shared config file.
    ///
    /// Sections the job does not know (e.g. `server`, `auth`) are ignored, so
    /// the server and the job can share one file.
    pub fn load_config(path: Option<&str>) -> Result<RefreshConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., STOREFRONT__REFRESH__TIMEOUT_MS=20000
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("refresh.products"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: RefreshConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = RefreshConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.refresh.base_interval(), Duration::from_secs(5));
        let keys: Vec<&str> = cfg.refresh.products.iter().map(ProductKey::as_str).collect();
        assert_eq!(keys, ["beanies", "facemasks", "gloves"]);
    }

    #[test]
    fn test_empty_products_rejected() {
        let mut cfg = RefreshConfig::default();
        cfg.refresh.products.clear();
        assert!(cfg.validate().unwrap_err().contains("refresh.products"));
    }

    #[test]
    fn test_empty_product_key_fails_to_deserialize() {
        let err = serde_json::from_value::<RefreshSettings>(serde_json::json!({
            "products": ["beanies", ""]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("empty"), "{err}");

        let settings: RefreshSettings =
            serde_json::from_value(serde_json::json!({"products": ["gloves"]})).unwrap();
        assert_eq!(settings.products, vec![ProductKey::new("gloves").unwrap()]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut cfg = RefreshConfig::default();
        cfg.refresh.timeout_ms = 0;
        assert!(cfg.validate().unwrap_err().contains("timeout_ms"));
    }
}
