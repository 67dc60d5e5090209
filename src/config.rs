//! Client configuration, read from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::store::DEFAULT_MAX_NOTIFY_DEPTH;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub api: ApiConfig,
    pub router: RouterConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Where `/` redirects to.
    pub default_route: String,
    /// Where failing handlers send the user. Empty disables the redirect.
    pub error_route: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Storage key the state snapshot is persisted under.
    pub persist_key: String,
    pub max_notify_depth: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            api: ApiConfig::default(),
            router: RouterConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_route: "/dashboard".to_string(),
            error_route: "/error".to_string(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_key: "shopdesk-state".to_string(),
            max_notify_depth: DEFAULT_MAX_NOTIFY_DEPTH,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RouterConfig {
    pub fn error_route(&self) -> Option<&str> {
        Some(self.error_route.as_str()).filter(|route| !route.is_empty())
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = &self.api.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got `{base_url}`"
            )));
        }
        if self.api.timeout_ms == 0 {
            return Err(ConfigError::Invalid("api.timeout_ms must be positive".into()));
        }
        if !self.router.default_route.starts_with('/') {
            return Err(ConfigError::Invalid(
                "router.default_route must start with `/`".into(),
            ));
        }
        if let Some(route) = self.router.error_route() {
            if !route.starts_with('/') {
                return Err(ConfigError::Invalid(
                    "router.error_route must start with `/`".into(),
                ));
            }
        }
        if self.store.persist_key.is_empty() {
            return Err(ConfigError::Invalid("store.persist_key must not be empty".into()));
        }
        if self.store.max_notify_depth == 0 {
            return Err(ConfigError::Invalid(
                "store.max_notify_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
