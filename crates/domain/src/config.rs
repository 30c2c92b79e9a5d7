//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_API_TIMEOUT_SECS, DEFAULT_ENTITY_TTL_MS};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Remote API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

/// Durable session slot configuration
///
/// `storage_path: None` keeps the session in memory only, so a restart
/// requires a fresh login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub storage_path: Option<String>,
}

/// Read-through cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_entity_ttl_millis")]
    pub entity_ttl_millis: u64,
}

impl CacheSettings {
    pub fn entity_ttl(&self) -> Duration {
        Duration::from_millis(self.entity_ttl_millis)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { entity_ttl_millis: DEFAULT_ENTITY_TTL_MS }
    }
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}

fn default_entity_ttl_millis() -> u64 {
    DEFAULT_ENTITY_TTL_MS
}
