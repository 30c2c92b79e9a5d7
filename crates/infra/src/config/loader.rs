//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `WAREHOUSE_API_URL` is missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `WAREHOUSE_API_URL`: API base URL (required for environment loading)
//! - `WAREHOUSE_API_TIMEOUT`: Transport timeout in seconds
//! - `WAREHOUSE_SESSION_PATH`: File that persists the signed-in session
//! - `WAREHOUSE_ENTITY_TTL_MS`: Entity cache TTL in milliseconds
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./warehouse.toml` or `./warehouse.json`
//! 2. `./config.toml` or `./config.json`
//! 3. `../config.toml` or `../config.json`

use std::path::{Path, PathBuf};

use warehouse_domain::{ApiConfig, CacheSettings, Config, Result, SessionConfig, WarehouseError};

pub const ENV_API_URL: &str = "WAREHOUSE_API_URL";
pub const ENV_API_TIMEOUT: &str = "WAREHOUSE_API_TIMEOUT";
pub const ENV_SESSION_PATH: &str = "WAREHOUSE_SESSION_PATH";
pub const ENV_ENTITY_TTL_MS: &str = "WAREHOUSE_ENTITY_TTL_MS";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `WarehouseError::Config` if neither source yields a valid
/// configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only the API URL is required; other values fall back to defaults.
///
/// # Errors
/// Returns `WarehouseError::Config` if the URL is missing or a numeric
/// variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let base_url = env_var(ENV_API_URL)?;
    let defaults = Config::default();

    let timeout_seconds = env_number(ENV_API_TIMEOUT, "API timeout")?
        .unwrap_or(defaults.api.timeout_seconds);
    let entity_ttl_millis = env_number(ENV_ENTITY_TTL_MS, "entity TTL")?
        .unwrap_or(defaults.cache.entity_ttl_millis);
    let storage_path = std::env::var(ENV_SESSION_PATH).ok().filter(|p| !p.trim().is_empty());

    Ok(Config {
        api: ApiConfig { base_url, timeout_seconds },
        session: SessionConfig { storage_path },
        cache: CacheSettings { entity_ttl_millis },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `WarehouseError::Config` if the file is missing or invalid.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(WarehouseError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            WarehouseError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| WarehouseError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| WarehouseError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| WarehouseError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(WarehouseError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    probe_in(&cwd)
}

fn probe_in(dir: &Path) -> Option<PathBuf> {
    [
        "warehouse.toml",
        "warehouse.json",
        "config.toml",
        "config.json",
        "../config.toml",
        "../config.json",
    ]
    .iter()
    .map(|candidate| dir.join(candidate))
    .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        WarehouseError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional numeric environment variable
fn env_number(key: &str, what: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| WarehouseError::Config(format!("Invalid {what} in {key}: {e}"))),
        Err(_) => Ok(None),
    }
}
