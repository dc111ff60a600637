//! Configuration management
//!
//! Loads and saves configuration from XDG-compliant paths.
//! Config location: ~/.config/rescue-geo/config.toml
//!
//! The API key may also come from the `RESCUE_GEO_API_KEY` environment
//! variable, which wins over the file.

pub mod defaults;

use crate::constants::api::{API_KEY_ENV, MIN_API_KEY_LEN};
use crate::constants::cache::GEOCODE_CACHE_FILE;
use crate::coord::DeviceCoordinate;
use crate::error::{Error, Result};
use crate::map::MapBackend;
use defaults::*;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Geocoding service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Location acquisition settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Geocode cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Map rendering settings
    #[serde(default)]
    pub map: MapConfig,

    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Geocoding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Vendor web service key
    #[serde(default)]
    pub key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

/// Location acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Per-attempt position timeout in seconds
    #[serde(default = "default_location_timeout")]
    pub timeout_secs: u64,

    /// Attempts per provider
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit in milliseconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Consecutive transient failures before switching providers
    #[serde(default = "default_switch_after")]
    pub switch_after_transient_failures: u32,

    /// Fallback provider: "ip" or "none"
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// Fixed device position, used instead of a positioning provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_longitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_latitude: Option<f64>,
}

/// Geocode cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Keep the cache on disk between CLI runs
    #[serde(default = "default_true")]
    pub persist: bool,
}

/// Map rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// "surface" or "native"
    #[serde(default = "default_map_backend")]
    pub backend: String,

    /// Surface map style
    #[serde(default = "default_map_style")]
    pub style: String,
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions for serde
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_api_timeout() -> u64 {
    DEFAULT_API_TIMEOUT_SECS
}
fn default_location_timeout() -> u64 {
    DEFAULT_LOCATION_TIMEOUT_SECS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_backoff_base() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}
fn default_switch_after() -> u32 {
    DEFAULT_SWITCH_AFTER
}
fn default_fallback() -> String {
    DEFAULT_FALLBACK.to_string()
}
fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
fn default_true() -> bool {
    true
}
fn default_map_backend() -> String {
    DEFAULT_MAP_BACKEND.to_string()
}
fn default_map_style() -> String {
    DEFAULT_MAP_STYLE.to_string()
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_location_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            switch_after_transient_failures: default_switch_after(),
            fallback: default_fallback(),
            fixed_longitude: None,
            fixed_latitude: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            persist: default_true(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            backend: default_map_backend(),
            style: default_map_style(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl LocationConfig {
    /// The configured fixed position, if both halves are set
    pub fn fixed_position(&self) -> Result<Option<DeviceCoordinate>> {
        match (self.fixed_longitude, self.fixed_latitude) {
            (Some(lon), Some(lat)) => DeviceCoordinate::checked(lon, lat).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::Config(
                "location.fixed_longitude and location.fixed_latitude must be set together"
                    .to_string(),
            )),
        }
    }
}

/// Pick the effective API key: a non-empty environment value wins
///
/// A missing or too-short key is only warned about; the vendor will reject
/// calls made with it.
pub fn resolve_api_key(configured: &str, from_env: Option<String>) -> String {
    let key = from_env
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| configured.trim().to_string());

    if key.is_empty() {
        warn!(
            "No geocoding API key configured (set api.key or {}); requests will be rejected",
            API_KEY_ENV
        );
    } else if key.len() <= MIN_API_KEY_LEN {
        warn!(
            "Geocoding API key looks malformed ({} characters); requests will likely be rejected",
            key.len()
        );
    }

    key
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_optional_f64(key: &str, value: &str) -> Result<Option<f64>> {
    if value.is_empty() || value == "none" {
        Ok(None)
    } else {
        parse_value(key, value).map(Some)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(APP_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Get the persisted geocode cache path
    pub fn geocode_cache_path() -> Result<PathBuf> {
        dirs::cache_dir()
            .map(|p| p.join(APP_DIR_NAME).join(GEOCODE_CACHE_FILE))
            .ok_or_else(|| Error::Config("Could not determine cache directory".to_string()))
    }

    /// Load configuration from the default path
    ///
    /// Creates default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// The API key in effect, after the environment override
    pub fn resolved_api_key(&self) -> String {
        resolve_api_key(&self.api.key, env::var(API_KEY_ENV).ok())
    }

    /// The configured map backend
    pub fn map_backend(&self) -> Result<MapBackend> {
        self.map.backend.parse().map_err(Error::Config)
    }

    /// Get a configuration value by key path
    ///
    /// Key format: "section.key"
    /// Returns the value as a string, or None if not found
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["api", "key"] => Some(self.api.key.clone()),
            ["api", "base_url"] => Some(self.api.base_url.clone()),
            ["api", "timeout_secs"] => Some(self.api.timeout_secs.to_string()),

            ["location", "timeout_secs"] => Some(self.location.timeout_secs.to_string()),
            ["location", "max_attempts"] => Some(self.location.max_attempts.to_string()),
            ["location", "backoff_base_ms"] => Some(self.location.backoff_base_ms.to_string()),
            ["location", "switch_after_transient_failures"] => {
                Some(self.location.switch_after_transient_failures.to_string())
            }
            ["location", "fallback"] => Some(self.location.fallback.clone()),
            ["location", "fixed_longitude"] => {
                Some(self.location.fixed_longitude.map_or_else(String::new, |v| v.to_string()))
            }
            ["location", "fixed_latitude"] => {
                Some(self.location.fixed_latitude.map_or_else(String::new, |v| v.to_string()))
            }

            ["cache", "ttl_secs"] => Some(self.cache.ttl_secs.to_string()),
            ["cache", "persist"] => Some(self.cache.persist.to_string()),

            ["map", "backend"] => Some(self.map.backend.clone()),
            ["map", "style"] => Some(self.map.style.clone()),

            ["server", "host"] => Some(self.server.host.clone()),
            ["server", "port"] => Some(self.server.port.to_string()),

            _ => None,
        }
    }

    /// Set a configuration value by key path
    ///
    /// Key format: "section.key"
    /// Returns error if key is invalid or value type is wrong
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["api", "key"] => self.api.key = value.to_string(),
            ["api", "base_url"] => self.api.base_url = value.trim_end_matches('/').to_string(),
            ["api", "timeout_secs"] => self.api.timeout_secs = parse_value(key, value)?,

            ["location", "timeout_secs"] => self.location.timeout_secs = parse_value(key, value)?,
            ["location", "max_attempts"] => {
                let attempts: u32 = parse_value(key, value)?;
                if attempts == 0 {
                    return Err(Error::Config("location.max_attempts must be at least 1".to_string()));
                }
                self.location.max_attempts = attempts;
            }
            ["location", "backoff_base_ms"] => {
                self.location.backoff_base_ms = parse_value(key, value)?
            }
            ["location", "switch_after_transient_failures"] => {
                self.location.switch_after_transient_failures = parse_value(key, value)?
            }
            ["location", "fallback"] => {
                if !FALLBACK_PROVIDERS.contains(&value) {
                    return Err(Error::Config(format!(
                        "Invalid fallback provider: {} (expected one of: {})",
                        value,
                        FALLBACK_PROVIDERS.join(", ")
                    )));
                }
                self.location.fallback = value.to_string();
            }
            ["location", "fixed_longitude"] => {
                self.location.fixed_longitude = parse_optional_f64(key, value)?
            }
            ["location", "fixed_latitude"] => {
                self.location.fixed_latitude = parse_optional_f64(key, value)?
            }

            ["cache", "ttl_secs"] => self.cache.ttl_secs = parse_value(key, value)?,
            ["cache", "persist"] => self.cache.persist = parse_value(key, value)?,

            ["map", "backend"] => {
                let backend: MapBackend = value.parse().map_err(Error::Config)?;
                self.map.backend = backend.to_string();
            }
            ["map", "style"] => self.map.style = value.to_string(),

            ["server", "host"] => self.server.host = value.to_string(),
            ["server", "port"] => self.server.port = parse_value(key, value)?,

            _ => {
                return Err(Error::Config(format!("Unknown config key: {}", key)));
            }
        }

        Ok(())
    }

    /// List all available config keys
    pub fn available_keys() -> Vec<&'static str> {
        vec![
            "api.key",
            "api.base_url",
            "api.timeout_secs",
            "location.timeout_secs",
            "location.max_attempts",
            "location.backoff_base_ms",
            "location.switch_after_transient_failures",
            "location.fallback",
            "location.fixed_longitude",
            "location.fixed_latitude",
            "cache.ttl_secs",
            "cache.persist",
            "map.backend",
            "map.style",
            "server.host",
            "server.port",
        ]
    }

    /// Get server address as "host:port"
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
