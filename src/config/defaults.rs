//! Default configuration values
//!
//! Named constants for all tunable parameters

use crate::constants::api::AMAP_BASE_URL;
use crate::constants::cache::GEOCODE_TTL_MS;
use crate::constants::location::{
    ACQUIRE_TIMEOUT_SECS, BACKOFF_BASE_MS, MAX_ATTEMPTS, SWITCH_AFTER_TRANSIENT_FAILURES,
};

/// Default geocoding service base URL
pub const DEFAULT_BASE_URL: &str = AMAP_BASE_URL;

/// Default HTTP timeout for geocoding calls in seconds
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Default per-attempt location timeout in seconds
pub const DEFAULT_LOCATION_TIMEOUT_SECS: u64 = ACQUIRE_TIMEOUT_SECS;

/// Default attempts per provider
pub const DEFAULT_MAX_ATTEMPTS: u32 = MAX_ATTEMPTS;

/// Default backoff unit in milliseconds
pub const DEFAULT_BACKOFF_BASE_MS: u64 = BACKOFF_BASE_MS;

/// Default transient failures before a provider switch
pub const DEFAULT_SWITCH_AFTER: u32 = SWITCH_AFTER_TRANSIENT_FAILURES;

/// Default fallback provider when no fixed position is configured
pub const DEFAULT_FALLBACK: &str = "ip";

/// Accepted fallback provider names
pub const FALLBACK_PROVIDERS: &[&str] = &["ip", "none"];

/// Default geocode cache TTL in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = (GEOCODE_TTL_MS / 1000) as u64;

/// Default map backend
pub const DEFAULT_MAP_BACKEND: &str = "surface";

/// Default surface map style
pub const DEFAULT_MAP_STYLE: &str = "amap://styles/normal";

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 7878;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application directory name (for XDG paths)
pub const APP_DIR_NAME: &str = "rescue-geo";
