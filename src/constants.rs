//! Centralized constants for the rescue-geo crate
//!
//! This module consolidates constants that are used across multiple modules
//! to avoid duplication and ensure consistency.

/// Geographic constants
pub mod geo {
    /// Mean Earth radius in meters (WGS84 approximation)
    pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

    /// Decimal places kept when quantizing a coordinate into a cache key (~0.11 m)
    pub const QUANTIZE_DECIMALS: usize = 6;
}

/// External API endpoints
pub mod api {
    /// AMap web service base URL
    pub const AMAP_BASE_URL: &str = "https://restapi.amap.com/v3";

    /// IP geolocation API (free, no key required)
    pub const IP_API_URL: &str = "http://ip-api.com/json";

    /// Environment variable that overrides the configured API key
    pub const API_KEY_ENV: &str = "RESCUE_GEO_API_KEY";

    /// Keys this short or shorter are treated as malformed
    pub const MIN_API_KEY_LEN: usize = 10;

    /// Hard vendor limit on coordinates per batch reverse-geocode request
    pub const REGEO_BATCH_LIMIT: usize = 20;

    /// Vendor status string for a successful call
    pub const STATUS_OK: &str = "1";
}

/// Cache settings
pub mod cache {
    /// Geocode cache TTL in milliseconds (1 hour)
    pub const GEOCODE_TTL_MS: i64 = 3_600_000;

    /// Persisted geocode cache file name
    pub const GEOCODE_CACHE_FILE: &str = "geocode_cache.json";

    /// IP location cache duration in seconds (1 hour)
    pub const IP_LOCATION_TTL_SECS: i64 = 3600;

    /// IP location cache file name
    pub const IP_LOCATION_CACHE_FILE: &str = "ip_location_cache.json";
}

/// Location acquisition defaults
pub mod location {
    /// Per-attempt position timeout in seconds
    pub const ACQUIRE_TIMEOUT_SECS: u64 = 20;

    /// Attempts per provider before giving up
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Linear backoff unit in milliseconds
    pub const BACKOFF_BASE_MS: u64 = 1000;

    /// Consecutive transient failures on the primary before switching providers
    pub const SWITCH_AFTER_TRANSIENT_FAILURES: u32 = 2;
}
