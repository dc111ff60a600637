//! IP-based geolocation
//!
//! Coarse fallback used when no device fix is available. ip-api.com reports
//! WGS-84, so results are device-datum coordinates. A single lookup is
//! cached on disk for an hour.

use crate::config::defaults::APP_DIR_NAME;
use crate::constants::api::IP_API_URL;
use crate::constants::cache::{IP_LOCATION_CACHE_FILE, IP_LOCATION_TTL_SECS};
use crate::coord::DeviceCoordinate;
use crate::error::{Error, Result};
use crate::geo::transport::{ReqwestTransport, Transport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// A coarse position derived from the caller's public IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpFix {
    pub coordinate: DeviceCoordinate,
    pub display_name: String,
}

/// ip-api.com response
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedFix {
    fix: IpFix,
    fetched_at: DateTime<Utc>,
}

/// IP location service with an optional file cache
#[derive(Debug)]
pub struct IpLocator<T: Transport = ReqwestTransport> {
    transport: T,
    url: String,
    cache_path: Option<PathBuf>,
}

impl<T: Transport> IpLocator<T> {
    /// Create a locator caching under the user cache directory
    pub fn new(transport: T) -> Self {
        let cache_path = dirs::cache_dir().map(|p| p.join(APP_DIR_NAME).join(IP_LOCATION_CACHE_FILE));
        Self {
            transport,
            url: IP_API_URL.to_string(),
            cache_path,
        }
    }

    /// Create a locator with a specific cache path
    pub fn with_cache_path(transport: T, cache_path: PathBuf) -> Self {
        Self {
            cache_path: Some(cache_path),
            ..Self::new(transport)
        }
    }

    /// Create a locator that always queries the service
    pub fn without_cache(transport: T) -> Self {
        Self {
            cache_path: None,
            ..Self::new(transport)
        }
    }

    /// Point the locator at a different service URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Locate the caller by public IP
    pub async fn locate(&self) -> Result<IpFix> {
        if let Some(cached) = self.load_cache() {
            debug!("IP location cache hit");
            return Ok(cached);
        }

        let fix = self.fetch().await?;
        self.save_cache(&fix);
        Ok(fix)
    }

    async fn fetch(&self) -> Result<IpFix> {
        let body = self.transport.get(&self.url).await?;
        let data: IpApiResponse = serde_json::from_str(&body)?;

        if data.status != "success" {
            return Err(Error::remote(
                "IP_LOOKUP_FAILED",
                data.message.unwrap_or_else(|| "IP location lookup failed".to_string()),
            ));
        }

        let (Some(lat), Some(lon)) = (data.lat, data.lon) else {
            return Err(Error::remote("IP_LOOKUP_FAILED", "response carried no position"));
        };
        let coordinate = DeviceCoordinate::checked(lon, lat)?;

        let display_name = [data.city, data.region_name, data.country]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Ok(IpFix {
            coordinate,
            display_name: if display_name.is_empty() {
                "Unknown Location".to_string()
            } else {
                display_name
            },
        })
    }

    fn load_cache(&self) -> Option<IpFix> {
        let cache_path = self.cache_path.as_ref()?;
        let content = fs::read_to_string(cache_path).ok()?;
        let cached: CachedFix = serde_json::from_str(&content).ok()?;

        let age = Utc::now().signed_duration_since(cached.fetched_at);
        (age.num_seconds() < IP_LOCATION_TTL_SECS).then_some(cached.fix)
    }

    fn save_cache(&self, fix: &IpFix) {
        let Some(cache_path) = &self.cache_path else {
            return;
        };

        let cached = CachedFix {
            fix: fix.clone(),
            fetched_at: Utc::now(),
        };

        let written = cache_path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| {
                let content = serde_json::to_string_pretty(&cached)?;
                fs::write(cache_path, content)
            });
        if let Err(e) = written {
            warn!("Failed to write IP location cache: {}", e);
        }
    }

    /// Remove the cached lookup
    pub fn clear_cache(&self) {
        if let Some(cache_path) = &self.cache_path {
            let _ = fs::remove_file(cache_path);
        }
    }

    pub fn cache_duration() -> Duration {
        Duration::from_secs(IP_LOCATION_TTL_SECS.unsigned_abs())
    }
}
