//! Geocoding client
//!
//! One instance is built at startup and shared (usually behind an `Arc`) by
//! the acquisition controller, the map adapters and the HTTP facade. It owns
//! the geocode cache; nothing else touches it.
//!
//! No call retries internally. Retry policy belongs to the caller.

use crate::config::Config;
use crate::constants::api::REGEO_BATCH_LIMIT;
use crate::coord::datum::to_vendor_datum;
use crate::coord::{DeviceCoordinate, VendorCoordinate};
use crate::error::Result;
use crate::geo::amap::{self, build_url};
use crate::geo::cache::{CacheStats, Clock, GeocodeCache};
use crate::geo::transport::{ReqwestTransport, Transport};
use crate::geo::{
    AddressResult, PoiSearchOptions, PointOfInterest, RegeoOptions, RouteOptions, RouteResult,
    SuggestOptions,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the map vendor's geocoding web service
#[derive(Debug)]
pub struct GeocodingClient<T: Transport = ReqwestTransport> {
    transport: T,
    base_url: String,
    api_key: String,
    cache: Mutex<GeocodeCache>,
}

impl GeocodingClient<ReqwestTransport> {
    /// Build a reqwest-backed client from configuration
    ///
    /// A missing or malformed API key is only warned about; requests will
    /// fail later with the vendor's auth error.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.api.timeout_secs))?;
        let ttl = Duration::from_secs(config.cache.ttl_secs);

        let cache = match (config.cache.persist, Config::geocode_cache_path()) {
            (true, Ok(path)) => GeocodeCache::load_from(&path, clock.clone(), ttl).unwrap_or_else(|e| {
                warn!("Ignoring unreadable geocode cache: {}", e);
                GeocodeCache::with_ttl(clock.clone(), ttl)
            }),
            _ => GeocodeCache::with_ttl(clock, ttl),
        };

        Ok(Self::new(
            transport,
            config.api.base_url.clone(),
            config.resolved_api_key(),
            cache,
        ))
    }
}

impl<T: Transport> GeocodingClient<T> {
    pub fn new(
        transport: T,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        cache: GeocodeCache,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            api_key: api_key.into(),
            cache: Mutex::new(cache),
        }
    }

    fn cache(&self) -> MutexGuard<'_, GeocodeCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        build_url(&self.base_url, path, &self.api_key, params)
    }

    /// Resolve a vendor-datum coordinate to an address
    ///
    /// A cache hit returns without touching the network.
    pub async fn reverse_geocode(
        &self,
        coord: VendorCoordinate,
        opts: RegeoOptions,
    ) -> Result<AddressResult> {
        coord.validate()?;
        let key = coord.quantized_key();

        if opts.use_cache {
            let cached = self.cache().get(&key);
            if let Some(hit) = cached {
                debug!(%key, "geocode cache hit");
                return Ok(hit);
            }
            debug!(%key, "geocode cache miss");
        }

        let url = self.url(
            "geocode/regeo",
            &[
                ("location", coord.to_lnglat_string()),
                ("radius", opts.radius.to_string()),
                ("extensions", opts.extensions.as_str().to_string()),
                ("roadlevel", "0".to_string()),
            ],
        );
        let body = self.transport.get(&url).await?;
        let address = amap::parse_regeo(&body, coord)?;

        if opts.use_cache {
            self.cache().put(key, address.clone());
        }

        Ok(address)
    }

    /// Resolve a device-datum coordinate, converting it to the vendor datum first
    pub async fn reverse_geocode_device(
        &self,
        coord: DeviceCoordinate,
        opts: RegeoOptions,
    ) -> Result<AddressResult> {
        self.reverse_geocode(to_vendor_datum(coord), opts).await
    }

    /// Resolve many coordinates, 20 per upstream request
    ///
    /// A failing sub-batch is logged and skipped; the call returns whatever
    /// the other sub-batches produced. Successful results are cached under
    /// the same key `reverse_geocode` reads: batch requests use the `base`
    /// detail level, which fills every `AddressResult` field, so a later
    /// single lookup of the same point is served from the cache.
    pub async fn reverse_geocode_batch(&self, coords: &[VendorCoordinate]) -> Vec<AddressResult> {
        let mut results = Vec::with_capacity(coords.len());

        for (index, chunk) in coords.chunks(REGEO_BATCH_LIMIT).enumerate() {
            match self.reverse_geocode_chunk(chunk).await {
                Ok(addresses) => {
                    {
                        let mut cache = self.cache();
                        for address in &addresses {
                            cache.put(address.source_coordinate.quantized_key(), address.clone());
                        }
                    }
                    results.extend(addresses);
                }
                Err(e) => {
                    warn!(batch = index, size = chunk.len(), "Skipping failed reverse geocode batch: {}", e);
                }
            }
        }

        results
    }

    async fn reverse_geocode_chunk(&self, chunk: &[VendorCoordinate]) -> Result<Vec<AddressResult>> {
        for coord in chunk {
            coord.validate()?;
        }
        let locations = chunk
            .iter()
            .map(|c| c.to_lnglat_string())
            .collect::<Vec<_>>()
            .join("|");

        let url = self.url(
            "geocode/regeo",
            &[
                ("location", locations),
                ("batch", "true".to_string()),
                ("extensions", "base".to_string()),
                ("roadlevel", "0".to_string()),
            ],
        );
        let body = self.transport.get(&url).await?;
        amap::parse_regeo_batch(&body, chunk)
    }

    /// Keyword search for points of interest
    pub async fn search_poi(
        &self,
        keyword: &str,
        opts: &PoiSearchOptions,
    ) -> Result<Vec<PointOfInterest>> {
        let url = self.url(
            "place/text",
            &[
                ("keywords", keyword.to_string()),
                ("city", opts.city.clone().unwrap_or_default()),
                (
                    "location",
                    opts.location.map(|c| c.to_lnglat_string()).unwrap_or_default(),
                ),
                ("radius", opts.radius.to_string()),
                ("offset", opts.offset.to_string()),
                ("page", opts.page.to_string()),
                ("extensions", "base".to_string()),
            ],
        );
        let body = self.transport.get(&url).await?;
        amap::parse_pois(&body)
    }

    /// As-you-type suggestions; suggestions without a location are dropped
    pub async fn input_suggest(
        &self,
        keyword: &str,
        opts: &SuggestOptions,
    ) -> Result<Vec<PointOfInterest>> {
        let url = self.url(
            "assistant/inputtips",
            &[
                ("keywords", keyword.to_string()),
                ("datatype", opts.datatype.as_str().to_string()),
                (
                    "location",
                    opts.location.map(|c| c.to_lnglat_string()).unwrap_or_default(),
                ),
                ("city", opts.city.clone().unwrap_or_default()),
            ],
        );
        let body = self.transport.get(&url).await?;
        amap::parse_tips(&body)
    }

    /// Plan a route between two vendor-datum coordinates
    pub async fn plan_route(
        &self,
        from: VendorCoordinate,
        to: VendorCoordinate,
        opts: &RouteOptions,
    ) -> Result<RouteResult> {
        from.validate()?;
        to.validate()?;

        let waypoints = opts
            .waypoints
            .iter()
            .map(|c| c.to_lnglat_string())
            .collect::<Vec<_>>()
            .join(";");

        let url = self.url(
            &format!("direction/{}", opts.mode.as_str()),
            &[
                ("origin", from.to_lnglat_string()),
                ("destination", to.to_lnglat_string()),
                ("strategy", opts.strategy.to_string()),
                ("waypoints", waypoints),
                ("extensions", "base".to_string()),
            ],
        );
        let body = self.transport.get(&url).await?;
        amap::parse_route(&body)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Persist the cache snapshot
    pub fn save_cache(&self, path: &Path) -> Result<()> {
        self.cache().save_to(path)
    }
}
