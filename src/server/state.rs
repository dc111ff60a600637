//! Server shared state
//!
//! Holds configuration and the shared geocoding client for the HTTP server.

use crate::config::Config;
use crate::error::Result;
use crate::geo::{GeocodingClient, ReqwestTransport, SystemClock, Transport};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Shared state for the HTTP server
pub struct AppState<T: Transport = ReqwestTransport> {
    /// Configuration
    pub config: Arc<RwLock<Config>>,

    /// The one geocoding client; owns the cache
    client: Arc<GeocodingClient<T>>,

    started_at: Instant,
}

impl AppState<ReqwestTransport> {
    /// Create state with a reqwest-backed client built from `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let client = GeocodingClient::from_config(&config, Arc::new(SystemClock))?;
        Ok(Self::new(config, Arc::new(client)))
    }
}

impl<T: Transport> AppState<T> {
    /// Create new application state around an existing client
    pub fn new(config: Config, client: Arc<GeocodingClient<T>>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            client,
            started_at: Instant::now(),
        }
    }

    /// The shared geocoding client
    pub fn client(&self) -> &GeocodingClient<T> {
        &self.client
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
