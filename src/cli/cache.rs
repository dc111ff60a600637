//! Cache command handler
//!
//! Inspect or clear the persisted geocode cache and the IP location cache.

use crate::config::Config;
use crate::error::Result;
use crate::geo::ip_location::IpLocator;
use crate::geo::{GeocodeCache, ReqwestTransport, SystemClock};
use clap::{Args, Subcommand};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// Cache command arguments
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show live entry count and keys
    Stats,

    /// Delete cached geocodes and the cached IP location
    Clear,

    /// Show the cache file path
    Path,
}

/// Run the cache command
pub fn run(args: CacheArgs) -> Result<()> {
    let path = Config::geocode_cache_path()?;

    match args.action {
        CacheAction::Path => {
            println!("{}", path.display());
        }
        CacheAction::Stats => {
            let config = Config::load()?;
            let cache = GeocodeCache::load_from(
                &path,
                Arc::new(SystemClock),
                Duration::from_secs(config.cache.ttl_secs),
            )?;
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
        }
        CacheAction::Clear => {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            IpLocator::new(ReqwestTransport::new(Duration::from_secs(1))?).clear_cache();
            println!("Cache cleared");
        }
    }

    Ok(())
}
