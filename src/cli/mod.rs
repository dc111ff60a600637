//! CLI command handlers
//!
//! Each subcommand has its own module with handler functions.

pub mod cache;
pub mod config;
pub mod convert;
pub mod geocode;
pub mod locate;
pub mod serve;

use crate::config::Config;
use crate::error::Result;
use crate::geo::{GeocodingClient, SystemClock};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Location and geocoding toolkit for pet rescue maps
#[derive(Parser)]
#[command(name = "rescue-geo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire the current position and resolve its address
    Locate(locate::LocateArgs),

    /// Reverse geocode a coordinate
    Regeo(geocode::RegeoArgs),

    /// Search points of interest by keyword
    Poi(geocode::PoiArgs),

    /// Autocomplete suggestions for a partial keyword
    Tips(geocode::TipsArgs),

    /// Plan a route between two points
    Route(geocode::RouteArgs),

    /// Convert a coordinate between device and vendor datums
    Convert(convert::ConvertArgs),

    /// Inspect or clear the geocode cache
    Cache(cache::CacheArgs),

    /// Manage configuration
    Config(config::ConfigArgs),

    /// Start the HTTP API (foreground)
    Serve(serve::ServeArgs),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins; otherwise `default` is used. Logs go to stderr so JSON
/// output on stdout stays clean.
pub fn init_tracing(default: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(match cli.command {
        Commands::Serve(_) => "info",
        _ => "warn",
    });

    match cli.command {
        Commands::Locate(args) => locate::run(args).await,
        Commands::Regeo(args) => geocode::run_regeo(args).await,
        Commands::Poi(args) => geocode::run_poi(args).await,
        Commands::Tips(args) => geocode::run_tips(args).await,
        Commands::Route(args) => geocode::run_route(args).await,
        Commands::Convert(args) => convert::run(args),
        Commands::Cache(args) => cache::run(args),
        Commands::Config(args) => config::run(args),
        Commands::Serve(args) => serve::run(args).await,
    }
}

/// Build the geocoding client used by CLI commands
fn geocoding_client(config: &Config) -> Result<GeocodingClient> {
    GeocodingClient::from_config(config, Arc::new(SystemClock))
}

/// Write the cache back to disk when persistence is on
fn persist_cache(client: &GeocodingClient, config: &Config) {
    if !config.cache.persist {
        return;
    }
    let saved = Config::geocode_cache_path().and_then(|path| client.save_cache(&path));
    if let Err(e) = saved {
        warn!("Failed to save geocode cache: {}", e);
    }
}

/// Print a value as pretty JSON on stdout
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
