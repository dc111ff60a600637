//! Geocoding command handlers
//!
//! Reverse geocoding, POI search, input tips and route planning against the
//! configured vendor service. Results are printed as JSON.

use super::{geocoding_client, persist_cache, print_json};
use crate::config::Config;
use crate::coord::{DeviceCoordinate, VendorCoordinate};
use crate::error::{Error, Result};
use crate::geo::{
    PoiSearchOptions, RegeoOptions, RouteOptions, SuggestDatatype, SuggestOptions, TravelMode,
};
use clap::Args;

/// Regeo command arguments
#[derive(Args)]
pub struct RegeoArgs {
    /// Longitude
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Input is a raw GPS (WGS-84) coordinate rather than a vendor one
    #[arg(long)]
    pub device: bool,

    /// Search radius in meters
    #[arg(long, default_value_t = 1000)]
    pub radius: u32,

    /// Bypass the geocode cache
    #[arg(long)]
    pub no_cache: bool,
}

/// POI command arguments
#[derive(Args)]
pub struct PoiArgs {
    /// Search keyword
    pub keyword: String,

    /// Restrict to a city (name or adcode)
    #[arg(long)]
    pub city: Option<String>,

    /// Search around "lon,lat" (vendor datum)
    #[arg(long)]
    pub near: Option<VendorCoordinate>,

    /// Search radius in meters
    #[arg(long, default_value_t = 3000)]
    pub radius: u32,

    /// Page size
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub page: u32,
}

/// Tips command arguments
#[derive(Args)]
pub struct TipsArgs {
    /// Partial keyword
    pub keyword: String,

    /// Restrict to a city (name or adcode)
    #[arg(long)]
    pub city: Option<String>,

    /// Bias towards "lon,lat" (vendor datum)
    #[arg(long)]
    pub near: Option<VendorCoordinate>,

    /// Suggestion type: all, poi, bus, busline
    #[arg(long, default_value = "all")]
    pub datatype: String,
}

/// Route command arguments
#[derive(Args)]
pub struct RouteArgs {
    /// Origin "lon,lat" (vendor datum)
    #[arg(long, allow_hyphen_values = true)]
    pub from: VendorCoordinate,

    /// Destination "lon,lat" (vendor datum)
    #[arg(long, allow_hyphen_values = true)]
    pub to: VendorCoordinate,

    /// Travel mode: driving or walking
    #[arg(long, short = 'm', default_value = "driving")]
    pub mode: String,

    /// Vendor routing strategy (driving only)
    #[arg(long, default_value_t = 1)]
    pub strategy: u32,

    /// Intermediate "lon,lat" points, in order
    #[arg(long = "via")]
    pub waypoints: Vec<VendorCoordinate>,
}

/// Run the regeo command
pub async fn run_regeo(args: RegeoArgs) -> Result<()> {
    let config = Config::load()?;
    let client = geocoding_client(&config)?;
    let opts = RegeoOptions {
        radius: args.radius,
        use_cache: !args.no_cache,
        ..RegeoOptions::default()
    };

    let address = if args.device {
        let coord = DeviceCoordinate::checked(args.lon, args.lat)?;
        client.reverse_geocode_device(coord, opts).await?
    } else {
        let coord = VendorCoordinate::checked(args.lon, args.lat)?;
        client.reverse_geocode(coord, opts).await?
    };

    persist_cache(&client, &config);
    print_json(&address)
}

/// Run the poi command
pub async fn run_poi(args: PoiArgs) -> Result<()> {
    let config = Config::load()?;
    let client = geocoding_client(&config)?;
    let opts = PoiSearchOptions {
        city: args.city,
        location: args.near,
        radius: args.radius,
        offset: args.limit,
        page: args.page,
    };

    let pois = client.search_poi(&args.keyword, &opts).await?;
    print_json(&pois)
}

/// Run the tips command
pub async fn run_tips(args: TipsArgs) -> Result<()> {
    let config = Config::load()?;
    let client = geocoding_client(&config)?;
    let opts = SuggestOptions {
        location: args.near,
        city: args.city,
        datatype: args.datatype.parse::<SuggestDatatype>().map_err(Error::Config)?,
    };

    let tips = client.input_suggest(&args.keyword, &opts).await?;
    print_json(&tips)
}

/// Run the route command
pub async fn run_route(args: RouteArgs) -> Result<()> {
    let config = Config::load()?;
    let client = geocoding_client(&config)?;
    let opts = RouteOptions {
        mode: args.mode.parse::<TravelMode>().map_err(Error::Config)?,
        strategy: args.strategy,
        waypoints: args.waypoints,
    };

    let route = client.plan_route(args.from, args.to, &opts).await?;
    print_json(&route)
}
