//! Locate command handler
//!
//! Runs one acquisition through the controller and prints the result.
//! A fixed position (from flags or config) is the primary provider when
//! present, with IP geolocation behind it; otherwise IP geolocation is the
//! only provider.

use super::{geocoding_client, persist_cache, print_json};
use crate::config::Config;
use crate::coord::DeviceCoordinate;
use crate::error::{Error, Result};
use crate::geo::ip_location::IpLocator;
use crate::geo::ReqwestTransport;
use crate::location::{
    AcquisitionController, FixedLocationProvider, IpLocationProvider, LocationProvider,
    RetryPolicy,
};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Locate command arguments
#[derive(Args)]
pub struct LocateArgs {
    /// Fixed device longitude (WGS-84), overrides config
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Fixed device latitude (WGS-84), overrides config
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Skip reverse geocoding of the fix
    #[arg(long)]
    pub no_address: bool,

    /// Ignore the cached IP location
    #[arg(long)]
    pub fresh: bool,
}

/// Which provider fills a controller slot
#[derive(Debug, Clone, Copy, PartialEq)]
enum ProviderChoice {
    Fixed(DeviceCoordinate),
    Ip,
}

/// Decide the primary and secondary providers
fn choose_providers(
    fixed: Option<DeviceCoordinate>,
    fallback: &str,
) -> (ProviderChoice, Option<ProviderChoice>) {
    match fixed {
        Some(coord) if fallback == "ip" => (ProviderChoice::Fixed(coord), Some(ProviderChoice::Ip)),
        Some(coord) => (ProviderChoice::Fixed(coord), None),
        None => (ProviderChoice::Ip, None),
    }
}

fn build_provider(choice: ProviderChoice, config: &Config, fresh: bool) -> Result<Arc<dyn LocationProvider>> {
    Ok(match choice {
        ProviderChoice::Fixed(coord) => Arc::new(FixedLocationProvider::new(coord)),
        ProviderChoice::Ip => {
            let transport = ReqwestTransport::new(Duration::from_secs(config.api.timeout_secs))?;
            let locator = if fresh {
                IpLocator::without_cache(transport)
            } else {
                IpLocator::new(transport)
            };
            Arc::new(IpLocationProvider::new(locator))
        }
    })
}

/// Run the locate command
pub async fn run(args: LocateArgs) -> Result<()> {
    let config = Config::load()?;

    let fixed = match (args.lon, args.lat) {
        (Some(lon), Some(lat)) => Some(DeviceCoordinate::checked(lon, lat)?),
        _ => config.location.fixed_position()?,
    };
    let (primary, secondary) = choose_providers(fixed, &config.location.fallback);

    let mut controller =
        AcquisitionController::new(build_provider(primary, &config, args.fresh)?)
            .with_policy(RetryPolicy::from(&config.location));
    if let Some(secondary) = secondary {
        controller = controller.with_secondary(build_provider(secondary, &config, args.fresh)?);
    }

    let client = if args.no_address {
        None
    } else {
        let client = Arc::new(geocoding_client(&config)?);
        controller = controller.with_resolver(client.clone());
        Some(client)
    };

    let acquisition = match controller.request().await {
        Ok(acquisition) => acquisition,
        Err(Error::Acquisition(reason)) => {
            eprintln!("{}", reason.guidance());
            return Err(Error::Acquisition(reason));
        }
        Err(e) => return Err(e),
    };
    info!("Located via {} provider", acquisition.provider);

    if let Some(client) = client {
        persist_cache(&client, &config);
    }
    print_json(&acquisition)
}
