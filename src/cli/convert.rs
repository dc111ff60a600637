//! Convert command handler
//!
//! Offline datum conversion; no network access.

use crate::coord::datum::{convert, TargetDatum};
use crate::error::Result;
use clap::Args;

/// Convert command arguments
#[derive(Args)]
pub struct ConvertArgs {
    /// Longitude
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Target datum: vendor (gcj02) or device (wgs84)
    #[arg(long, default_value = "vendor")]
    pub to: TargetDatum,
}

/// Run the convert command
pub fn run(args: ConvertArgs) -> Result<()> {
    let conversion = convert(args.lon, args.lat, args.to)?;
    println!("{}", serde_json::to_string_pretty(&conversion)?);
    Ok(())
}
