//! rescue-geo CLI entry point
//!
//! Location and geocoding toolkit - CLI + HTTP API

use rescue_geo::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
