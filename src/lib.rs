//! rescue-geo: location, geocoding and map bridge for a pet-rescue directory
//!
//! A library and CLI tool that finds where the user is, turns coordinates into
//! addresses, and drives a map that shows nearby rescue cases.
//!
//! ## Features
//!
//! - Datum-tagged coordinates with WGS-84 to GCJ-02 conversion
//! - Geocoding client (reverse geocode, batch, POI search, input tips, routes)
//!   with a one-hour cache
//! - Location acquisition state machine with retry, backoff and provider switch
//! - Typed message bridge to an embedded map surface
//! - Map host adapters for surface and native backends
//! - HTTP API + CLI interface
//!
//! ## Quick Start
//!
//! ```rust
//! use rescue_geo::coord::datum::{to_device_datum, to_vendor_datum};
//! use rescue_geo::coord::distance::haversine_distance;
//! use rescue_geo::coord::DeviceCoordinate;
//!
//! let gps = DeviceCoordinate::new(116.4074, 39.9042); // Beijing
//!
//! // Shift into the map vendor's datum before geocoding or rendering
//! let vendor = to_vendor_datum(gps);
//! println!("Vendor position: {}", vendor);
//!
//! // And back, within a few meters
//! let back = to_device_datum(vendor);
//! assert!(haversine_distance(gps, back) < 5.0);
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod constants;
pub mod coord;
pub mod error;
pub mod geo;
pub mod location;
pub mod map;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use coord::{Coordinate, DeviceCoordinate, VendorCoordinate};
pub use error::{Error, Result};
pub use geo::{AddressResult, GeocodingClient};
pub use location::{AcquisitionController, AcquisitionState, FailureReason};
pub use map::{MapBackend, MapHostAdapter, MapHostBuilder, PetMarker};
