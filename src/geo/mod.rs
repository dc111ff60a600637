//! Geocoding module
//!
//! Reverse geocoding, POI search, input suggestions and route planning
//! against the map vendor's web service, plus IP geolocation.

pub mod amap;
pub mod cache;
pub mod client;
pub mod ip_location;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

pub use cache::{CacheStats, Clock, GeocodeCache, ManualClock, SystemClock};
pub use client::GeocodingClient;
pub use transport::{ReqwestTransport, Transport};

use crate::coord::VendorCoordinate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A resolved address for a coordinate
///
/// Only the geocoding client produces these; once built they are handed out
/// by value and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AddressResult {
    pub formatted_address: String,
    pub province: String,
    pub city: String,
    pub district: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub township: Option<String>,
    pub adcode: String,
    pub city_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,
    #[serde(default)]
    pub business_areas: Vec<String>,
    /// The coordinate that was resolved
    pub source_coordinate: VendorCoordinate,
}

/// A named, located place from POI search or input suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub address: String,
    pub location: VendorCoordinate,
    /// Distance from the search center, when the search had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
}

/// A planned route between two points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RouteResult {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub path: Vec<VendorCoordinate>,
    pub toll_fare: f64,
    pub traffic_light_count: u32,
}

/// How much detail the reverse geocoder returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extensions {
    Base,
    #[default]
    All,
}

impl Extensions {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::All => "all",
        }
    }
}

/// Reverse geocode options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegeoOptions {
    /// Search radius in meters
    pub radius: u32,
    pub extensions: Extensions,
    /// Consult and populate the cache
    pub use_cache: bool,
}

impl Default for RegeoOptions {
    fn default() -> Self {
        Self {
            radius: 1000,
            extensions: Extensions::All,
            use_cache: true,
        }
    }
}

/// POI text search options
#[derive(Debug, Clone, PartialEq)]
pub struct PoiSearchOptions {
    pub city: Option<String>,
    pub location: Option<VendorCoordinate>,
    /// Search radius in meters (only meaningful with `location`)
    pub radius: u32,
    /// Page size
    pub offset: u32,
    /// 1-based page number
    pub page: u32,
}

impl Default for PoiSearchOptions {
    fn default() -> Self {
        Self {
            city: None,
            location: None,
            radius: 3000,
            offset: 20,
            page: 1,
        }
    }
}

/// Kind of suggestion to return while the user types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestDatatype {
    #[default]
    All,
    Poi,
    Bus,
    Busline,
}

impl SuggestDatatype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Poi => "poi",
            Self::Bus => "bus",
            Self::Busline => "busline",
        }
    }
}

impl FromStr for SuggestDatatype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "poi" => Ok(Self::Poi),
            "bus" => Ok(Self::Bus),
            "busline" => Ok(Self::Busline),
            _ => Err(format!("Unknown suggestion type: {}", s)),
        }
    }
}

/// Input suggestion options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestOptions {
    pub location: Option<VendorCoordinate>,
    pub city: Option<String>,
    pub datatype: SuggestDatatype,
}

/// Travel mode for route planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
        }
    }
}

impl FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "driving" | "drive" => Ok(Self::Driving),
            "walking" | "walk" => Ok(Self::Walking),
            _ => Err(format!("Unknown travel mode: {}", s)),
        }
    }
}

/// Route planning options
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOptions {
    pub mode: TravelMode,
    /// Vendor routing strategy (driving only)
    pub strategy: u32,
    pub waypoints: Vec<VendorCoordinate>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            mode: TravelMode::Driving,
            strategy: 1,
            waypoints: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_defaults() {
        let regeo = RegeoOptions::default();
        assert_eq!(regeo.radius, 1000);
        assert_eq!(regeo.extensions.as_str(), "all");
        assert!(regeo.use_cache);

        let poi = PoiSearchOptions::default();
        assert_eq!((poi.radius, poi.offset, poi.page), (3000, 20, 1));

        let route = RouteOptions::default();
        assert_eq!(route.mode, TravelMode::Driving);
        assert_eq!(route.strategy, 1);
        assert!(route.waypoints.is_empty());

        assert_eq!(SuggestOptions::default().datatype.as_str(), "all");
    }

    #[test]
    fn test_travel_mode_from_str() {
        assert_eq!("driving".parse::<TravelMode>().unwrap(), TravelMode::Driving);
        assert_eq!("WALK".parse::<TravelMode>().unwrap(), TravelMode::Walking);
        assert!("teleport".parse::<TravelMode>().is_err());
    }

    #[test]
    fn test_suggest_datatype_from_str() {
        assert_eq!("POI".parse::<SuggestDatatype>().unwrap(), SuggestDatatype::Poi);
        assert_eq!("busline".parse::<SuggestDatatype>().unwrap().as_str(), "busline");
        assert!("metro".parse::<SuggestDatatype>().is_err());
    }

    #[test]
    fn test_address_result_serialization() {
        let addr = AddressResult {
            formatted_address: "北京市东城区东华门街道天安门".to_string(),
            province: "北京市".to_string(),
            city: String::new(),
            district: "东城区".to_string(),
            township: Some("东华门街道".to_string()),
            adcode: "110101".to_string(),
            city_code: "010".to_string(),
            street: None,
            street_number: None,
            business_areas: vec![],
            source_coordinate: VendorCoordinate::new(116.3975, 39.9087),
        };

        let json = serde_json::to_string(&addr).unwrap();
        assert!(!json.contains("street_number"));
        let parsed: AddressResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, addr);
    }
}
