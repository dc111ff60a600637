//! AMap web service schema
//!
//! Request URL construction and response parsing for the four endpoints the
//! client consumes. The vendor is loose with types: empty string fields can
//! arrive as `[]`, and numeric fields usually arrive as strings, so the raw
//! structs go through the lenient helpers at the bottom of this file.

use crate::constants::api::STATUS_OK;
use crate::coord::VendorCoordinate;
use crate::error::{Error, Result};
use crate::geo::{AddressResult, PointOfInterest, RouteResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Build `{base}/{path}?key=...&k=v...`, skipping empty values
pub fn build_url(base: &str, path: &str, key: &str, params: &[(&str, String)]) -> String {
    let mut url = format!(
        "{}/{}?key={}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/'),
        urlencoding::encode(key)
    );
    for (name, value) in params {
        if value.is_empty() {
            continue;
        }
        url.push('&');
        url.push_str(name);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

/// Status fields present on every response
#[derive(Debug, Deserialize)]
struct VendorStatus {
    #[serde(deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    info: String,
    #[serde(default, deserialize_with = "lenient_string")]
    infocode: String,
}

impl VendorStatus {
    fn check(&self) -> Result<()> {
        if self.status == STATUS_OK {
            Ok(())
        } else {
            let code = if self.infocode.is_empty() {
                format!("STATUS_{}", self.status)
            } else {
                self.infocode.clone()
            };
            Err(Error::remote(code, self.info.clone()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegeoResponse {
    #[serde(flatten)]
    status: VendorStatus,
    regeocode: Option<RawRegeocode>,
    #[serde(default)]
    regeocodes: Vec<RawRegeocode>,
}

#[derive(Debug, Deserialize)]
struct RawRegeocode {
    #[serde(default, deserialize_with = "lenient_string")]
    formatted_address: String,
    #[serde(rename = "addressComponent")]
    address_component: RawAddressComponent,
}

#[derive(Debug, Deserialize)]
struct RawAddressComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    province: String,
    #[serde(default, deserialize_with = "lenient_string")]
    city: String,
    #[serde(default, deserialize_with = "lenient_string")]
    district: String,
    #[serde(default, deserialize_with = "lenient_string")]
    township: String,
    #[serde(default, deserialize_with = "lenient_string")]
    adcode: String,
    #[serde(default, deserialize_with = "lenient_string")]
    citycode: String,
    #[serde(rename = "streetNumber", default)]
    street_number: Value,
    #[serde(rename = "businessAreas", alias = "businessCircles", default)]
    business_areas: Value,
}

impl RawRegeocode {
    fn into_address(self, source: VendorCoordinate) -> AddressResult {
        let c = self.address_component;
        AddressResult {
            formatted_address: self.formatted_address,
            province: c.province,
            city: c.city,
            district: c.district,
            township: non_empty(c.township),
            adcode: c.adcode,
            city_code: c.citycode,
            street: non_empty(value_string(c.street_number.get("street"))),
            street_number: non_empty(value_string(c.street_number.get("number"))),
            business_areas: business_area_names(&c.business_areas),
            source_coordinate: source,
        }
    }
}

/// Decode a vendor body; anything that isn't the expected JSON is a remote fault
fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::remote("INVALID_RESPONSE", e.to_string()))
}

/// Parse a single reverse geocode response
pub fn parse_regeo(body: &str, source: VendorCoordinate) -> Result<AddressResult> {
    let response: RegeoResponse = decode(body)?;
    response.status.check()?;

    response
        .regeocode
        .map(|r| r.into_address(source))
        .ok_or_else(|| Error::remote("NO_REGEOCODE", "response carried no regeocode"))
}

/// Parse a batch reverse geocode response; results follow `sources` order
pub fn parse_regeo_batch(body: &str, sources: &[VendorCoordinate]) -> Result<Vec<AddressResult>> {
    let response: RegeoResponse = decode(body)?;
    response.status.check()?;

    if response.regeocodes.len() != sources.len() {
        return Err(Error::remote(
            "BATCH_SIZE_MISMATCH",
            format!(
                "asked for {} addresses, got {}",
                sources.len(),
                response.regeocodes.len()
            ),
        ));
    }

    Ok(response
        .regeocodes
        .into_iter()
        .zip(sources.iter().copied())
        .map(|(r, source)| r.into_address(source))
        .collect())
}

#[derive(Debug, Deserialize)]
struct PlaceResponse {
    #[serde(flatten)]
    status: VendorStatus,
    #[serde(default)]
    pois: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct TipsResponse {
    #[serde(flatten)]
    status: VendorStatus,
    #[serde(default)]
    tips: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    address: String,
    #[serde(default, deserialize_with = "lenient_string")]
    location: String,
    #[serde(default, deserialize_with = "lenient_string")]
    distance: String,
}

impl RawPlace {
    /// `None` when the place has no usable location
    fn into_poi(self) -> Option<PointOfInterest> {
        let location = VendorCoordinate::parse_lnglat(&self.location).ok()?;
        Some(PointOfInterest {
            id: self.id,
            name: self.name,
            address: self.address,
            location,
            distance_meters: self.distance.trim().parse().ok(),
        })
    }
}

/// Parse a POI text search response, preserving server order
pub fn parse_pois(body: &str) -> Result<Vec<PointOfInterest>> {
    let response: PlaceResponse = decode(body)?;
    response.status.check()?;
    Ok(response.pois.into_iter().filter_map(RawPlace::into_poi).collect())
}

/// Parse an input tips response, dropping tips that cannot be located
pub fn parse_tips(body: &str) -> Result<Vec<PointOfInterest>> {
    let response: TipsResponse = decode(body)?;
    response.status.check()?;
    Ok(response.tips.into_iter().filter_map(RawPlace::into_poi).collect())
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(flatten)]
    status: VendorStatus,
    route: Option<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    #[serde(default)]
    paths: Vec<RawPath>,
}

#[derive(Debug, Deserialize)]
struct RawPath {
    #[serde(default, deserialize_with = "lenient_f64")]
    distance: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    duration: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    tolls: f64,
    #[serde(
        default,
        rename = "traffic_lights",
        alias = "trafficLights",
        deserialize_with = "lenient_f64"
    )]
    traffic_lights: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    polyline: String,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default, deserialize_with = "lenient_string")]
    polyline: String,
}

/// Parse a route planning response (first path only)
pub fn parse_route(body: &str) -> Result<RouteResult> {
    let response: RouteResponse = decode(body)?;
    response.status.check()?;

    let path = response
        .route
        .and_then(|r| r.paths.into_iter().next())
        .ok_or_else(|| Error::remote("NO_ROUTE", "response carried no route path"))?;

    let points = if path.polyline.is_empty() {
        let mut points = Vec::new();
        for step in &path.steps {
            for point in parse_polyline(&step.polyline)? {
                // Consecutive steps share their boundary point
                if points.last() != Some(&point) {
                    points.push(point);
                }
            }
        }
        points
    } else {
        parse_polyline(&path.polyline)?
    };

    Ok(RouteResult {
        distance_meters: path.distance,
        duration_seconds: path.duration,
        path: points,
        toll_fare: path.tolls,
        traffic_light_count: path.traffic_lights.max(0.0).round() as u32,
    })
}

/// Parse an encoded polyline `"lon,lat;lon,lat;..."` into ordered points
pub fn parse_polyline(encoded: &str) -> Result<Vec<VendorCoordinate>> {
    encoded
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(VendorCoordinate::parse_lnglat)
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Render a loosely typed JSON value as a string (`[]`/null become empty)
fn value_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn business_area_names(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|areas| {
            areas
                .iter()
                .filter_map(|area| area.get("name"))
                .map(|name| value_string(Some(name)))
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_string(Some(&value)))
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}
