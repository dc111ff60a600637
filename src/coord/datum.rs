//! Conversion between the device datum (WGS-84) and the vendor datum (GCJ-02)
//!
//! The vendor datum is WGS-84 plus a non-linear, closed-form offset defined
//! only inside the vendor's territory. Outside the territory bounding box the
//! offset is meaningless, so both directions return the input numbers
//! unchanged there.

use crate::coord::{Coordinate, DeviceCoordinate, VendorCoordinate};
use crate::error::{Error, Result};
use serde::Serialize;
use std::f64::consts::PI;
use std::str::FromStr;

/// Semi-major axis of the Krasovsky 1940 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6_378_245.0;

/// First eccentricity squared of the Krasovsky 1940 ellipsoid
const ECCENTRICITY_SQ: f64 = 0.006_693_421_622_965_943_23;

/// Territory bounding box (degrees)
const MIN_LONGITUDE: f64 = 72.004;
const MAX_LONGITUDE: f64 = 137.8347;
const MIN_LATITUDE: f64 = 0.8293;
const MAX_LATITUDE: f64 = 55.8271;

/// Whether the offset transform is defined at this position
pub fn is_in_territory(longitude: f64, latitude: f64) -> bool {
    (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude)
        && (MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude)
}

/// Convert a device (WGS-84) coordinate into the vendor datum (GCJ-02)
pub fn to_vendor_datum(c: DeviceCoordinate) -> VendorCoordinate {
    if !is_in_territory(c.longitude, c.latitude) {
        return Coordinate::new(c.longitude, c.latitude);
    }
    let (d_lng, d_lat) = offset(c.longitude, c.latitude);
    Coordinate::new(c.longitude + d_lng, c.latitude + d_lat)
}

/// Convert a vendor (GCJ-02) coordinate back into the device datum (WGS-84)
///
/// Uses the one-step inverse `2c - forward(c)`; the residual error is well
/// under a few meters inside the territory.
pub fn to_device_datum(c: VendorCoordinate) -> DeviceCoordinate {
    if !is_in_territory(c.longitude, c.latitude) {
        return Coordinate::new(c.longitude, c.latitude);
    }
    let (d_lng, d_lat) = offset(c.longitude, c.latitude);
    Coordinate::new(c.longitude - d_lng, c.latitude - d_lat)
}

/// Direction of a raw-number conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDatum {
    /// WGS-84 in, GCJ-02 out
    Vendor,
    /// GCJ-02 in, WGS-84 out
    Device,
}

impl FromStr for TargetDatum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vendor" | "gcj02" => Ok(Self::Vendor),
            "device" | "wgs84" => Ok(Self::Device),
            _ => Err(Error::Config(format!(
                "Unknown target datum: {} (expected vendor or device)",
                s
            ))),
        }
    }
}

/// Result of converting raw longitude/latitude numbers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub from: &'static str,
    pub to: &'static str,
    pub longitude: f64,
    pub latitude: f64,
    /// False when the input lay outside the territory and passed through
    pub shifted: bool,
}

/// Validate raw numbers and convert them towards `target`
pub fn convert(longitude: f64, latitude: f64, target: TargetDatum) -> Result<Conversion> {
    let shifted = is_in_territory(longitude, latitude);
    let (from, to, out_lng, out_lat) = match target {
        TargetDatum::Vendor => {
            let input = DeviceCoordinate::checked(longitude, latitude)?;
            let out = to_vendor_datum(input);
            (input.datum_name(), out.datum_name(), out.longitude, out.latitude)
        }
        TargetDatum::Device => {
            let input = VendorCoordinate::checked(longitude, latitude)?;
            let out = to_device_datum(input);
            (input.datum_name(), out.datum_name(), out.longitude, out.latitude)
        }
    };
    Ok(Conversion {
        from,
        to,
        longitude: out_lng,
        latitude: out_lat,
        shifted,
    })
}

/// Longitude/latitude offset in degrees at a WGS-84 position
fn offset(longitude: f64, latitude: f64) -> (f64, f64) {
    let x = longitude - 105.0;
    let y = latitude - 35.0;

    let rad_lat = latitude / 180.0 * PI;
    let magic = 1.0 - ECCENTRICITY_SQ * rad_lat.sin().powi(2);
    let sqrt_magic = magic.sqrt();

    let d_lat = transform_latitude(x, y) * 180.0
        / ((SEMI_MAJOR_AXIS * (1.0 - ECCENTRICITY_SQ)) / (magic * sqrt_magic) * PI);
    let d_lng =
        transform_longitude(x, y) * 180.0 / (SEMI_MAJOR_AXIS / sqrt_magic * rad_lat.cos() * PI);

    (d_lng, d_lat)
}

fn transform_latitude(x: f64, y: f64) -> f64 {
    let mut ret = -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0 / 3.0;
    ret
}

fn transform_longitude(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += (20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0 / 3.0;
    ret += (20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0 / 3.0;
    ret += (150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0 / 3.0;
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::distance::haversine_distance;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_beijing_round_trip_under_five_meters() {
        let original = DeviceCoordinate::new(116.4074, 39.9042);
        let back = to_device_datum(to_vendor_datum(original));
        let error = haversine_distance(original, back);
        assert!(error < 5.0, "round-trip error {} m", error);
    }

    #[test]
    fn test_forward_offset_is_a_few_hundred_meters() {
        let original = DeviceCoordinate::new(116.4074, 39.9042);
        let shifted = to_vendor_datum(original);
        let moved = haversine_distance(
            original,
            DeviceCoordinate::new(shifted.longitude, shifted.latitude),
        );
        assert!(moved > 100.0 && moved < 1000.0, "offset {} m", moved);
    }

    #[test]
    fn test_known_reference_point() {
        // Central Beijing shifts by roughly +0.00624 lon, +0.00140 lat
        let vendor = to_vendor_datum(DeviceCoordinate::new(116.391_350, 39.907_238));
        assert_relative_eq!(vendor.longitude, 116.397_594, epsilon = 2e-4);
        assert_relative_eq!(vendor.latitude, 39.908_641, epsilon = 2e-4);
    }

    #[test]
    fn test_representative_round_trips() {
        let samples = [
            (121.4737, 31.2304),  // Shanghai
            (113.2644, 23.1291),  // Guangzhou
            (104.0665, 30.5723),  // Chengdu
            (126.6424, 45.7570),  // Harbin
            (87.6168, 43.8256),   // Urumqi
            (110.3312, 20.0310),  // Haikou
        ];
        for (lng, lat) in samples {
            let original = DeviceCoordinate::new(lng, lat);
            let back = to_device_datum(to_vendor_datum(original));
            let error = haversine_distance(original, back);
            assert!(error < 5.0, "round-trip error {} m at {}", error, original);
        }
    }

    #[test]
    fn test_outside_territory_is_identity() {
        let outside = [
            (-74.0060, 40.7128), // New York
            (2.3522, 48.8566),   // Paris
            (151.2093, -33.8688), // Sydney
            (139.0, 35.6),        // just east of the box
            (100.0, 0.5),         // just south of the box
            (180.0, 90.0),
            (-180.0, -90.0),
        ];
        for (lng, lat) in outside {
            let vendor = to_vendor_datum(DeviceCoordinate::new(lng, lat));
            assert_eq!((vendor.longitude, vendor.latitude), (lng, lat));

            let device = to_device_datum(VendorCoordinate::new(lng, lat));
            assert_eq!((device.longitude, device.latitude), (lng, lat));
        }
    }

    #[test]
    fn test_sampled_outside_points_are_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut checked = 0;
        while checked < 500 {
            let lng: f64 = rng.gen_range(-180.0..=180.0);
            let lat: f64 = rng.gen_range(-90.0..=90.0);
            if is_in_territory(lng, lat) {
                continue;
            }
            let vendor = to_vendor_datum(DeviceCoordinate::new(lng, lat));
            assert_eq!((vendor.longitude, vendor.latitude), (lng, lat));
            checked += 1;
        }
    }

    #[test]
    fn test_territory_edges() {
        assert!(is_in_territory(MIN_LONGITUDE, MIN_LATITUDE));
        assert!(is_in_territory(MAX_LONGITUDE, MAX_LATITUDE));
        assert!(!is_in_territory(MIN_LONGITUDE - 0.001, 30.0));
        assert!(!is_in_territory(110.0, MAX_LATITUDE + 0.001));
    }

    #[test]
    fn test_convert_raw_numbers() {
        let c = convert(116.3975, 39.9087, TargetDatum::Vendor).unwrap();
        assert_eq!((c.from, c.to), ("wgs84", "gcj02"));
        assert!(c.shifted);
        assert!((c.longitude - 116.3975).abs() > 1e-4);

        let outside = convert(-0.1276, 51.5072, "device".parse().unwrap()).unwrap();
        assert_eq!((outside.from, outside.to), ("gcj02", "wgs84"));
        assert!(!outside.shifted);
        assert_eq!((outside.longitude, outside.latitude), (-0.1276, 51.5072));
    }

    #[test]
    fn test_convert_rejects_bad_input() {
        assert!(convert(116.0, 95.0, TargetDatum::Vendor).is_err());
        assert!("mercator".parse::<TargetDatum>().is_err());
        assert_eq!("GCJ02".parse::<TargetDatum>().unwrap(), TargetDatum::Vendor);
    }
}
