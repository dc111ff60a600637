//! Coordinates and datums
//!
//! This module handles:
//! - Datum-tagged coordinates (device GPS datum vs. map vendor datum)
//! - Conversion between the two datums
//! - Great-circle distance

pub mod datum;
pub mod distance;

use crate::constants::geo::QUANTIZE_DECIMALS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A coordinate reference system marker
pub trait Datum: Copy + fmt::Debug + Default + PartialEq + Send + Sync + 'static {
    /// Short name used in logs and output
    const NAME: &'static str;
}

/// Uncorrected GPS datum reported by device positioning hardware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wgs84;

/// Offset datum used by the map vendor's tiles and web services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gcj02;

impl Datum for Wgs84 {
    const NAME: &'static str = "wgs84";
}

impl Datum for Gcj02 {
    const NAME: &'static str = "gcj02";
}

/// A geographic coordinate expressed in datum `D`
///
/// Coordinates in different datums are different types; the only way across
/// is [`datum::to_vendor_datum`] / [`datum::to_device_datum`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate<D: Datum> {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(skip)]
    datum: PhantomData<D>,
}

/// A coordinate from device positioning (WGS-84)
pub type DeviceCoordinate = Coordinate<Wgs84>;

/// A coordinate in the map vendor's datum (GCJ-02)
pub type VendorCoordinate = Coordinate<Gcj02>;

impl<D: Datum> Coordinate<D> {
    /// Create new coordinates (longitude first, matching the vendor wire order)
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            datum: PhantomData,
        }
    }

    /// Create coordinates, rejecting out-of-range values
    pub fn checked(longitude: f64, latitude: f64) -> Result<Self> {
        let coord = Self::new(longitude, latitude);
        coord.validate()?;
        Ok(coord)
    }

    /// Validate that coordinates are within valid ranges
    ///
    /// Latitude: -90 to 90
    /// Longitude: -180 to 180
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidCoordinates(format!(
                "Latitude {} is out of range [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidCoordinates(format!(
                "Longitude {} is out of range [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Name of the datum this coordinate is expressed in
    pub fn datum_name(&self) -> &'static str {
        D::NAME
    }

    /// Vendor wire form: `"lon,lat"` with 6 decimal places
    pub fn to_lnglat_string(&self) -> String {
        format!(
            "{:.prec$},{:.prec$}",
            self.longitude,
            self.latitude,
            prec = QUANTIZE_DECIMALS
        )
    }

    /// Cache key grouping practically identical locations (~0.11 m)
    ///
    /// Values that round to zero from below key as `0.000000`, not `-0.000000`.
    pub fn quantized_key(&self) -> String {
        let scale = 10f64.powi(QUANTIZE_DECIMALS as i32);
        // adding +0.0 turns -0.0 into 0.0
        let quantize = |v: f64| (v * scale).round() / scale + 0.0;
        format!(
            "{:.prec$},{:.prec$}",
            quantize(self.longitude),
            quantize(self.latitude),
            prec = QUANTIZE_DECIMALS
        )
    }

    /// Parse the vendor wire form `"lon,lat"`
    pub fn parse_lnglat(s: &str) -> Result<Self> {
        let (lng, lat) = s
            .trim()
            .split_once(',')
            .ok_or_else(|| Error::InvalidCoordinates(format!("Expected \"lon,lat\", got {:?}", s)))?;
        let longitude: f64 = lng.trim().parse().map_err(|_| {
            Error::InvalidCoordinates(format!("Invalid longitude: {}", lng))
        })?;
        let latitude: f64 = lat.trim().parse().map_err(|_| {
            Error::InvalidCoordinates(format!("Invalid latitude: {}", lat))
        })?;
        Self::checked(longitude, latitude)
    }
}

impl<D: Datum> fmt::Display for Coordinate<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.to_lnglat_string(), D::NAME)
    }
}

impl<D: Datum> std::str::FromStr for Coordinate<D> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_lnglat(s)
    }
}
