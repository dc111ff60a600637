//! Bridge wire messages
//!
//! Every message crossing the surface boundary is a JSON string of the form
//! `{"type": "...", "data": {...}}`. Outbound messages are a serde-tagged
//! enum. Inbound messages are routed by `type` first and only then is `data`
//! decoded, so an unknown type is reported as such rather than as a generic
//! decode failure.

use crate::coord::VendorCoordinate;
use crate::error::{Error, Result};
use crate::location::ProviderError;
use crate::map::{PetMarker, RescueStatus};
use serde::{Deserialize, Serialize};

/// A marker as the surface draws it
///
/// `color` is filled in on the host so both sides render the same hue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerPayload {
    pub id: String,
    pub name: String,
    pub status: RescueStatus,
    pub longitude: f64,
    pub latitude: f64,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&PetMarker> for MarkerPayload {
    fn from(marker: &PetMarker) -> Self {
        Self {
            id: marker.id.clone(),
            name: marker.name.clone(),
            status: marker.status,
            longitude: marker.coordinate.longitude,
            latitude: marker.coordinate.latitude,
            color: marker.color().hex().to_string(),
            image_url: marker.image_url.clone(),
        }
    }
}

/// Host → surface messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "ADD_PETS")]
    SetMarkers { pets: Vec<MarkerPayload> },

    #[serde(rename = "CLEAR_PETS")]
    ClearMarkers {},

    #[serde(rename = "CENTER_MAP")]
    RecenterMap {
        longitude: f64,
        latitude: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        zoom: Option<f32>,
    },

    #[serde(rename = "GET_LOCATION")]
    RequestLocation {
        #[serde(rename = "requestId")]
        request_id: String,
    },

    #[serde(rename = "SET_MAP_STYLE")]
    SetStyle { style: String },

    #[serde(rename = "ADDRESS_SEARCH")]
    AddressSearch { keyword: String },

    #[serde(rename = "POI_SEARCH")]
    PoiSearch {
        keyword: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        city: Option<String>,
    },
}

impl OutboundMessage {
    pub fn set_markers(markers: &[PetMarker]) -> Self {
        Self::SetMarkers {
            pets: markers.iter().map(MarkerPayload::from).collect(),
        }
    }

    pub fn recenter(center: VendorCoordinate, zoom: Option<f32>) -> Self {
        Self::RecenterMap {
            longitude: center.longitude,
            latitude: center.latitude,
            zoom,
        }
    }

    /// Wire name of this message
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SetMarkers { .. } => "ADD_PETS",
            Self::ClearMarkers {} => "CLEAR_PETS",
            Self::RecenterMap { .. } => "CENTER_MAP",
            Self::RequestLocation { .. } => "GET_LOCATION",
            Self::SetStyle { .. } => "SET_MAP_STYLE",
            Self::AddressSearch { .. } => "ADDRESS_SEARCH",
            Self::PoiSearch { .. } => "POI_SEARCH",
        }
    }
}

/// A location error reported by the surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFailure {
    pub code: String,
    pub message: String,
}

impl LocationFailure {
    /// Classify the surface's error code
    ///
    /// Codes follow the browser geolocation API, either by name or by its
    /// numeric value (1 denied, 2 unavailable, 3 timeout).
    pub fn to_provider_error(&self) -> ProviderError {
        match self.code.to_ascii_uppercase().as_str() {
            "PERMISSION_DENIED" | "1" => ProviderError::PermissionDenied,
            "TIMEOUT" | "3" => ProviderError::Timeout,
            "NETWORK_ERROR" => ProviderError::Network(self.message.clone()),
            _ => ProviderError::Unavailable(self.message.clone()),
        }
    }
}

/// Surface → host messages
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    MapReady,
    MapError { message: String },
    MarkerTapped { id: String },
    LocationResolved {
        coordinate: VendorCoordinate,
        request_id: Option<String>,
    },
    LocationFailed {
        failure: LocationFailure,
        request_id: Option<String>,
    },
    MapTapped { coordinate: VendorCoordinate },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MarkerData {
    #[serde(alias = "petId")]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointData {
    #[serde(alias = "lng")]
    longitude: f64,
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FailureData {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(kind: &str, data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| Error::Bridge(format!("malformed {} payload: {}", kind, e)))
}

fn point(data: &PointData) -> Result<VendorCoordinate> {
    VendorCoordinate::checked(data.longitude, data.latitude)
}

impl InboundMessage {
    /// Parse a raw envelope string
    pub fn parse(raw: &str) -> Result<Self> {
        let envelope: RawEnvelope = serde_json::from_str(raw)
            .map_err(|e| Error::Bridge(format!("not a bridge envelope: {}", e)))?;
        let kind = envelope.kind.as_str();

        let message = match kind {
            "MAP_LOADED" => Self::MapReady,
            "MAP_ERROR" => {
                let data: ErrorData = decode(kind, envelope.data)?;
                Self::MapError {
                    message: data.message,
                }
            }
            "MARKER_CLICK" => {
                let data: MarkerData = decode(kind, envelope.data)?;
                Self::MarkerTapped { id: data.id }
            }
            "LOCATION_SUCCESS" => {
                let data: PointData = decode(kind, envelope.data)?;
                Self::LocationResolved {
                    coordinate: point(&data)?,
                    request_id: data.request_id,
                }
            }
            "LOCATION_ERROR" => {
                let data: FailureData = decode(kind, envelope.data)?;
                let code = match data.code {
                    Some(serde_json::Value::String(s)) => s,
                    Some(serde_json::Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Self::LocationFailed {
                    failure: LocationFailure {
                        code,
                        message: data.message,
                    },
                    request_id: data.request_id,
                }
            }
            "MAP_CLICK" => {
                let data: PointData = decode(kind, envelope.data)?;
                Self::MapTapped {
                    coordinate: point(&data)?,
                }
            }
            other => {
                return Err(Error::Bridge(format!("unknown message type {:?}", other)));
            }
        };

        Ok(message)
    }

    /// Wire name of this message
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::MapReady => "MAP_LOADED",
            Self::MapError { .. } => "MAP_ERROR",
            Self::MarkerTapped { .. } => "MARKER_CLICK",
            Self::LocationResolved { .. } => "LOCATION_SUCCESS",
            Self::LocationFailed { .. } => "LOCATION_ERROR",
            Self::MapTapped { .. } => "MAP_CLICK",
        }
    }
}
