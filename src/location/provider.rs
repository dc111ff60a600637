//! Location providers
//!
//! A provider is one way of getting a position: the map surface's own
//! geolocation, the public IP, or a configured fixed point. Providers report
//! raw outcomes; the state machine decides whether to retry or switch.

use super::{Position, ProviderError};
use crate::bridge::MapBridge;
use crate::coord::DeviceCoordinate;
use crate::error::Error;
use crate::geo::ip_location::IpLocator;
use crate::geo::{ReqwestTransport, Transport};
use async_trait::async_trait;
use std::sync::Arc;

/// Outcome of a permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// A source of positions
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Short name for logs and results
    fn name(&self) -> &str;

    /// Ask for permission to locate; providers without a prompt grant
    async fn request_permission(&self) -> PermissionStatus;

    /// Produce one position
    ///
    /// May never complete; the controller bounds it with a timeout.
    async fn current_position(&self) -> Result<Position, ProviderError>;
}

/// Locates through the embedded map surface
///
/// The surface does its own permission prompt, so denial shows up as a
/// `LOCATION_ERROR` reply rather than from `request_permission`.
#[derive(Debug)]
pub struct BridgeLocationProvider {
    bridge: Arc<MapBridge>,
}

impl BridgeLocationProvider {
    pub fn new(bridge: Arc<MapBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl LocationProvider for BridgeLocationProvider {
    fn name(&self) -> &str {
        "surface"
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<Position, ProviderError> {
        let pending = self
            .bridge
            .request_location()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        match pending.wait().await {
            Ok(Ok(coordinate)) => Ok(Position::Vendor(coordinate)),
            Ok(Err(failure)) => Err(failure.to_provider_error()),
            Err(e) => Err(ProviderError::Unavailable(e.to_string())),
        }
    }
}

/// Coarse position from the public IP address
#[derive(Debug)]
pub struct IpLocationProvider<T: Transport = ReqwestTransport> {
    locator: IpLocator<T>,
}

impl<T: Transport> IpLocationProvider<T> {
    pub fn new(locator: IpLocator<T>) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl<T: Transport + 'static> LocationProvider for IpLocationProvider<T> {
    fn name(&self) -> &str {
        "ip"
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<Position, ProviderError> {
        match self.locator.locate().await {
            Ok(fix) => Ok(Position::Device(fix.coordinate)),
            Err(e) if e.is_network() => Err(ProviderError::Network(e.to_string())),
            Err(Error::RemoteService { code, .. }) if code.starts_with("HTTP_5") => {
                Err(ProviderError::Network(format!("IP service returned {}", code)))
            }
            Err(e) => Err(ProviderError::Unavailable(e.to_string())),
        }
    }
}

/// Always reports the same position
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    coordinate: DeviceCoordinate,
}

impl FixedLocationProvider {
    pub fn new(coordinate: DeviceCoordinate) -> Self {
        Self { coordinate }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<Position, ProviderError> {
        Ok(Position::Device(self.coordinate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Routed;
    use crate::coord::VendorCoordinate;
    use crate::geo::test_support::StubTransport;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_fixed_provider() {
        let provider = FixedLocationProvider::new(DeviceCoordinate::new(116.4074, 39.9042));
        assert_eq!(provider.request_permission().await, PermissionStatus::Granted);
        assert_eq!(
            provider.current_position().await.unwrap(),
            Position::Device(DeviceCoordinate::new(116.4074, 39.9042))
        );
    }

    #[tokio::test]
    async fn test_ip_provider_classifies_errors() {
        let stub = StubTransport::new()
            .with_network_error("dns failure")
            .with_remote_error("HTTP_503", "Service Unavailable")
            .with_body(r#"{"status":"fail","message":"private range"}"#)
            .with_body(r#"{"status":"success","lat":31.23,"lon":121.47,"city":"Shanghai"}"#);
        let provider = IpLocationProvider::new(IpLocator::without_cache(stub));

        assert!(matches!(provider.current_position().await, Err(ProviderError::Network(_))));
        assert!(matches!(provider.current_position().await, Err(ProviderError::Network(_))));
        assert!(matches!(provider.current_position().await, Err(ProviderError::Unavailable(_))));
        assert_eq!(
            provider.current_position().await.unwrap(),
            Position::Device(DeviceCoordinate::new(121.47, 31.23))
        );
    }

    #[tokio::test]
    async fn test_bridge_provider_round_trip() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let bridge = Arc::new(MapBridge::new(Arc::new(tx)));
        let provider = BridgeLocationProvider::new(bridge.clone());

        let surface = tokio::spawn(async move {
            let raw = rx.recv().await.unwrap();
            let request: serde_json::Value = serde_json::from_str(&raw).unwrap();
            let reply = serde_json::json!({
                "type": "LOCATION_SUCCESS",
                "data": {"lng": 116.41, "lat": 39.91, "requestId": request["data"]["requestId"]}
            });
            bridge.dispatch(&reply.to_string()).unwrap()
        });

        let position = provider.current_position().await.unwrap();
        assert_eq!(position, Position::Vendor(VendorCoordinate::new(116.41, 39.91)));
        assert!(matches!(surface.await.unwrap(), Routed::Reply { .. }));
    }

    #[tokio::test]
    async fn test_bridge_provider_maps_surface_denial() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let bridge = Arc::new(MapBridge::new(Arc::new(tx)));
        let provider = BridgeLocationProvider::new(bridge.clone());

        tokio::spawn(async move {
            rx.recv().await.unwrap();
            bridge
                .dispatch(r#"{"type":"LOCATION_ERROR","data":{"code":"PERMISSION_DENIED","message":"denied"}}"#)
                .unwrap();
        });

        assert_eq!(
            provider.current_position().await.unwrap_err(),
            ProviderError::PermissionDenied
        );
    }
}
