//! Embedded web map backend
//!
//! Contract calls become bridge messages. Inbound strings from the surface
//! are pumped through [`MapBridge::dispatch`] on a background task; whatever
//! is not a reply to a pending location request becomes a [`MapEvent`].

use super::{report, LocationSetup, MapBackend, MapEvent, MapHostAdapter, PetMarker};
use crate::bridge::{InboundMessage, MapBridge, OutboundMessage, Routed, SurfaceTransport};
use crate::coord::VendorCoordinate;
use crate::error::{Error, Result};
use crate::location::{Acquisition, AcquisitionController, BridgeLocationProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

impl From<InboundMessage> for MapEvent {
    fn from(message: InboundMessage) -> Self {
        match message {
            InboundMessage::MapReady => Self::Ready,
            InboundMessage::MapError { message } => Self::Error(message),
            InboundMessage::MarkerTapped { id } => Self::MarkerTap(id),
            InboundMessage::LocationResolved { coordinate, .. } => Self::LocationResolved {
                coordinate,
                address: None,
            },
            InboundMessage::LocationFailed { failure, .. } => {
                Self::LocationFailed(failure.to_provider_error().reason())
            }
            InboundMessage::MapTapped { coordinate } => Self::MapTap(coordinate),
        }
    }
}

async fn pump(
    bridge: Arc<MapBridge>,
    mut inbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<MapEvent>,
) {
    while let Some(raw) = inbound.recv().await {
        match bridge.dispatch(&raw) {
            Ok(Routed::Event(message)) => {
                if events.send(message.into()).is_err() {
                    debug!("map event receiver dropped, stopping surface pump");
                    break;
                }
            }
            Ok(Routed::Reply { request_id }) => {
                debug!(%request_id, "location reply delivered");
            }
            // already logged by dispatch
            Err(_) => {}
        }
    }
}

/// Map adapter for a sandboxed web surface
pub struct SurfaceMapAdapter {
    bridge: Arc<MapBridge>,
    controller: AcquisitionController,
    events: mpsc::UnboundedSender<MapEvent>,
    pump: JoinHandle<()>,
}

impl SurfaceMapAdapter {
    /// Create the adapter and start pumping `inbound`
    ///
    /// Must be called from within a Tokio runtime. Location requests go to
    /// the surface first and to `setup.secondary` when the surface gives up.
    pub fn new(
        transport: Arc<dyn SurfaceTransport>,
        inbound: mpsc::UnboundedReceiver<String>,
        setup: LocationSetup,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MapEvent>)> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Bridge(format!("surface adapter needs a Tokio runtime: {}", e)))?;

        let bridge = Arc::new(MapBridge::new(transport));
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = setup.controller(Arc::new(BridgeLocationProvider::new(bridge.clone())));
        let pump = runtime.spawn(pump(bridge.clone(), inbound, events.clone()));

        Ok((
            Self {
                bridge,
                controller,
                events,
                pump,
            },
            receiver,
        ))
    }

    pub fn bridge(&self) -> &Arc<MapBridge> {
        &self.bridge
    }

    pub fn controller(&self) -> &AcquisitionController {
        &self.controller
    }

    pub fn set_style(&self, style: &str) -> Result<()> {
        self.bridge.send(&OutboundMessage::SetStyle {
            style: style.to_string(),
        })
    }

    /// Ask the surface to run its own address search
    pub fn search_address(&self, keyword: &str) -> Result<()> {
        self.bridge.send(&OutboundMessage::AddressSearch {
            keyword: keyword.to_string(),
        })
    }

    /// Ask the surface to run its own POI search
    pub fn search_poi(&self, keyword: &str, city: Option<&str>) -> Result<()> {
        self.bridge.send(&OutboundMessage::PoiSearch {
            keyword: keyword.to_string(),
            city: city.map(str::to_string),
        })
    }
}

impl Drop for SurfaceMapAdapter {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl MapHostAdapter for SurfaceMapAdapter {
    fn backend(&self) -> MapBackend {
        MapBackend::Surface
    }

    async fn set_markers(&self, markers: &[PetMarker]) -> Result<()> {
        self.bridge.send(&OutboundMessage::set_markers(markers))
    }

    async fn clear_markers(&self) -> Result<()> {
        self.bridge.send(&OutboundMessage::ClearMarkers {})
    }

    async fn recenter(&self, center: VendorCoordinate, zoom: Option<f32>) -> Result<()> {
        self.bridge.send(&OutboundMessage::recenter(center, zoom))
    }

    async fn request_location(&self) -> Result<Acquisition> {
        let result = self.controller.request().await;
        report(&self.events, &result);

        if let Ok(acquisition) = &result {
            if let Err(e) = self.recenter(acquisition.coordinate, None).await {
                warn!("Failed to recenter on the new fix: {}", e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::DeviceCoordinate;
    use crate::location::{FailureReason, FixedLocationProvider};
    use crate::map::RescueStatus;
    use serde_json::Value;

    struct Harness {
        adapter: SurfaceMapAdapter,
        events: mpsc::UnboundedReceiver<MapEvent>,
        outbound: mpsc::UnboundedReceiver<String>,
        inbound: mpsc::UnboundedSender<String>,
    }

    fn harness(setup: LocationSetup) -> Harness {
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (inbound, in_rx) = mpsc::unbounded_channel();
        let (adapter, events) = SurfaceMapAdapter::new(Arc::new(out_tx), in_rx, setup).unwrap();
        Harness {
            adapter,
            events,
            outbound,
            inbound,
        }
    }

    async fn next_sent(outbound: &mut mpsc::UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&outbound.recv().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_contract_calls_become_messages() {
        let mut h = harness(LocationSetup::default());
        let marker = PetMarker::new("p1", "Mochi", RescueStatus::NeedsRescue, VendorCoordinate::new(116.4, 39.9));

        h.adapter.set_markers(&[marker]).await.unwrap();
        h.adapter.clear_markers().await.unwrap();
        h.adapter.recenter(VendorCoordinate::new(116.4, 39.9), Some(14.0)).await.unwrap();
        h.adapter.search_poi("宠物医院", Some("北京")).unwrap();

        let sent = next_sent(&mut h.outbound).await;
        assert_eq!(sent["type"], "ADD_PETS");
        assert_eq!(sent["data"]["pets"][0]["color"], "#FF9500");
        assert_eq!(next_sent(&mut h.outbound).await["type"], "CLEAR_PETS");
        assert_eq!(next_sent(&mut h.outbound).await["data"]["zoom"], 14.0);
        assert_eq!(next_sent(&mut h.outbound).await["data"]["city"], "北京");
    }

    #[tokio::test]
    async fn test_inbound_messages_become_events() {
        let mut h = harness(LocationSetup::default());

        for raw in [
            r#"{"type":"MAP_LOADED","data":{}}"#,
            r#"{"type":"NOT_A_THING","data":{}}"#,
            r#"{"type":"MARKER_CLICK","data":{"id":"p3"}}"#,
            r#"{"type":"MAP_CLICK","data":{"longitude":116.4,"latitude":39.9}}"#,
            r#"{"type":"MAP_ERROR","data":{"message":"INVALID_USER_SCODE"}}"#,
        ] {
            h.inbound.send(raw.to_string()).unwrap();
        }

        assert_eq!(h.events.recv().await.unwrap(), MapEvent::Ready);
        assert_eq!(h.events.recv().await.unwrap(), MapEvent::MarkerTap("p3".into()));
        assert_eq!(
            h.events.recv().await.unwrap(),
            MapEvent::MapTap(VendorCoordinate::new(116.4, 39.9))
        );
        assert_eq!(
            h.events.recv().await.unwrap(),
            MapEvent::Error("INVALID_USER_SCODE".into())
        );
    }

    #[tokio::test]
    async fn test_request_location_through_surface() {
        let Harness {
            adapter,
            mut events,
            mut outbound,
            inbound,
        } = harness(LocationSetup::default());

        let (acquisition, request) = tokio::join!(adapter.request_location(), async {
            let request = next_sent(&mut outbound).await;
            let reply = serde_json::json!({
                "type": "LOCATION_SUCCESS",
                "data": {"longitude": 116.41, "latitude": 39.91, "requestId": request["data"]["requestId"]}
            });
            inbound.send(reply.to_string()).unwrap();
            request
        });

        assert_eq!(request["type"], "GET_LOCATION");
        let acquisition = acquisition.unwrap();
        assert_eq!(acquisition.provider, "surface");
        assert_eq!(acquisition.coordinate, VendorCoordinate::new(116.41, 39.91));

        assert_eq!(
            events.recv().await.unwrap(),
            MapEvent::LocationResolved {
                coordinate: VendorCoordinate::new(116.41, 39.91),
                address: None
            }
        );
        assert_eq!(next_sent(&mut outbound).await["type"], "CENTER_MAP");
    }

    #[tokio::test]
    async fn test_surface_denial_falls_back_to_device() {
        let setup = LocationSetup {
            secondary: Some(Arc::new(FixedLocationProvider::new(DeviceCoordinate::new(121.47, 31.23)))),
            ..LocationSetup::default()
        };
        let Harness {
            adapter,
            mut events,
            mut outbound,
            inbound,
        } = harness(setup);

        let (acquisition, _) = tokio::join!(adapter.request_location(), async {
            next_sent(&mut outbound).await;
            inbound
                .send(r#"{"type":"LOCATION_ERROR","data":{"code":1,"message":"denied"}}"#.to_string())
                .unwrap();
        });

        let acquisition = acquisition.unwrap();
        assert_eq!(acquisition.provider, "fixed");
        assert!(matches!(events.recv().await.unwrap(), MapEvent::LocationResolved { .. }));
    }

    #[tokio::test]
    async fn test_surface_denial_without_fallback_fails() {
        let Harness {
            adapter,
            mut events,
            mut outbound,
            inbound,
        } = harness(LocationSetup::default());

        let (result, _) = tokio::join!(adapter.request_location(), async {
            next_sent(&mut outbound).await;
            inbound
                .send(r#"{"type":"LOCATION_ERROR","data":{"code":"PERMISSION_DENIED"}}"#.to_string())
                .unwrap();
        });

        assert!(matches!(result, Err(Error::Acquisition(FailureReason::PermissionDenied))));
        assert_eq!(
            events.recv().await.unwrap(),
            MapEvent::LocationFailed(FailureReason::PermissionDenied)
        );
    }
}
