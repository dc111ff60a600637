//! Map host adapters
//!
//! One contract, [`MapHostAdapter`], with two backends:
//! - [`surface::SurfaceMapAdapter`] drives an embedded web map over the bridge
//! - [`native::NativeMapAdapter`] drives a native map widget directly
//!
//! Both emit the same [`MapEvent`]s and color markers the same way, so the
//! owning screen does not care which one it got. The backend is picked by
//! the caller through [`MapBackend`]; nothing here inspects the platform.

pub mod native;
pub mod surface;

pub use native::{NativeMapAdapter, NativeMapView, NativeMarker, NativeMarkerKind};
pub use surface::SurfaceMapAdapter;

use crate::bridge::SurfaceTransport;
use crate::coord::VendorCoordinate;
use crate::error::{Error, Result};
use crate::geo::AddressResult;
use crate::location::{
    Acquisition, AcquisitionController, AddressResolver, FailureReason, LocationProvider,
    RetryPolicy, Timer,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Rescue status of a pet listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RescueStatus {
    Emergency,
    NeedsRescue,
    ForAdoption,
    Adopted,
}

/// Marker hue, derived from [`RescueStatus`] only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerColor {
    Red,
    Orange,
    Green,
    Gray,
}

impl MarkerColor {
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Red => "#FF3B30",
            Self::Orange => "#FF9500",
            Self::Green => "#34C759",
            Self::Gray => "#8E8E93",
        }
    }
}

impl From<RescueStatus> for MarkerColor {
    fn from(status: RescueStatus) -> Self {
        match status {
            RescueStatus::Emergency => Self::Red,
            RescueStatus::NeedsRescue => Self::Orange,
            RescueStatus::ForAdoption => Self::Green,
            RescueStatus::Adopted => Self::Gray,
        }
    }
}

/// A pet to show on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetMarker {
    pub id: String,
    pub name: String,
    pub status: RescueStatus,
    pub coordinate: VendorCoordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PetMarker {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        status: RescueStatus,
        coordinate: VendorCoordinate,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            coordinate,
            image_url: None,
        }
    }

    pub fn color(&self) -> MarkerColor {
        self.status.into()
    }
}

/// Events surfaced to the screen that owns the map
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    Ready,
    Error(String),
    MarkerTap(String),
    LocationResolved {
        coordinate: VendorCoordinate,
        address: Option<AddressResult>,
    },
    LocationFailed(FailureReason),
    MapTap(VendorCoordinate),
}

/// Which rendering backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapBackend {
    #[default]
    Surface,
    Native,
}

impl fmt::Display for MapBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface => write!(f, "surface"),
            Self::Native => write!(f, "native"),
        }
    }
}

impl FromStr for MapBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "surface" | "web" | "webview" => Ok(Self::Surface),
            "native" => Ok(Self::Native),
            _ => Err(format!("Unknown map backend: {}", s)),
        }
    }
}

/// The map contract shared by both backends
#[async_trait]
pub trait MapHostAdapter: Send + Sync {
    fn backend(&self) -> MapBackend;

    /// Replace the pet markers on the map
    async fn set_markers(&self, markers: &[PetMarker]) -> Result<()>;

    async fn clear_markers(&self) -> Result<()>;

    async fn recenter(&self, center: VendorCoordinate, zoom: Option<f32>) -> Result<()>;

    /// Acquire the user's position, emitting `LocationResolved` or `LocationFailed`
    async fn request_location(&self) -> Result<Acquisition>;
}

/// Location settings shared by both backends
#[derive(Clone, Default)]
pub struct LocationSetup {
    /// Provider used when the backend's own location path gives up
    pub secondary: Option<Arc<dyn LocationProvider>>,
    pub resolver: Option<Arc<dyn AddressResolver>>,
    pub policy: RetryPolicy,
    pub timer: Option<Arc<dyn Timer>>,
}

impl LocationSetup {
    fn controller(&self, primary: Arc<dyn LocationProvider>) -> AcquisitionController {
        let mut controller = AcquisitionController::new(primary).with_policy(self.policy.clone());
        if let Some(secondary) = &self.secondary {
            controller = controller.with_secondary(secondary.clone());
        }
        if let Some(resolver) = &self.resolver {
            controller = controller.with_resolver(resolver.clone());
        }
        if let Some(timer) = &self.timer {
            controller = controller.with_timer(timer.clone());
        }
        controller
    }
}

/// Emit the location event matching an acquisition outcome
fn report(events: &mpsc::UnboundedSender<MapEvent>, result: &Result<Acquisition>) {
    let event = match result {
        Ok(acquisition) => MapEvent::LocationResolved {
            coordinate: acquisition.coordinate,
            address: acquisition.address.clone(),
        },
        Err(Error::Acquisition(reason)) => MapEvent::LocationFailed(*reason),
        Err(_) => return,
    };
    let _ = events.send(event);
}

/// Builds the adapter for an explicitly chosen backend
#[derive(Default)]
pub struct MapHostBuilder {
    backend: MapBackend,
    setup: LocationSetup,
    device: Option<Arc<dyn LocationProvider>>,
    surface: Option<(Arc<dyn SurfaceTransport>, mpsc::UnboundedReceiver<String>)>,
    view: Option<Arc<dyn NativeMapView>>,
    style: Option<String>,
}

impl MapHostBuilder {
    pub fn new(backend: MapBackend) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Outbound transport and inbound message stream of the embedded surface
    pub fn with_surface(
        mut self,
        transport: Arc<dyn SurfaceTransport>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        self.surface = Some((transport, inbound));
        self
    }

    pub fn with_native_view(mut self, view: Arc<dyn NativeMapView>) -> Self {
        self.view = Some(view);
        self
    }

    /// Device positioning: primary for the native backend, fallback for the surface
    pub fn with_device_provider(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.device = Some(provider);
        self
    }

    /// Fallback for the native backend when the device provider gives up
    pub fn with_fallback_provider(mut self, provider: Arc<dyn LocationProvider>) -> Self {
        self.setup.secondary = Some(provider);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.setup.resolver = Some(resolver);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.setup.policy = policy;
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.setup.timer = Some(timer);
        self
    }

    /// Surface map style, sent once the adapter is built
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn build(self) -> Result<(Box<dyn MapHostAdapter>, mpsc::UnboundedReceiver<MapEvent>)> {
        match self.backend {
            MapBackend::Surface => {
                let (transport, inbound) = self.surface.ok_or_else(|| {
                    Error::Config("surface backend needs a surface transport".to_string())
                })?;
                let mut setup = self.setup;
                if let Some(device) = self.device {
                    setup.secondary = Some(device);
                }

                let (adapter, events) = SurfaceMapAdapter::new(transport, inbound, setup)?;
                if let Some(style) = &self.style {
                    adapter.set_style(style)?;
                }
                Ok((Box::new(adapter), events))
            }
            MapBackend::Native => {
                let view = self.view.ok_or_else(|| {
                    Error::Config("native backend needs a map view".to_string())
                })?;
                let device = self.device.ok_or_else(|| {
                    Error::Config("native backend needs a device location provider".to_string())
                })?;

                let (adapter, events) = NativeMapAdapter::new(view, device, self.setup);
                Ok((Box::new(adapter), events))
            }
        }
    }
}
