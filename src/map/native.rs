//! Native map widget backend
//!
//! No bridge: markers and camera moves go straight to a [`NativeMapView`],
//! positions come from device providers, and the widget's gesture callbacks
//! are forwarded through the `notify_*` methods.

use super::{report, LocationSetup, MapBackend, MapEvent, MapHostAdapter, MarkerColor, PetMarker};
use crate::coord::VendorCoordinate;
use crate::error::Result;
use crate::location::{Acquisition, AcquisitionController, LocationProvider};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::warn;

/// Marker id reserved for the user's own position
pub const USER_MARKER_ID: &str = "__user__";

/// What a native marker depicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeMarkerKind {
    Pet(MarkerColor),
    /// Drawn with the platform's own "you are here" style
    User,
}

/// A marker handed to the native widget
#[derive(Debug, Clone, PartialEq)]
pub struct NativeMarker {
    pub id: String,
    pub title: String,
    pub position: VendorCoordinate,
    pub kind: NativeMarkerKind,
}

impl From<&PetMarker> for NativeMarker {
    fn from(marker: &PetMarker) -> Self {
        Self {
            id: marker.id.clone(),
            title: marker.name.clone(),
            position: marker.coordinate,
            kind: NativeMarkerKind::Pet(marker.color()),
        }
    }
}

/// Primitives a native map widget offers
pub trait NativeMapView: Send + Sync {
    fn add_marker(&self, marker: NativeMarker) -> Result<()>;

    /// Remove every marker, the user marker included
    fn remove_markers(&self) -> Result<()>;

    fn move_camera(&self, center: VendorCoordinate, zoom: Option<f32>) -> Result<()>;
}

/// Map adapter for a native map widget
pub struct NativeMapAdapter {
    view: Arc<dyn NativeMapView>,
    controller: AcquisitionController,
    events: mpsc::UnboundedSender<MapEvent>,
    user_position: Mutex<Option<VendorCoordinate>>,
}

impl NativeMapAdapter {
    /// Create the adapter; `device` is the primary location provider
    pub fn new(
        view: Arc<dyn NativeMapView>,
        device: Arc<dyn LocationProvider>,
        setup: LocationSetup,
    ) -> (Self, mpsc::UnboundedReceiver<MapEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let adapter = Self {
            view,
            controller: setup.controller(device),
            events,
            user_position: Mutex::new(None),
        };
        (adapter, receiver)
    }

    pub fn controller(&self) -> &AcquisitionController {
        &self.controller
    }

    fn user_position(&self) -> MutexGuard<'_, Option<VendorCoordinate>> {
        self.user_position.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add_user_marker(&self, position: VendorCoordinate) -> Result<()> {
        self.view.add_marker(NativeMarker {
            id: USER_MARKER_ID.to_string(),
            title: String::new(),
            position,
            kind: NativeMarkerKind::User,
        })
    }

    /// Clear the widget, keeping the user marker if one was placed
    fn reset_markers(&self) -> Result<()> {
        self.view.remove_markers()?;
        let user = *self.user_position();
        if let Some(position) = user {
            self.add_user_marker(position)?;
        }
        Ok(())
    }

    fn emit(&self, event: MapEvent) {
        let _ = self.events.send(event);
    }

    pub fn notify_ready(&self) {
        self.emit(MapEvent::Ready);
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        self.emit(MapEvent::Error(message.into()));
    }

    pub fn notify_marker_tap(&self, id: impl Into<String>) {
        let id = id.into();
        if id != USER_MARKER_ID {
            self.emit(MapEvent::MarkerTap(id));
        }
    }

    pub fn notify_map_tap(&self, position: VendorCoordinate) {
        self.emit(MapEvent::MapTap(position));
    }
}

#[async_trait]
impl MapHostAdapter for NativeMapAdapter {
    fn backend(&self) -> MapBackend {
        MapBackend::Native
    }

    async fn set_markers(&self, markers: &[PetMarker]) -> Result<()> {
        self.reset_markers()?;
        for marker in markers {
            self.view.add_marker(marker.into())?;
        }
        Ok(())
    }

    async fn clear_markers(&self) -> Result<()> {
        self.reset_markers()
    }

    async fn recenter(&self, center: VendorCoordinate, zoom: Option<f32>) -> Result<()> {
        self.view.move_camera(center, zoom)
    }

    async fn request_location(&self) -> Result<Acquisition> {
        let result = self.controller.request().await;

        if let Ok(acquisition) = &result {
            let previous = self.user_position().replace(acquisition.coordinate);
            let rendered = match previous {
                Some(_) => self.reset_markers(),
                None => self.add_user_marker(acquisition.coordinate),
            }
            .and_then(|_| self.view.move_camera(acquisition.coordinate, None));
            if let Err(e) = rendered {
                warn!("Failed to show the new fix: {}", e);
            }
        }

        report(&self.events, &result);
        result
    }
}
