//! Host side of the map surface bridge
//!
//! The embedded map runs in its own execution context and only exchanges
//! JSON strings with the host. [`MapBridge`] serializes outbound messages
//! onto a [`SurfaceTransport`] and routes inbound strings by type.
//!
//! Location requests are correlated: `request_location` tags `GET_LOCATION`
//! with a fresh `requestId` and waits for a reply carrying the same id. The
//! surface is not obliged to echo ids, so a reply without one is matched to
//! the oldest outstanding request instead. With more than one request
//! outstanding that fallback can pair a reply with the wrong caller; the
//! acquisition controller never has more than one in flight.

pub mod message;

pub use message::{InboundMessage, LocationFailure, MarkerPayload, OutboundMessage};

use crate::coord::VendorCoordinate;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

/// Delivers serialized messages to the map surface
pub trait SurfaceTransport: Send + Sync {
    fn post(&self, message: String) -> Result<()>;
}

impl SurfaceTransport for mpsc::UnboundedSender<String> {
    fn post(&self, message: String) -> Result<()> {
        self.send(message)
            .map_err(|_| Error::Bridge("surface channel closed".to_string()))
    }
}

/// Outcome of a correlated location request
pub type LocationReply = std::result::Result<VendorCoordinate, LocationFailure>;

/// Where an inbound message ended up
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Delivered to the caller waiting on this request
    Reply { request_id: String },
    /// Not claimed by any request; the adapter turns it into an event
    Event(InboundMessage),
}

#[derive(Debug)]
struct PendingRequest {
    request_id: String,
    reply: oneshot::Sender<LocationReply>,
}

type PendingQueue = Arc<Mutex<VecDeque<PendingRequest>>>;

fn lock(queue: &PendingQueue) -> MutexGuard<'_, VecDeque<PendingRequest>> {
    queue.lock().unwrap_or_else(|e| e.into_inner())
}

/// An outstanding `GET_LOCATION` request
///
/// Dropping it withdraws the request, so a late reply is surfaced as an
/// event instead of being matched to a caller that has given up.
#[derive(Debug)]
pub struct PendingLocation {
    request_id: String,
    receiver: oneshot::Receiver<LocationReply>,
    queue: PendingQueue,
}

impl PendingLocation {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the surface to answer
    pub async fn wait(mut self) -> Result<LocationReply> {
        (&mut self.receiver)
            .await
            .map_err(|_| Error::Bridge("location request was dropped by the bridge".to_string()))
    }
}

impl Drop for PendingLocation {
    fn drop(&mut self) {
        lock(&self.queue).retain(|p| p.request_id != self.request_id);
    }
}

/// Typed channel to the map surface
pub struct MapBridge {
    surface: Arc<dyn SurfaceTransport>,
    pending: PendingQueue,
}

impl MapBridge {
    pub fn new(surface: Arc<dyn SurfaceTransport>) -> Self {
        Self {
            surface,
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Serialize and post a message; nothing waits for an answer
    pub fn send(&self, message: &OutboundMessage) -> Result<()> {
        let raw = serde_json::to_string(message)?;
        debug!(kind = message.type_name(), "bridge send");
        self.surface.post(raw)
    }

    /// Send `GET_LOCATION` with a fresh correlation id
    pub fn request_location(&self) -> Result<PendingLocation> {
        let request_id = Uuid::new_v4().to_string();
        let (reply, receiver) = oneshot::channel();

        lock(&self.pending).push_back(PendingRequest {
            request_id: request_id.clone(),
            reply,
        });
        let pending = PendingLocation {
            request_id: request_id.clone(),
            receiver,
            queue: self.pending.clone(),
        };

        self.send(&OutboundMessage::RequestLocation { request_id })?;
        Ok(pending)
    }

    /// Number of location requests awaiting a reply
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Parse an inbound string and route it
    ///
    /// Location replies go to the matching pending request when there is
    /// one; everything else comes back as [`Routed::Event`]. Unknown or
    /// malformed messages are logged and returned as [`Error::Bridge`].
    pub fn dispatch(&self, raw: &str) -> Result<Routed> {
        let message = InboundMessage::parse(raw).inspect_err(|e| {
            warn!("Rejected surface message: {}", e);
        })?;
        debug!(kind = message.type_name(), "bridge receive");

        let (request_id, reply) = match &message {
            InboundMessage::LocationResolved {
                coordinate,
                request_id,
            } => (request_id.as_deref(), Ok(*coordinate)),
            InboundMessage::LocationFailed {
                failure,
                request_id,
            } => (request_id.as_deref(), Err(failure.clone())),
            _ => return Ok(Routed::Event(message)),
        };

        let Some(waiting) = self.claim(request_id) else {
            return Ok(Routed::Event(message));
        };

        let request_id = waiting.request_id.clone();
        match waiting.reply.send(reply) {
            Ok(()) => Ok(Routed::Reply { request_id }),
            Err(_) => Ok(Routed::Event(message)),
        }
    }

    /// Take the request a reply belongs to: by id, or the oldest when the
    /// reply carries none
    fn claim(&self, request_id: Option<&str>) -> Option<PendingRequest> {
        let mut queue = lock(&self.pending);
        match request_id {
            Some(id) => {
                let index = queue.iter().position(|p| p.request_id == id)?;
                queue.remove(index)
            }
            None => queue.pop_front(),
        }
    }
}

impl fmt::Debug for MapBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapBridge")
            .field("pending", &self.pending_requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> (MapBridge, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MapBridge::new(Arc::new(tx)), rx)
    }

    fn success(request_id: Option<&str>, lon: f64) -> String {
        serde_json::json!({
            "type": "LOCATION_SUCCESS",
            "data": {"longitude": lon, "latitude": 39.9, "requestId": request_id}
        })
        .to_string()
    }

    #[test]
    fn test_send_posts_envelope() {
        let (bridge, mut rx) = bridge();
        bridge
            .send(&OutboundMessage::SetStyle {
                style: "amap://styles/whitesmoke".into(),
            })
            .unwrap();

        let raw = rx.try_recv().unwrap();
        assert_eq!(
            raw,
            r#"{"type":"SET_MAP_STYLE","data":{"style":"amap://styles/whitesmoke"}}"#
        );
    }

    #[test]
    fn test_send_on_closed_surface() {
        let (bridge, rx) = bridge();
        drop(rx);
        let err = bridge.send(&OutboundMessage::ClearMarkers {}).unwrap_err();
        assert!(matches!(err, Error::Bridge(_)));
    }

    #[test]
    fn test_dispatch_plain_events() {
        let (bridge, _rx) = bridge();
        assert_eq!(
            bridge.dispatch(r#"{"type":"MAP_LOADED","data":{}}"#).unwrap(),
            Routed::Event(InboundMessage::MapReady)
        );
        assert!(bridge.dispatch(r#"{"type":"BOGUS"}"#).is_err());
    }

    #[tokio::test]
    async fn test_reply_matched_by_id() {
        let (bridge, mut rx) = bridge();
        let first = bridge.request_location().unwrap();
        let second = bridge.request_location().unwrap();
        assert_eq!(bridge.pending_requests(), 2);

        let sent: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(sent["type"], "GET_LOCATION");
        assert_eq!(sent["data"]["requestId"], first.request_id());

        let id = second.request_id().to_string();
        let routed = bridge.dispatch(&success(Some(&id), 116.5)).unwrap();
        assert_eq!(routed, Routed::Reply { request_id: id });

        let reply = second.wait().await.unwrap().unwrap();
        assert_eq!(reply.longitude, 116.5);
        assert_eq!(bridge.pending_requests(), 1);
        drop(first);
    }

    #[tokio::test]
    async fn test_reply_without_id_goes_to_oldest() {
        let (bridge, _rx) = bridge();
        let first = bridge.request_location().unwrap();
        let second = bridge.request_location().unwrap();

        bridge.dispatch(&success(None, 116.1)).unwrap();
        bridge
            .dispatch(r#"{"type":"LOCATION_ERROR","data":{"code":"TIMEOUT","message":"slow"}}"#)
            .unwrap();

        assert_eq!(first.wait().await.unwrap().unwrap().longitude, 116.1);
        let failure = second.wait().await.unwrap().unwrap_err();
        assert_eq!(failure.code, "TIMEOUT");
    }

    #[test]
    fn test_unsolicited_reply_is_an_event() {
        let (bridge, _rx) = bridge();
        let routed = bridge.dispatch(&success(None, 116.2)).unwrap();
        assert!(matches!(routed, Routed::Event(InboundMessage::LocationResolved { .. })));

        let pending = bridge.request_location().unwrap();
        let routed = bridge.dispatch(&success(Some("someone-else"), 116.2)).unwrap();
        assert!(matches!(routed, Routed::Event(_)), "unknown id is not claimed");
        assert_eq!(bridge.pending_requests(), 1);
        drop(pending);
    }

    #[test]
    fn test_dropped_request_is_withdrawn() {
        let (bridge, _rx) = bridge();
        let pending = bridge.request_location().unwrap();
        drop(pending);

        assert_eq!(bridge.pending_requests(), 0);
        let routed = bridge.dispatch(&success(None, 116.3)).unwrap();
        assert!(matches!(routed, Routed::Event(_)));
    }

    #[test]
    fn test_failed_send_leaves_nothing_pending() {
        let (bridge, rx) = bridge();
        drop(rx);
        assert!(bridge.request_location().is_err());
        assert_eq!(bridge.pending_requests(), 0);
    }
}
