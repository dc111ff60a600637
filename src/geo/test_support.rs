//! Test utilities for the geocoding client.
//!
//! [`StubTransport`] is a deterministic [`Transport`] that replays scripted
//! bodies and records every URL it was asked for, so tests can count upstream
//! calls without a network.

use crate::error::{Error, Result};
use crate::geo::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum StubReply {
    Body(String),
    Network(String),
    Remote { code: String, message: String },
}

impl StubReply {
    fn into_result(self) -> Result<String> {
        match self {
            Self::Body(body) => Ok(body),
            Self::Network(message) => Err(Error::Network(message)),
            Self::Remote { code, message } => Err(Error::RemoteService { code, message }),
        }
    }
}

#[derive(Debug, Default)]
struct StubState {
    routes: Vec<(String, StubReply)>,
    queue: VecDeque<StubReply>,
    calls: Vec<String>,
}

/// Scripted transport
///
/// Resolution order for each request: the first route whose fragment occurs
/// in the URL, then the next queued reply, then a network error.
///
/// ```
/// use rescue_geo::geo::test_support::StubTransport;
///
/// let stub = StubTransport::new()
///     .with_body(r#"{"status":"1"}"#)
///     .with_network_error("connection reset");
/// assert_eq!(stub.call_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    state: Arc<Mutex<StubState>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(self, reply: StubReply) -> Self {
        self.state().queue.push_back(reply);
        self
    }

    /// Queue a successful body
    pub fn with_body(self, body: impl Into<String>) -> Self {
        self.push(StubReply::Body(body.into()))
    }

    /// Queue a transport failure
    pub fn with_network_error(self, message: impl Into<String>) -> Self {
        self.push(StubReply::Network(message.into()))
    }

    /// Queue an HTTP-level failure
    pub fn with_remote_error(self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.push(StubReply::Remote {
            code: code.into(),
            message: message.into(),
        })
    }

    /// Answer every URL containing `fragment` with `body`
    pub fn route(self, fragment: impl Into<String>, body: impl Into<String>) -> Self {
        self.state()
            .routes
            .push((fragment.into(), StubReply::Body(body.into())));
        self
    }

    /// URLs requested so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }
}

impl Transport for StubTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let reply = {
            let mut state = self.state();
            state.calls.push(url.to_string());

            let routed = state
                .routes
                .iter()
                .find(|(fragment, _)| url.contains(fragment.as_str()))
                .map(|(_, reply)| reply.clone());

            routed
                .or_else(|| state.queue.pop_front())
                .unwrap_or_else(|| StubReply::Network(format!("no stub response for {}", url)))
        };
        reply.into_result()
    }
}
