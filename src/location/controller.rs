//! Async driver for the acquisition state machine
//!
//! The controller performs the commands [`Machine`] emits: it asks providers
//! for permission and positions, sleeps through backoffs, and resolves the
//! final fix to an address. Only one request runs at a time; an overlapping
//! `request()` is rejected with [`Error::AcquisitionInProgress`].
//!
//! Each attempt races the provider against [`Timer::delay`]. The losing
//! future is dropped. Providers whose underlying platform call cannot be
//! cancelled keep running in the background until it settles; only the
//! result is discarded.

use super::machine::{Command, Event, Machine, ProviderSlot};
use super::provider::{LocationProvider, PermissionStatus};
use super::{AcquisitionState, Acquisition, AddressResolver, FailureReason, Position, RetryPolicy};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Source of delays for timeouts and backoff
#[async_trait]
pub trait Timer: Send + Sync {
    async fn delay(&self, duration: Duration);
}

/// Timer backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clears the in-flight flag even if the request future is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs location requests against a primary and optional secondary provider
pub struct AcquisitionController {
    primary: Arc<dyn LocationProvider>,
    secondary: Option<Arc<dyn LocationProvider>>,
    resolver: Option<Arc<dyn AddressResolver>>,
    timer: Arc<dyn Timer>,
    policy: RetryPolicy,
    in_flight: AtomicBool,
    state: watch::Sender<AcquisitionState>,
}

impl AcquisitionController {
    /// Create a controller with the default policy and a tokio timer
    pub fn new(primary: Arc<dyn LocationProvider>) -> Self {
        let (state, _) = watch::channel(AcquisitionState::Idle);
        Self {
            primary,
            secondary: None,
            resolver: None,
            timer: Arc::new(TokioTimer),
            policy: RetryPolicy::default(),
            in_flight: AtomicBool::new(false),
            state,
        }
    }

    /// Provider to switch to when the primary is denied or keeps failing
    pub fn with_secondary(mut self, secondary: Arc<dyn LocationProvider>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Reverse geocode successful fixes
    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Current state of the latest request
    pub fn state(&self) -> AcquisitionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<AcquisitionState> {
        self.state.subscribe()
    }

    fn provider(&self, slot: ProviderSlot) -> Option<&Arc<dyn LocationProvider>> {
        match slot {
            ProviderSlot::Primary => Some(&self.primary),
            ProviderSlot::Secondary => self.secondary.as_ref(),
        }
    }

    /// Acquire a position and resolve it to an address
    ///
    /// Fails with [`Error::Acquisition`] carrying the terminal reason, or
    /// [`Error::AcquisitionInProgress`] if another request is running.
    pub async fn request(&self) -> Result<Acquisition> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(Error::AcquisitionInProgress);
        }
        let _in_flight = InFlight(&self.in_flight);

        self.run().await
    }

    async fn run(&self) -> Result<Acquisition> {
        let mut machine = Machine::new(self.policy.clone(), self.secondary.is_some());
        let mut command = machine.handle(Event::Start);
        let mut fix: Option<(Position, String)> = None;
        let mut address = None;

        loop {
            self.state.send_replace(machine.state());

            let event = match command {
                Command::RequestPermission(slot) => self.request_permission(slot).await,
                Command::SwitchProvider { from, to } => {
                    info!(
                        from = self.provider_name(from),
                        to = self.provider_name(to),
                        "Switching location provider"
                    );
                    self.request_permission(to).await
                }
                Command::FetchPosition {
                    provider,
                    attempt,
                    timeout,
                } => {
                    let Some(p) = self.provider(provider) else {
                        return Err(Error::Acquisition(FailureReason::ProviderUnavailable));
                    };
                    debug!(provider = p.name(), attempt, "requesting position");

                    tokio::select! {
                        biased;
                        result = p.current_position() => match result {
                            Ok(position) => {
                                fix = Some((position, p.name().to_string()));
                                Event::PositionReceived
                            }
                            Err(e) => {
                                debug!(provider = p.name(), attempt, "position request failed: {}", e);
                                Event::ProviderFailed(e)
                            }
                        },
                        _ = self.timer.delay(timeout) => {
                            debug!(provider = p.name(), attempt, "position request timed out");
                            Event::TimedOut
                        }
                    }
                }
                Command::Backoff(duration) => {
                    self.timer.delay(duration).await;
                    Event::BackoffElapsed
                }
                Command::ResolveAddress => match (&fix, &self.resolver) {
                    (Some((position, _)), Some(resolver)) => {
                        match resolver.resolve(position.to_vendor()).await {
                            Ok(resolved) => {
                                address = Some(resolved);
                                Event::AddressResolved
                            }
                            Err(e) => {
                                let mismatch = Error::GeocodeMismatch(e.to_string());
                                warn!("{}", mismatch);
                                Event::GeocodeFailed
                            }
                        }
                    }
                    _ => Event::GeocodeFailed,
                },
                Command::Complete => {
                    let Some((position, provider)) = fix else {
                        return Err(Error::Acquisition(FailureReason::ProviderUnavailable));
                    };
                    return Ok(Acquisition {
                        coordinate: position.to_vendor(),
                        address,
                        provider,
                    });
                }
                Command::Fail(reason) => {
                    info!(%reason, "Location acquisition failed");
                    return Err(Error::Acquisition(reason));
                }
                Command::Ignore => {
                    warn!(state = %machine.state(), "Acquisition stalled on an unexpected event");
                    self.state
                        .send_replace(AcquisitionState::Failed(FailureReason::ProviderUnavailable));
                    return Err(Error::Acquisition(FailureReason::ProviderUnavailable));
                }
            };

            command = machine.handle(event);
        }
    }

    async fn request_permission(&self, slot: ProviderSlot) -> Event {
        let Some(provider) = self.provider(slot) else {
            return Event::PermissionDenied;
        };
        match provider.request_permission().await {
            PermissionStatus::Granted => Event::PermissionGranted,
            PermissionStatus::Denied => Event::PermissionDenied,
        }
    }

    fn provider_name(&self, slot: ProviderSlot) -> &str {
        self.provider(slot).map(|p| p.name()).unwrap_or("none")
    }
}

impl std::fmt::Debug for AcquisitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionController")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.as_ref().map(|p| p.name()))
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish()
    }
}
