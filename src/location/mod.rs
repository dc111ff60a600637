//! Location acquisition
//!
//! This module handles:
//! - The acquisition state machine (pure transitions in [`machine`])
//! - The async controller that drives it ([`controller`])
//! - Location providers with different datums and failure modes ([`provider`])

pub mod controller;
pub mod machine;
pub mod provider;

pub use controller::{AcquisitionController, Timer, TokioTimer};
pub use machine::{Command, Event, Machine, ProviderSlot};
pub use provider::{
    BridgeLocationProvider, FixedLocationProvider, IpLocationProvider, LocationProvider,
    PermissionStatus,
};

use crate::config::LocationConfig;
use crate::constants::location::{
    ACQUIRE_TIMEOUT_SECS, BACKOFF_BASE_MS, MAX_ATTEMPTS, SWITCH_AFTER_TRANSIENT_FAILURES,
};
use crate::coord::datum::to_vendor_datum;
use crate::coord::{DeviceCoordinate, VendorCoordinate};
use crate::error::Result;
use crate::geo::{AddressResult, GeocodingClient, RegeoOptions, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Terminal reason an acquisition failed
///
/// Each reason calls for a different user action, see [`guidance`](Self::guidance).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("timed out waiting for a position")]
    Timeout,

    #[error("no location provider could produce a position")]
    ProviderUnavailable,

    #[error("network error while locating")]
    NetworkError,
}

impl FailureReason {
    /// Reason-specific advice for the screen that owns the request
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Enable location access for this app in system settings.",
            Self::Timeout => "Could not get a fix in time. Move somewhere with a clearer sky and retry.",
            Self::ProviderUnavailable => "Location is unavailable on this device. Enter the address manually.",
            Self::NetworkError => "Check your network connection and retry.",
        }
    }
}

/// Raw outcome reported by a provider, before classification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("provider timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether another attempt on the same provider may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network(_))
    }

    /// Terminal reason when this error exhausts the attempt budget
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::PermissionDenied => FailureReason::PermissionDenied,
            Self::Timeout => FailureReason::Timeout,
            Self::Network(_) => FailureReason::NetworkError,
            Self::Unavailable(_) => FailureReason::ProviderUnavailable,
        }
    }
}

/// Observable acquisition state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum AcquisitionState {
    #[default]
    Idle,
    RequestingPermission,
    Acquiring,
    ResolvingAddress,
    Succeeded,
    Failed(FailureReason),
}

impl AcquisitionState {
    /// Whether a request is currently running
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::RequestingPermission | Self::Acquiring | Self::ResolvingAddress
        )
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RequestingPermission => write!(f, "requesting permission"),
            Self::Acquiring => write!(f, "acquiring"),
            Self::ResolvingAddress => write!(f, "resolving address"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// A position as reported by a provider, in that provider's datum
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    Device(DeviceCoordinate),
    Vendor(VendorCoordinate),
}

impl Position {
    /// The position in the vendor datum used for geocoding and rendering
    pub fn to_vendor(self) -> VendorCoordinate {
        match self {
            Self::Device(c) => to_vendor_datum(c),
            Self::Vendor(c) => c,
        }
    }
}

/// A successful acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    pub coordinate: VendorCoordinate,
    /// Absent when reverse geocoding failed after the fix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressResult>,
    /// Name of the provider that produced the fix
    pub provider: String,
}

/// Retry, backoff and provider-switch thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt position timeout
    pub timeout: Duration,
    /// Attempts per provider
    pub max_attempts: u32,
    /// Backoff unit; the wait after attempt `n` is `backoff_base * n`
    pub backoff_base: Duration,
    /// Consecutive transient failures on the primary before switching
    pub switch_after_transient_failures: u32,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(ACQUIRE_TIMEOUT_SECS),
            max_attempts: MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(BACKOFF_BASE_MS),
            switch_after_transient_failures: SWITCH_AFTER_TRANSIENT_FAILURES,
        }
    }
}

impl From<&LocationConfig> for RetryPolicy {
    fn from(config: &LocationConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            switch_after_transient_failures: config.switch_after_transient_failures,
        }
    }
}

/// Turns a fix into an address
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, coordinate: VendorCoordinate) -> Result<AddressResult>;
}

#[async_trait]
impl<T: Transport + 'static> AddressResolver for GeocodingClient<T> {
    async fn resolve(&self, coordinate: VendorCoordinate) -> Result<AddressResult> {
        self.reverse_geocode(coordinate, RegeoOptions::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(3000));
    }

    #[test]
    fn test_provider_error_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(!ProviderError::PermissionDenied.is_transient());
        assert!(!ProviderError::Unavailable("no gps".into()).is_transient());

        assert_eq!(ProviderError::Network("x".into()).reason(), FailureReason::NetworkError);
        assert_eq!(ProviderError::Unavailable("x".into()).reason(), FailureReason::ProviderUnavailable);
    }

    #[test]
    fn test_every_reason_has_distinct_guidance() {
        let reasons = [
            FailureReason::PermissionDenied,
            FailureReason::Timeout,
            FailureReason::ProviderUnavailable,
            FailureReason::NetworkError,
        ];
        let mut texts: Vec<_> = reasons.iter().map(|r| r.guidance()).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), reasons.len());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&AcquisitionState::Failed(FailureReason::Timeout)).unwrap();
        assert_eq!(json, r#"{"state":"failed","reason":"timeout"}"#);
        assert_eq!(
            serde_json::to_string(&AcquisitionState::Acquiring).unwrap(),
            r#"{"state":"acquiring"}"#
        );
    }

    #[test]
    fn test_device_position_is_converted() {
        let device = Position::Device(DeviceCoordinate::new(116.4074, 39.9042));
        let vendor = device.to_vendor();
        assert!(vendor.longitude > 116.4074);

        let already = VendorCoordinate::new(116.41, 39.91);
        assert_eq!(Position::Vendor(already).to_vendor(), already);
    }
}
