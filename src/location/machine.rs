//! Acquisition state machine
//!
//! `Machine::handle` is a pure transition function: it takes what just
//! happened and returns what the controller should do next. It never sleeps,
//! never calls a provider and never reads a clock, so every path can be
//! tested synchronously.
//!
//! Policy:
//! - `Timeout` and `Network` are retried on the same provider, up to
//!   `max_attempts`, waiting `backoff_base * attempt` between attempts.
//! - `PermissionDenied` and `Unavailable` are never retried.
//! - On the primary provider, a denial, a hard failure, or
//!   `switch_after_transient_failures` transient failures in a row switch to
//!   the secondary provider when one exists. The switch restarts the attempt
//!   count and asks the new provider for permission.

use super::{AcquisitionState, FailureReason, ProviderError, RetryPolicy};
use std::time::Duration;
use tracing::debug;

/// Which configured provider an attempt runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSlot {
    Primary,
    Secondary,
}

/// Something that happened during an acquisition
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start,
    PermissionGranted,
    PermissionDenied,
    PositionReceived,
    ProviderFailed(ProviderError),
    TimedOut,
    BackoffElapsed,
    AddressResolved,
    GeocodeFailed,
}

/// What the controller should do next
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RequestPermission(ProviderSlot),
    SwitchProvider { from: ProviderSlot, to: ProviderSlot },
    FetchPosition { provider: ProviderSlot, attempt: u32, timeout: Duration },
    Backoff(Duration),
    ResolveAddress,
    Complete,
    Fail(FailureReason),
    /// The event made no sense in the current state
    Ignore,
}

/// Acquisition state machine for a single request
#[derive(Debug, Clone)]
pub struct Machine {
    policy: RetryPolicy,
    has_secondary: bool,
    state: AcquisitionState,
    provider: ProviderSlot,
    attempt: u32,
    consecutive_transient: u32,
    backing_off: bool,
}

impl Machine {
    pub fn new(policy: RetryPolicy, has_secondary: bool) -> Self {
        Self {
            policy,
            has_secondary,
            state: AcquisitionState::Idle,
            provider: ProviderSlot::Primary,
            attempt: 0,
            consecutive_transient: 0,
            backing_off: false,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn provider(&self) -> ProviderSlot {
        self.provider
    }

    /// Current 1-based attempt number on the active provider
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Apply an event and return the next command
    pub fn handle(&mut self, event: Event) -> Command {
        let before = self.state;
        let command = self.transition(event.clone());
        debug!(?event, from = %before, to = %self.state, ?command, "acquisition transition");
        command
    }

    fn transition(&mut self, event: Event) -> Command {
        use AcquisitionState as S;

        match (self.state, event) {
            (S::Idle | S::Succeeded | S::Failed(_), Event::Start) => {
                self.provider = ProviderSlot::Primary;
                self.attempt = 1;
                self.consecutive_transient = 0;
                self.backing_off = false;
                self.state = S::RequestingPermission;
                Command::RequestPermission(ProviderSlot::Primary)
            }

            (S::RequestingPermission, Event::PermissionGranted) => {
                self.state = S::Acquiring;
                self.fetch()
            }
            (S::RequestingPermission, Event::PermissionDenied) => {
                self.switch_or_fail(FailureReason::PermissionDenied)
            }

            (S::Acquiring, Event::PositionReceived) if !self.backing_off => {
                self.state = S::ResolvingAddress;
                Command::ResolveAddress
            }
            (S::Acquiring, Event::TimedOut) if !self.backing_off => {
                self.on_failure(ProviderError::Timeout)
            }
            (S::Acquiring, Event::ProviderFailed(error)) if !self.backing_off => {
                self.on_failure(error)
            }
            (S::Acquiring, Event::BackoffElapsed) if self.backing_off => {
                self.backing_off = false;
                self.attempt += 1;
                self.fetch()
            }

            (S::ResolvingAddress, Event::AddressResolved | Event::GeocodeFailed) => {
                self.state = S::Succeeded;
                Command::Complete
            }

            _ => Command::Ignore,
        }
    }

    fn fetch(&self) -> Command {
        Command::FetchPosition {
            provider: self.provider,
            attempt: self.attempt,
            timeout: self.policy.timeout,
        }
    }

    fn on_failure(&mut self, error: ProviderError) -> Command {
        if !error.is_transient() {
            return self.switch_or_fail(error.reason());
        }

        self.consecutive_transient += 1;
        if self.can_switch()
            && self.consecutive_transient >= self.policy.switch_after_transient_failures
        {
            return self.switch();
        }

        if self.attempt >= self.policy.max_attempts {
            return self.fail(error.reason());
        }

        self.backing_off = true;
        Command::Backoff(self.policy.backoff(self.attempt))
    }

    fn can_switch(&self) -> bool {
        self.has_secondary && self.provider == ProviderSlot::Primary
    }

    fn switch_or_fail(&mut self, reason: FailureReason) -> Command {
        if self.can_switch() {
            self.switch()
        } else {
            self.fail(reason)
        }
    }

    fn switch(&mut self) -> Command {
        let from = self.provider;
        self.provider = ProviderSlot::Secondary;
        self.attempt = 1;
        self.consecutive_transient = 0;
        self.backing_off = false;
        self.state = AcquisitionState::RequestingPermission;
        Command::SwitchProvider {
            from,
            to: ProviderSlot::Secondary,
        }
    }

    fn fail(&mut self, reason: FailureReason) -> Command {
        self.state = AcquisitionState::Failed(reason);
        Command::Fail(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(has_secondary: bool) -> Machine {
        Machine::new(RetryPolicy::default(), has_secondary)
    }

    fn fetch(provider: ProviderSlot, attempt: u32) -> Command {
        Command::FetchPosition {
            provider,
            attempt,
            timeout: Duration::from_secs(20),
        }
    }

    fn started(has_secondary: bool) -> Machine {
        let mut m = machine(has_secondary);
        assert_eq!(m.handle(Event::Start), Command::RequestPermission(ProviderSlot::Primary));
        assert_eq!(m.handle(Event::PermissionGranted), fetch(ProviderSlot::Primary, 1));
        m
    }

    #[test]
    fn test_happy_path() {
        let mut m = started(false);
        assert_eq!(m.state(), AcquisitionState::Acquiring);

        assert_eq!(m.handle(Event::PositionReceived), Command::ResolveAddress);
        assert_eq!(m.state(), AcquisitionState::ResolvingAddress);

        assert_eq!(m.handle(Event::AddressResolved), Command::Complete);
        assert_eq!(m.state(), AcquisitionState::Succeeded);
    }

    #[test]
    fn test_geocode_failure_still_succeeds() {
        let mut m = started(false);
        m.handle(Event::PositionReceived);
        assert_eq!(m.handle(Event::GeocodeFailed), Command::Complete);
        assert_eq!(m.state(), AcquisitionState::Succeeded);
    }

    #[test]
    fn test_two_timeouts_then_success_backs_off_linearly() {
        let mut m = started(false);

        assert_eq!(m.handle(Event::TimedOut), Command::Backoff(Duration::from_millis(1000)));
        assert_eq!(m.handle(Event::BackoffElapsed), fetch(ProviderSlot::Primary, 2));
        assert_eq!(m.handle(Event::TimedOut), Command::Backoff(Duration::from_millis(2000)));
        assert_eq!(m.handle(Event::BackoffElapsed), fetch(ProviderSlot::Primary, 3));
        assert_eq!(m.handle(Event::PositionReceived), Command::ResolveAddress);
        assert_eq!(m.attempt(), 3);
    }

    #[test]
    fn test_attempt_budget_exhausted() {
        let mut m = started(false);
        m.handle(Event::ProviderFailed(ProviderError::Network("reset".into())));
        m.handle(Event::BackoffElapsed);
        m.handle(Event::TimedOut);
        m.handle(Event::BackoffElapsed);

        let last = m.handle(Event::ProviderFailed(ProviderError::Network("reset".into())));
        assert_eq!(last, Command::Fail(FailureReason::NetworkError));
        assert_eq!(m.state(), AcquisitionState::Failed(FailureReason::NetworkError));
    }

    #[test]
    fn test_permission_denied_is_not_retried() {
        let mut m = machine(false);
        m.handle(Event::Start);
        assert_eq!(
            m.handle(Event::PermissionDenied),
            Command::Fail(FailureReason::PermissionDenied)
        );
        assert_eq!(m.attempt(), 1);
    }

    #[test]
    fn test_denial_during_fetch_is_not_retried() {
        let mut m = started(false);
        assert_eq!(
            m.handle(Event::ProviderFailed(ProviderError::PermissionDenied)),
            Command::Fail(FailureReason::PermissionDenied)
        );
    }

    #[test]
    fn test_hard_failure_without_secondary() {
        let mut m = started(false);
        assert_eq!(
            m.handle(Event::ProviderFailed(ProviderError::Unavailable("no hardware".into()))),
            Command::Fail(FailureReason::ProviderUnavailable)
        );
    }

    #[test]
    fn test_denial_switches_to_secondary() {
        let mut m = machine(true);
        m.handle(Event::Start);

        assert_eq!(
            m.handle(Event::PermissionDenied),
            Command::SwitchProvider {
                from: ProviderSlot::Primary,
                to: ProviderSlot::Secondary
            }
        );
        assert_eq!(m.state(), AcquisitionState::RequestingPermission);
        assert_eq!(m.handle(Event::PermissionGranted), fetch(ProviderSlot::Secondary, 1));
    }

    #[test]
    fn test_two_transient_failures_switch_and_reset_attempts() {
        let mut m = started(true);

        assert_eq!(m.handle(Event::TimedOut), Command::Backoff(Duration::from_millis(1000)));
        m.handle(Event::BackoffElapsed);
        assert!(matches!(m.handle(Event::TimedOut), Command::SwitchProvider { .. }));
        assert_eq!(m.attempt(), 1);

        m.handle(Event::PermissionGranted);
        assert_eq!(m.handle(Event::TimedOut), Command::Backoff(Duration::from_millis(1000)));
    }

    #[test]
    fn test_secondary_never_switches_again() {
        let mut m = machine(true);
        m.handle(Event::Start);
        m.handle(Event::PermissionDenied);
        assert_eq!(
            m.handle(Event::PermissionDenied),
            Command::Fail(FailureReason::PermissionDenied)
        );
        assert_eq!(m.provider(), ProviderSlot::Secondary);
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let mut m = machine(false);
        assert_eq!(m.handle(Event::PositionReceived), Command::Ignore);
        assert_eq!(m.state(), AcquisitionState::Idle);

        let mut m = started(false);
        assert_eq!(m.handle(Event::Start), Command::Ignore);
        m.handle(Event::TimedOut);
        assert_eq!(m.handle(Event::PositionReceived), Command::Ignore, "still backing off");
    }

    #[test]
    fn test_restart_after_terminal_state() {
        let mut m = started(false);
        m.handle(Event::ProviderFailed(ProviderError::PermissionDenied));
        assert_eq!(m.handle(Event::Start), Command::RequestPermission(ProviderSlot::Primary));
        assert_eq!(m.attempt(), 1);
    }
}
