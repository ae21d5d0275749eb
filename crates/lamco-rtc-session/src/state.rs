//! Pure state machine for the connection lifecycle.
//!
//! [`Lifecycle::apply`] maps `(state, event)` to a new state plus a list of
//! [`SideEffect`]s. The session driver executes the effects in order; the state
//! machine itself never performs I/O and never reads a clock, so every
//! transition is testable without a runtime.
//!
//! Events that do not apply in the current state are ignored and produce no
//! effects.

use std::fmt;
use std::time::Duration;

use crate::backoff::Backoff;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Idle, nothing open
    #[default]
    Disconnected,

    /// Signaling open or opening, negotiation in progress
    Connecting,

    /// Media flowing, keepalive running
    Connected,

    /// Terminal until an explicit restart
    Error,

    /// Waiting for the backoff delay before the next attempt
    Reconnecting,
}

impl ConnectionState {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Whether a session is open or being retried
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }

    /// Whether an explicit start is accepted
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Explicit start
    StartRequested,

    /// Explicit user stop
    StopRequested,

    /// A remote offer or answer was applied by the transport
    Negotiated,

    /// Transport reported connected or completed
    TransportConnected,

    /// Transport lost connectivity, signaling closed, watchdog fired or the
    /// attempt could not be opened
    ConnectionLost { reason: String },

    /// Backoff delay elapsed
    RetryDue,

    /// The transport rejected the remote description
    NegotiationFailed { reason: String },
}

/// Actions requested by a transition, executed by the session driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Open signaling and the transport for a new attempt
    OpenSession,

    /// Start the keepalive timer and watchdog
    StartKeepalive,

    /// Stop the keepalive timer and watchdog
    StopKeepalive,

    /// Cancel a pending retry
    CancelRetry,

    /// Close signaling and the transport for the current attempt
    TeardownSession {
        /// Attempt a bye message first
        send_bye: bool,
        /// Stop the resource monitor and release cached frames
        release_frames: bool,
    },

    /// Arm the retry timer
    ScheduleRetry { attempt: u32, delay: Duration },

    /// Publish the new state
    Notify(ConnectionState),
}

/// Connection lifecycle state machine
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    negotiated: bool,
    backoff: Backoff,
}

impl Lifecycle {
    /// Create a machine in `Disconnected`
    #[must_use]
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            negotiated: false,
            backoff,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the current attempt has applied a remote description
    #[must_use]
    pub fn is_negotiated(&self) -> bool {
        self.negotiated
    }

    /// Reconnect attempts in the current outage
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    /// Reconnect attempts allowed per outage
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.backoff.max_attempts()
    }

    /// Apply an event, returning the effects to execute
    pub fn apply(&mut self, event: LifecycleEvent) -> Vec<SideEffect> {
        use ConnectionState as S;

        match (self.state, event) {
            (S::Disconnected | S::Error, LifecycleEvent::StartRequested) => {
                self.backoff.reset();
                self.negotiated = false;
                self.enter(S::Connecting, vec![SideEffect::OpenSession])
            }

            (S::Disconnected, LifecycleEvent::StopRequested) => Vec::new(),

            (current, LifecycleEvent::StopRequested) => {
                self.negotiated = false;
                self.enter(
                    S::Disconnected,
                    vec![
                        SideEffect::StopKeepalive,
                        SideEffect::CancelRetry,
                        SideEffect::TeardownSession {
                            send_bye: matches!(current, S::Connecting | S::Connected),
                            release_frames: true,
                        },
                    ],
                )
            }

            (S::Connecting | S::Connected, LifecycleEvent::Negotiated) => {
                self.negotiated = true;
                Vec::new()
            }

            (S::Connecting, LifecycleEvent::TransportConnected) if self.negotiated => {
                self.backoff.reset();
                self.enter(S::Connected, vec![SideEffect::StartKeepalive])
            }

            (S::Connecting | S::Connected, LifecycleEvent::ConnectionLost { .. }) => {
                self.negotiated = false;
                match self.backoff.next_delay() {
                    Some(delay) => {
                        let attempt = self.backoff.attempt();
                        self.enter(
                            S::Reconnecting,
                            vec![
                                SideEffect::StopKeepalive,
                                SideEffect::TeardownSession {
                                    send_bye: false,
                                    release_frames: false,
                                },
                                SideEffect::ScheduleRetry { attempt, delay },
                            ],
                        )
                    }
                    None => self.enter(
                        S::Error,
                        vec![
                            SideEffect::StopKeepalive,
                            SideEffect::TeardownSession {
                                send_bye: false,
                                release_frames: true,
                            },
                        ],
                    ),
                }
            }

            (S::Reconnecting, LifecycleEvent::RetryDue) => {
                self.negotiated = false;
                self.enter(S::Connecting, vec![SideEffect::OpenSession])
            }

            (current @ (S::Connecting | S::Connected | S::Reconnecting), LifecycleEvent::NegotiationFailed { .. }) => {
                self.negotiated = false;
                self.enter(
                    S::Error,
                    vec![
                        SideEffect::StopKeepalive,
                        SideEffect::CancelRetry,
                        SideEffect::TeardownSession {
                            send_bye: current != S::Reconnecting,
                            release_frames: true,
                        },
                    ],
                )
            }

            _ => Vec::new(),
        }
    }

    /// Switch state. `Notify` follows the transition's effects, except for
    /// `Connecting`, which is published before the attempt opens.
    fn enter(&mut self, next: ConnectionState, mut effects: Vec<SideEffect>) -> Vec<SideEffect> {
        self.state = next;
        if next == ConnectionState::Connecting {
            effects.insert(0, SideEffect::Notify(next));
        } else {
            effects.push(SideEffect::Notify(next));
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffConfig;

    fn machine(max_attempts: u32) -> Lifecycle {
        Lifecycle::new(Backoff::new(BackoffConfig::default(), max_attempts))
    }

    fn lost() -> LifecycleEvent {
        LifecycleEvent::ConnectionLost {
            reason: "transport failed".to_string(),
        }
    }

    fn connect(m: &mut Lifecycle) {
        m.apply(LifecycleEvent::StartRequested);
        m.apply(LifecycleEvent::Negotiated);
        m.apply(LifecycleEvent::TransportConnected);
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_start() {
        let mut m = machine(3);
        let effects = m.apply(LifecycleEvent::StartRequested);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(
            effects,
            vec![SideEffect::Notify(ConnectionState::Connecting), SideEffect::OpenSession]
        );

        // Start while active is ignored
        assert!(m.apply(LifecycleEvent::StartRequested).is_empty());
    }

    #[test]
    fn test_connected_requires_negotiation() {
        let mut m = machine(3);
        m.apply(LifecycleEvent::StartRequested);
        assert!(m.apply(LifecycleEvent::TransportConnected).is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);

        m.apply(LifecycleEvent::Negotiated);
        let effects = m.apply(LifecycleEvent::TransportConnected);
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(
            effects,
            vec![SideEffect::StartKeepalive, SideEffect::Notify(ConnectionState::Connected)]
        );
    }

    #[test]
    fn test_reconnect_until_exhausted() {
        let mut m = machine(2);
        connect(&mut m);

        let effects = m.apply(lost());
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        assert!(effects.contains(&SideEffect::ScheduleRetry {
            attempt: 1,
            delay: Duration::from_millis(500)
        }));

        m.apply(LifecycleEvent::RetryDue);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(!m.is_negotiated());

        let effects = m.apply(lost());
        assert!(effects.contains(&SideEffect::ScheduleRetry {
            attempt: 2,
            delay: Duration::from_secs(1)
        }));

        m.apply(LifecycleEvent::RetryDue);
        assert_eq!(m.attempt(), m.max_attempts());
        let effects = m.apply(lost());
        assert_eq!(m.state(), ConnectionState::Error);
        assert!(!m.state().is_active());
        assert!(effects.contains(&SideEffect::TeardownSession {
            send_bye: false,
            release_frames: true
        }));
        assert!(!effects.iter().any(|e| matches!(e, SideEffect::ScheduleRetry { .. })));

        // Error is terminal for automatic retries
        assert!(m.apply(LifecycleEvent::RetryDue).is_empty());
        assert!(m.apply(lost()).is_empty());
    }

    #[test]
    fn test_successful_reconnect_resets_budget() {
        let mut m = machine(2);
        connect(&mut m);
        m.apply(lost());
        m.apply(LifecycleEvent::RetryDue);
        m.apply(LifecycleEvent::Negotiated);
        m.apply(LifecycleEvent::TransportConnected);
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.attempt(), 0);
    }

    #[test]
    fn test_stop_while_connected() {
        let mut m = machine(3);
        connect(&mut m);

        let effects = m.apply(LifecycleEvent::StopRequested);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(
            effects,
            vec![
                SideEffect::StopKeepalive,
                SideEffect::CancelRetry,
                SideEffect::TeardownSession {
                    send_bye: true,
                    release_frames: true
                },
                SideEffect::Notify(ConnectionState::Disconnected),
            ]
        );

        // Late transport reports do not revive the session
        assert!(m.apply(lost()).is_empty());
        assert!(m.apply(LifecycleEvent::TransportConnected).is_empty());
        assert!(m.apply(LifecycleEvent::StopRequested).is_empty());
    }

    #[test]
    fn test_stop_while_reconnecting_skips_bye() {
        let mut m = machine(3);
        connect(&mut m);
        m.apply(lost());

        let effects = m.apply(LifecycleEvent::StopRequested);
        assert!(effects.contains(&SideEffect::TeardownSession {
            send_bye: false,
            release_frames: true
        }));
        assert!(effects.contains(&SideEffect::CancelRetry));
    }

    #[test]
    fn test_negotiation_failure() {
        let mut m = machine(3);
        m.apply(LifecycleEvent::StartRequested);
        let effects = m.apply(LifecycleEvent::NegotiationFailed {
            reason: "bad sdp".to_string(),
        });
        assert_eq!(m.state(), ConnectionState::Error);
        assert_eq!(effects.last(), Some(&SideEffect::Notify(ConnectionState::Error)));

        // Explicit restart from Error is allowed
        m.apply(LifecycleEvent::StartRequested);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.attempt(), 0);
    }

    #[test]
    fn test_zero_attempts_goes_straight_to_error() {
        let mut m = machine(0);
        connect(&mut m);
        m.apply(lost());
        assert_eq!(m.state(), ConnectionState::Error);
    }

    #[test]
    fn test_state_helpers() {
        assert!(ConnectionState::Error.can_start());
        assert!(!ConnectionState::Reconnecting.can_start());
        assert!(ConnectionState::Reconnecting.is_active());
        assert_eq!(ConnectionState::default().to_string(), "disconnected");
    }
}
