//! Error types for session operations
//!
//! Provides typed errors that library users can match and handle specifically.
//! Connection-path errors mostly surface as state transitions rather than
//! return values; the variants here are what the manager's methods return and
//! what gets logged when a transition is taken.

use lamco_rtc_frame::FrameError;
use thiserror::Error;

/// Errors that can occur during session operations
///
/// # Examples
///
/// ```no_run
/// # use lamco_rtc_session::{SessionError, SessionManager};
/// # async fn example(manager: SessionManager) -> Result<(), SessionError> {
/// match manager.start().await {
///     Ok(()) => println!("connecting"),
///     Err(SessionError::InvalidState(state)) => {
///         eprintln!("already running: {state}");
///     }
///     Err(e) => eprintln!("start failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum SessionError {
    /// The media transport rejected the remote session description
    ///
    /// Unrecoverable for the current session; the manager moves to `Error`.
    #[error("Transport negotiation failed: {0}")]
    TransportNegotiationFailed(String),

    /// The signaling channel closed underneath the session
    #[error("Signaling channel closed")]
    SignalingChannelClosed,

    /// The signaling channel could not be opened or written
    #[error("Signaling failed: {0}")]
    SignalingFailed(String),

    /// The request does not apply in the current connection state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation did not complete in time
    #[error("Timed out: {0}")]
    Timeout(&'static str),

    /// Frame pipeline error
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Signaling message could not be encoded or decoded
    #[error("Signaling message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Whether an automatic reconnect may fix this error
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SignalingChannelClosed | Self::SignalingFailed(_) | Self::Timeout(_) | Self::Serialization(_) => {
                true
            }
            Self::Frame(e) => e.is_recoverable(),
            Self::TransportNegotiationFailed(_) | Self::InvalidState(_) | Self::InvalidConfig(_) => false,
        }
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
