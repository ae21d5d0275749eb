//! Media transport seam
//!
//! The peer connection library is external. It is driven through
//! [`MediaTransport`] and reports back through a [`TransportObserver`] that the
//! session manager registers when it opens a session.
//!
//! Observer calls may arrive on the transport's own threads. The manager's
//! observer never blocks: state changes and signaling messages are queued to
//! the session driver, frames go straight to the conversion engine.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lamco_rtc_frame::TransportFrame;

use crate::error::Result;
use crate::signaling::SignalingMessage;

/// Connectivity state reported by the transport
///
/// Mirrors the ICE connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// Gathering has not started
    New,
    /// Connectivity checks in progress
    Checking,
    /// A usable candidate pair was found
    Connected,
    /// Checks finished with a usable pair
    Completed,
    /// Connectivity was lost
    Disconnected,
    /// Connectivity checks failed
    Failed,
    /// The transport was shut down
    Closed,
}

impl TransportState {
    /// Whether media can flow
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }

    /// Whether the connection was lost
    #[must_use]
    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Checking => "checking",
            Self::Connected => "connected",
            Self::Completed => "completed",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution and frame-rate hints for the remote sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaHints {
    /// Preferred width in pixels
    pub width: u32,
    /// Preferred height in pixels
    pub height: u32,
    /// Preferred frame rate
    pub fps: u32,
}

impl MediaHints {
    /// Create hints
    #[must_use]
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }
}

/// Callbacks from the media transport
pub trait TransportObserver: Send + Sync {
    /// Connectivity changed
    fn on_state_change(&self, state: TransportState);

    /// A decoded frame arrived; must not block
    fn on_frame(&self, frame: TransportFrame);

    /// The transport produced a message for the remote peer (local
    /// description or candidate)
    fn on_signaling_message(&self, message: SignalingMessage);
}

/// External peer connection driven by the session manager
///
/// One transport instance serves every connection attempt: `open` is called
/// per attempt and `close` tears the attempt down.
#[async_trait]
pub trait MediaTransport: Send {
    /// Start a session, reporting through `observer`
    async fn open(&mut self, observer: Arc<dyn TransportObserver>, hints: MediaHints) -> Result<()>;

    /// Apply a message received from the remote peer
    ///
    /// Offers and answers are negotiation; an error means the remote
    /// description was rejected.
    async fn handle_remote_signal(&mut self, message: &SignalingMessage) -> Result<()>;

    /// Renegotiate resolution and frame rate without reconnecting
    async fn set_constraints(&mut self, hints: MediaHints) -> Result<()>;

    /// Tear the current session down; must be safe to call when not open
    async fn close(&mut self);
}
