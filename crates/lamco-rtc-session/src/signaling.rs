//! Signaling channel
//!
//! Negotiation, keepalive and termination messages travel as JSON text frames
//! tagged by `"type"`:
//!
//! ```json
//! {"type":"offer","sdp":"v=0..."}
//! {"type":"candidate","candidate":"...","sdpMid":"0","sdpMLineIndex":0}
//! {"type":"ping"}
//! ```
//!
//! The channel itself is external. A [`SignalingConnector`] opens it and hands
//! back a [`SignalingLink`], a pair of text channels the session manager owns
//! for the lifetime of one connection attempt. [`SignalingLink::pair`] builds an
//! in-process duplex for tests and loopback demos.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// Message exchanged over the signaling channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Sent by the local side right after the channel opens
    Hello {
        /// Local client name
        client: String,
        /// Whether compatibility signaling is requested
        #[serde(default)]
        compatibility: bool,
    },

    /// Session description offer
    Offer {
        /// SDP body
        sdp: String,
    },

    /// Session description answer
    Answer {
        /// SDP body
        sdp: String,
    },

    /// Trickled ICE candidate
    Candidate {
        /// Candidate line
        candidate: String,
        /// Media stream identification tag
        #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
        sdp_mid: Option<String>,
        /// Media line index
        #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
        sdp_mline_index: Option<u32>,
    },

    /// Keepalive request
    Ping,

    /// Keepalive reply
    Pong,

    /// Session termination
    Bye,
}

impl SignalingMessage {
    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire tag of this message
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Bye => "bye",
        }
    }

    /// Whether this is an offer or answer
    #[must_use]
    pub fn is_session_description(&self) -> bool {
        matches!(self, Self::Offer { .. } | Self::Answer { .. })
    }
}

/// One open signaling connection
///
/// Dropping the link closes both directions.
#[derive(Debug)]
pub struct SignalingLink {
    /// Text frames to the remote side
    pub outgoing: mpsc::Sender<String>,
    /// Text frames from the remote side; `None` from `recv` means closed
    pub incoming: mpsc::Receiver<String>,
}

impl SignalingLink {
    /// Create two connected ends of an in-process channel
    ///
    /// Whatever one end sends, the other receives.
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);
        (
            Self {
                outgoing: a_tx,
                incoming: b_rx,
            },
            Self {
                outgoing: b_tx,
                incoming: a_rx,
            },
        )
    }

    /// Encode and send a message
    pub async fn send(&self, message: &SignalingMessage) -> Result<()> {
        let text = message.to_json()?;
        self.outgoing
            .send(text)
            .await
            .map_err(|_| crate::error::SessionError::SignalingChannelClosed)
    }

    /// Receive and decode the next message
    ///
    /// Returns `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<Result<SignalingMessage>> {
        let text = self.incoming.recv().await?;
        Some(SignalingMessage::from_json(&text))
    }
}

/// Opens the external signaling channel
///
/// Called once per connection attempt. Implementations own the actual
/// transport (WebSocket, TCP, ...) and bridge it onto a [`SignalingLink`].
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Connect to `endpoint`
    async fn connect(&self, endpoint: &str) -> Result<SignalingLink>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(SignalingMessage::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);

        let candidate = SignalingMessage::Candidate {
            candidate: "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        };
        let json = candidate.to_json().unwrap();
        assert!(json.contains(r#""type":"candidate""#));
        assert!(json.contains(r#""sdpMid":"0""#));
        assert!(json.contains(r#""sdpMLineIndex":0"#));
    }

    #[test]
    fn test_decode() {
        let msg = SignalingMessage::from_json(r#"{"type":"answer","sdp":"v=0"}"#).unwrap();
        assert_eq!(msg, SignalingMessage::Answer { sdp: "v=0".to_string() });
        assert!(msg.is_session_description());

        let hello = SignalingMessage::from_json(r#"{"type":"hello","client":"peer"}"#).unwrap();
        assert_eq!(
            hello,
            SignalingMessage::Hello {
                client: "peer".to_string(),
                compatibility: false
            }
        );

        let candidate = SignalingMessage::from_json(r#"{"type":"candidate","candidate":"c"}"#).unwrap();
        assert_eq!(candidate.kind(), "candidate");
    }

    #[test]
    fn test_decode_rejects_unknown() {
        let err = SignalingMessage::from_json(r#"{"type":"teleport"}"#).unwrap_err();
        assert!(matches!(err, crate::SessionError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_link_pair() {
        let (local, mut remote) = SignalingLink::pair(4);
        local.send(&SignalingMessage::Bye).await.unwrap();
        assert_eq!(remote.recv().await.unwrap().unwrap(), SignalingMessage::Bye);

        drop(local);
        assert!(remote.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (local, remote) = SignalingLink::pair(1);
        drop(remote);
        let err = local.send(&SignalingMessage::Ping).await.unwrap_err();
        assert!(matches!(err, crate::SessionError::SignalingChannelClosed));
    }
}
