//! Remote transport seam and the JSON envelopes carried over it.
//!
//! Outbound sends are synchronous enqueues: they either hand the message to
//! the connection's writer or fail immediately. There is no acknowledgement
//! and no retry.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{TransportError, TransportResult};
use crate::model::{AudioZone, Connection, Session, SessionUpdate};

/// Messages pushed by the session authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    /// Full session list.
    Sessions { payload: Vec<Session> },
    /// One full session.
    SessionSnapshot { payload: Session },
    /// Subset of a session's fields.
    SessionUpdated { payload: SessionUpdate },
    /// Full zone list.
    AudioZones { payload: Vec<AudioZone> },
    /// Connected clients and the players each exposes.
    Connections { payload: Vec<Connection> },
}

impl InboundMessage {
    /// Short name for log lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sessions { .. } => "SESSIONS",
            Self::SessionSnapshot { .. } => "SESSION_SNAPSHOT",
            Self::SessionUpdated { .. } => "SESSION_UPDATED",
            Self::AudioZones { .. } => "AUDIO_ZONES",
            Self::Connections { .. } => "CONNECTIONS",
        }
    }
}

/// Messages sent to the session authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    UpdateSession { payload: SessionUpdate },
    RegisterConnection { payload: Connection },
}

/// Decodes one inbound text frame.
pub fn decode_inbound(text: &str) -> TransportResult<InboundMessage> {
    serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))
}

/// Encodes one outbound message as a text frame.
pub fn encode_outbound(message: &OutboundMessage) -> TransportResult<String> {
    serde_json::to_string(message).map_err(|e| TransportError::Encode(e.to_string()))
}

/// Outbound half of the remote channel.
pub trait RemoteTransport: Send + Sync {
    /// Enqueues a session update. Fire-and-forget.
    fn send_session_update(&self, update: &SessionUpdate) -> TransportResult<()>;

    /// Announces this client and its players.
    fn register_connection(&self, connection: &Connection) -> TransportResult<()>;
}

/// Transport that enqueues outbound messages on an unbounded channel.
///
/// The receiving end is drained by whatever owns the real connection (the
/// agent's WebSocket writer, or a test).
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn enqueue(&self, message: OutboundMessage) -> TransportResult<()> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}

impl RemoteTransport for ChannelTransport {
    fn send_session_update(&self, update: &SessionUpdate) -> TransportResult<()> {
        self.enqueue(OutboundMessage::UpdateSession {
            payload: update.clone(),
        })
    }

    fn register_connection(&self, connection: &Connection) -> TransportResult<()> {
        self.enqueue(OutboundMessage::RegisterConnection {
            payload: connection.clone(),
        })
    }
}
