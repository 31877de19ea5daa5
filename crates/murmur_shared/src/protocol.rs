//! Wire protocol shared between clients and the server.
//!
//! Every frame is one JSON object in a text message.
//!
//! ```text
//!   client ──> { "cmd": "north" }
//!   server ──> { "type": "environment", "msg": "Temple Square\nExits [n s]\n" }
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::MAX_FRAME_LEN;

/// Errors decoding or encoding protocol frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not a valid request object.
    #[error("malformed request: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The frame exceeds the size limit.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    Oversize {
        /// Actual frame length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// A server message failed to serialize.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Result alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A command line typed by the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Free text: `<verb> <rest>`.
    #[serde(default)]
    pub cmd: String,
}

impl ClientRequest {
    /// Wraps a command line.
    #[must_use]
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// Rendering tag for an outbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Speech and other player-to-player text.
    Social,
    /// Fight output.
    Combat,
    /// Room descriptions and movement feedback.
    Environment,
    /// Something the server could not do.
    Error,
    /// The ASCII map around the player.
    Map,
}

/// One message delivered to a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Rendering tag.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text body.
    pub msg: String,
}

impl ServerMessage {
    /// Creates a message of any kind.
    #[must_use]
    pub fn new(kind: MessageKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    /// A social message.
    #[must_use]
    pub fn social(msg: impl Into<String>) -> Self {
        Self::new(MessageKind::Social, msg)
    }

    /// A combat message.
    #[must_use]
    pub fn combat(msg: impl Into<String>) -> Self {
        Self::new(MessageKind::Combat, msg)
    }

    /// An environment message.
    #[must_use]
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::new(MessageKind::Environment, msg)
    }

    /// An error message.
    #[must_use]
    pub fn error(msg: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, msg)
    }

    /// A map message.
    #[must_use]
    pub fn map(msg: impl Into<String>) -> Self {
        Self::new(MessageKind::Map, msg)
    }
}

/// Decodes an inbound text frame.
///
/// A frame without a `cmd` key decodes to an empty command line.
///
/// # Errors
///
/// Returns [`ProtocolError::Oversize`] for frames over [`MAX_FRAME_LEN`] and
/// [`ProtocolError::Malformed`] for anything that is not a JSON object.
pub fn decode_request(frame: &str) -> ProtocolResult<ClientRequest> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::Oversize {
            len: frame.len(),
            max: MAX_FRAME_LEN,
        });
    }
    serde_json::from_str(frame).map_err(ProtocolError::Malformed)
}

/// Encodes an outbound message as a text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_message(message: &ServerMessage) -> ProtocolResult<String> {
    serde_json::to_string(message).map_err(ProtocolError::Encode)
}

/// Encodes a client request. Used by bots and test clients.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_request(request: &ClientRequest) -> ProtocolResult<String> {
    serde_json::to_string(request).map_err(ProtocolError::Encode)
}

/// Decodes a server message on the client side.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the frame is not a message.
pub fn decode_message(frame: &str) -> ProtocolResult<ServerMessage> {
    serde_json::from_str(frame).map_err(ProtocolError::Malformed)
}
