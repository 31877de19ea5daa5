//! # MURMUR Shared
//!
//! Types used by both the server and its clients.
//!
//! This crate must NEVER depend on world state or on a transport. If a type
//! needs a socket or a room, it belongs in `murmur_networking` or
//! `murmur_world`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod protocol;

pub use constants::{DEFAULT_PORT, DEFAULT_START_ROOM, GUEST_NAME, MAX_FRAME_LEN, WS_PATH};
pub use protocol::{
    decode_message, decode_request, encode_message, encode_request, ClientRequest, MessageKind,
    ProtocolError, ProtocolResult, ServerMessage,
};
