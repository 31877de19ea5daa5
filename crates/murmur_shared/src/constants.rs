//! # Protocol Constants
//!
//! Defaults both sides agree on. The server may override the port and
//! start room from its config file.

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Request path the WebSocket upgrade is served on.
pub const WS_PATH: &str = "/server";

/// Largest inbound text frame accepted, in bytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024;

/// Room every new actor starts in and `recall` returns to.
pub const DEFAULT_START_ROOM: u32 = 3001;

/// Name given to connections attached without an identity.
pub const GUEST_NAME: &str = "Gnoric";
