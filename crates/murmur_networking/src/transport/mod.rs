//! # Transport Layer
//!
//! Blocking, text-frame transports. A session owns the reader on its own
//! thread and hands the writer to its delivery thread.
//!
//! ## Design
//!
//! - One text frame carries one JSON document
//! - `Ok(None)` from [`FrameReader::read_frame`] is a clean close
//! - Closing the writer ends the connection for the reader too

pub mod memory;
pub mod websocket;

use crate::error::TransportResult;

pub use memory::{memory_pair, MemoryClient, MemoryReader, MemoryWriter};
pub use websocket::{accept_websocket, WsReader, WsWriter};

/// Inbound half of a connection.
pub trait FrameReader: Send {
    /// Blocks for the next text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`](crate::TransportError) on a protocol or
    /// socket failure. [`TransportError::NonText`](crate::TransportError::NonText)
    /// leaves the reader usable.
    fn read_frame(&mut self) -> TransportResult<Option<String>>;
}

/// Outbound half of a connection.
pub trait FrameWriter: Send {
    /// Blocks until `frame` is handed to the peer.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`](crate::TransportError) if the peer is gone.
    fn write_frame(&mut self, frame: String) -> TransportResult<()>;

    /// Closes the connection. Idempotent; errors are swallowed.
    fn close(&mut self);
}
