//! In-process transport over crossbeam channels.
//!
//! Behaves like a socket from the session's side: closing the writer ends
//! the reader, and a client that hangs up ends both.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use murmur_shared::{decode_message, encode_request, ClientRequest, ServerMessage};

use super::{FrameReader, FrameWriter};
use crate::error::{TransportError, TransportResult};

enum Inbound {
    Text(String),
    Binary,
}

/// Server-side inbound half.
pub struct MemoryReader {
    inbound: Receiver<Inbound>,
    hangup: Receiver<()>,
}

/// Server-side outbound half.
pub struct MemoryWriter {
    outbound: Sender<String>,
    hangup: Option<Sender<()>>,
    broken: Arc<AtomicBool>,
}

/// The peer end, driven by tests and bots.
pub struct MemoryClient {
    inbound: Option<Sender<Inbound>>,
    outbound: Receiver<String>,
    broken: Arc<AtomicBool>,
}

/// Creates a connected reader, writer and client.
#[must_use]
pub fn memory_pair() -> (MemoryReader, MemoryWriter, MemoryClient) {
    let (in_tx, in_rx) = crossbeam_channel::unbounded();
    let (out_tx, out_rx) = crossbeam_channel::unbounded();
    let (hangup_tx, hangup_rx) = crossbeam_channel::bounded(0);
    let broken = Arc::new(AtomicBool::new(false));

    let reader = MemoryReader {
        inbound: in_rx,
        hangup: hangup_rx,
    };
    let writer = MemoryWriter {
        outbound: out_tx,
        hangup: Some(hangup_tx),
        broken: Arc::clone(&broken),
    };
    let client = MemoryClient {
        inbound: Some(in_tx),
        outbound: out_rx,
        broken,
    };
    (reader, writer, client)
}

impl FrameReader for MemoryReader {
    fn read_frame(&mut self) -> TransportResult<Option<String>> {
        select! {
            recv(self.inbound) -> frame => match frame {
                Ok(Inbound::Text(text)) => Ok(Some(text)),
                Ok(Inbound::Binary) => Err(TransportError::NonText),
                Err(_) => Ok(None),
            },
            recv(self.hangup) -> _ => Ok(None),
        }
    }
}

impl FrameWriter for MemoryWriter {
    fn write_frame(&mut self, frame: String) -> TransportResult<()> {
        if self.hangup.is_none() || self.broken.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        self.hangup = None;
    }
}

impl MemoryClient {
    /// Sends a command line as a request frame. Returns false once hung up.
    pub fn send_command(&self, line: &str) -> bool {
        match encode_request(&ClientRequest::new(line)) {
            Ok(frame) => self.send_raw(frame),
            Err(_) => false,
        }
    }

    /// Sends an arbitrary text frame.
    pub fn send_raw(&self, frame: impl Into<String>) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(Inbound::Text(frame.into())).is_ok())
    }

    /// Sends a binary frame.
    pub fn send_binary(&self) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(Inbound::Binary).is_ok())
    }

    /// Waits for the next server frame.
    ///
    /// # Errors
    ///
    /// Returns [`RecvTimeoutError::Disconnected`] once the server closed the
    /// connection and every frame was read.
    pub fn recv_frame(&self, timeout: Duration) -> Result<String, RecvTimeoutError> {
        self.outbound.recv_timeout(timeout)
    }

    /// Waits for the next server message. `None` on timeout, close or a
    /// frame that does not decode.
    #[must_use]
    pub fn recv_message(&self, timeout: Duration) -> Option<ServerMessage> {
        let frame = self.recv_frame(timeout).ok()?;
        decode_message(&frame).ok()
    }

    /// Makes every later server write fail, like a reset socket.
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::Release);
    }

    /// Closes the client's sending side. The server reads a clean close.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }
}
