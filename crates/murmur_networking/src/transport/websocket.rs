//! WebSocket transport.
//!
//! The handshake runs on the tokio runtime. The split halves are then driven
//! from plain threads with [`Handle::block_on`], so sessions never hold an
//! async context.
//!
//! Upgrades are served only on [`WS_PATH`]; inbound messages larger than
//! [`MAX_FRAME_LEN`] fail the connection before they are buffered whole.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use murmur_shared::{MAX_FRAME_LEN, WS_PATH};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use super::{FrameReader, FrameWriter};
use crate::error::{TransportError, TransportResult};

type Socket = WebSocketStream<TcpStream>;

/// Inbound half of a WebSocket connection.
pub struct WsReader {
    stream: SplitStream<Socket>,
    runtime: Handle,
}

/// Outbound half of a WebSocket connection.
pub struct WsWriter {
    sink: SplitSink<Socket, Message>,
    runtime: Handle,
    closed: bool,
}

/// Message and frame limits applied to every connection.
fn socket_config() -> WebSocketConfig {
    WebSocketConfig {
        max_message_size: Some(MAX_FRAME_LEN),
        max_frame_size: Some(MAX_FRAME_LEN),
        ..WebSocketConfig::default()
    }
}

#[allow(clippy::result_large_err)]
fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }
    tracing::debug!(path = %request.uri().path(), "upgrade refused on unknown path");
    let mut refusal = ErrorResponse::new(Some(format!("websocket is served on {WS_PATH}\n")));
    *refusal.status_mut() = StatusCode::NOT_FOUND;
    Err(refusal)
}

/// Completes the server handshake on `stream`.
///
/// `runtime` must be the handle of the runtime the stream is registered
/// with; the halves use it to block from non-runtime threads.
///
/// # Errors
///
/// Returns [`TransportError::WebSocket`] if the handshake fails, including
/// an upgrade requested on a path other than [`WS_PATH`].
pub async fn accept_websocket(
    stream: TcpStream,
    runtime: Handle,
) -> TransportResult<(WsReader, WsWriter)> {
    let socket =
        tokio_tungstenite::accept_hdr_async_with_config(stream, check_path, Some(socket_config()))
            .await?;
    let (sink, stream) = socket.split();
    Ok((
        WsReader {
            stream,
            runtime: runtime.clone(),
        },
        WsWriter {
            sink,
            runtime,
            closed: false,
        },
    ))
}

impl FrameReader for WsReader {
    fn read_frame(&mut self) -> TransportResult<Option<String>> {
        let stream = &mut self.stream;
        self.runtime.block_on(async {
            loop {
                match stream.next().await {
                    None | Some(Ok(Message::Close(_))) => return Ok(None),
                    Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                    Some(Ok(Message::Binary(_))) => return Err(TransportError::NonText),
                    // Pings are answered by tungstenite itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                    Some(Err(
                        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                    )) => return Ok(None),
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        })
    }
}

impl FrameWriter for WsWriter {
    fn write_frame(&mut self, frame: String) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let sink = &mut self.sink;
        self.runtime
            .block_on(sink.send(Message::Text(frame)))
            .map_err(TransportError::from)
    }

    fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        let sink = &mut self.sink;
        if let Err(e) = self.runtime.block_on(sink.close()) {
            tracing::debug!(error = %e, "websocket close handshake failed");
        }
    }
}
