//! # MUD Server
//!
//! Accepts WebSocket connections and runs one session per connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         TOKIO RUNTIME                            │
//! │   TcpListener ──> accept ──> WebSocket handshake (task)          │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ split halves
//!            ┌────────────────────┴─────────────────────┐
//!            ▼                                          ▼
//!   session thread (reader)                   delivery thread (writer)
//!            │ schedule                                 ▲ recv
//!            ▼                                          │
//!   ┌─────────────────┐        deliver         ┌──────────────┐
//!   │   WORLD ACTOR   │ ─────────────────────> │   MAILBOX    │
//!   └─────────────────┘                        └──────────────┘
//! ```
//!
//! Tokio never runs game logic. Socket halves are driven from the session
//! and delivery threads through the runtime handle.

pub mod delivery;
pub mod session;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use murmur_core::Scheduler;
use murmur_world::{CommandTable, World};
use tokio::net::TcpListener;
use tokio::runtime::{Handle, Runtime};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::transport::{accept_websocket, WsReader, WsWriter};

pub use delivery::{run_delivery, DeliveryStats};
pub use session::{ConnectionSession, SessionSettings, SessionSummary};

/// Identifier of one accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection counters.
#[derive(Debug, Default)]
pub struct ConnectionCounter {
    accepted: AtomicU64,
    active: AtomicUsize,
}

impl ConnectionCounter {
    /// Registers a new connection and returns its id.
    pub fn open(&self) -> ConnectionId {
        self.active.fetch_add(1, Ordering::AcqRel);
        ConnectionId(self.accepted.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Registers the end of a connection.
    pub fn close(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Connections currently open.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Connections accepted since startup.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Acquire)
    }
}

/// Everything a session thread needs from the server.
struct SessionContext {
    scheduler: Scheduler<World>,
    commands: Arc<CommandTable>,
    settings: SessionSettings,
    connections: Arc<ConnectionCounter>,
}

/// The WebSocket front end.
pub struct MudServer {
    runtime: Runtime,
    listener: TcpListener,
    local_addr: SocketAddr,
    context: Arc<SessionContext>,
}

impl MudServer {
    /// Builds the I/O runtime and binds the listener.
    ///
    /// `scheduler` must feed the world actor that was built with `commands`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`](crate::ServerError::Io) if the runtime
    /// cannot start or the address cannot be bound.
    pub fn bind(
        config: &ServerConfig,
        scheduler: Scheduler<World>,
        commands: Arc<CommandTable>,
    ) -> ServerResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("murmur-io")
            .build()?;
        let listener = runtime.block_on(TcpListener::bind(config.bind))?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            runtime,
            listener,
            local_addr,
            context: Arc::new(SessionContext {
                scheduler,
                commands,
                settings: config.session_settings(),
                connections: Arc::new(ConnectionCounter::default()),
            }),
        })
    }

    /// The bound address. Useful when binding port 0.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connection counters, readable while the server runs.
    #[must_use]
    pub fn connections(&self) -> Arc<ConnectionCounter> {
        Arc::clone(&self.context.connections)
    }

    /// Accepts connections until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`](crate::ServerError::Io) if accepting fails.
    pub fn serve(self) -> ServerResult<()> {
        let Self {
            runtime,
            listener,
            local_addr,
            context,
        } = self;
        tracing::info!(addr = %local_addr, "accepting connections");
        let handle = runtime.handle().clone();
        runtime.block_on(accept_loop(listener, handle, context))?;
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    runtime: Handle,
    context: Arc<SessionContext>,
) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "could not disable nagle");
        }
        let connection = context.connections.open();
        tracing::info!(
            %connection,
            %peer,
            active = context.connections.active(),
            "connection accepted"
        );

        let (task_runtime, task_context) = (runtime.clone(), Arc::clone(&context));
        tokio::spawn(async move {
            match accept_websocket(stream, task_runtime).await {
                Ok((reader, writer)) => spawn_session(connection, reader, writer, task_context),
                Err(e) => {
                    tracing::warn!(%connection, %peer, error = %e, "websocket handshake failed");
                    task_context.connections.close();
                }
            }
        });
    }
}

fn spawn_session(
    connection: ConnectionId,
    reader: WsReader,
    writer: WsWriter,
    context: Arc<SessionContext>,
) {
    let connections = Arc::clone(&context.connections);
    let spawned = thread::Builder::new()
        .name(format!("murmur-session-{}", connection.0))
        .spawn(move || {
            let session = ConnectionSession::new(
                connection,
                reader,
                context.scheduler.clone(),
                Arc::clone(&context.commands),
                context.settings.clone(),
            );
            if let Err(e) = session.run(writer) {
                tracing::warn!(%connection, error = %e, "session failed");
            }
            context.connections.close();
        });
    if let Err(e) = spawned {
        tracing::error!(%connection, error = %e, "could not start session thread");
        connections.close();
    }
}
