//! # MURMUR Networking
//!
//! Connects clients to the world actor.
//!
//! ## Architecture
//!
//! - **Transport**: blocking text-frame seam with WebSocket and in-memory
//!   implementations
//! - **Session**: one thread per connection, reads commands and schedules
//!   them as world events
//! - **Delivery**: one thread per connection, drains the player's mailbox
//!   into the transport
//! - **Server**: tokio listener and WebSocket handshake, nothing else
//!
//! ## Example
//!
//! ```rust,ignore
//! use murmur_networking::{MudServer, ServerConfig};
//!
//! let config = ServerConfig::load("murmur.toml".as_ref())?;
//! let server = MudServer::bind(&config, scheduler, commands)?;
//! server.serve()?; // Blocks
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod server;
pub mod transport;

pub use config::ServerConfig;
pub use error::{ConfigError, ServerError, ServerResult, TransportError, TransportResult};
pub use server::{
    run_delivery, ConnectionCounter, ConnectionId, ConnectionSession, DeliveryStats, MudServer,
    SessionSettings, SessionSummary,
};
pub use transport::{memory_pair, FrameReader, FrameWriter, MemoryClient};
