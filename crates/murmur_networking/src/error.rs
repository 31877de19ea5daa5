//! Error types for transports, configuration and the server.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use murmur_core::ActorError;
use murmur_world::WorldError;
use tokio_tungstenite::tungstenite;

/// Failures reading or writing one connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer sent something other than a text frame.
    #[error("non-text frame received")]
    NonText,
    /// The transport was already closed.
    #[error("transport closed")]
    Closed,
    /// WebSocket protocol or socket failure.
    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),
    /// Socket failure outside the WebSocket codec.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Returns true if the session may keep reading after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NonText)
    }
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures loading or validating [`ServerConfig`](crate::ServerConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("reading {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The config file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("parsing {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Failures of the server or of one session.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The world could not be built.
    #[error(transparent)]
    World(#[from] WorldError),
    /// The world actor failed.
    #[error(transparent)]
    Actor(#[from] ActorError),
    /// A connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Listener or thread failure.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// The world did not confirm the new player in time.
    #[error("world did not attach the player within {0:?}")]
    AttachTimeout(Duration),
    /// The world actor is gone.
    #[error("world actor is not running")]
    WorldGone,
}

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
