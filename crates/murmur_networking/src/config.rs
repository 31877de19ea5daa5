//! # Server Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file at all) gives a working local server.
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! areas = "areas"
//! start_room = 3001
//! mailbox_capacity = 1000
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use murmur_core::{EventQueue, DEFAULT_MAILBOX_CAPACITY};
use murmur_shared::{DEFAULT_PORT, DEFAULT_START_ROOM, GUEST_NAME};
use murmur_world::{RoomId, World, WorldRules, DEFAULT_MAX_BACKLOG, TIME_TO_MOVE};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::server::SessionSettings;

/// Server settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: SocketAddr,
    /// Directory of area files.
    pub areas: PathBuf,
    /// Room new players start in.
    pub start_room: u32,
    /// Name given to every guest.
    pub guest_name: String,
    /// Outbound messages buffered per connection.
    pub mailbox_capacity: usize,
    /// Events buffered in the world's ingress channel.
    pub event_capacity: usize,
    /// Commands a player may have queued.
    pub max_backlog: usize,
    /// How long a session waits for the world to attach its player.
    pub attach_timeout_ms: u64,
    /// Minimum gap between movement commands.
    pub move_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            areas: PathBuf::from("areas"),
            start_room: DEFAULT_START_ROOM,
            guest_name: GUEST_NAME.to_owned(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            event_capacity: EventQueue::<World>::DEFAULT_CAPACITY,
            max_backlog: DEFAULT_MAX_BACKLOG,
            attach_timeout_ms: 5_000,
            move_delay_ms: u64::try_from(TIME_TO_MOVE.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl ServerConfig {
    /// Reads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.guest_name.trim().is_empty() {
            return invalid("guest_name", "must not be empty");
        }
        if self.mailbox_capacity == 0 {
            return invalid("mailbox_capacity", "must be at least 1");
        }
        if self.event_capacity == 0 {
            return invalid("event_capacity", "must be at least 1");
        }
        if self.max_backlog == 0 {
            return invalid("max_backlog", "must be at least 1");
        }
        if self.attach_timeout_ms == 0 {
            return invalid("attach_timeout_ms", "must be at least 1");
        }
        Ok(())
    }

    /// Rules for the world built from this config.
    #[must_use]
    pub const fn world_rules(&self) -> WorldRules {
        WorldRules {
            start_room: RoomId(self.start_room),
            move_delay: Duration::from_millis(self.move_delay_ms),
        }
    }

    /// Per-connection settings for sessions.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            guest_name: self.guest_name.clone(),
            mailbox_capacity: self.mailbox_capacity,
            max_backlog: self.max_backlog,
            attach_timeout: Duration::from_millis(self.attach_timeout_ms),
        }
    }
}
