//! # World Error Types
//!
//! Failures building the world. Nothing here is raised while the world actor
//! runs: commands report problems to the player instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::topology::RoomId;

/// Errors that can occur loading or constructing the world.
#[derive(Error, Debug)]
pub enum WorldError {
    /// An area file or directory could not be read.
    #[error("reading {path}: {source}")]
    Io {
        /// The path being read.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// An area file is not valid area JSON.
    #[error("decoding {path}: {source}")]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// Two rooms share an id.
    #[error("duplicate room id {id} found in area {area}")]
    DuplicateRoom {
        /// The repeated id.
        id: RoomId,
        /// Area the second copy came from.
        area: u32,
    },

    /// An exit uses a direction number outside 0..=5.
    #[error("room {room} has an exit with unknown direction {door}")]
    BadDirection {
        /// Room holding the exit.
        room: RoomId,
        /// Raw direction value.
        door: i64,
    },

    /// A room id is negative or too large.
    #[error("invalid room id {0}")]
    BadRoomId(i64),

    /// The configured start room does not exist.
    #[error("start room {0} does not exist")]
    MissingStartRoom(RoomId),

    /// A room referenced by an operation does not exist.
    #[error("room {0} does not exist")]
    UnknownRoom(RoomId),

    /// No area files were found.
    #[error("no area files found in {0}")]
    EmptyWorld(PathBuf),
}

/// Result type for world construction.
pub type WorldResult<T> = Result<T, WorldError>;
