//! # Area Loader
//!
//! Reads legacy area files into a [`Topology`] before the world starts.
//!
//! Only the room subset of the area schema is decoded; mobiles, objects,
//! resets and shops are ignored. Field names follow the legacy files
//! (`"ID"`, `"Rooms"`, `"Doors"`, `"ToRoom"`, ...).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{WorldError, WorldResult};
use crate::topology::{Direction, Exit, Room, RoomId, Topology};

#[derive(Debug, Deserialize)]
struct AreaFile {
    #[serde(rename = "ID", default)]
    id: u32,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Rooms", default)]
    rooms: Vec<RoomRecord>,
}

#[derive(Debug, Deserialize)]
struct RoomRecord {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Doors", default)]
    doors: Vec<DoorRecord>,
}

#[derive(Debug, Deserialize)]
struct DoorRecord {
    #[serde(rename = "Door")]
    door: i64,
    #[serde(rename = "ToRoom")]
    to_room: i64,
}

/// A decoded area file.
#[derive(Debug)]
pub struct Area {
    /// Area id from the file.
    pub id: u32,
    /// Area name.
    pub name: String,
    /// Rooms defined in the file.
    pub rooms: Vec<Room>,
}

/// Decodes one area from JSON text. `path` is only used in errors.
///
/// # Errors
///
/// Returns [`WorldError::Parse`] for invalid JSON and
/// [`WorldError::BadRoomId`] / [`WorldError::BadDirection`] for values the
/// room graph cannot represent.
pub fn parse_area(path: &Path, json: &str) -> WorldResult<Area> {
    let file: AreaFile = serde_json::from_str(json).map_err(|source| WorldError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rooms = Vec::with_capacity(file.rooms.len());
    for record in file.rooms {
        let id = u32::try_from(record.id)
            .map(RoomId)
            .map_err(|_| WorldError::BadRoomId(record.id))?;
        let mut exits = Vec::with_capacity(record.doors.len());
        for door in record.doors {
            let direction = Direction::from_index(door.door)
                .ok_or(WorldError::BadDirection { room: id, door: door.door })?;
            exits.push(Exit {
                direction,
                to: u32::try_from(door.to_room).ok().map(RoomId),
            });
        }
        rooms.push(Room {
            id,
            name: record.name,
            description: record.description,
            area: file.id,
            exits,
        });
    }

    Ok(Area {
        id: file.id,
        name: file.name,
        rooms,
    })
}

/// Reads and decodes one area file.
///
/// # Errors
///
/// Returns [`WorldError::Io`] if the file cannot be read, otherwise as
/// [`parse_area`].
pub fn load_area_file(path: &Path) -> WorldResult<Area> {
    let json = fs::read_to_string(path).map_err(|source| WorldError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_area(path, &json)
}

/// Lists `*.json` files in `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`WorldError::Io`] if the directory cannot be listed.
pub fn area_paths(dir: &Path) -> WorldResult<Vec<PathBuf>> {
    let io_err = |source| WorldError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Loads every area file in `dir` into a single topology.
///
/// # Errors
///
/// Fails if any file is unreadable or malformed, if two rooms share an id,
/// or if the directory holds no area files.
pub fn load_areas(dir: &Path) -> WorldResult<Topology> {
    let paths = area_paths(dir)?;
    if paths.is_empty() {
        return Err(WorldError::EmptyWorld(dir.to_path_buf()));
    }

    let mut rooms = Vec::new();
    for path in &paths {
        let area = load_area_file(path)?;
        tracing::debug!(area = %area.name, id = area.id, rooms = area.rooms.len(), "area decoded");
        rooms.extend(area.rooms);
    }

    let topology = Topology::from_rooms(rooms)?;
    tracing::info!(
        areas = paths.len(),
        rooms = topology.room_count(),
        "loaded areas"
    );
    Ok(topology)
}
