//! # Topology
//!
//! The static room graph. Built once by the loader, then shared read-only
//! (`Arc<Topology>`) with every thread.
//!
//! Room ids are dense non-negative integers; the graph is a `Vec` indexed by
//! id with holes for unused ids. An exit pointing at a hole or past the end
//! resolves to "no exit".

use std::fmt;

use crate::error::{WorldError, WorldResult};

/// Identifier of a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(pub u32);

impl RoomId {
    /// Index into dense per-room tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Zone number: rooms are grouped in blocks of 100.
    #[inline]
    #[must_use]
    pub const fn zone(self) -> u32 {
        self.0 / 100
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Exit direction. Discriminants match the area file encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    /// +y on the map.
    North = 0,
    /// +x on the map.
    East = 1,
    /// -y on the map.
    South = 2,
    /// -x on the map.
    West = 3,
    /// Up a level.
    Up = 4,
    /// Down a level.
    Down = 5,
}

impl Direction {
    /// All directions in file order.
    pub const ALL: [Self; 6] = [
        Self::North,
        Self::East,
        Self::South,
        Self::West,
        Self::Up,
        Self::Down,
    ];

    /// Decodes the area file number.
    #[must_use]
    pub const fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::North),
            1 => Some(Self::East),
            2 => Some(Self::South),
            3 => Some(Self::West),
            4 => Some(Self::Up),
            5 => Some(Self::Down),
            _ => None,
        }
    }

    /// Full lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Single-letter abbreviation used in exit lists.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::North => 'n',
            Self::East => 'e',
            Self::South => 's',
            Self::West => 'w',
            Self::Up => 'u',
            Self::Down => 'd',
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One door out of a room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exit {
    /// Which way the exit leads.
    pub direction: Direction,
    /// Destination; `None` if the file gave a negative id.
    pub to: Option<RoomId>,
}

/// A location in the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Room {
    /// Unique id.
    pub id: RoomId,
    /// Short title.
    pub name: String,
    /// Long description.
    pub description: String,
    /// Id of the area file the room came from.
    pub area: u32,
    /// Exits in file order.
    pub exits: Vec<Exit>,
}

impl Room {
    /// Zone number of this room.
    #[must_use]
    pub const fn zone(&self) -> u32 {
        self.id.zone()
    }

    /// Title followed by the exit list.
    #[must_use]
    pub fn short_description(&self) -> String {
        self.with_exits(&self.name)
    }

    /// Long description followed by the exit list.
    #[must_use]
    pub fn description(&self) -> String {
        self.with_exits(&self.description)
    }

    fn with_exits(&self, head: &str) -> String {
        let mut out = String::with_capacity(head.len() + 16 + self.exits.len() * 2);
        out.push_str(head);
        out.push_str("\nExits [");
        for (i, exit) in self.exits.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push(exit.direction.letter());
        }
        out.push_str("]\n");
        out
    }
}

/// Immutable room graph.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    rooms: Vec<Option<Room>>,
    room_count: usize,
}

impl Topology {
    /// Builds the dense table.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateRoom`] if two rooms share an id.
    pub fn from_rooms(rooms: impl IntoIterator<Item = Room>) -> WorldResult<Self> {
        let mut table: Vec<Option<Room>> = Vec::new();
        let mut room_count = 0;
        for room in rooms {
            let index = room.id.index();
            if index >= table.len() {
                table.resize_with(index + 1, || None);
            }
            if table[index].is_some() {
                return Err(WorldError::DuplicateRoom {
                    id: room.id,
                    area: room.area,
                });
            }
            table[index] = Some(room);
            room_count += 1;
        }
        Ok(Self {
            rooms: table,
            room_count,
        })
    }

    /// Looks up a room.
    #[inline]
    #[must_use]
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns true if `id` names an existing room.
    #[must_use]
    pub fn contains(&self, id: RoomId) -> bool {
        self.room(id).is_some()
    }

    /// Follows the first exit of `room` leading `direction`.
    ///
    /// Missing rooms, negative ids, holes and out-of-range ids all resolve
    /// to `None`.
    #[must_use]
    pub fn exit_target(&self, room: &Room, direction: Direction) -> Option<&Room> {
        room.exits
            .iter()
            .filter(|exit| exit.direction == direction)
            .find_map(|exit| exit.to.filter(|to| to.index() < self.rooms.len()))
            .and_then(|to| self.room(to))
    }

    /// Size of the id space (highest id + 1).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns true if there are no rooms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.room_count == 0
    }

    /// Number of rooms that exist.
    #[must_use]
    pub const fn room_count(&self) -> usize {
        self.room_count
    }

    /// Iterates existing rooms in id order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter().flatten()
    }
}
