//! Per-actor record of explored rooms.

use std::fmt;

use crate::topology::{RoomId, Topology};

const WORD_BITS: usize = 32;

/// Growable bitset keyed by room id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisitedRooms {
    words: Vec<u32>,
}

impl VisitedRooms {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates a set with every existing room of `topology` marked.
    #[must_use]
    pub fn all_of(topology: &Topology) -> Self {
        let mut set = Self {
            words: Vec::with_capacity(topology.len().div_ceil(WORD_BITS)),
        };
        for room in topology.rooms() {
            set.set(room.id);
        }
        set
    }

    /// Returns true if `room` is marked.
    #[must_use]
    pub fn contains(&self, room: RoomId) -> bool {
        let (index, offset) = Self::locate(room);
        self.words
            .get(index)
            .is_some_and(|word| word & (1 << offset) != 0)
    }

    /// Marks `room`, growing the set as needed.
    pub fn set(&mut self, room: RoomId) {
        let (index, offset) = Self::locate(room);
        if index >= self.words.len() {
            tracing::trace!(words = index + 1, room = %room, "extending visited set");
            self.words.resize(index + 1, 0);
        }
        self.words[index] |= 1 << offset;
    }

    /// Unmarks `room`.
    pub fn clear(&mut self, room: RoomId) {
        let (index, offset) = Self::locate(room);
        if let Some(word) = self.words.get_mut(index) {
            *word &= !(1 << offset);
        }
    }

    /// Number of marked rooms.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    const fn locate(room: RoomId) -> (usize, u32) {
        let i = room.index();
        (i / WORD_BITS, (i % WORD_BITS) as u32)
    }
}

/// Hex, most significant word first, leading zeros trimmed.
impl fmt::Display for VisitedRooms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = String::with_capacity(self.words.len() * 8);
        for word in self.words.iter().rev() {
            digits.push_str(&format!("{word:08x}"));
        }
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            f.write_str("0")
        } else {
            f.write_str(trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::tests::room;

    #[test]
    fn test_set_grows_and_clear_is_bounded() {
        let mut set = VisitedRooms::new();
        assert!(!set.contains(RoomId(100)));
        set.clear(RoomId(100));

        set.set(RoomId(100));
        assert!(set.contains(RoomId(100)));
        assert!(!set.contains(RoomId(99)));
        assert_eq!(set.count(), 1);

        set.clear(RoomId(100));
        assert!(!set.contains(RoomId(100)));
    }

    #[test]
    fn test_hex_display() {
        let mut set = VisitedRooms::new();
        assert_eq!(set.to_string(), "0");
        set.set(RoomId(0));
        set.set(RoomId(4));
        assert_eq!(set.to_string(), "11");
        set.set(RoomId(32));
        assert_eq!(set.to_string(), "100000011");
    }

    #[test]
    fn test_all_of_marks_existing_rooms_only() {
        let topology = Topology::from_rooms([room(1, "A", &[]), room(40, "B", &[])]).unwrap();
        let set = VisitedRooms::all_of(&topology);
        assert!(set.contains(RoomId(1)));
        assert!(set.contains(RoomId(40)));
        assert!(!set.contains(RoomId(2)));
        assert_eq!(set.count(), 2);
    }
}
