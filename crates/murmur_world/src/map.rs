//! # Map Renderer
//!
//! Draws the rooms around the player as box-drawing text.
//!
//! A breadth-first walk lays rooms out on a grid, one cell per room, up to
//! [`MAP_DEPTH`] cells from the current room. Each cell is 4 characters
//! wide:
//!
//! ```text
//!   ╭─╮ ╭─╮
//!   │╳│↔│ │      ╳  current room        ↕ ↔  two-way exit
//!   ╰─╯ ╰─╯      ⇡ ⇢  unexplored        ↑ →  one-way exit
//!    ↕           ⇑ ⇒  leaves the zone   ↗ ↙  up / down in a corner
//! ```

use std::collections::{HashMap, VecDeque};

use crate::topology::{Direction, Room, Topology};
use crate::visited::VisitedRooms;

/// How many rooms out from the current room the map reaches.
pub const MAP_DEPTH: i32 = 3;

type Cell = (i32, i32);

/// Arrow set for one horizontal direction.
struct Arrows {
    dir: Direction,
    dx: i32,
    dy: i32,
    two_way: char,
    one_way: char,
    leaves_zone: char,
    unexplored: char,
}

const PLANAR: [Arrows; 4] = [
    Arrows { dir: Direction::North, dx: 0, dy: 1, two_way: '↕', one_way: '↑', leaves_zone: '⇑', unexplored: '⇡' },
    Arrows { dir: Direction::South, dx: 0, dy: -1, two_way: '↕', one_way: '↓', leaves_zone: '⇓', unexplored: '⇣' },
    Arrows { dir: Direction::East, dx: 1, dy: 0, two_way: '↔', one_way: '→', leaves_zone: '⇒', unexplored: '⇢' },
    Arrows { dir: Direction::West, dx: -1, dy: 0, two_way: '↔', one_way: '←', leaves_zone: '⇐', unexplored: '⇠' },
];

/// Renders the map centred on `current`.
///
/// The output is `2·(4·MAP_DEPTH + 2) + 1` lines of that many characters,
/// top row first.
#[must_use]
pub fn render_map(topology: &Topology, current: &Room, visited: &VisitedRooms) -> String {
    let text = trace(topology, current, visited);
    let extent = MAP_DEPTH * 4 + 2;

    let side = usize::try_from(2 * extent + 1).unwrap_or(0);
    let mut out = String::with_capacity(side * (side + 1) * 3);
    for y in (-extent..=extent).rev() {
        for x in -extent..=extent {
            out.push(text.get(&(x, y)).copied().unwrap_or(' '));
        }
        out.push('\n');
    }
    out
}

fn trace<'t>(
    topology: &'t Topology,
    start: &'t Room,
    visited: &VisitedRooms,
) -> HashMap<Cell, char> {
    let mut queue: VecDeque<Cell> = VecDeque::from([(0, 0)]);
    let mut grid: HashMap<Cell, &'t Room> = HashMap::from([((0, 0), start)]);
    let mut text: HashMap<Cell, char> = HashMap::new();

    while let Some(here) = queue.pop_front() {
        let Some(&room) = grid.get(&here) else {
            continue;
        };
        if here.0.abs() > MAP_DEPTH || here.1.abs() > MAP_DEPTH {
            continue;
        }

        let (x, y) = (here.0 * 4, here.1 * 4);
        draw_box(&mut text, x, y, here == (0, 0));

        for arrows in &PLANAR {
            let Some(target) = topology.exit_target(room, arrows.dir) else {
                continue;
            };
            let next = (here.0 + arrows.dx, here.1 + arrows.dy);
            let edge = (x + arrows.dx, y + arrows.dy);
            let gap = (x + 2 * arrows.dx, y + 2 * arrows.dy);

            if room.zone() != target.zone() {
                text.insert(edge, arrows.leaves_zone);
                continue;
            }
            if !visited.contains(target.id) {
                text.insert(edge, arrows.unexplored);
                continue;
            }

            let placed = match grid.get(&next) {
                None => {
                    grid.insert(next, target);
                    queue.push_back(next);
                    true
                }
                Some(existing) => existing.id == target.id,
            };
            if placed {
                let back = topology.exit_target(target, arrows.dir.reverse());
                let two_way = back.is_some_and(|b| b.id == room.id);
                text.insert(gap, if two_way { arrows.two_way } else { arrows.one_way });
            } else {
                // The cell is taken by a different room: the layout bends.
                text.insert(edge, arrows.one_way);
            }
        }

        if let Some(target) = topology.exit_target(room, Direction::Up) {
            text.insert((x + 1, y + 1), corner(room, target, visited, ['⇗', '⤴', '↗']));
        }
        if let Some(target) = topology.exit_target(room, Direction::Down) {
            text.insert((x - 1, y - 1), corner(room, target, visited, ['⇙', '⤶', '↙']));
        }
    }

    text
}

fn draw_box(text: &mut HashMap<Cell, char>, x: i32, y: i32, is_current: bool) {
    text.insert((x, y), if is_current { '╳' } else { ' ' });
    text.insert((x - 1, y), '│');
    text.insert((x + 1, y), '│');
    text.insert((x, y + 1), '─');
    text.insert((x, y - 1), '─');
    text.insert((x - 1, y + 1), '╭');
    text.insert((x + 1, y + 1), '╮');
    text.insert((x - 1, y - 1), '╰');
    text.insert((x + 1, y - 1), '╯');
}

/// `[leaves zone, unexplored, explored]`
fn corner(room: &Room, target: &Room, visited: &VisitedRooms, symbols: [char; 3]) -> char {
    if room.zone() != target.zone() {
        symbols[0]
    } else if !visited.contains(target.id) {
        symbols[1]
    } else {
        symbols[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::tests::room;
    use crate::topology::RoomId;
    use Direction::{Down, East, North, South, Up, West};

    fn lines(map: &str) -> Vec<Vec<char>> {
        map.lines().map(|l| l.chars().collect()).collect()
    }

    /// Character at map coordinates, origin in the centre.
    fn at(map: &[Vec<char>], x: i32, y: i32) -> char {
        let extent = MAP_DEPTH * 4 + 2;
        let row = usize::try_from(extent - y).unwrap();
        let col = usize::try_from(x + extent).unwrap();
        map[row][col]
    }

    #[test]
    fn test_lone_room() {
        let topology = Topology::from_rooms([room(3001, "Temple", &[])]).unwrap();
        let current = topology.room(RoomId(3001)).unwrap();
        let map = render_map(&topology, current, &VisitedRooms::all_of(&topology));

        let grid = lines(&map);
        assert_eq!(grid.len(), 29);
        assert!(grid.iter().all(|row| row.len() == 29));
        assert_eq!(at(&grid, 0, 0), '╳');
        assert_eq!(at(&grid, -1, 1), '╭');
        assert_eq!(at(&grid, 1, -1), '╯');
        assert_eq!(map.chars().filter(|c| !c.is_whitespace()).count(), 9);
    }

    #[test]
    fn test_two_way_and_one_way_exits() {
        let topology = Topology::from_rooms([
            room(3001, "Temple", &[(North, 3002), (East, 3003)]),
            room(3002, "Square", &[(South, 3001)]),
            room(3003, "Alley", &[]),
        ])
        .unwrap();
        let current = topology.room(RoomId(3001)).unwrap();
        let grid = lines(&render_map(&topology, current, &VisitedRooms::all_of(&topology)));

        assert_eq!(at(&grid, 0, 2), '↕');
        assert_eq!(at(&grid, 2, 0), '→');
        // Neighbours are drawn as empty boxes.
        assert_eq!(at(&grid, 0, 4), ' ');
        assert_eq!(at(&grid, -1, 4), '│');
        assert_eq!(at(&grid, 4, 0), ' ');
        assert_eq!(at(&grid, 5, 0), '│');
    }

    #[test]
    fn test_unexplored_and_zone_crossing_exits() {
        let topology = Topology::from_rooms([
            room(3001, "Temple", &[(West, 3004), (South, 3100)]),
            room(3004, "Dark", &[]),
            room(3100, "Elsewhere", &[]),
        ])
        .unwrap();
        let current = topology.room(RoomId(3001)).unwrap();
        let mut visited = VisitedRooms::all_of(&topology);
        visited.clear(RoomId(3004));

        let grid = lines(&render_map(&topology, current, &visited));
        assert_eq!(at(&grid, -1, 0), '⇠');
        assert_eq!(at(&grid, 0, -1), '⇓');
        // Neither neighbour is drawn.
        assert_eq!(at(&grid, -4, 0), ' ');
        assert_eq!(at(&grid, -5, 0), ' ');
    }

    #[test]
    fn test_up_down_corners() {
        let topology = Topology::from_rooms([
            room(3001, "Temple", &[(Up, 3005), (Down, 3200)]),
            room(3005, "Tower", &[]),
            room(3200, "Cellar", &[]),
        ])
        .unwrap();
        let current = topology.room(RoomId(3001)).unwrap();
        let mut visited = VisitedRooms::all_of(&topology);
        let grid = lines(&render_map(&topology, current, &visited));
        assert_eq!(at(&grid, 1, 1), '↗');
        assert_eq!(at(&grid, -1, -1), '⇙');

        visited.clear(RoomId(3005));
        let grid = lines(&render_map(&topology, current, &visited));
        assert_eq!(at(&grid, 1, 1), '⤴');
    }

    #[test]
    fn test_walk_stops_at_depth() {
        // A straight corridor running east, longer than the map reaches.
        let rooms: Vec<_> = (0..6u32)
            .map(|i| {
                let id = 3010 + i;
                room(id, "Corridor", &[(East, i64::from(id + 1)), (West, i64::from(id) - 1)])
            })
            .collect();
        let topology = Topology::from_rooms(rooms).unwrap();
        let current = topology.room(RoomId(3010)).unwrap();
        let grid = lines(&render_map(&topology, current, &VisitedRooms::all_of(&topology)));

        assert_eq!(at(&grid, 12, 0), ' ');
        assert_eq!(at(&grid, 13, 0), '│');
        assert_eq!(at(&grid, 10, 0), '↔');
        // The exit toward the undrawn fourth room still shows at the edge.
        assert_eq!(at(&grid, 14, 0), '↔');
        assert_eq!(at(&grid, -2, 0), ' ');
    }
}
