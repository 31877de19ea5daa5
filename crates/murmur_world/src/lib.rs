//! # MURMUR World
//!
//! The state owned by the world actor, and the commands that mutate it.
//!
//! ## Layout
//!
//! - [`topology`]: immutable room graph, shared by every thread
//! - [`loader`]: reads area files into a [`Topology`] before startup
//! - [`world`]: actors and the command pipeline, touched only on the actor thread
//! - [`command`] / [`commands`]: verb table and built-in handlers
//! - [`map`]: the text map sent after every look and move
//!
//! ## Example
//!
//! ```rust,ignore
//! use murmur_core::{EventQueue, WorldActor};
//! use murmur_world::{builtin_commands, load_areas, World, WorldRules};
//! use std::sync::Arc;
//!
//! let topology = Arc::new(load_areas("areas".as_ref())?);
//! let (scheduler, queue) = EventQueue::bounded(100);
//! let world = World::new(topology, Arc::new(builtin_commands()), WorldRules::default(), scheduler.clone())?;
//! let actor = WorldActor::new(world, queue).spawn("murmur-world")?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod actor;
pub mod command;
pub mod commands;
pub mod error;
pub mod loader;
pub mod map;
pub mod topology;
pub mod visited;
pub mod world;

pub use actor::{
    Actor, ActorId, CommandGate, CommandLane, CommandLanes, CommandTicket, Controller, GateError,
    Lane, DEFAULT_MAX_BACKLOG, TIME_TO_MOVE,
};
pub use command::{Command, CommandHandler, CommandTable};
pub use commands::builtin_commands;
pub use error::{WorldError, WorldResult};
pub use loader::{load_areas, Area};
pub use map::{render_map, MAP_DEPTH};
pub use topology::{Direction, Exit, Room, RoomId, Topology};
pub use visited::VisitedRooms;
pub use world::{World, WorldRules};
