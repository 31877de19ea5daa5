//! # MURMUR Core
//!
//! The concurrency kernel of the MURMUR world server.
//!
//! ## Architecture Rules
//!
//! 1. **One writer** - world state is owned by a single [`WorldActor`] thread
//! 2. **Time order** - mutations run in non-decreasing `fire_at` order
//! 3. **Producers never wait** - [`Scheduler::schedule`] hands off or defers, it never stalls
//! 4. **Consumers never wait on the world** - [`Mailbox::send`] drops the oldest message instead of blocking
//!
//! ```text
//!   session A ──┐                                    ┌──> Mailbox A ──> delivery A
//!   session B ──┼──> Scheduler ──> EventQueue ──> WorldActor ──> Mailbox B ──> delivery B
//!   world     ──┘   (any thread)   (min-heap)    (one thread)   (drop-oldest)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use murmur_core::{EventQueue, WorldActor};
//! use std::time::Duration;
//!
//! let (scheduler, queue) = EventQueue::<Vec<u32>>::bounded(128);
//! let handle = WorldActor::new(Vec::new(), queue).spawn("world")?;
//!
//! scheduler.schedule(|log| log.push(2), Duration::from_millis(20));
//! scheduler.schedule(|log| log.push(1), Duration::ZERO);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod schedule;
pub mod sync;

pub use schedule::{
    Action, ActorError, ActorHandle, ActorPhase, ActorStats, EventQueue, Scheduler,
    SchedulerStats, TimedEvent, WakeTimer, WorldActor,
};
pub use sync::{Mailbox, RecvTimeout, SendOutcome, DEFAULT_MAILBOX_CAPACITY};
