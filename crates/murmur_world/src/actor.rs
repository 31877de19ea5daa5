//! # Actors
//!
//! A player or NPC present in the world.
//!
//! ## Throttling
//!
//! Every command returns how long its actor must wait before the next
//! command on the same lane. Each actor has two lanes:
//!
//! ```text
//!   Fast lane: look, say, who, quit      (minimum delay 0)
//!   Slow lane: movement, recall          (minimum delay: the move delay)
//! ```
//!
//! A lane is a FIFO of pending command lines plus a `blocked_until`
//! instant. The world keeps the authoritative copy in [`CommandLane`]; the
//! session reads the mirrored copy in [`CommandGate`] to pick a delay and to
//! refuse input once too many commands are queued.
//!
//! ## Ordering
//!
//! Command events for one lane can leave the event queue in any order when
//! their wake times tie. The gate therefore stamps every line with a
//! [`CommandTicket`], and the lane only admits lines into its FIFO in ticket
//! order:
//!
//! ```text
//!   gate.issue(lane) ──> seq 0, 1, 2 ...
//!   lane.admit(2, ..)    held
//!   lane.admit(0, ..)    queued: 0
//!   lane.admit(1, ..)    queued: 0 1 2
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use murmur_core::{Mailbox, SendOutcome};
use murmur_shared::{MessageKind, ServerMessage};
use parking_lot::Mutex;

use crate::topology::RoomId;
use crate::visited::VisitedRooms;

/// Minimum delay after a movement command.
pub const TIME_TO_MOVE: Duration = Duration::from_millis(200);

/// Commands an actor may have queued before further input is refused.
pub const DEFAULT_MAX_BACKLOG: usize = 16;

/// Identifier of an actor. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which throttle a command counts against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Informational commands.
    Fast,
    /// Commands that take game time, like moving.
    Slow,
}

impl Lane {
    const fn slot(self) -> usize {
        match self {
            Self::Fast => 0,
            Self::Slow => 1,
        }
    }
}

/// Position of one stamped command line on its lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommandTicket {
    /// Lane the line was stamped for.
    pub lane: Lane,
    /// Issue order on that lane, starting at 0.
    pub seq: u64,
}

/// Pending commands on one lane, owned by the world.
#[derive(Debug)]
pub struct CommandLane {
    pending: VecDeque<String>,
    held: BTreeMap<u64, String>,
    next_seq: u64,
    blocked_until: Instant,
    pump_scheduled: bool,
}

impl CommandLane {
    fn new(now: Instant) -> Self {
        Self {
            pending: VecDeque::new(),
            held: BTreeMap::new(),
            next_seq: 0,
            blocked_until: now,
            pump_scheduled: false,
        }
    }

    /// Queued command lines, not counting lines held for an earlier ticket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Lines that arrived ahead of an earlier ticket.
    #[must_use]
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// When the lane may run its next command.
    #[must_use]
    pub const fn blocked_until(&self) -> Instant {
        self.blocked_until
    }

    /// Returns true if a follow-up pump event is already on the queue.
    #[must_use]
    pub const fn pump_scheduled(&self) -> bool {
        self.pump_scheduled
    }

    pub(crate) fn push(&mut self, line: String) {
        self.pending.push_back(line);
    }

    /// Queues `line` once every earlier ticket has been queued. Returns how
    /// many lines moved into the FIFO.
    pub(crate) fn admit(&mut self, seq: u64, line: String) -> usize {
        if seq < self.next_seq {
            tracing::warn!(seq, next = self.next_seq, "stale command ticket queued as is");
            self.pending.push_back(line);
            return 1;
        }
        self.held.insert(seq, line);
        let mut moved = 0;
        while let Some(line) = self.held.remove(&self.next_seq) {
            self.pending.push_back(line);
            self.next_seq += 1;
            moved += 1;
        }
        moved
    }

    pub(crate) fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub(crate) fn block_until(&mut self, until: Instant) {
        self.blocked_until = until;
    }

    pub(crate) fn set_pump_scheduled(&mut self, scheduled: bool) {
        self.pump_scheduled = scheduled;
    }
}

/// Both lanes of one actor.
#[derive(Debug)]
pub struct CommandLanes {
    fast: CommandLane,
    slow: CommandLane,
}

impl CommandLanes {
    /// Creates unblocked, empty lanes.
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            fast: CommandLane::new(now),
            slow: CommandLane::new(now),
        }
    }

    /// The lane for `lane`.
    #[must_use]
    pub const fn get(&self, lane: Lane) -> &CommandLane {
        match lane {
            Lane::Fast => &self.fast,
            Lane::Slow => &self.slow,
        }
    }

    pub(crate) fn get_mut(&mut self, lane: Lane) -> &mut CommandLane {
        match lane {
            Lane::Fast => &mut self.fast,
            Lane::Slow => &mut self.slow,
        }
    }
}

/// Reasons a session may not queue another command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// Too many commands are already waiting.
    #[error("command backlog full ({limit} pending)")]
    Backlogged {
        /// Configured limit.
        limit: usize,
    },
}

struct GateInner {
    blocked_until: Mutex<[Option<Instant>; 2]>,
    issued: [AtomicU64; 2],
    backlog: AtomicUsize,
    max_backlog: usize,
}

/// Throttle state shared between a session and its actor.
///
/// Written by the world after every command, read by the session before it
/// schedules the next one.
#[derive(Clone)]
pub struct CommandGate {
    inner: Arc<GateInner>,
}

impl CommandGate {
    /// Creates an open gate that refuses input once `max_backlog` commands
    /// are queued (at least one).
    #[must_use]
    pub fn new(max_backlog: usize) -> Self {
        Self {
            inner: Arc::new(GateInner {
                blocked_until: Mutex::new([None, None]),
                issued: [AtomicU64::new(0), AtomicU64::new(0)],
                backlog: AtomicUsize::new(0),
                max_backlog: max_backlog.max(1),
            }),
        }
    }

    /// Claims a backlog slot for one command.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Backlogged`] if the limit is reached.
    pub fn try_reserve(&self) -> Result<(), GateError> {
        let limit = self.inner.max_backlog;
        self.inner
            .backlog
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| GateError::Backlogged { limit })
    }

    /// Returns a backlog slot once its command has run or been discarded.
    pub fn release(&self) {
        let _ = self
            .inner
            .backlog
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Commands reserved but not yet run.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.inner.backlog.load(Ordering::Acquire)
    }

    /// Stamps the next command line on `lane`.
    pub fn issue(&self, lane: Lane) -> CommandTicket {
        let seq = self.inner.issued[lane.slot()].fetch_add(1, Ordering::AcqRel);
        CommandTicket { lane, seq }
    }

    /// How long to hold a new `lane` command before it can run.
    ///
    /// Only a hint for when to schedule the event; ordering comes from the
    /// ticket.
    #[must_use]
    pub fn delay_for(&self, lane: Lane, now: Instant) -> Duration {
        self.inner.blocked_until.lock()[lane.slot()]
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    /// Records when `lane` unblocks.
    pub fn block_until(&self, lane: Lane, until: Instant) {
        self.inner.blocked_until.lock()[lane.slot()] = Some(until);
    }
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKLOG)
    }
}

impl fmt::Debug for CommandGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandGate")
            .field("backlog", &self.backlog())
            .field("max_backlog", &self.inner.max_backlog)
            .finish_non_exhaustive()
    }
}

/// Who drives an actor.
#[derive(Clone, Debug)]
pub enum Controller {
    /// A connected player; output goes to the connection's mailbox.
    Player {
        /// Outbound queue of the connection.
        mailbox: Mailbox<ServerMessage>,
        /// Throttle shared with the connection's session.
        gate: CommandGate,
    },
    /// A world-driven mobile. Output is discarded.
    Npc,
}

/// A mobile entity in the world.
#[derive(Debug)]
pub struct Actor {
    /// Unique id.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Current room.
    pub location: RoomId,
    /// Where `recall` returns to.
    pub start_location: RoomId,
    /// Rooms this actor has explored.
    pub visited: VisitedRooms,
    /// Command throttles.
    pub lanes: CommandLanes,
    /// Who drives this actor.
    pub controller: Controller,
}

impl Actor {
    /// Returns true for player-controlled actors.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.controller, Controller::Player { .. })
    }

    /// Sends a message to whoever controls the actor. No-op for NPCs.
    pub fn send(&self, kind: MessageKind, text: impl Into<String>) {
        self.deliver(ServerMessage::new(kind, text));
    }

    /// Sends a prepared message. No-op for NPCs.
    pub fn deliver(&self, message: ServerMessage) {
        if let Controller::Player { mailbox, .. } = &self.controller {
            if mailbox.send(message) == SendOutcome::Closed {
                tracing::trace!(actor = %self.id, "message to disconnected player discarded");
            }
        }
    }

    /// The player's throttle, if any.
    #[must_use]
    pub const fn gate(&self) -> Option<&CommandGate> {
        match &self.controller {
            Controller::Player { gate, .. } => Some(gate),
            Controller::Npc => None,
        }
    }

    /// Closes the player's mailbox. No-op for NPCs.
    pub fn disconnect(&self) {
        if let Controller::Player { mailbox, .. } = &self.controller {
            mailbox.close();
        }
    }
}
