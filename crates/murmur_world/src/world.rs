//! # World State
//!
//! Everything the world actor owns. Every method here runs on the actor
//! thread; other threads reach the world only through
//! [`Scheduler::schedule`].
//!
//! ## Command Flow
//!
//! ```text
//!   session ──schedule──> submit_ticketed ──> lane FIFO ──> pump_lane ──> handler
//!                           (ticket order)        ▲              │
//!                                                 └─ blocked? ───┘ one pump event
//!                                                                 at blocked_until
//! ```
//!
//! [`World::submit_command`] skips the ticket and queues directly. It is
//! meant for lines that originate on the actor thread.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use murmur_core::{Mailbox, Scheduler};
use murmur_shared::{ServerMessage, DEFAULT_START_ROOM};

use crate::actor::{
    Actor, ActorId, CommandGate, CommandLanes, CommandTicket, Controller, Lane, TIME_TO_MOVE,
};
use crate::command::CommandTable;
use crate::error::{WorldError, WorldResult};
use crate::topology::{RoomId, Topology};
use crate::visited::VisitedRooms;

/// Tunables fixed at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldRules {
    /// Where new actors appear and `recall` leads.
    pub start_room: RoomId,
    /// Delay after a movement command.
    pub move_delay: Duration,
}

impl WorldRules {
    /// Floor applied to the delay a command on `lane` returns.
    #[must_use]
    pub const fn min_delay(&self, lane: Lane) -> Duration {
        match lane {
            Lane::Fast => Duration::ZERO,
            Lane::Slow => self.move_delay,
        }
    }
}

impl Default for WorldRules {
    fn default() -> Self {
        Self {
            start_room: RoomId(DEFAULT_START_ROOM),
            move_delay: TIME_TO_MOVE,
        }
    }
}

/// The mutable world.
pub struct World {
    topology: Arc<Topology>,
    commands: Arc<CommandTable>,
    rules: WorldRules,
    actors: BTreeMap<ActorId, Actor>,
    next_actor: u64,
    scheduler: Scheduler<World>,
}

impl World {
    /// Creates an empty world over `topology`.
    ///
    /// `scheduler` must feed the queue of the actor that will own this world.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::MissingStartRoom`] if the start room is not in
    /// the topology.
    pub fn new(
        topology: Arc<Topology>,
        commands: Arc<CommandTable>,
        rules: WorldRules,
        scheduler: Scheduler<World>,
    ) -> WorldResult<Self> {
        if !topology.contains(rules.start_room) {
            return Err(WorldError::MissingStartRoom(rules.start_room));
        }
        Ok(Self {
            topology,
            commands,
            rules,
            actors: BTreeMap::new(),
            next_actor: 1,
            scheduler,
        })
    }

    /// The room graph.
    #[must_use]
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// The command table.
    #[must_use]
    pub fn commands(&self) -> &Arc<CommandTable> {
        &self.commands
    }

    /// Startup tunables.
    #[must_use]
    pub const fn rules(&self) -> &WorldRules {
        &self.rules
    }

    /// Handle for scheduling follow-up events.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<World> {
        &self.scheduler
    }

    /// Looks up an actor.
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Looks up an actor for mutation.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// All actors in id order.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    /// Actors standing in `room`.
    pub fn actors_in(&self, room: RoomId) -> impl Iterator<Item = &Actor> {
        self.actors.values().filter(move |a| a.location == room)
    }

    /// Number of actors present.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Number of connected players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.actors.values().filter(|a| a.is_player()).count()
    }

    /// Places a connected player in the start room.
    pub fn spawn_player(
        &mut self,
        name: impl Into<String>,
        mailbox: Mailbox<ServerMessage>,
        gate: CommandGate,
    ) -> ActorId {
        let id = self.allocate_id();
        let start = self.rules.start_room;
        let actor = Actor {
            id,
            name: name.into(),
            location: start,
            start_location: start,
            visited: VisitedRooms::all_of(&self.topology),
            lanes: CommandLanes::new(Instant::now()),
            controller: Controller::Player { mailbox, gate },
        };
        tracing::info!(actor = %id, name = %actor.name, room = %start, "player entered the world");
        self.actors.insert(id, actor);
        id
    }

    /// Places a world-driven actor in `location`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownRoom`] if `location` does not exist.
    pub fn spawn_npc(&mut self, name: impl Into<String>, location: RoomId) -> WorldResult<ActorId> {
        if !self.topology.contains(location) {
            return Err(WorldError::UnknownRoom(location));
        }
        let id = self.allocate_id();
        let actor = Actor {
            id,
            name: name.into(),
            location,
            start_location: location,
            visited: VisitedRooms::new(),
            lanes: CommandLanes::new(Instant::now()),
            controller: Controller::Npc,
        };
        tracing::debug!(actor = %id, name = %actor.name, room = %location, "npc spawned");
        self.actors.insert(id, actor);
        Ok(id)
    }

    /// Removes an actor, closing its mailbox. Pending commands are dropped.
    pub fn despawn(&mut self, id: ActorId) -> Option<Actor> {
        let actor = self.actors.remove(&id)?;
        actor.disconnect();
        tracing::info!(actor = %id, name = %actor.name, "actor left the world");
        Some(actor)
    }

    /// Sends one message to one actor. Returns false if the actor is gone.
    pub fn send_to(&self, id: ActorId, message: ServerMessage) -> bool {
        match self.actors.get(&id) {
            Some(actor) => {
                actor.deliver(message);
                true
            }
            None => false,
        }
    }

    /// Sends `message` to everyone in `room` except `except`. Returns the
    /// number of recipients.
    pub fn broadcast_room(
        &self,
        room: RoomId,
        except: Option<ActorId>,
        message: &ServerMessage,
    ) -> usize {
        let mut sent = 0;
        for actor in self.actors_in(room).filter(|a| Some(a.id) != except) {
            actor.deliver(message.clone());
            sent += 1;
        }
        sent
    }

    /// Queues a command line on the actor's lane and runs it when the lane
    /// allows.
    ///
    /// Unknown verbs are answered with an error message. Lines for actors
    /// that no longer exist are dropped.
    pub fn submit_command(&mut self, id: ActorId, line: &str) {
        let commands = Arc::clone(&self.commands);
        let Some(actor) = self.actors.get_mut(&id) else {
            tracing::trace!(actor = %id, "command for departed actor dropped");
            return;
        };
        let Some((command, _)) = commands.parse(line) else {
            if let Some(gate) = actor.gate() {
                gate.release();
            }
            actor.deliver(ServerMessage::error("Huh?"));
            return;
        };
        let lane = command.lane;
        actor.lanes.get_mut(lane).push(line.to_owned());
        self.pump_lane(id, lane, false);
    }

    /// Queues a line stamped by [`CommandGate::issue`].
    ///
    /// Lines enter the lane in ticket order, however their events were
    /// ordered on the way here. The ticket's lane is authoritative; a line
    /// whose verb does not parse still fills its slot and is answered when
    /// it reaches the front.
    pub fn submit_ticketed(&mut self, id: ActorId, ticket: CommandTicket, line: &str) {
        let Some(actor) = self.actors.get_mut(&id) else {
            tracing::trace!(actor = %id, seq = ticket.seq, "command for departed actor dropped");
            return;
        };
        let lane = actor.lanes.get_mut(ticket.lane);
        if lane.admit(ticket.seq, line.to_owned()) == 0 {
            tracing::trace!(actor = %id, seq = ticket.seq, held = lane.held(), "command held");
            return;
        }
        self.pump_lane(id, ticket.lane, false);
    }

    fn pump_lane(&mut self, id: ActorId, lane: Lane, from_timer: bool) {
        let now = Instant::now();
        let commands = Arc::clone(&self.commands);
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        let gate = actor.gate().cloned();
        let state = actor.lanes.get_mut(lane);

        if from_timer {
            state.set_pump_scheduled(false);
        } else if state.pump_scheduled() {
            // The scheduled pump will pick this line up.
            return;
        }
        if state.is_empty() {
            return;
        }
        if state.blocked_until() > now {
            let at = state.blocked_until();
            state.set_pump_scheduled(true);
            self.schedule_pump(id, lane, at);
            return;
        }

        let Some(line) = state.pop() else {
            return;
        };
        if let Some(gate) = &gate {
            gate.release();
        }
        let Some((command, rest)) = commands.parse(&line) else {
            // Answer it and move on to the next line; the lane stays open.
            self.send_to(id, ServerMessage::error("Huh?"));
            self.pump_lane(id, lane, false);
            return;
        };

        let returned = (command.handler)(self, id, rest);
        let delay = returned.max(self.rules.min_delay(lane));
        let until = Instant::now() + delay;
        tracing::trace!(
            actor = %id,
            command = command.name,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "command executed"
        );

        // The command may have removed its own actor.
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        let state = actor.lanes.get_mut(lane);
        state.block_until(until);
        if let Some(gate) = &gate {
            gate.block_until(lane, until);
        }
        if !state.is_empty() && !state.pump_scheduled() {
            state.set_pump_scheduled(true);
            self.schedule_pump(id, lane, until);
        }
    }

    fn schedule_pump(&self, id: ActorId, lane: Lane, at: Instant) {
        self.scheduler
            .schedule_at(at, move |world: &mut World| world.pump_lane(id, lane, true));
    }

    fn allocate_id(&mut self) -> ActorId {
        let id = ActorId(self.next_actor);
        self.next_actor += 1;
        id
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("rooms", &self.topology.room_count())
            .field("actors", &self.actors.len())
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin_commands;
    use crate::topology::tests::room;
    use crate::topology::Direction::{North, South};
    use murmur_core::EventQueue;

    fn world() -> (World, EventQueue<World>) {
        let topology = Topology::from_rooms([
            room(3001, "Temple", &[(North, 3002)]),
            room(3002, "Square", &[(South, 3001)]),
        ])
        .unwrap();
        let (scheduler, queue) = EventQueue::bounded(64);
        let world = World::new(
            Arc::new(topology),
            Arc::new(builtin_commands()),
            WorldRules::default(),
            scheduler,
        )
        .unwrap();
        (world, queue)
    }

    #[test]
    fn test_missing_start_room_rejected() {
        let (scheduler, _queue) = EventQueue::bounded(4);
        let rules = WorldRules {
            start_room: RoomId(42),
            ..WorldRules::default()
        };
        let err = World::new(
            Arc::new(Topology::default()),
            Arc::new(CommandTable::new()),
            rules,
            scheduler,
        )
        .unwrap_err();
        assert!(matches!(err, WorldError::MissingStartRoom(RoomId(42))));
    }

    #[test]
    fn test_spawn_and_despawn_player() {
        let (mut world, _queue) = world();
        let mailbox = Mailbox::new(16);
        let id = world.spawn_player("Gnoric", mailbox.clone(), CommandGate::default());

        let actor = world.actor(id).unwrap();
        assert_eq!(actor.location, RoomId(3001));
        assert!(actor.visited.contains(RoomId(3002)));
        assert_eq!(world.player_count(), 1);

        assert!(world.despawn(id).is_some());
        assert!(mailbox.is_closed());
        assert!(world.despawn(id).is_none());
        assert!(!world.send_to(id, ServerMessage::social("hi")));
    }

    #[test]
    fn test_npc_needs_existing_room() {
        let (mut world, _queue) = world();
        assert!(world.spawn_npc("cityguard", RoomId(3002)).is_ok());
        assert!(matches!(
            world.spawn_npc("lost", RoomId(9)),
            Err(WorldError::UnknownRoom(RoomId(9)))
        ));
        assert_eq!(world.player_count(), 0);
        assert_eq!(world.actor_count(), 1);
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let (mut world, _queue) = world();
        let a = Mailbox::new(8);
        let b = Mailbox::new(8);
        let id_a = world.spawn_player("A", a.clone(), CommandGate::default());
        world.spawn_player("B", b.clone(), CommandGate::default());

        let sent = world.broadcast_room(RoomId(3001), Some(id_a), &ServerMessage::social("psst"));
        assert_eq!(sent, 1);
        assert!(a.is_empty());
        assert_eq!(b.snapshot(), vec![ServerMessage::social("psst")]);
    }

    #[test]
    fn test_unknown_verb_answers_huh() {
        let (mut world, _queue) = world();
        let mailbox = Mailbox::new(8);
        let gate = CommandGate::new(4);
        let id = world.spawn_player("A", mailbox.clone(), gate.clone());

        gate.try_reserve().unwrap();
        world.submit_command(id, "dance wildly");
        assert_eq!(mailbox.snapshot(), vec![ServerMessage::error("Huh?")]);
        assert_eq!(gate.backlog(), 0);
    }

    #[test]
    fn test_blocked_lane_schedules_single_pump() {
        let (mut world, mut queue) = world();
        let mailbox = Mailbox::new(64);
        let gate = CommandGate::new(8);
        let id = world.spawn_player("A", mailbox.clone(), gate.clone());

        for _ in 0..3 {
            gate.try_reserve().unwrap();
        }
        world.submit_command(id, "north");
        world.submit_command(id, "south");
        world.submit_command(id, "north");

        // First move ran immediately; the rest wait behind one pump event.
        let actor = world.actor(id).unwrap();
        assert_eq!(actor.location, RoomId(3002));
        let slow = actor.lanes.get(Lane::Slow);
        assert_eq!(slow.len(), 2);
        assert!(slow.pump_scheduled());
        assert_eq!(gate.backlog(), 2);
        assert!(gate.delay_for(Lane::Slow, Instant::now()) > Duration::ZERO);

        assert_eq!(queue.drain_incoming(), 1);
        assert_eq!(queue.len(), 1);

        // Fast lane is not held up by the slow one.
        gate.try_reserve().unwrap();
        mailbox_clear(&mailbox);
        world.submit_command(id, "look");
        assert!(!mailbox.is_empty());
        assert_eq!(world.actor(id).unwrap().lanes.get(Lane::Fast).len(), 0);
    }

    #[test]
    fn test_ticketed_lines_run_in_issue_order() {
        let (mut world, _queue) = world();
        let mailbox = Mailbox::new(64);
        let gate = CommandGate::new(8);
        let id = world.spawn_player("A", mailbox.clone(), gate.clone());

        let first = gate.issue(Lane::Slow);
        let second = gate.issue(Lane::Slow);
        for _ in 0..2 {
            gate.try_reserve().unwrap();
        }

        world.submit_ticketed(id, second, "south");
        let actor = world.actor(id).unwrap();
        assert_eq!(actor.location, RoomId(3001));
        assert_eq!(actor.lanes.get(Lane::Slow).held(), 1);
        assert!(mailbox.is_empty());

        world.submit_ticketed(id, first, "north");
        let slow = world.actor(id).unwrap().lanes.get(Lane::Slow);
        assert_eq!(world.actor(id).unwrap().location, RoomId(3002));
        assert_eq!((slow.held(), slow.len()), (0, 1));
        assert!(slow.pump_scheduled());
        assert_eq!(gate.backlog(), 1);
    }

    #[test]
    fn test_unparsable_ticketed_line_keeps_its_slot() {
        let (mut world, _queue) = world();
        let mailbox = Mailbox::new(64);
        let gate = CommandGate::new(8);
        let id = world.spawn_player("A", mailbox.clone(), gate.clone());

        let bad = gate.issue(Lane::Fast);
        let look = gate.issue(Lane::Fast);
        gate.try_reserve().unwrap();
        gate.try_reserve().unwrap();

        world.submit_ticketed(id, look, "look");
        assert!(mailbox.is_empty());
        world.submit_ticketed(id, bad, "dance");

        let replies = mailbox.snapshot();
        assert_eq!(replies[0], ServerMessage::error("Huh?"));
        assert!(replies[1].msg.starts_with("Temple"));
        assert_eq!(gate.backlog(), 0);
    }

    fn mailbox_clear(mailbox: &Mailbox<ServerMessage>) {
        while mailbox.try_recv().is_some() {}
    }
}
