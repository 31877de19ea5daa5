//! # World Command Integration Test
//!
//! Loads the fixture areas, runs the world on a real actor thread and drives
//! it the way a session does: by scheduling command events.

use murmur_core::{ActorHandle, EventQueue, Mailbox, RecvTimeout, Scheduler, WorldActor};
use murmur_shared::{MessageKind, ServerMessage};
use murmur_world::{builtin_commands, load_areas, ActorId, CommandGate, World, WorldRules};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    scheduler: Scheduler<World>,
    handle: Option<ActorHandle<World>>,
}

struct Player {
    id: ActorId,
    mailbox: Mailbox<ServerMessage>,
    gate: CommandGate,
}

impl Harness {
    fn start() -> Self {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let topology = Arc::new(load_areas(&dir).unwrap());
        let (scheduler, queue) = EventQueue::bounded(EventQueue::<World>::DEFAULT_CAPACITY);
        let world = World::new(
            topology,
            Arc::new(builtin_commands()),
            WorldRules::default(),
            scheduler.clone(),
        )
        .unwrap();
        let handle = WorldActor::new(world, queue).spawn("world-test").unwrap();
        Self {
            scheduler,
            handle: Some(handle),
        }
    }

    fn join(&self, name: &'static str) -> Player {
        let mailbox = Mailbox::new(64);
        let gate = CommandGate::new(8);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let (m, g) = (mailbox.clone(), gate.clone());
        self.scheduler.schedule(
            move |world: &mut World| {
                let _ = tx.send(world.spawn_player(name, m, g));
            },
            Duration::ZERO,
        );
        let id = rx.recv_timeout(WAIT).unwrap();
        Player { id, mailbox, gate }
    }

    fn command(&self, player: &Player, line: &str) {
        player.gate.try_reserve().unwrap();
        let (id, line) = (player.id, line.to_owned());
        self.scheduler
            .schedule(move |world: &mut World| world.submit_command(id, &line), Duration::ZERO);
    }

    fn stop(mut self) -> World {
        self.handle.take().unwrap().join().unwrap()
    }
}

fn next(player: &Player) -> ServerMessage {
    match player.mailbox.recv_timeout(WAIT) {
        RecvTimeout::Message(msg) => msg,
        other => panic!("expected a message, got {other:?}"),
    }
}

fn expect(player: &Player, kind: MessageKind, text: &str) {
    assert_eq!(next(player), ServerMessage::new(kind, text));
}

fn expect_map(player: &Player) -> String {
    let msg = next(player);
    assert_eq!(msg.kind, MessageKind::Map);
    msg.msg
}

/// Test: Look shows the long description, the exits and the map.
#[test]
fn test_look_shows_room_and_map() {
    let harness = Harness::start();
    let p = harness.join("Gnoric");

    harness.command(&p, "look");
    let description = next(&p);
    assert_eq!(description.kind, MessageKind::Environment);
    assert!(description.msg.starts_with("You are in the southern end"));
    assert!(description.msg.ends_with("\nExits [n e d]\n"));

    let map = expect_map(&p);
    assert!(map.contains('╳'));
    assert!(map.contains('↕'));
    // Stairs down leave the zone.
    assert!(map.contains('⇙'));

    harness.command(&p, "l at the pillars");
    expect(&p, MessageKind::Environment, "I don't know how to look at that\n");
    harness.stop();
}

/// Test: Walking, dead ends, dangling exits and stray arguments.
#[test]
fn test_movement_messages() {
    let harness = Harness::start();
    let p = harness.join("Gnoric");

    harness.command(&p, "north");
    expect(&p, MessageKind::Environment, "Temple Square\nExits [s w]\n");
    expect_map(&p);

    harness.command(&p, "n");
    expect(&p, MessageKind::Environment, "You cannot go that way.\n");

    harness.command(&p, "w");
    expect(&p, MessageKind::Environment, "Market Street\nExits [e n]\n");
    expect_map(&p);

    harness.command(&p, "north");
    expect(&p, MessageKind::Environment, "Error trying to move in that direction\n");

    harness.command(&p, "north quickly");
    expect(
        &p,
        MessageKind::Environment,
        "I don't know what to do with the extra information.\n",
    );

    let world = harness.stop();
    assert_eq!(world.actor(p.id).unwrap().location.0, 3004);
}

/// Test: Back-to-back moves are spaced by the move delay.
#[test]
fn test_movement_is_throttled() {
    let harness = Harness::start();
    let p = harness.join("Gnoric");

    let start = Instant::now();
    harness.command(&p, "north");
    harness.command(&p, "south");

    expect(&p, MessageKind::Environment, "Temple Square\nExits [s w]\n");
    expect_map(&p);
    expect(&p, MessageKind::Environment, "The Temple Of Midgaard\nExits [n e d]\n");
    assert!(start.elapsed() >= WorldRules::default().move_delay);
    harness.stop();
}

/// Test: Informational commands are not held behind pending movement.
#[test]
fn test_fast_lane_overtakes_slow_lane() {
    let harness = Harness::start();
    let p = harness.join("Gnoric");

    harness.command(&p, "north");
    harness.command(&p, "north");
    harness.command(&p, "look");

    expect(&p, MessageKind::Environment, "Temple Square\nExits [s w]\n");
    expect_map(&p);
    let look = next(&p);
    assert!(look.msg.starts_with("You are standing on the temple square."));
    expect_map(&p);
    expect(&p, MessageKind::Environment, "You cannot go that way.\n");
    harness.stop();
}

/// Test: Speech reaches everyone else in the room.
#[test]
fn test_say_reaches_room() {
    let harness = Harness::start();
    let a = harness.join("Alice");
    let b = harness.join("Bob");

    harness.command(&a, "say well met");
    expect(&a, MessageKind::Social, "You say, 'well met'\n");
    expect(&b, MessageKind::Social, "Alice says, 'well met'\n");

    harness.command(&b, "'");
    expect(&b, MessageKind::Social, "Say what?\n");

    harness.command(&b, "who");
    expect(
        &b,
        MessageKind::Environment,
        "Players online:\n  Alice\n  Bob\n2 players online.\n",
    );
    harness.stop();
}

/// Test: Others see arrivals and departures.
#[test]
fn test_room_sees_movement() {
    let harness = Harness::start();
    let a = harness.join("Alice");
    let b = harness.join("Bob");

    harness.command(&a, "east");
    expect(&b, MessageKind::Environment, "Alice leaves east.\n");
    expect(&a, MessageKind::Environment, "The Chapel\nExits [w u]\n");
    expect_map(&a);

    harness.command(&b, "e");
    expect(&a, MessageKind::Environment, "Bob arrives.\n");
    expect(&b, MessageKind::Environment, "The Chapel\nExits [w u]\n");
    expect_map(&b);
    expect(&b, MessageKind::Environment, "Alice is here.\n");
    harness.stop();
}

/// Test: Recall and zone-crossing stairs.
#[test]
fn test_down_and_recall() {
    let harness = Harness::start();
    let p = harness.join("Gnoric");

    harness.command(&p, "d");
    expect(&p, MessageKind::Environment, "The Catacombs\nExits [u]\n");
    let map = expect_map(&p);
    assert!(map.contains('⇗'));

    harness.command(&p, "recall");
    expect(&p, MessageKind::Environment, "The Temple Of Midgaard\nExits [n e d]\n");
    expect_map(&p);

    harness.command(&p, "recall home");
    expect(
        &p,
        MessageKind::Environment,
        "I don't know what to do with the extra information.\n",
    );
    harness.stop();
}

/// Test: Unknown verbs are answered without touching the world.
#[test]
fn test_unknown_verb() {
    let harness = Harness::start();
    let p = harness.join("Gnoric");

    harness.command(&p, "dance");
    expect(&p, MessageKind::Error, "Huh?");
    assert_eq!(p.gate.backlog(), 0);
    harness.stop();
}

/// Test: Quit says goodbye, closes the mailbox and removes the actor.
#[test]
fn test_quit_disconnects() {
    let harness = Harness::start();
    let a = harness.join("Alice");
    let b = harness.join("Bob");

    harness.command(&a, "quit");
    expect(&a, MessageKind::Environment, "Goodbye.\n");
    expect(&b, MessageKind::Environment, "Alice has left the game.\n");
    assert_eq!(a.mailbox.recv_timeout(WAIT), RecvTimeout::Closed);

    // Commands still in flight for the departed actor are dropped.
    harness.command(&a, "look");
    let world = harness.stop();
    assert!(world.actor(a.id).is_none());
    assert_eq!(world.player_count(), 1);
}
