//! Built-in commands.
//!
//! Every handler checks its own preconditions (actor present, room present,
//! no stray arguments) and answers the player instead of failing.

use std::sync::Arc;
use std::time::Duration;

use murmur_shared::{MessageKind, ServerMessage};

use crate::actor::{ActorId, Lane};
use crate::command::{Command, CommandHandler, CommandTable};
use crate::map::render_map;
use crate::topology::Direction;
use crate::world::World;

const EXTRA_ARGS: &str = "I don't know what to do with the extra information.\n";

/// Builds the table of built-in commands.
#[must_use]
pub fn builtin_commands() -> CommandTable {
    let mut table = CommandTable::new();
    let fast = |name: &'static str, handler: CommandHandler| Command {
        name,
        lane: Lane::Fast,
        handler,
    };
    let slow = |name: &'static str, handler: CommandHandler| Command {
        name,
        lane: Lane::Slow,
        handler,
    };

    table.register(fast("look", cmd_look), &["l"]);
    table.register(slow("north", cmd_north), &["n"]);
    table.register(slow("east", cmd_east), &["e"]);
    table.register(slow("south", cmd_south), &["s"]);
    table.register(slow("west", cmd_west), &["w"]);
    table.register(slow("up", cmd_up), &["u"]);
    table.register(slow("down", cmd_down), &["d"]);
    table.register(slow("recall", cmd_recall), &[]);
    table.register(fast("say", cmd_say), &["'"]);
    table.register(fast("who", cmd_who), &[]);
    table.register(fast("quit", cmd_quit), &[]);
    table
}

/// Sends the actor's room description and map.
fn show_room(world: &World, id: ActorId, long: bool) {
    let Some(actor) = world.actor(id) else {
        return;
    };
    let topology = world.topology();
    let Some(room) = topology.room(actor.location) else {
        actor.send(MessageKind::Error, "You are nowhere.\n");
        return;
    };

    let text = if long {
        room.description()
    } else {
        room.short_description()
    };
    actor.send(MessageKind::Environment, text);
    actor.send(MessageKind::Map, render_map(topology, room, &actor.visited));

    for other in world.actors_in(room.id).filter(|a| a.id != id) {
        actor.send(MessageKind::Environment, format!("{} is here.\n", other.name));
    }
}

fn cmd_look(world: &mut World, id: ActorId, args: &str) -> Duration {
    if !args.is_empty() {
        world.send_to(id, ServerMessage::environment("I don't know how to look at that\n"));
        return Duration::ZERO;
    }
    show_room(world, id, true);
    Duration::ZERO
}

fn cmd_north(world: &mut World, id: ActorId, args: &str) -> Duration {
    move_actor(world, id, args, Direction::North)
}

fn cmd_east(world: &mut World, id: ActorId, args: &str) -> Duration {
    move_actor(world, id, args, Direction::East)
}

fn cmd_south(world: &mut World, id: ActorId, args: &str) -> Duration {
    move_actor(world, id, args, Direction::South)
}

fn cmd_west(world: &mut World, id: ActorId, args: &str) -> Duration {
    move_actor(world, id, args, Direction::West)
}

fn cmd_up(world: &mut World, id: ActorId, args: &str) -> Duration {
    move_actor(world, id, args, Direction::Up)
}

fn cmd_down(world: &mut World, id: ActorId, args: &str) -> Duration {
    move_actor(world, id, args, Direction::Down)
}

fn move_actor(world: &mut World, id: ActorId, args: &str, direction: Direction) -> Duration {
    let delay = world.rules().move_delay;
    let topology = Arc::clone(world.topology());
    let Some(actor) = world.actor(id) else {
        return delay;
    };
    if !args.is_empty() {
        actor.send(MessageKind::Environment, EXTRA_ARGS);
        return delay;
    }

    let from = actor.location;
    let exit = topology
        .room(from)
        .and_then(|room| room.exits.iter().find(|e| e.direction == direction));
    let Some(exit) = exit else {
        actor.send(MessageKind::Environment, "You cannot go that way.\n");
        return delay;
    };
    let Some(target) = exit.to.and_then(|to| topology.room(to)) else {
        actor.send(MessageKind::Environment, "Error trying to move in that direction\n");
        return delay;
    };

    let name = actor.name.clone();
    world.broadcast_room(
        from,
        Some(id),
        &ServerMessage::environment(format!("{name} leaves {direction}.\n")),
    );

    let Some(actor) = world.actor_mut(id) else {
        return delay;
    };
    actor.location = target.id;
    let seen = actor.visited.contains(target.id);
    actor.visited.set(target.id);

    world.broadcast_room(
        target.id,
        Some(id),
        &ServerMessage::environment(format!("{name} arrives.\n")),
    );
    show_room(world, id, !seen);
    delay
}

fn cmd_recall(world: &mut World, id: ActorId, args: &str) -> Duration {
    let delay = world.rules().move_delay;
    let Some(actor) = world.actor(id) else {
        return delay;
    };
    if !args.is_empty() {
        actor.send(MessageKind::Environment, EXTRA_ARGS);
        return delay;
    }

    let (from, to, name) = (actor.location, actor.start_location, actor.name.clone());
    if !world.topology().contains(to) {
        actor.send(MessageKind::Error, "You have nowhere to recall to.\n");
        return delay;
    }
    if from != to {
        world.broadcast_room(
            from,
            Some(id),
            &ServerMessage::environment(format!("{name} disappears.\n")),
        );
        if let Some(actor) = world.actor_mut(id) {
            actor.location = to;
            actor.visited.set(to);
        }
        world.broadcast_room(
            to,
            Some(id),
            &ServerMessage::environment(format!("{name} appears in the middle of the room.\n")),
        );
    }
    show_room(world, id, false);
    delay
}

fn cmd_say(world: &mut World, id: ActorId, args: &str) -> Duration {
    let Some(actor) = world.actor(id) else {
        return Duration::ZERO;
    };
    if args.is_empty() {
        actor.send(MessageKind::Social, "Say what?\n");
        return Duration::ZERO;
    }

    actor.send(MessageKind::Social, format!("You say, '{args}'\n"));
    let heard = ServerMessage::social(format!("{} says, '{args}'\n", actor.name));
    world.broadcast_room(actor.location, Some(id), &heard);
    Duration::ZERO
}

fn cmd_who(world: &mut World, id: ActorId, _args: &str) -> Duration {
    let mut text = String::from("Players online:\n");
    let mut count = 0;
    for player in world.actors().filter(|a| a.is_player()) {
        text.push_str("  ");
        text.push_str(&player.name);
        text.push('\n');
        count += 1;
    }
    text.push_str(&format!("{count} player{} online.\n", if count == 1 { "" } else { "s" }));
    world.send_to(id, ServerMessage::environment(text));
    Duration::ZERO
}

fn cmd_quit(world: &mut World, id: ActorId, _args: &str) -> Duration {
    let Some(actor) = world.actor(id) else {
        return Duration::ZERO;
    };
    actor.send(MessageKind::Environment, "Goodbye.\n");
    let left = ServerMessage::environment(format!("{} has left the game.\n", actor.name));
    world.broadcast_room(actor.location, Some(id), &left);
    world.despawn(id);
    Duration::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_verbs_and_lanes() {
        let table = builtin_commands();
        for (verb, name, lane) in [
            ("l", "look", Lane::Fast),
            ("n", "north", Lane::Slow),
            ("d", "down", Lane::Slow),
            ("recall", "recall", Lane::Slow),
            ("'", "say", Lane::Fast),
            ("who", "who", Lane::Fast),
            ("quit", "quit", Lane::Fast),
        ] {
            let command = table.get(verb).unwrap();
            assert_eq!(command.name, name);
            assert_eq!(command.lane, lane);
        }
        assert!(table.get("q").is_none());
    }
}
