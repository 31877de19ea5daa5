//! # Command Table
//!
//! Maps verbs typed by players to handlers. Built once at startup and shared
//! read-only between the world and every session.
//!
//! A handler runs on the world actor thread with exclusive access to the
//! [`World`]. It performs all of its mutation synchronously, reports results
//! by sending messages, and returns the minimum delay before the same actor
//! may run another command on the same [`Lane`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::actor::{ActorId, Lane};
use crate::world::World;

/// Signature of a command implementation: world, acting actor, argument
/// text (already trimmed).
pub type CommandHandler = fn(&mut World, ActorId, &str) -> Duration;

/// A registered command.
#[derive(Clone, Copy)]
pub struct Command {
    /// Canonical verb.
    pub name: &'static str,
    /// Throttle lane.
    pub lane: Lane,
    /// Implementation.
    pub handler: CommandHandler,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("lane", &self.lane)
            .finish_non_exhaustive()
    }
}

/// Verb and alias lookup.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Vec<Command>,
    verbs: HashMap<&'static str, usize>,
}

impl CommandTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command` under its name and each alias. Later
    /// registrations replace earlier ones for the same verb.
    pub fn register(&mut self, command: Command, aliases: &[&'static str]) {
        let index = self.commands.len();
        self.commands.push(command);
        self.verbs.insert(command.name, index);
        for &alias in aliases {
            self.verbs.insert(alias, index);
        }
    }

    /// Looks up a verb exactly (case-sensitive).
    #[must_use]
    pub fn get(&self, verb: &str) -> Option<&Command> {
        self.verbs.get(verb).map(|&i| &self.commands[i])
    }

    /// Splits `line` into verb and arguments and looks up the verb.
    ///
    /// The verb ends at the first whitespace character; the remainder is
    /// trimmed. A line starting with whitespace has an empty verb and never
    /// matches.
    #[must_use]
    pub fn parse<'l>(&self, line: &'l str) -> Option<(&Command, &'l str)> {
        let (verb, rest) = split_command(line);
        if verb.is_empty() {
            return None;
        }
        self.get(verb).map(|command| (command, rest))
    }

    /// Canonical names of registered commands, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.iter().map(|c| c.name)
    }

    /// Number of registered verbs, aliases included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.verbs.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }
}

fn split_command(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(space) => (&line[..space], line[space..].trim()),
        None => (line, ""),
    }
}
