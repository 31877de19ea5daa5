//! # Connection Session
//!
//! Adapts one transport to the world actor.
//!
//! ## Lifecycle
//!
//! ```text
//!   attach ──> spawn event ──> ready (or timeout)
//!      │
//!      ├──> delivery thread: mailbox ──> writer
//!      │
//!      └──> read loop: frame ──> decode ──> verb lookup ──> gate ticket ──> schedule
//!              │
//!              └── close / error ──> close mailbox ──> despawn event ──> join delivery
//! ```
//!
//! The session never touches world state. Everything it needs from the
//! world goes through a scheduled event, and everything the world says comes
//! back through the mailbox.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use murmur_core::{Mailbox, Scheduler, DEFAULT_MAILBOX_CAPACITY};
use murmur_shared::{decode_request, ServerMessage, GUEST_NAME};
use murmur_world::{ActorId, CommandGate, CommandTable, World, DEFAULT_MAX_BACKLOG};

use super::delivery::{run_delivery, DeliveryStats};
use super::ConnectionId;
use crate::error::{ServerError, ServerResult};
use crate::transport::{FrameReader, FrameWriter};

const UNKNOWN_VERB: &str = "Huh?";
const UNREADABLE: &str = "I could not read that request.\n";
const NON_TEXT: &str = "Only text frames are understood.\n";
const BACKLOGGED: &str = "You are doing too much at once. Slow down.\n";

/// Per-connection settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Name of the guest actor.
    pub guest_name: String,
    /// Outbound mailbox capacity.
    pub mailbox_capacity: usize,
    /// Commands that may be waiting before input is refused.
    pub max_backlog: usize,
    /// How long to wait for the world to attach the player.
    pub attach_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            guest_name: GUEST_NAME.to_owned(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            max_backlog: DEFAULT_MAX_BACKLOG,
            attach_timeout: Duration::from_secs(5),
        }
    }
}

/// What happened during one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// The player actor the session drove.
    pub actor: ActorId,
    /// Commands scheduled on the world.
    pub commands: u64,
    /// Inputs answered with an error instead of being scheduled.
    pub rejected: u64,
    /// Outbound side.
    pub delivery: DeliveryStats,
}

/// One connected client.
pub struct ConnectionSession<R> {
    connection: ConnectionId,
    reader: R,
    scheduler: Scheduler<World>,
    commands: Arc<CommandTable>,
    settings: SessionSettings,
}

/// Handles shared by the read loop and the world for one player.
struct Link {
    actor: ActorId,
    mailbox: Mailbox<ServerMessage>,
    gate: CommandGate,
}

impl<R: FrameReader> ConnectionSession<R> {
    /// Creates a session reading from `reader`.
    ///
    /// `commands` must be the table the world was built with; the session
    /// uses it only to reject unknown verbs early.
    #[must_use]
    pub fn new(
        connection: ConnectionId,
        reader: R,
        scheduler: Scheduler<World>,
        commands: Arc<CommandTable>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            connection,
            reader,
            scheduler,
            commands,
            settings,
        }
    }

    /// Runs the session to completion on the calling thread.
    ///
    /// Returns once the client is gone and the delivery thread has stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AttachTimeout`] or [`ServerError::WorldGone`]
    /// if the player could not be attached, and [`ServerError::Io`] if the
    /// delivery thread could not be started. Transport errors after attach
    /// end the session normally.
    pub fn run<W>(mut self, mut writer: W) -> ServerResult<SessionSummary>
    where
        W: FrameWriter + 'static,
    {
        let mailbox = Mailbox::new(self.settings.mailbox_capacity);
        let gate = CommandGate::new(self.settings.max_backlog);

        let actor = match self.attach(&mailbox, &gate) {
            Ok(actor) => actor,
            Err(e) => {
                writer.close();
                return Err(e);
            }
        };
        tracing::info!(connection = %self.connection, %actor, "player attached");

        let delivery = {
            let mailbox = mailbox.clone();
            let connection = self.connection;
            thread::Builder::new()
                .name(format!("murmur-delivery-{}", connection.0))
                .spawn(move || run_delivery(connection, &mailbox, writer))
        };
        let delivery = match delivery {
            Ok(handle) => handle,
            Err(e) => {
                mailbox.close();
                self.schedule_despawn(actor);
                return Err(e.into());
            }
        };

        let link = Link {
            actor,
            mailbox,
            gate,
        };
        let mut summary = SessionSummary {
            actor,
            commands: 0,
            rejected: 0,
            delivery: DeliveryStats::default(),
        };

        self.dispatch(&link, "look", &mut summary);
        self.read_loop(&link, &mut summary);

        link.mailbox.close();
        self.schedule_despawn(actor);
        summary.delivery = delivery.join().unwrap_or_else(|_| {
            tracing::error!(connection = %self.connection, "delivery thread panicked");
            DeliveryStats::default()
        });
        tracing::info!(
            connection = %self.connection,
            %actor,
            commands = summary.commands,
            rejected = summary.rejected,
            delivered = summary.delivery.delivered,
            "session ended"
        );
        Ok(summary)
    }

    /// Asks the world to create the player and waits for its id.
    fn attach(
        &self,
        mailbox: &Mailbox<ServerMessage>,
        gate: &CommandGate,
    ) -> ServerResult<ActorId> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let name = self.settings.guest_name.clone();
        let (mailbox, gate) = (mailbox.clone(), gate.clone());
        let connection = self.connection;

        self.scheduler.schedule(
            move |world: &mut World| {
                let actor = world.spawn_player(name, mailbox, gate);
                if ready_tx.send(actor).is_err() {
                    tracing::warn!(%connection, %actor, "session gave up before attach");
                    world.despawn(actor);
                }
            },
            Duration::ZERO,
        );

        match ready_rx.recv_timeout(self.settings.attach_timeout) {
            Ok(actor) => Ok(actor),
            Err(RecvTimeoutError::Timeout) => {
                Err(ServerError::AttachTimeout(self.settings.attach_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ServerError::WorldGone),
        }
    }

    fn read_loop(&mut self, link: &Link, summary: &mut SessionSummary) {
        loop {
            if link.mailbox.is_closed() {
                tracing::debug!(connection = %self.connection, "mailbox closed, ending read loop");
                return;
            }
            match self.reader.read_frame() {
                Ok(Some(frame)) => match decode_request(&frame) {
                    Ok(request) => self.dispatch(link, &request.cmd, summary),
                    Err(e) => {
                        tracing::debug!(connection = %self.connection, error = %e, "bad request");
                        link.mailbox.send(ServerMessage::error(UNREADABLE));
                        summary.rejected += 1;
                    }
                },
                Ok(None) => {
                    tracing::debug!(connection = %self.connection, "client closed the connection");
                    return;
                }
                Err(e) if e.is_recoverable() => {
                    link.mailbox.send(ServerMessage::error(NON_TEXT));
                    summary.rejected += 1;
                }
                Err(e) => {
                    tracing::debug!(connection = %self.connection, error = %e, "read failed");
                    return;
                }
            }
        }
    }

    /// Schedules one command line, or answers it directly if it cannot run.
    fn dispatch(&self, link: &Link, line: &str, summary: &mut SessionSummary) {
        let Some((command, _)) = self.commands.parse(line) else {
            link.mailbox.send(ServerMessage::error(UNKNOWN_VERB));
            summary.rejected += 1;
            return;
        };
        if let Err(e) = link.gate.try_reserve() {
            tracing::debug!(
                connection = %self.connection,
                actor = %link.actor,
                error = %e,
                "input refused"
            );
            link.mailbox.send(ServerMessage::error(BACKLOGGED));
            summary.rejected += 1;
            return;
        }

        // The ticket fixes the order; the delay only avoids waking the world
        // before the lane can run.
        let ticket = link.gate.issue(command.lane);
        let delay = link.gate.delay_for(command.lane, Instant::now());
        let (actor, line) = (link.actor, line.to_owned());
        self.scheduler.schedule(
            move |world: &mut World| world.submit_ticketed(actor, ticket, &line),
            delay,
        );
        summary.commands += 1;
    }

    fn schedule_despawn(&self, actor: ActorId) {
        self.scheduler.schedule(
            move |world: &mut World| {
                world.despawn(actor);
            },
            Duration::ZERO,
        );
    }
}
