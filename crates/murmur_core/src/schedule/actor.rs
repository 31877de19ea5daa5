//! # World Actor
//!
//! The single thread with write access to world state.
//!
//! ## State Machine
//!
//! ```text
//!            event arrives, not due           timer fires
//!   ┌──────┐ ─────────────────────> ┌─────────┐ ──────────┐
//!   │ Idle │                        │ Waiting │           │
//!   └──────┘ <───────────────────── └─────────┘ <───┐     ▼
//!       │       queue empty              │          │  ┌───────────┐
//!       │                                └──────────┼─>│ Executing │
//!       └───────── event due ───────────────────────┴──└───────────┘
//! ```
//!
//! ## Rules
//!
//! - At most one event executes at a time, inline on this thread
//! - An action never blocks on I/O; waiting means scheduling a follow-up
//! - A single wake timer is armed for the earliest pending event and only
//!   ever moved earlier while waiting
//! - A panicking action is fatal: the world has no recovery for
//!   half-applied mutations

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use super::event::TimedEvent;
use super::queue::EventQueue;

/// Errors from the world actor lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// The OS refused to start the actor thread.
    #[error("failed to spawn world actor thread: {0}")]
    Spawn(#[from] io::Error),

    /// An action panicked; world state is lost.
    #[error("world actor panicked while executing an event")]
    Panicked,
}

/// Observable phase of the actor loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ActorPhase {
    /// No pending events, no timer armed.
    Idle = 0,
    /// Timer armed for the earliest pending event.
    Waiting = 1,
    /// Running exactly one event's action.
    Executing = 2,
    /// Loop has exited.
    Stopped = 3,
}

impl ActorPhase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Waiting,
            2 => Self::Executing,
            _ => Self::Stopped,
        }
    }
}

/// Actor loop statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActorStats {
    /// Events executed.
    pub executed: u64,
    /// Times the wake timer was armed or moved earlier.
    pub timer_rearms: u64,
    /// Times the loop woke because the timer expired.
    pub timer_wakeups: u64,
    /// Largest observed delay between `fire_at` and execution start.
    pub max_lateness: Duration,
}

/// The single wake deadline of the actor.
///
/// Coalesces every pending deadline into one: arming with a later time than
/// the one already armed is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct WakeTimer {
    armed: Option<Instant>,
}

impl WakeTimer {
    /// Creates a disarmed timer.
    #[must_use]
    pub const fn new() -> Self {
        Self { armed: None }
    }

    /// Arms the timer for `deadline` if nothing is armed or `deadline` is
    /// earlier than the armed time. Returns true if the deadline changed.
    pub fn arm(&mut self, deadline: Instant) -> bool {
        match self.armed {
            Some(current) if current <= deadline => false,
            _ => {
                self.armed = Some(deadline);
                true
            }
        }
    }

    /// Cancels the armed deadline.
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// The armed deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.armed
    }

    /// Returns true if armed and expired at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.armed.is_some_and(|d| d <= now)
    }
}

/// What woke the actor out of `Idle`/`Waiting`.
enum Wake<S> {
    Event(TimedEvent<S>),
    Timer,
    ProducersGone,
    Shutdown,
}

/// Owner of world state `S` and the consumer end of its [`EventQueue`].
pub struct WorldActor<S> {
    state: S,
    queue: EventQueue<S>,
    timer: WakeTimer,
    producers_gone: bool,
    // Keeps the shutdown channel open for `run` on the caller's thread.
    // `spawn` hands the only sender to the handle instead.
    _shutdown_tx: Option<Sender<()>>,
    shutdown_rx: Receiver<()>,
    phase: Arc<AtomicU8>,
    stats: Arc<Mutex<ActorStats>>,
}

impl<S: Send + 'static> WorldActor<S> {
    /// Creates an actor owning `state` and consuming `queue`.
    #[must_use]
    pub fn new(state: S, queue: EventQueue<S>) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        Self {
            state,
            queue,
            timer: WakeTimer::new(),
            producers_gone: false,
            _shutdown_tx: Some(shutdown_tx),
            shutdown_rx,
            phase: Arc::new(AtomicU8::new(ActorPhase::Idle as u8)),
            stats: Arc::new(Mutex::new(ActorStats::default())),
        }
    }

    /// Starts the loop on a dedicated named thread.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Spawn`] if the thread cannot be created.
    pub fn spawn(mut self, name: &str) -> Result<ActorHandle<S>, ActorError> {
        let (shutdown, shutdown_rx) = bounded(1);
        self.shutdown_rx = shutdown_rx;
        self._shutdown_tx = None;
        let phase = Arc::clone(&self.phase);
        let stats = Arc::clone(&self.stats);
        let join = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || self.run())?;
        tracing::debug!(thread = name, "world actor started");
        Ok(ActorHandle {
            join,
            shutdown,
            phase,
            stats,
        })
    }

    /// Runs the loop on the current thread until shutdown, returning the
    /// final world state.
    ///
    /// Also returns once every producer is gone and nothing is pending.
    pub fn run(mut self) -> S {
        loop {
            self.queue.drain_incoming();

            let now = Instant::now();
            if let Some(event) = self.queue.pop_ready(now) {
                if self.shutdown_requested() {
                    self.queue.push(event);
                    break;
                }
                self.execute(event, now);
                continue;
            }

            let wake = match self.queue.next_fire_at() {
                None => {
                    if self.producers_gone {
                        break;
                    }
                    self.timer.disarm();
                    self.set_phase(ActorPhase::Idle);
                    self.wait(None)
                }
                Some(next) => {
                    if self.timer.arm(next) {
                        self.stats.lock().timer_rearms += 1;
                    }
                    self.set_phase(ActorPhase::Waiting);
                    self.wait(self.timer.deadline())
                }
            };

            match wake {
                Wake::Event(event) => self.queue.push(event),
                Wake::Timer => {
                    // The deadline was handed to the wait itself, so there is
                    // no separately fired timer left to drain before rearming.
                    self.timer.disarm();
                    self.stats.lock().timer_wakeups += 1;
                }
                Wake::ProducersGone => self.producers_gone = true,
                Wake::Shutdown => break,
            }
        }

        let pending = self.queue.len() + self.queue.in_flight();
        self.set_phase(ActorPhase::Stopped);
        let stats = *self.stats.lock();
        tracing::info!(
            executed = stats.executed,
            discarded = pending,
            max_lateness_us = u64::try_from(stats.max_lateness.as_micros()).unwrap_or(u64::MAX),
            "world actor stopped"
        );
        self.state
    }

    fn execute(&mut self, event: TimedEvent<S>, now: Instant) {
        // No timer runs while an event executes.
        self.timer.disarm();
        self.set_phase(ActorPhase::Executing);

        let lateness = now.saturating_duration_since(event.fire_at());
        event.fire(&mut self.state);

        let mut stats = self.stats.lock();
        stats.executed += 1;
        stats.max_lateness = stats.max_lateness.max(lateness);
    }

    /// A busy loop never reaches `wait`, so shutdown is polled between events.
    fn shutdown_requested(&self) -> bool {
        !matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Empty))
    }

    fn wait(&self, deadline: Option<Instant>) -> Wake<S> {
        let incoming = self.queue.receiver();
        let shutdown = &self.shutdown_rx;

        if self.producers_gone {
            // Only the timer or a shutdown can wake us now.
            return match deadline {
                Some(d) => select! {
                    recv(shutdown) -> _ => Wake::Shutdown,
                    default(d.saturating_duration_since(Instant::now())) => Wake::Timer,
                },
                None => Wake::Shutdown,
            };
        }

        match deadline {
            Some(d) => select! {
                recv(incoming) -> msg => msg.map_or(Wake::ProducersGone, Wake::Event),
                recv(shutdown) -> _ => Wake::Shutdown,
                default(d.saturating_duration_since(Instant::now())) => Wake::Timer,
            },
            None => select! {
                recv(incoming) -> msg => msg.map_or(Wake::ProducersGone, Wake::Event),
                recv(shutdown) -> _ => Wake::Shutdown,
            },
        }
    }

    fn set_phase(&self, phase: ActorPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

impl<S> fmt::Debug for WorldActor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldActor")
            .field("pending", &self.queue.len())
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

/// Handle to a running [`WorldActor`].
///
/// Dropping the handle without calling [`ActorHandle::join`] also stops the
/// actor, because the shutdown channel disconnects.
pub struct ActorHandle<S> {
    join: JoinHandle<S>,
    shutdown: Sender<()>,
    phase: Arc<AtomicU8>,
    stats: Arc<Mutex<ActorStats>>,
}

impl<S> ActorHandle<S> {
    /// Asks the loop to stop before executing any further event.
    ///
    /// Pending events are discarded; scheduled work does not survive a stop.
    pub fn shutdown(&self) {
        // A full channel means a stop is already pending.
        let _ = self.shutdown.try_send(());
    }

    /// Current loop phase.
    #[must_use]
    pub fn phase(&self) -> ActorPhase {
        ActorPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Snapshot of loop statistics.
    #[must_use]
    pub fn stats(&self) -> ActorStats {
        *self.stats.lock()
    }

    /// Returns true once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stops the actor and returns the final world state.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Panicked`] if an action panicked.
    pub fn join(self) -> Result<S, ActorError> {
        self.shutdown();
        self.join.join().map_err(|_| ActorError::Panicked)
    }
}

impl<S> fmt::Debug for ActorHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("phase", &self.phase())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Scheduler;

    #[test]
    fn test_wake_timer_coalesces_to_earliest() {
        let base = Instant::now();
        let mut timer = WakeTimer::new();
        assert!(timer.arm(base + Duration::from_millis(50)));
        assert!(!timer.arm(base + Duration::from_millis(80)));
        assert!(timer.arm(base + Duration::from_millis(10)));
        assert_eq!(timer.deadline(), Some(base + Duration::from_millis(10)));
        assert!(timer.is_due(base + Duration::from_millis(10)));

        timer.disarm();
        assert!(!timer.is_due(base + Duration::from_secs(1)));
        assert!(timer.arm(base + Duration::from_millis(80)));
    }

    #[test]
    fn test_executes_in_fire_order() {
        let (scheduler, queue) = EventQueue::<Vec<u32>>::bounded(16);
        let base = Instant::now() + Duration::from_millis(20);
        scheduler.schedule_at(base + Duration::from_millis(30), |log| log.push(3));
        scheduler.schedule_at(base + Duration::from_millis(10), |log| log.push(1));
        scheduler.schedule_at(base + Duration::from_millis(20), |log| log.push(2));

        let handle = WorldActor::new(Vec::new(), queue).spawn("test-order").unwrap();
        thread::sleep(Duration::from_millis(150));
        let log = handle.join().unwrap();
        assert_eq!(log, vec![1, 2, 3]);
    }

    #[test]
    fn test_earlier_event_preempts_armed_timer() {
        let (scheduler, queue) = EventQueue::<Vec<&'static str>>::bounded(16);
        let handle = WorldActor::new(Vec::new(), queue).spawn("test-preempt").unwrap();

        scheduler.schedule(|log| log.push("late"), Duration::from_millis(200));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.phase(), ActorPhase::Waiting);

        scheduler.schedule(|log| log.push("early"), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(300));

        let stats = handle.stats();
        assert_eq!(stats.executed, 2);
        assert!(stats.timer_rearms >= 2);
        let log = handle.join().unwrap();
        assert_eq!(log, vec!["early", "late"]);
    }

    #[test]
    fn test_actions_schedule_follow_ups() {
        struct Counter {
            hits: u32,
            scheduler: Option<Scheduler<Counter>>,
        }

        let (scheduler, queue) = EventQueue::<Counter>::bounded(4);
        let state = Counter {
            hits: 0,
            scheduler: Some(scheduler.clone()),
        };
        let handle = WorldActor::new(state, queue).spawn("test-follow-up").unwrap();

        fn tick(counter: &mut Counter) {
            counter.hits += 1;
            if counter.hits < 5 {
                if let Some(s) = &counter.scheduler {
                    s.schedule(tick, Duration::from_millis(1));
                }
            }
        }
        scheduler.schedule(tick, Duration::ZERO);
        thread::sleep(Duration::from_millis(100));

        let state = handle.join().unwrap();
        assert_eq!(state.hits, 5);
    }

    #[test]
    fn test_idle_when_empty_and_stops_on_shutdown() {
        let (_scheduler, queue) = EventQueue::<()>::bounded(4);
        let handle = WorldActor::new((), queue).spawn("test-idle").unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(handle.phase(), ActorPhase::Idle);

        handle.shutdown();
        thread::sleep(Duration::from_millis(20));
        assert!(handle.is_finished());
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_shutdown_stops_busy_loop() {
        struct Spinner {
            spins: u64,
            scheduler: Scheduler<Spinner>,
        }

        fn spin(state: &mut Spinner) {
            state.spins += 1;
            state.scheduler.schedule(spin, Duration::ZERO);
        }

        let (scheduler, queue) = EventQueue::<Spinner>::bounded(4);
        let state = Spinner {
            spins: 0,
            scheduler: scheduler.clone(),
        };
        scheduler.schedule(spin, Duration::ZERO);
        let handle = WorldActor::new(state, queue).spawn("test-busy").unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(handle.stats().executed > 0);

        handle.shutdown();
        thread::sleep(Duration::from_millis(100));
        assert!(handle.is_finished());
        assert_eq!(handle.phase(), ActorPhase::Stopped);
        let state = handle.join().unwrap();
        assert!(state.spins > 0);
    }

    #[test]
    fn test_dropping_handle_stops_actor() {
        let (scheduler, queue) = EventQueue::<u32>::bounded(4);
        let handle = WorldActor::new(0, queue).spawn("test-drop").unwrap();
        let phase = Arc::clone(&handle.phase);
        drop(handle);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(ActorPhase::from_u8(phase.load(Ordering::Acquire)), ActorPhase::Stopped);
        drop(scheduler);
    }

    #[test]
    fn test_exits_when_producers_gone_and_drained() {
        let (scheduler, queue) = EventQueue::<u32>::bounded(4);
        scheduler.schedule(|n| *n += 1, Duration::from_millis(5));
        drop(scheduler);

        let n = WorldActor::new(0, queue).run();
        assert_eq!(n, 1);
    }
}
