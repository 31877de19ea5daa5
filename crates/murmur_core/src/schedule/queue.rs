//! # Event Queue
//!
//! Many producers, exactly one consumer.
//!
//! ## Design
//!
//! ```text
//!   Scheduler (clone per producer) ──> bounded channel ──> EventQueue (min-heap)
//!            │                                ▲
//!            └── channel full ──> detached ───┘
//!                                 send thread
//! ```
//!
//! Producers compute `fire_at` at call time and hand the event over without
//! waiting. Ordering happens on the consumer side, in the heap.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use super::event::TimedEvent;

/// Handoff counters shared by every clone of a [`Scheduler`].
#[derive(Debug, Default)]
struct Counters {
    handed_off: AtomicU64,
    deferred: AtomicU64,
    dropped: AtomicU64,
}

/// Snapshot of scheduler handoff statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Events placed directly into the channel.
    pub handed_off: u64,
    /// Events that found the channel full and were sent from a detached thread.
    pub deferred: u64,
    /// Events dropped because the consumer is gone.
    pub dropped: u64,
}

/// Producer handle for the event queue.
///
/// Cheap to clone; safe to call from any thread, including from inside an
/// action running on the world actor.
pub struct Scheduler<S> {
    sender: Sender<TimedEvent<S>>,
    counters: Arc<Counters>,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<S: 'static> Scheduler<S> {
    /// Schedules `action` to run `delay` from now.
    pub fn schedule<F>(&self, action: F, delay: Duration)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.submit(TimedEvent::after(delay, action));
    }

    /// Schedules `action` to run at the absolute time `fire_at`.
    pub fn schedule_at<F>(&self, fire_at: Instant, action: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.submit(TimedEvent::at(fire_at, action));
    }

    /// Hands an already-built event to the consumer.
    ///
    /// Never blocks: when the channel is momentarily full the send is retried
    /// from a detached thread, so a busy world never stalls a producer.
    pub fn submit(&self, event: TimedEvent<S>) {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.counters.handed_off.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(event)) => self.defer(event),
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("event queue consumer is gone; dropping scheduled event");
            }
        }
    }

    fn defer(&self, event: TimedEvent<S>) {
        self.counters.deferred.fetch_add(1, Ordering::Relaxed);
        let sender = self.sender.clone();
        let counters = Arc::clone(&self.counters);
        let spawned = thread::Builder::new()
            .name("murmur-deferred-send".into())
            .spawn(move || {
                if sender.send(event).is_err() {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("event queue closed before deferred send completed");
                }
            });
        if let Err(e) = spawned {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "could not spawn deferred send; event dropped");
        }
    }

    /// Returns handoff statistics accumulated across all clones.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            handed_off: self.counters.handed_off.load(Ordering::Relaxed),
            deferred: self.counters.deferred.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Consumer side of the event queue.
///
/// Not `Clone`: exactly one thread ever pops.
pub struct EventQueue<S> {
    incoming: Receiver<TimedEvent<S>>,
    pending: BinaryHeap<TimedEvent<S>>,
}

impl<S: 'static> EventQueue<S> {
    /// Default ingress buffer size.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Creates a queue whose ingress channel buffers up to `capacity` events
    /// before producers fall back to deferred sends.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Scheduler<S>, Self) {
        let (sender, incoming) = bounded(capacity.max(1));
        let scheduler = Scheduler {
            sender,
            counters: Arc::new(Counters::default()),
        };
        let queue = Self {
            incoming,
            pending: BinaryHeap::new(),
        };
        (scheduler, queue)
    }
}

impl<S> EventQueue<S> {
    /// Moves everything waiting in the ingress channel into the heap.
    ///
    /// Returns the number of events moved.
    pub fn drain_incoming(&mut self) -> usize {
        let mut moved = 0;
        loop {
            match self.incoming.try_recv() {
                Ok(event) => {
                    self.pending.push(event);
                    moved += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return moved,
            }
        }
    }

    /// Accepts one event delivered outside the channel (already received).
    pub fn push(&mut self, event: TimedEvent<S>) {
        self.pending.push(event);
    }

    /// Pops the earliest pending event if it is due at `now`.
    pub fn pop_ready(&mut self, now: Instant) -> Option<TimedEvent<S>> {
        if self.pending.peek().is_some_and(|e| e.is_due(now)) {
            self.pending.pop()
        } else {
            None
        }
    }

    /// Wake time of the earliest pending event.
    #[must_use]
    pub fn next_fire_at(&self) -> Option<Instant> {
        self.pending.peek().map(TimedEvent::fire_at)
    }

    /// Number of events in the heap (not counting the ingress channel).
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if the heap holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of events still sitting in the ingress channel.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.incoming.len()
    }

    /// The ingress receiver, for the actor's wait loop.
    pub(crate) fn receiver(&self) -> &Receiver<TimedEvent<S>> {
        &self.incoming
    }
}
