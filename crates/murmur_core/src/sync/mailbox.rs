//! # Outbound Mailbox
//!
//! Bounded per-connection queue between the world actor (producer) and a
//! delivery thread (consumer).
//!
//! ```text
//!   WorldActor ──send()──> [VecDeque, drop-oldest] ──recv()──> delivery ──> socket
//!   (never waits)               ▲        │
//!                               └ close ─┘ (wakes the consumer)
//! ```
//!
//! The producer side takes the lock only long enough to push. A slow socket
//! makes the queue grow until it is full; from then on the oldest message is
//! discarded for every new one.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Messages buffered per connection before the oldest are discarded.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1000;

/// Result of [`Mailbox::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was queued with room to spare.
    Queued,
    /// The message was queued after discarding this many older messages.
    QueuedDroppingOldest(usize),
    /// The mailbox is closed; the message was discarded.
    Closed,
}

/// Result of [`Mailbox::recv_timeout`].
#[derive(Debug, PartialEq, Eq)]
pub enum RecvTimeout<M> {
    /// A message was dequeued.
    Message(M),
    /// Nothing arrived before the timeout.
    Timeout,
    /// The mailbox is closed and drained.
    Closed,
}

struct State<M> {
    queue: VecDeque<M>,
    capacity: usize,
    closed: bool,
    dropped: u64,
    overflowing: bool,
}

struct Shared<M> {
    state: Mutex<State<M>>,
    not_empty: Condvar,
}

/// Cloneable handle to a bounded drop-oldest queue.
pub struct Mailbox<M> {
    shared: Arc<Shared<M>>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M> Default for Mailbox<M> {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl<M> Mailbox<M> {
    /// Creates an open mailbox holding at most `capacity` messages
    /// (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    queue: VecDeque::with_capacity(capacity.min(64)),
                    capacity,
                    closed: false,
                    dropped: 0,
                    overflowing: false,
                }),
                not_empty: Condvar::new(),
            }),
        }
    }

    /// Enqueues `msg` without waiting.
    ///
    /// When full, the oldest message is discarded to make room.
    pub fn send(&self, msg: M) -> SendOutcome {
        let mut state = self.shared.state.lock();
        if state.closed {
            return SendOutcome::Closed;
        }

        let mut evicted = 0;
        while state.queue.len() >= state.capacity {
            state.queue.pop_front();
            evicted += 1;
        }
        state.queue.push_back(msg);

        let outcome = if evicted == 0 {
            state.overflowing = false;
            SendOutcome::Queued
        } else {
            state.dropped += evicted as u64;
            if !state.overflowing {
                state.overflowing = true;
                tracing::warn!(
                    capacity = state.capacity,
                    dropped_total = state.dropped,
                    "outbound mailbox full; dropping oldest messages"
                );
            }
            SendOutcome::QueuedDroppingOldest(evicted)
        };
        drop(state);

        self.shared.not_empty.notify_one();
        outcome
    }

    /// Marks the mailbox closed and wakes the consumer.
    ///
    /// Later sends are discarded. Messages already queued can still be
    /// received. Calling this more than once has no further effect.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.shared.not_empty.notify_all();
    }

    /// Waits for the next message.
    ///
    /// Returns `None` only once the mailbox is closed and empty.
    pub fn recv(&self) -> Option<M> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(msg) = state.queue.pop_front() {
                return Some(msg);
            }
            if state.closed {
                return None;
            }
            self.shared.not_empty.wait(&mut state);
        }
    }

    /// Waits at most `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> RecvTimeout<M> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(msg) = state.queue.pop_front() {
                return RecvTimeout::Message(msg);
            }
            if state.closed {
                return RecvTimeout::Closed;
            }
            if self
                .shared
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return match state.queue.pop_front() {
                    Some(msg) => RecvTimeout::Message(msg),
                    None if state.closed => RecvTimeout::Closed,
                    None => RecvTimeout::Timeout,
                };
            }
        }
    }

    /// Dequeues a message if one is ready.
    pub fn try_recv(&self) -> Option<M> {
        self.shared.state.lock().queue.pop_front()
    }

    /// Messages currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().queue.is_empty()
    }

    /// Returns true once [`Mailbox::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Maximum queued messages.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }

    /// Total messages discarded by overflow.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.state.lock().dropped
    }
}

impl<M: Clone> Mailbox<M> {
    /// Copy of the queued messages, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<M> {
        self.shared.state.lock().queue.iter().cloned().collect()
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Mailbox")
            .field("len", &state.queue.len())
            .field("capacity", &state.capacity)
            .field("closed", &state.closed)
            .field("dropped", &state.dropped)
            .finish()
    }
}
