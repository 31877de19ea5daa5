//! Deferred world mutations.

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

/// A one-shot mutation of the world state `S`.
///
/// Actions run on the world actor thread, one at a time, and must not block
/// on external I/O. Anything that needs to wait schedules a follow-up event.
pub type Action<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// A deferred world mutation with an absolute wake time.
///
/// `fire_at` cannot change once the event exists; the only way to "move" an
/// event is to schedule a new one.
pub struct TimedEvent<S> {
    fire_at: Instant,
    action: Action<S>,
}

impl<S> TimedEvent<S> {
    /// Creates an event that wakes at `fire_at`.
    pub fn at<F>(fire_at: Instant, action: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        Self {
            fire_at,
            action: Box::new(action),
        }
    }

    /// Creates an event that wakes `delay` from now.
    pub fn after<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        Self::at(Instant::now() + delay, action)
    }

    /// Returns the wake time.
    #[inline]
    #[must_use]
    pub const fn fire_at(&self) -> Instant {
        self.fire_at
    }

    /// Returns true if the event may run at `now`.
    #[inline]
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.fire_at <= now
    }

    /// Consumes the event, running its action against `state`.
    pub fn fire(self, state: &mut S) {
        (self.action)(state);
    }
}

impl<S> fmt::Debug for TimedEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedEvent")
            .field("fire_at", &self.fire_at)
            .finish_non_exhaustive()
    }
}

// Min-heap on `fire_at`: Rust's BinaryHeap is a max-heap, so the ordering is
// reversed. Equal wake times compare equal; their relative order is unspecified.
impl<S> PartialEq for TimedEvent<S> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at
    }
}

impl<S> Eq for TimedEvent<S> {}

impl<S> PartialOrd for TimedEvent<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for TimedEvent<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.fire_at.cmp(&self.fire_at)
    }
}
