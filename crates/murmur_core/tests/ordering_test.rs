//! # Event Ordering Integration Test
//!
//! Drives a spawned world actor from several producer threads and checks
//! that mutations happen one at a time, in wake-time order.

use murmur_core::{EventQueue, Scheduler, WorldActor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Test: Distinct wake times execute in strictly increasing order.
#[test]
fn test_distinct_fire_times_execute_in_order() {
    let (scheduler, queue) = EventQueue::<Vec<u64>>::bounded(EventQueue::<Vec<u64>>::DEFAULT_CAPACITY);
    let base = Instant::now() + Duration::from_millis(50);

    // Submit in a scrambled order.
    let offsets: Vec<u64> = (0..40).map(|i| (i * 17) % 40).collect();
    for &offset in &offsets {
        scheduler.schedule_at(base + Duration::from_millis(offset * 2), move |log| {
            log.push(offset);
        });
    }

    let handle = WorldActor::new(Vec::new(), queue).spawn("order-test").unwrap();
    thread::sleep(Duration::from_millis(300));
    let log = handle.join().unwrap();

    let expected: Vec<u64> = (0..40).collect();
    assert_eq!(log, expected);
}

/// Test: Equal delays from the same instant both run (no starvation).
#[test]
fn test_equal_fire_times_all_execute() {
    let (scheduler, queue) = EventQueue::<Vec<&'static str>>::bounded(8);
    let at = Instant::now() + Duration::from_millis(10);
    scheduler.schedule_at(at, |log| log.push("a"));
    scheduler.schedule_at(at, |log| log.push("b"));

    let handle = WorldActor::new(Vec::new(), queue).spawn("tie-test").unwrap();
    thread::sleep(Duration::from_millis(80));
    let mut log = handle.join().unwrap();
    log.sort_unstable();
    assert_eq!(log, vec!["a", "b"]);
}

/// Test: A later submission with an earlier wake time runs first.
///
/// Connection A schedules a move 100ms out; connection B submits 5ms later
/// with a wake time computed before A's.
#[test]
fn test_later_submitted_earlier_fire_at_runs_first() {
    let (scheduler, queue) = EventQueue::<Vec<char>>::bounded(8);
    let handle = WorldActor::new(Vec::new(), queue).spawn("preempt-test").unwrap();

    let b_fire_at = Instant::now() + Duration::from_millis(40);
    let a = scheduler.clone();
    a.schedule(|log| log.push('A'), Duration::from_millis(100));

    thread::sleep(Duration::from_millis(5));
    let b = scheduler.clone();
    b.schedule_at(b_fire_at, |log| log.push('B'));

    thread::sleep(Duration::from_millis(250));
    let log = handle.join().unwrap();
    assert_eq!(log, vec!['B', 'A']);
}

/// World state instrumented with a non-reentrant guard.
struct Guarded {
    inside: Arc<AtomicBool>,
    mutations: u64,
    reentered: bool,
}

impl Guarded {
    fn mutate(&mut self) {
        if self.inside.swap(true, Ordering::AcqRel) {
            self.reentered = true;
        }
        // Widen the window for an overlapping writer.
        thread::yield_now();
        self.mutations += 1;
        self.inside.store(false, Ordering::Release);
    }
}

/// Test: Concurrent producers never cause overlapping mutations.
#[test]
fn test_mutation_never_reentered_under_concurrent_load() {
    const PRODUCERS: u64 = 8;
    const PER_PRODUCER: u64 = 200;

    let (scheduler, queue) = EventQueue::<Guarded>::bounded(1024);
    let state = Guarded {
        inside: Arc::new(AtomicBool::new(false)),
        mutations: 0,
        reentered: false,
    };
    let handle = WorldActor::new(state, queue).spawn("guard-test").unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|_| {
            let scheduler: Scheduler<Guarded> = scheduler.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    scheduler.schedule(Guarded::mutate, Duration::from_micros(i % 7));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.stats().executed < PRODUCERS * PER_PRODUCER && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    let stats = scheduler.stats();
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.handed_off + stats.deferred, PRODUCERS * PER_PRODUCER);

    let state = handle.join().unwrap();
    assert!(!state.reentered, "world state mutated concurrently");
    assert_eq!(state.mutations, PRODUCERS * PER_PRODUCER);
}

/// Test: Shutdown discards work that has not fired yet.
#[test]
fn test_shutdown_discards_pending_events() {
    let (scheduler, queue) = EventQueue::<u32>::bounded(8);
    scheduler.schedule(|n| *n += 1, Duration::ZERO);
    scheduler.schedule(|n| *n += 100, Duration::from_secs(60));

    let handle = WorldActor::new(0, queue).spawn("shutdown-test").unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(handle.join().unwrap(), 1);
}
