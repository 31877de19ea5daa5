//! # Event Scheduling
//!
//! Priority-ordered delayed execution against exclusively owned state.
//!
//! - [`TimedEvent`]: an absolute wake time paired with a one-shot action
//! - [`Scheduler`] / [`EventQueue`]: many-producer, single-consumer handoff ordered by wake time
//! - [`WorldActor`]: the single thread that drains the queue and runs actions inline

mod actor;
mod event;
mod queue;

pub use actor::{ActorError, ActorHandle, ActorPhase, ActorStats, WakeTimer, WorldActor};
pub use event::{Action, TimedEvent};
pub use queue::{EventQueue, Scheduler, SchedulerStats};
