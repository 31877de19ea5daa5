//! # Delivery Primitives
//!
//! Handoff from the world actor to per-connection consumers.

mod mailbox;

pub use mailbox::{Mailbox, RecvTimeout, SendOutcome, DEFAULT_MAILBOX_CAPACITY};
