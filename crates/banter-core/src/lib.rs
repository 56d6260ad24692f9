//! Pure registry logic for the banter realtime layer.
//!
//! This crate holds the two in-memory registries behind every delivery
//! decision: the session registry (who is connected, through which handle)
//! and the room tracker (which rooms each connection has joined). Both are
//! plain data structures with `&mut self` operations and no I/O, no
//! locking, and no async - the owning layer decides the concurrency
//! discipline. That keeps every invariant testable with direct calls.
//!
//! Absence is a value here, not a fault: operations return `bool` or
//! `Option` and there is no error type.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod rooms;
mod session;

pub use rooms::RoomTracker;
pub use session::{SessionEntry, SessionRegistry};
