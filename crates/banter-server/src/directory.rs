//! Group directory collaborator.
//!
//! Group membership is owned by group management, which lives outside this
//! crate. The directory answers one question (which rooms does this user
//! belong to?) and is consulted once per connect to rebuild the user's room
//! set. The trait is synchronous: implementations must answer from memory or
//! a local cache, because the caller invokes it directly on the connection
//! task.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use banter_proto::{RoomId, UserId};
use thiserror::Error;

/// Errors from a group directory lookup.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backing store could not answer the lookup.
    #[error("directory unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },
}

/// Source of truth for group membership.
///
/// Must be Clone (shared across connection tasks), Send + Sync (thread-safe),
/// and synchronous (no async methods). Implementations typically share
/// internal state via Arc, so clones answer from the same underlying data.
///
/// A lookup failure degrades the affected connection to an empty room set
/// until the next reconnect; it does not reject the connection.
pub trait GroupDirectory: Clone + Send + Sync + 'static {
    /// Rooms the user currently belongs to. Order is not significant.
    fn groups_for_user(&self, user: &UserId) -> Result<Vec<RoomId>, DirectoryError>;
}

/// In-memory group directory for testing and demo deployments.
///
/// All state is wrapped in Arc<Mutex<>> to allow Clone and concurrent access.
/// Uses `lock().expect()` which will panic if the mutex is poisoned -
/// acceptable for test code.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    inner: Arc<Mutex<HashMap<UserId, HashSet<RoomId>>>>,
}

impl MemoryDirectory {
    /// Create a new empty `MemoryDirectory`.
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Record that `user` belongs to `room`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock). This is acceptable for test code.
    #[allow(clippy::expect_used)]
    pub fn record_membership(&self, user: UserId, room: RoomId) {
        self.inner.lock().expect("Mutex poisoned").entry(user).or_default().insert(room);
    }

    /// Remove `user` from `room`, dropping the user entirely once their last
    /// room is gone.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn remove_membership(&self, user: &UserId, room: &RoomId) {
        let mut groups = self.inner.lock().expect("Mutex poisoned");

        if let Some(rooms) = groups.get_mut(user) {
            rooms.remove(room);

            if rooms.is_empty() {
                groups.remove(user);
            }
        }
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupDirectory for MemoryDirectory {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn groups_for_user(&self, user: &UserId) -> Result<Vec<RoomId>, DirectoryError> {
        let groups = self.inner.lock().expect("Mutex poisoned");

        Ok(groups.get(user).map_or_else(Vec::new, |rooms| rooms.iter().cloned().collect()))
    }
}
