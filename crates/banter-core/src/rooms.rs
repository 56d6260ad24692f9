//! Room membership tracker: which rooms each user's connection has joined.
//!
//! The tracker maintains bidirectional mappings: room → users (for
//! broadcast) and user → rooms (for cleanup on disconnect). This gives O(1)
//! lookups in both directions. Empty sets are pruned so abandoned rooms and
//! departed users leave nothing behind.
//!
//! Entries here are ephemeral intent, not truth. Persisted group membership
//! lives with the group-management collaborator; this tracker is rebuilt
//! from it on every reconnect and deleted in full on disconnect. Nothing
//! here filters by liveness - delivery-time filtering against the session
//! registry is the dispatcher's job.

use std::collections::{HashMap, HashSet};

use banter_proto::{RoomId, UserId};

/// Tracks joined rooms per user and members per room.
#[derive(Debug, Default)]
pub struct RoomTracker {
    /// User ID → set of joined room IDs.
    user_rooms: HashMap<UserId, HashSet<RoomId>>,
    /// Room ID → set of member user IDs.
    room_users: HashMap<RoomId, HashSet<UserId>>,
}

impl RoomTracker {
    /// Create a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `room` to `user`'s joined set. Idempotent.
    ///
    /// Returns `true` if the membership was newly recorded.
    pub fn join(&mut self, user: UserId, room: RoomId) -> bool {
        let newly_joined = self.room_users.entry(room.clone()).or_default().insert(user.clone());
        self.user_rooms.entry(user).or_default().insert(room);
        newly_joined
    }

    /// Remove `room` from `user`'s joined set. Idempotent; no-op if absent.
    ///
    /// Returns `true` if the user was a member and is no longer.
    pub fn leave(&mut self, user: &UserId, room: &RoomId) -> bool {
        let removed_from_room =
            self.room_users.get_mut(room).is_some_and(|users| users.remove(user));

        let removed_from_user =
            self.user_rooms.get_mut(user).is_some_and(|rooms| rooms.remove(room));

        if self.room_users.get(room).is_some_and(HashSet::is_empty) {
            self.room_users.remove(room);
        }
        if self.user_rooms.get(user).is_some_and(HashSet::is_empty) {
            self.user_rooms.remove(user);
        }

        removed_from_room && removed_from_user
    }

    /// Remove all rooms for `user` (disconnect path).
    ///
    /// Returns the rooms the user was in, which is empty if the user had
    /// joined nothing.
    pub fn clear(&mut self, user: &UserId) -> HashSet<RoomId> {
        let rooms = self.user_rooms.remove(user).unwrap_or_default();

        for room in &rooms {
            if let Some(users) = self.room_users.get_mut(room) {
                users.remove(user);
                if users.is_empty() {
                    self.room_users.remove(room);
                }
            }
        }

        rooms
    }

    /// Whether `user` has joined `room`.
    pub fn is_member(&self, user: &UserId, room: &RoomId) -> bool {
        self.room_users.get(room).is_some_and(|users| users.contains(user))
    }

    /// All users whose tracked set contains `room`.
    pub fn members_of(&self, room: &RoomId) -> impl Iterator<Item = &UserId> + '_ {
        self.room_users.get(room).into_iter().flatten()
    }

    /// All rooms `user` has joined.
    pub fn rooms_of(&self, user: &UserId) -> impl Iterator<Item = &RoomId> + '_ {
        self.user_rooms.get(user).into_iter().flatten()
    }

    /// Number of tracked members in `room`.
    pub fn member_count(&self, room: &RoomId) -> usize {
        self.room_users.get(room).map_or(0, HashSet::len)
    }

    /// Number of rooms with at least one tracked member.
    pub fn tracked_rooms(&self) -> usize {
        self.room_users.len()
    }

    /// Number of users tracking at least one room.
    pub fn tracked_users(&self) -> usize {
        self.user_rooms.len()
    }
}
