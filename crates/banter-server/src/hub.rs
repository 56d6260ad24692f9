//! Connection hub: session registry, room membership, and fan-out.
//!
//! The hub wraps the pure registries from [`banter_core`] in per-map
//! [`RwLock`]s and layers delivery on top. Two rules keep it deadlock-free:
//! each method holds at most one lock at a time, and no lock is held across
//! an await point or a socket write. Delivery itself is fire-and-forget:
//! frames are queued on bounded per-connection channels via
//! [`ClientHandle::try_send`], and a queue that is full or closed gets its
//! session evicted instead of ever blocking the caller.

use std::time::Instant;

use banter_core::{RoomTracker, SessionEntry, SessionRegistry};
use banter_proto::{Group, GroupMessage, GroupMessageEnvelope, RoomId, ServerEvent, UserId};
use tokio::sync::{RwLock, mpsc::error::TrySendError};
use tokio_tungstenite::tungstenite::Utf8Bytes;

use crate::{connection::ClientHandle, directory::GroupDirectory, error::ServerError};

/// Shared connection state and fan-out engine.
///
/// One hub serves the whole process. Connection tasks register sessions on
/// upgrade and tear them down when the socket ends; request-handling code
/// calls the notify methods to reach users. The server layer shares the hub
/// across tasks through an `Arc`.
pub struct Hub<D: GroupDirectory> {
    /// User → live session, last connect wins
    sessions: RwLock<SessionRegistry<ClientHandle>>,
    /// Ephemeral room membership, rebuilt from the directory on connect
    rooms: RwLock<RoomTracker>,
    /// Group membership source consulted on connect
    directory: D,
}

impl<D: GroupDirectory> Hub<D> {
    /// Create a hub with no connected sessions.
    pub fn new(directory: D) -> Self {
        Self {
            sessions: RwLock::new(SessionRegistry::new()),
            rooms: RwLock::new(RoomTracker::new()),
            directory,
        }
    }

    /// Register a freshly upgraded connection.
    ///
    /// If the user already had a session it is superseded: the old entry is
    /// dropped, which closes its outbound queue and lets the old writer task
    /// shut its socket down. The user's room set is rebuilt from the
    /// directory, then the updated online set goes out to everyone,
    /// including the new connection.
    #[allow(clippy::disallowed_methods)]
    pub async fn on_connect(
        &self,
        user: UserId,
        handle: ClientHandle,
        conn_id: u64,
    ) -> Result<(), ServerError> {
        let superseded = {
            let mut sessions = self.sessions.write().await;
            sessions.connect(user.clone(), SessionEntry::new(handle, conn_id, Instant::now()))
        };

        if superseded.is_some() {
            tracing::info!("Reconnect for {} supersedes previous session", user);
        }

        let groups = match self.directory.groups_for_user(&user) {
            Ok(groups) => groups,
            Err(e) => {
                tracing::warn!("Group lookup for {} failed, starting with no rooms: {}", user, e);
                Vec::new()
            },
        };

        {
            let mut rooms = self.rooms.write().await;
            rooms.clear(&user);

            for room in groups {
                rooms.join(user.clone(), room);
            }
        }

        tracing::info!("User {} connected (conn {})", user, conn_id);

        self.publish_presence().await
    }

    /// Tear down the session for `conn_id` if it is still the live one.
    ///
    /// Teardown for a superseded connection is a no-op, so a slow close
    /// racing a reconnect cannot evict the replacement session. Returns
    /// whether anything was actually removed.
    pub async fn on_disconnect(&self, user: &UserId, conn_id: u64) -> Result<bool, ServerError> {
        let removed = {
            let mut sessions = self.sessions.write().await;
            sessions.disconnect_conn(user, conn_id)
        };

        let Some(entry) = removed else {
            tracing::debug!("Stale teardown for {} ignored (conn {})", user, conn_id);
            return Ok(false);
        };

        let vacated = {
            let mut rooms = self.rooms.write().await;
            rooms.clear(user)
        };

        tracing::info!(
            "User {} disconnected after {:?} (left {} rooms)",
            user,
            entry.connected_at.elapsed(),
            vacated.len()
        );

        self.publish_presence().await?;

        Ok(true)
    }

    /// Start routing room traffic to an online user.
    ///
    /// Requests from users without a live session are ignored, so dead
    /// membership cannot accumulate for users who never connected. Returns
    /// whether the user newly joined.
    pub async fn on_join_room_request(&self, user: &UserId, room: RoomId) -> bool {
        if !self.sessions.read().await.is_online(user) {
            tracing::debug!("Join request from offline user {} ignored", user);
            return false;
        }

        let joined = self.rooms.write().await.join(user.clone(), room.clone());

        if joined {
            tracing::debug!("User {} joined room {}", user, room);
        }

        joined
    }

    /// Stop routing room traffic to a user. Returns whether they were a
    /// member.
    pub async fn on_leave_room_request(&self, user: &UserId, room: &RoomId) -> bool {
        let left = self.rooms.write().await.leave(user, room);

        if left {
            tracing::debug!("User {} left room {}", user, room);
        }

        left
    }

    /// Fan a chat message out to a room, excluding the sender.
    ///
    /// Returns the number of sessions the message was queued for.
    pub async fn notify_new_group_message(
        &self,
        room: &RoomId,
        message: GroupMessage,
        sender: &UserId,
    ) -> Result<usize, ServerError> {
        let event =
            ServerEvent::NewGroupMessage(GroupMessageEnvelope { message, group_id: room.clone() });

        self.send_to_room(room, &event, Some(sender)).await
    }

    /// Announce changed group metadata to everyone in the room, including
    /// whoever made the change.
    pub async fn notify_group_updated(
        &self,
        room: &RoomId,
        group: Group,
    ) -> Result<usize, ServerError> {
        self.send_to_room(room, &ServerEvent::GroupUpdated(group), None).await
    }

    /// Tell each listed user about a group they were just added to.
    ///
    /// The caller chooses the recipients (typically the new group's
    /// participants without its creator). Membership of the new room is not
    /// consulted: nobody has joined it yet. Returns how many recipients were
    /// online to receive the event.
    pub async fn notify_new_group(
        &self,
        targets: &[UserId],
        group: &Group,
    ) -> Result<usize, ServerError> {
        let mut delivered = 0;

        for target in targets {
            if self.send_to_user(target, &ServerEvent::NewGroup(group.clone())).await? {
                delivered += 1;
            }
        }

        Ok(delivered)
    }

    /// Queue an event for every member of a room, minus `exclude`.
    ///
    /// Members without a live session are skipped. A member whose queue is
    /// full or closed is evicted and does not count as delivered, but the
    /// rest of the room still gets the event. Returns the delivered count.
    pub async fn send_to_room(
        &self,
        room: &RoomId,
        event: &ServerEvent,
        exclude: Option<&UserId>,
    ) -> Result<usize, ServerError> {
        let frame = Utf8Bytes::from(event.encode()?);

        let recipients: Vec<UserId> = {
            let rooms = self.rooms.read().await;
            rooms.members_of(room).filter(|member| Some(*member) != exclude).cloned().collect()
        };

        let mut delivered = 0;
        let mut failed = Vec::new();

        {
            let sessions = self.sessions.read().await;

            for member in &recipients {
                // Members without a session are routing misses, not errors.
                let Some(entry) = sessions.lookup(member) else {
                    continue;
                };

                match entry.handle.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(err) => {
                        log_send_failure(member, &err);
                        failed.push((member.clone(), entry.conn_id));
                    },
                }
            }
        }

        if !failed.is_empty() {
            self.evict_sessions(failed).await;
            self.publish_presence().await?;
        }

        Ok(delivered)
    }

    /// Queue an event for a single user.
    ///
    /// Returns `false` if the user has no live session or their queue would
    /// not take the frame. Fire-and-forget: `true` means queued, not
    /// received.
    pub async fn send_to_user(
        &self,
        user: &UserId,
        event: &ServerEvent,
    ) -> Result<bool, ServerError> {
        let frame = Utf8Bytes::from(event.encode()?);

        let outcome = {
            let sessions = self.sessions.read().await;
            sessions.lookup(user).map(|entry| (entry.handle.try_send(frame), entry.conn_id))
        };

        match outcome {
            None => Ok(false),
            Some((Ok(()), _)) => Ok(true),
            Some((Err(err), conn_id)) => {
                log_send_failure(user, &err);
                self.evict_sessions(vec![(user.clone(), conn_id)]).await;
                self.publish_presence().await?;
                Ok(false)
            },
        }
    }

    /// Push the full online set to every connected session.
    ///
    /// The set is sorted so consecutive publishes with the same membership
    /// produce identical frames. Sessions that fail to take the frame are
    /// evicted, which changes the online set, so the snapshot is rebuilt and
    /// republished until a pass delivers cleanly. Each failing pass removes
    /// at least one session, so the loop terminates.
    pub async fn publish_presence(&self) -> Result<(), ServerError> {
        loop {
            let failed = {
                let sessions = self.sessions.read().await;

                let mut online: Vec<UserId> = sessions.online_users().cloned().collect();
                online.sort_unstable();

                let frame = Utf8Bytes::from(ServerEvent::OnlineUsers(online).encode()?);
                let mut failed = Vec::new();

                for (user, entry) in sessions.iter() {
                    if let Err(err) = entry.handle.try_send(frame.clone()) {
                        log_send_failure(user, &err);
                        failed.push((user.clone(), entry.conn_id));
                    }
                }

                failed
            };

            if failed.is_empty() {
                return Ok(());
            }

            self.evict_sessions(failed).await;
        }
    }

    /// Users with a live session, in no particular order.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.sessions.read().await.online_users().cloned().collect()
    }

    /// Whether the user currently has a live session.
    pub async fn is_online(&self, user: &UserId) -> bool {
        self.sessions.read().await.is_online(user)
    }

    /// Whether the user is currently routed traffic for the room.
    pub async fn is_member(&self, user: &UserId, room: &RoomId) -> bool {
        self.rooms.read().await.is_member(user, room)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.session_count()
    }

    /// Remove sessions whose queues refused a frame, clearing their room
    /// membership.
    ///
    /// Removal is guarded by connection id: if the user reconnected since
    /// the failure was observed, their new session is left alone.
    async fn evict_sessions(&self, failed: Vec<(UserId, u64)>) {
        for (user, conn_id) in failed {
            let removed = {
                let mut sessions = self.sessions.write().await;
                sessions.disconnect_conn(&user, conn_id)
            };

            if removed.is_some() {
                let mut rooms = self.rooms.write().await;
                rooms.clear(&user);

                tracing::info!("Evicted unresponsive session for {} (conn {})", user, conn_id);
            }
        }
    }
}

fn log_send_failure(user: &UserId, err: &TrySendError<Utf8Bytes>) {
    match err {
        TrySendError::Full(_) => {
            tracing::warn!("Outbound queue full for {}, disconnecting", user);
        },
        TrySendError::Closed(_) => {
            tracing::debug!("Dropping frame for {}: writer already gone", user);
        },
    }
}
