//! Session registry: user identity to live connection handle.
//!
//! At most one connection per user at any instant. A connect for an
//! already-registered user replaces the prior entry (last-connect-wins);
//! the superseded entry is handed back to the caller so the transport layer
//! can tear the old socket down on its own schedule. The registry itself
//! never touches a handle - it only stores and evicts them.
//!
//! Disconnects come in two flavors: the unguarded `disconnect` (remove
//! whatever is active) and the conn-id-guarded `disconnect_conn` used by
//! transport teardown, which refuses to evict a session that has already
//! been superseded by a newer connect.

use std::collections::HashMap;

use banter_proto::UserId;

/// One live transport session for one user.
///
/// Generic over the send-handle type `H` and the instant type `I` so tests
/// can use dummy handles and virtual time.
#[derive(Debug, Clone)]
pub struct SessionEntry<H, I = std::time::Instant> {
    /// Opaque send handle delivering to this connection.
    pub handle: H,
    /// Random id distinguishing this transport session from a superseded
    /// one for the same user.
    pub conn_id: u64,
    /// When the connection was registered.
    pub connected_at: I,
}

impl<H, I> SessionEntry<H, I> {
    /// Create a new entry.
    pub fn new(handle: H, conn_id: u64, connected_at: I) -> Self {
        Self { handle, conn_id, connected_at }
    }
}

/// Registry of live sessions, keyed by user.
///
/// Owned exclusively by one component; callers serialize access (one lock
/// around the whole registry), which is what makes `online_users` an atomic
/// snapshot with respect to concurrent connects and disconnects.
#[derive(Debug)]
pub struct SessionRegistry<H, I = std::time::Instant> {
    /// User ID → active session. The single source of "who is online".
    sessions: HashMap<UserId, SessionEntry<H, I>>,
}

impl<H, I> Default for SessionRegistry<H, I> {
    fn default() -> Self {
        Self { sessions: HashMap::new() }
    }
}

impl<H, I> SessionRegistry<H, I> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` as the active session for `user`.
    ///
    /// Returns the superseded entry if the user was already connected. The
    /// superseded handle must not be used for delivery afterward; it exists
    /// only so the caller can close the old transport.
    pub fn connect(
        &mut self,
        user: UserId,
        entry: SessionEntry<H, I>,
    ) -> Option<SessionEntry<H, I>> {
        self.sessions.insert(user, entry)
    }

    /// Remove the active session for `user`, if any. Idempotent.
    pub fn disconnect(&mut self, user: &UserId) -> Option<SessionEntry<H, I>> {
        self.sessions.remove(user)
    }

    /// Remove the session for `user` only if it still carries `conn_id`.
    ///
    /// Transport teardown paths use this so a stale connection's disconnect
    /// cannot evict the session that superseded it. Returns the removed
    /// entry, or `None` if the user is offline or a newer connection is
    /// active.
    pub fn disconnect_conn(&mut self, user: &UserId, conn_id: u64) -> Option<SessionEntry<H, I>> {
        if self.sessions.get(user).is_some_and(|entry| entry.conn_id == conn_id) {
            self.sessions.remove(user)
        } else {
            None
        }
    }

    /// The current session for `user`. Never returns a superseded entry.
    pub fn lookup(&self, user: &UserId) -> Option<&SessionEntry<H, I>> {
        self.sessions.get(user)
    }

    /// Whether `user` currently has a live session.
    pub fn is_online(&self, user: &UserId) -> bool {
        self.sessions.contains_key(user)
    }

    /// All currently-connected users.
    pub fn online_users(&self) -> impl Iterator<Item = &UserId> + '_ {
        self.sessions.keys()
    }

    /// All sessions with their owners. Used for full broadcasts.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &SessionEntry<H, I>)> + '_ {
        self.sessions.iter()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Virtual instants keep these tests clock-free.
    fn entry(handle: &'static str, conn_id: u64) -> SessionEntry<&'static str, u64> {
        SessionEntry::new(handle, conn_id, 0)
    }

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn connect_and_lookup() {
        let mut registry = SessionRegistry::new();

        assert!(registry.connect(user("alice"), entry("h1", 1)).is_none());
        assert!(registry.is_online(&user("alice")));
        assert!(!registry.is_online(&user("bob")));

        let session = registry.lookup(&user("alice")).unwrap();
        assert_eq!(session.handle, "h1");
        assert_eq!(session.conn_id, 1);
    }

    #[test]
    fn reconnect_supersedes_and_returns_old_entry() {
        let mut registry = SessionRegistry::new();

        registry.connect(user("alice"), entry("h1", 1));
        let superseded = registry.connect(user("alice"), entry("h2", 2)).unwrap();
        assert_eq!(superseded.handle, "h1");

        // Lookup resolves to the replacement only
        assert_eq!(registry.lookup(&user("alice")).unwrap().handle, "h2");
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut registry = SessionRegistry::new();

        registry.connect(user("alice"), entry("h1", 1));
        assert!(registry.disconnect(&user("alice")).is_some());
        assert!(registry.disconnect(&user("alice")).is_none());
        assert!(registry.lookup(&user("alice")).is_none());
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn guarded_disconnect_matches_conn_id() {
        let mut registry = SessionRegistry::new();

        registry.connect(user("alice"), entry("h1", 1));
        assert!(registry.disconnect_conn(&user("alice"), 999).is_none());
        assert!(registry.is_online(&user("alice")));

        let removed = registry.disconnect_conn(&user("alice"), 1).unwrap();
        assert_eq!(removed.handle, "h1");
        assert!(!registry.is_online(&user("alice")));
    }

    #[test]
    fn stale_teardown_cannot_evict_replacement() {
        let mut registry = SessionRegistry::new();

        registry.connect(user("alice"), entry("h1", 1));
        registry.connect(user("alice"), entry("h2", 2));

        // The first transport's teardown fires late; it must be a no-op
        assert!(registry.disconnect_conn(&user("alice"), 1).is_none());
        assert_eq!(registry.lookup(&user("alice")).unwrap().handle, "h2");
    }

    #[test]
    fn online_users_reflects_connects_and_disconnects() {
        let mut registry = SessionRegistry::new();

        registry.connect(user("alice"), entry("h1", 1));
        registry.connect(user("bob"), entry("h2", 2));

        let online: Vec<_> = registry.online_users().cloned().collect();
        assert_eq!(online.len(), 2);
        assert!(online.contains(&user("alice")));
        assert!(online.contains(&user("bob")));

        registry.disconnect(&user("alice"));
        let online: Vec<_> = registry.online_users().cloned().collect();
        assert_eq!(online, vec![user("bob")]);
    }

    #[test]
    fn iter_visits_every_session() {
        let mut registry = SessionRegistry::new();

        registry.connect(user("alice"), entry("h1", 1));
        registry.connect(user("bob"), entry("h2", 2));

        let mut seen: Vec<_> = registry.iter().map(|(u, e)| (u.clone(), e.handle)).collect();
        seen.sort();
        assert_eq!(seen, vec![(user("alice"), "h1"), (user("bob"), "h2")]);
    }
}
