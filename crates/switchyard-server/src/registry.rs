//! Session registry for connection and handle tracking.
//!
//! The registry maintains two mappings: session → handle (every live
//! connection, in accept order) and handle → session (a reverse index over
//! registered sessions). Handle lookups are O(1) and session lookups are
//! O(log n). The uniqueness check on registration scans every held handle,
//! because it is a length-bounded comparison rather than plain equality.
//!
//! Sessions are added without a handle and gain one through
//! [`SessionRegistry::try_register`]. Removing a session releases its handle.

use std::collections::{BTreeMap, HashMap};

use switchyard_proto::Handle;

/// Server-side state for one live connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Handle granted to this session, if any
    pub handle: Option<Handle>,
}

impl Session {
    /// Create a session with no handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the session has registered a handle.
    pub fn is_registered(&self) -> bool {
        self.handle.is_some()
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Handle attached to the session
    Accepted,
    /// Handle taken, empty, or session unknown; nothing changed
    Rejected,
}

impl RegisterOutcome {
    /// Whether the handle was granted.
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

/// Registry of live sessions and their handles.
///
/// Session ids are handed out in increasing order, so the ordered map keeps
/// sessions in insertion order without a separate sequence.
///
/// # Invariants
///
/// - No two sessions hold the same handle.
/// - No held handle starts with a handle registered after it.
/// - `handles[h] == id` exactly when `sessions[id].handle == Some(h)`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Session ID → session state
    sessions: BTreeMap<u64, Session>,
    /// Handle → session ID (reverse index). Enforces one session per handle
    handles: HashMap<Handle, u64>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session with no handle.
    ///
    /// Returns `false` if the session already exists.
    pub fn add(&mut self, session_id: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }

        self.sessions.insert(session_id, Session::new());
        true
    }

    /// Remove a session and release its handle.
    ///
    /// Returns the session if it existed. Removing an unknown session is a
    /// no-op.
    pub fn remove(&mut self, session_id: u64) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;

        if let Some(handle) = &session.handle {
            self.handles.remove(handle);
        }

        Some(session)
    }

    /// Attach `handle` to a session if it does not collide with a held one.
    ///
    /// Comparison covers the first `handle.len()` bytes of every held handle,
    /// so `"al"` collides with a held `"alice"` while `"alice"` does not
    /// collide with a held `"al"`. The check covers the caller too:
    /// re-registering the handle a session already holds is rejected.
    /// Registering a different handle replaces and releases the old one.
    /// Empty handles and unknown sessions are rejected.
    pub fn try_register(&mut self, session_id: u64, handle: Handle) -> RegisterOutcome {
        if handle.is_empty() || self.is_taken(&handle) {
            return RegisterOutcome::Rejected;
        }

        let Some(session) = self.sessions.get_mut(&session_id) else {
            return RegisterOutcome::Rejected;
        };

        if let Some(previous) = session.handle.replace(handle.clone()) {
            self.handles.remove(&previous);
        }
        self.handles.insert(handle, session_id);

        RegisterOutcome::Accepted
    }

    /// Whether a held handle matches `handle` over `handle.len()` bytes.
    fn is_taken(&self, handle: &Handle) -> bool {
        self.handles.keys().any(|held| held.as_bytes().starts_with(handle.as_bytes()))
    }

    /// All session ids, in insertion order.
    pub fn list(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.keys().copied()
    }

    /// Ids of sessions holding a handle, in insertion order.
    pub fn registered_sessions(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.iter().filter(|(_, session)| session.is_registered()).map(|(id, _)| *id)
    }

    /// Session state. `None` if session doesn't exist.
    pub fn find_by_session(&self, session_id: u64) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    /// Session holding `handle`. `None` if no session registered it.
    pub fn find_by_handle(&self, handle: &[u8]) -> Option<u64> {
        self.handles.get(handle).copied()
    }

    /// Check if a session is present.
    pub fn contains(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Total number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(s: &str) -> Handle {
        Handle::try_from(s).unwrap()
    }

    #[test]
    fn add_and_lookup_session() {
        let mut registry = SessionRegistry::new();

        assert!(registry.add(1));
        assert!(registry.contains(1));
        assert!(!registry.contains(2));

        let session = registry.find_by_session(1).unwrap();
        assert!(!session.is_registered());
    }

    #[test]
    fn add_duplicate_session_fails() {
        let mut registry = SessionRegistry::new();

        assert!(registry.add(1));
        assert!(!registry.add(1));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn register_carol_carol_dave() {
        let mut registry = SessionRegistry::new();
        registry.add(1);
        registry.add(2);
        registry.add(3);

        assert_eq!(registry.try_register(1, handle("carol")), RegisterOutcome::Accepted);
        assert_eq!(registry.try_register(2, handle("carol")), RegisterOutcome::Rejected);
        assert_eq!(registry.try_register(3, handle("dave")), RegisterOutcome::Accepted);

        // Original holder untouched, loser still unregistered
        assert_eq!(registry.find_by_handle(b"carol"), Some(1));
        assert_eq!(registry.find_by_session(1).unwrap().handle, Some(handle("carol")));
        assert!(!registry.find_by_session(2).unwrap().is_registered());
    }

    #[test]
    fn comparison_is_bounded_by_requested_length() {
        let mut registry = SessionRegistry::new();
        registry.add(1);
        registry.add(2);
        registry.add(3);

        assert!(registry.try_register(1, handle("alice")).is_accepted());

        // First two bytes of "alice" match
        assert_eq!(registry.try_register(2, handle("al")), RegisterOutcome::Rejected);
        assert!(!registry.find_by_session(2).unwrap().is_registered());

        // Longer than "alice", so only a held handle of that length could match
        assert!(registry.try_register(3, handle("alice2")).is_accepted());
        assert_eq!(registry.find_by_handle(b"alice"), Some(1));
        assert_eq!(registry.find_by_handle(b"al"), None);
    }

    #[test]
    fn shorter_held_handle_does_not_block_longer_request() {
        let mut registry = SessionRegistry::new();
        registry.add(1);
        registry.add(2);

        assert!(registry.try_register(1, handle("al")).is_accepted());
        assert!(registry.try_register(2, handle("alice")).is_accepted());
        assert_eq!(registry.find_by_handle(b"al"), Some(1));
        assert_eq!(registry.find_by_handle(b"alice"), Some(2));
    }

    #[test]
    fn reregistering_own_handle_is_rejected() {
        let mut registry = SessionRegistry::new();
        registry.add(1);

        assert!(registry.try_register(1, handle("carol")).is_accepted());
        assert_eq!(registry.try_register(1, handle("carol")), RegisterOutcome::Rejected);
        assert_eq!(registry.find_by_handle(b"carol"), Some(1));
    }

    #[test]
    fn registering_new_handle_releases_old() {
        let mut registry = SessionRegistry::new();
        registry.add(1);
        registry.add(2);

        registry.try_register(1, handle("carol"));
        assert!(registry.try_register(1, handle("dana")).is_accepted());

        assert_eq!(registry.find_by_handle(b"carol"), None);
        assert_eq!(registry.find_by_handle(b"dana"), Some(1));
        assert!(registry.try_register(2, handle("carol")).is_accepted());
    }

    #[test]
    fn empty_handle_is_rejected() {
        let mut registry = SessionRegistry::new();
        registry.add(1);

        let empty = Handle::new(Vec::new()).unwrap();
        assert_eq!(registry.try_register(1, empty), RegisterOutcome::Rejected);
    }

    #[test]
    fn register_unknown_session_is_rejected() {
        let mut registry = SessionRegistry::new();

        assert_eq!(registry.try_register(99, handle("ghost")), RegisterOutcome::Rejected);
        assert_eq!(registry.find_by_handle(b"ghost"), None);
    }

    #[test]
    fn remove_releases_handle() {
        let mut registry = SessionRegistry::new();
        registry.add(1);
        registry.try_register(1, handle("carol"));

        let session = registry.remove(1).unwrap();
        assert_eq!(session.handle, Some(handle("carol")));
        assert_eq!(registry.find_by_handle(b"carol"), None);

        registry.add(2);
        assert!(registry.try_register(2, handle("carol")).is_accepted());
    }

    #[test]
    fn remove_unknown_session_is_noop() {
        let mut registry = SessionRegistry::new();
        registry.add(1);
        registry.try_register(1, handle("carol"));

        assert!(registry.remove(42).is_none());
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.find_by_handle(b"carol"), Some(1));
    }

    #[test]
    fn list_is_insertion_ordered() {
        let mut registry = SessionRegistry::new();
        for id in [3, 7, 12, 40] {
            registry.add(id);
        }
        registry.remove(7);

        assert_eq!(registry.list().collect::<Vec<_>>(), vec![3, 12, 40]);
    }

    #[test]
    fn registered_sessions_skips_anonymous() {
        let mut registry = SessionRegistry::new();
        registry.add(1);
        registry.add(2);
        registry.add(3);
        registry.try_register(1, handle("a"));
        registry.try_register(3, handle("c"));

        assert_eq!(registry.registered_sessions().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn count_tracks_membership() {
        let mut registry = SessionRegistry::new();

        assert_eq!(registry.count(), 0);

        registry.add(1);
        assert_eq!(registry.count(), 1);

        registry.add(2);
        assert_eq!(registry.count(), 2);

        registry.remove(1);
        assert_eq!(registry.count(), 1);
    }
}
