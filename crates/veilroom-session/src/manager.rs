//! The session registry: every live connection's session, by ID.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. It uses a plain
//! `HashMap`. It lives inside the hub together with the room registry,
//! and both are mutated under the same lock, which keeps a session's room
//! pointer and the room's member set consistent.

use std::collections::HashMap;

use veilroom_protocol::{Envelope, SessionId};

use crate::{Outbox, Session, SessionError, SessionState};

/// Tracks all live sessions.
///
/// ## Lifecycle
///
/// ```text
/// accept ──→ open() ──→ [Unidentified] ──→ ... ──→ close() ──→ gone
/// ```
///
/// There is no reconnect: once `close()` removes a session its ID is
/// never handed out again.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    /// Last issued ID. IDs start at 1 and only ever increase.
    last_id: u64,
}

impl SessionRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its session ID.
    pub fn open(&mut self, outbox: Outbox) -> SessionId {
        self.last_id += 1;
        let id = SessionId(self.last_id);
        self.sessions.insert(id, Session::new(id, outbox));
        tracing::debug!(session_id = %id, "session opened");
        id
    }

    /// Removes a session and returns it, if it was still live.
    ///
    /// Closing an unknown (or already closed) ID returns `None`; the
    /// disconnect path relies on this to be idempotent.
    pub fn close(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        tracing::debug!(session_id = %id, "session closed");
        Some(session)
    }

    /// Looks up a session by ID.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Looks up a session by ID for mutation.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] for closed or unknown IDs.
    pub fn get_mut(
        &mut self,
        id: SessionId,
    ) -> Result<&mut Session, SessionError> {
        self.sessions.get_mut(&id).ok_or(SessionError::NotFound(id))
    }

    /// Returns the lifecycle state of `id`, `Closed` if it is gone.
    pub fn state(&self, id: SessionId) -> SessionState {
        self.sessions
            .get(&id)
            .map_or(SessionState::Closed, Session::state)
    }

    /// Queues an envelope for one session. Unknown IDs are ignored.
    pub fn deliver(&self, id: SessionId, envelope: Envelope) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|session| session.deliver(envelope))
    }

    /// Returns the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn outbox() -> (Outbox, mpsc::UnboundedReceiver<Envelope>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_open_issues_increasing_ids() {
        let mut registry = SessionRegistry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();

        let a = registry.open(tx1);
        let b = registry.open(tx2);

        assert_ne!(a, b);
        assert!(b > a);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.state(a), SessionState::Unidentified);
    }

    #[test]
    fn test_close_removes_session_once() {
        let mut registry = SessionRegistry::new();
        let (tx, _rx) = outbox();
        let id = registry.open(tx);

        assert!(registry.close(id).is_some());
        assert!(registry.close(id).is_none(), "second close is a no-op");
        assert_eq!(registry.state(id), SessionState::Closed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_not_reused_after_close() {
        let mut registry = SessionRegistry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();

        let first = registry.open(tx1);
        registry.close(first);
        let second = registry.open(tx2);

        assert_ne!(first, second);
    }

    #[test]
    fn test_get_mut_unknown_returns_not_found() {
        let mut registry = SessionRegistry::new();
        let result = registry.get_mut(SessionId(99));
        assert!(matches!(result, Err(SessionError::NotFound(SessionId(99)))));
    }

    #[test]
    fn test_deliver_routes_to_the_right_outbox() {
        let mut registry = SessionRegistry::new();
        let (tx1, mut rx1) = outbox();
        let (tx2, mut rx2) = outbox();
        let a = registry.open(tx1);
        let _b = registry.open(tx2);

        assert!(registry.deliver(a, Envelope::system("only a")));
        assert!(!registry.deliver(SessionId(404), Envelope::system("nobody")));

        assert_eq!(rx1.try_recv().unwrap(), Envelope::system("only a"));
        assert!(rx2.try_recv().is_err());
    }
}
