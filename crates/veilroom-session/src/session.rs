//! Session types: the server's record of one connection.
//!
//! A session tracks:
//! - WHO the client claims to be (`identity`, `public_key`)
//! - WHERE it is (`room`, a key into the room registry)
//! - HOW to reach it (`outbox`, drained by the connection's writer task)

use tokio::sync::mpsc;
use veilroom_protocol::{Envelope, PublicKey, SessionId};

use crate::SessionError;

/// Channel sender for delivering envelopes to one connection.
///
/// Unbounded on purpose: the relay pushes into it while holding the hub
/// lock, and must never wait on a slow socket there. The writer task on
/// the other end serializes writes, so envelopes reach the client in
/// the order they were pushed.
pub type Outbox = mpsc::UnboundedSender<Envelope>;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Unidentified ──(identify)──→ Identified ⇄ InRoom
///        │                           │          │
///        └───────────(close)─────────┴──────────┴──→ Closed
/// ```
///
/// `Closed` is never stored: a closed session is simply gone from the
/// registry, and [`SessionRegistry::state`](crate::SessionRegistry::state)
/// reports it for unknown IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no identity yet. Only `username` is accepted.
    Unidentified,
    /// Has an identity, not in any room.
    Identified,
    /// Member of exactly one room.
    InRoom,
    /// The connection is gone.
    Closed,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single connection's session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    identity: Option<String>,
    public_key: Option<PublicKey>,
    room: Option<String>,
    outbox: Outbox,
}

impl Session {
    /// Creates a fresh, unidentified session.
    pub fn new(id: SessionId, outbox: Outbox) -> Self {
        Self {
            id,
            identity: None,
            public_key: None,
            room: None,
            outbox,
        }
    }

    /// Returns the claimed identity, if set.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Returns the announced public key, if any.
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    /// Returns the name of the room this session is in, if any.
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        match (&self.identity, &self.room) {
            (None, _) => SessionState::Unidentified,
            (Some(_), None) => SessionState::Identified,
            (Some(_), Some(_)) => SessionState::InRoom,
        }
    }

    /// Returns the identity, or `IdentityRequired` if there is none yet.
    pub fn require_identity(&self) -> Result<&str, SessionError> {
        self.identity().ok_or(SessionError::IdentityRequired)
    }

    /// Sets the identity and public key. Allowed exactly once.
    ///
    /// The name is trimmed before it's stored. Uniqueness across sessions
    /// is deliberately NOT checked; two connections may claim the same
    /// name.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyIdentified`]: called a second time
    /// - [`SessionError::EmptyName`]: name is blank after trimming
    /// - [`SessionError::PublicKeyRequired`]: `require_key` and no key
    pub fn identify(
        &mut self,
        name: &str,
        public_key: Option<PublicKey>,
        require_key: bool,
    ) -> Result<&str, SessionError> {
        if self.identity.is_some() {
            return Err(SessionError::AlreadyIdentified);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        if require_key && public_key.is_none() {
            return Err(SessionError::PublicKeyRequired);
        }

        self.public_key = public_key;
        let stored = self.identity.insert(name.to_string());
        Ok(stored.as_str())
    }

    /// Records that the session joined `room`.
    ///
    /// Callers must update the room registry in the same critical section.
    pub fn enter_room(&mut self, room: String) {
        self.room = Some(room);
    }

    /// Clears the room pointer and returns the room that was left.
    pub fn take_room(&mut self) -> Option<String> {
        self.room.take()
    }

    /// Queues an envelope for this connection's writer task.
    ///
    /// Returns `false` if the writer is gone (the connection is closing).
    /// That's not an error for the caller: the disconnect path will clean
    /// the session up shortly.
    pub fn deliver(&self, envelope: Envelope) -> bool {
        let delivered = self.outbox.send(envelope).is_ok();
        if !delivered {
            tracing::trace!(session_id = %self.id, "outbox closed, envelope dropped");
        }
        delivered
    }
}
