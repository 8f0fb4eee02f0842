//! The relay state machine.
//!
//! [`Hub`] owns every session and every room. Each operation validates a
//! command against that state, mutates it, and pushes the resulting
//! envelopes into the outboxes of the sessions that should see them. All
//! of it is synchronous: the server keeps the hub behind one lock, so an
//! operation and the membership snapshot its fan-out uses are one
//! critical section, and nothing in here ever waits on a socket.
//!
//! ```text
//!                 ┌──────────────── Hub ────────────────┐
//! Command ──────→ │ SessionRegistry ⇄ RoomRegistry      │ ──→ outboxes
//!                 │        └── keys::plan ──┘           │
//!                 └─────────────────────────────────────┘
//! ```

use veilroom_protocol::{Command, Content, Envelope, ProtocolError, PublicKey, SessionId};
use veilroom_room::{Departure, KeyHolder, RoomError, RoomRegistry, keys};
use veilroom_session::{Outbox, SessionError, SessionRegistry};

use crate::{RelayConfig, RelayError, RelayMode};

/// Sessions, rooms, and the rules that connect them.
#[derive(Debug, Default)]
pub struct Hub {
    sessions: SessionRegistry,
    rooms: RoomRegistry,
    config: RelayConfig,
}

impl Hub {
    /// Creates an empty hub with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            rooms: RoomRegistry::new(),
            config,
        }
    }

    /// Read access to the live sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Read access to the live rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Registers a freshly accepted connection.
    pub fn connect(&mut self, outbox: Outbox) -> SessionId {
        self.sessions.open(outbox)
    }

    /// Tears a session down: implicit leave, then removal.
    ///
    /// Remaining room members get one "<name> disconnected" notice; the
    /// closing session gets nothing. Calling this for a session that is
    /// already gone does nothing.
    pub fn disconnect(&mut self, id: SessionId) {
        let Some(mut session) = self.sessions.close(id) else {
            return;
        };

        if let Some(room) = session.take_room() {
            match self.rooms.leave(&room, id) {
                Ok(Departure::Remaining(members)) => {
                    let name = session.identity().unwrap_or_default();
                    let notice = Envelope::system(format!("{name} disconnected"));
                    self.deliver_all(members, &notice);
                }
                Ok(Departure::Closed) => {}
                Err(e) => {
                    tracing::warn!(session_id = %id, room = %room, error = %e, "room out of sync on disconnect");
                }
            }
        }

        tracing::info!(
            session_id = %id,
            identity = session.identity().unwrap_or("-"),
            "session disconnected"
        );
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Handles one decoded record, or reports why it couldn't be decoded.
    ///
    /// Any error becomes a single `error` envelope to `id` and nothing
    /// else; state is untouched.
    pub fn process(
        &mut self,
        id: SessionId,
        parsed: Result<Command, ProtocolError>,
    ) {
        let result = match parsed {
            Ok(command) => self.handle(id, command),
            Err(e) => Err(e.into()),
        };

        if let Err(err) = result {
            tracing::debug!(
                session_id = %id,
                class = ?err.class(),
                error = ?err,
                "command rejected"
            );
            self.sessions.deliver(id, Envelope::error(err.to_string()));
        }
    }

    /// Dispatches one command for session `id`.
    ///
    /// # Errors
    /// Returns the [`RelayError`] whose text the client should see. On
    /// error nothing was changed and nothing was sent.
    pub fn handle(
        &mut self,
        id: SessionId,
        command: Command,
    ) -> Result<(), RelayError> {
        tracing::trace!(session_id = %id, kind = %command.kind(), "command");
        match command {
            Command::Identify { name, public_key } => {
                self.identify(id, &name, public_key)
            }
            Command::Create { room } => self.create(id, room),
            Command::Join { room } => self.join(id, room),
            Command::Leave => self.leave(id),
            Command::Message(content) => self.message(id, content),
        }
    }

    fn identify(
        &mut self,
        id: SessionId,
        name: &str,
        public_key: Option<PublicKey>,
    ) -> Result<(), RelayError> {
        let require_key = self.config.require_public_key;
        let session = self.sessions.get_mut(id)?;
        let name = session.identify(name, public_key, require_key)?.to_string();

        tracing::info!(
            session_id = %id,
            identity = %name,
            has_key = session.public_key().is_some(),
            "identified"
        );
        session.deliver(Envelope::welcome(format!("Username set to: {name}")));
        Ok(())
    }

    fn create(&mut self, id: SessionId, room: String) -> Result<(), RelayError> {
        let session = self.sessions.get_mut(id)?;
        let identity = session.require_identity()?.to_string();
        if session.room().is_some() {
            return Err(RoomError::AlreadyInRoom.into());
        }

        self.rooms.create(&room, id)?;
        session.enter_room(room.clone());
        session.deliver(Envelope::welcome(format!(
            "Created and joined room: {room}"
        )));

        self.broadcast(
            &room,
            None,
            &Envelope::system(format!("{identity} created and joined the room")),
        );
        self.distribute_keys(&room, id);
        Ok(())
    }

    fn join(&mut self, id: SessionId, room: String) -> Result<(), RelayError> {
        let session = self.sessions.get_mut(id)?;
        let identity = session.require_identity()?.to_string();
        if session.room().is_some() {
            return Err(RoomError::AlreadyInRoom.into());
        }

        self.rooms.join(&room, id)?;
        session.enter_room(room.clone());
        session.deliver(Envelope::welcome(format!("Joined room: {room}")));

        self.broadcast(
            &room,
            Some(id),
            &Envelope::system(format!("{identity} joined the room")),
        );
        self.distribute_keys(&room, id);
        Ok(())
    }

    fn leave(&mut self, id: SessionId) -> Result<(), RelayError> {
        let session = self.sessions.get_mut(id)?;
        let identity = session.require_identity()?.to_string();
        let room = session
            .room()
            .map(str::to_string)
            .ok_or(RoomError::NotInRoom)?;

        let departure = self.rooms.leave(&room, id)?;
        session.take_room();
        session.deliver(Envelope::welcome(format!("Left room: {room}")));

        if let Departure::Remaining(members) = departure {
            let notice = Envelope::system(format!("{identity} left the room"));
            self.deliver_all(members, &notice);
        }
        Ok(())
    }

    fn message(&self, id: SessionId, content: Content) -> Result<(), RelayError> {
        let session = self
            .sessions
            .get(id)
            .ok_or(SessionError::NotFound(id))?;
        let sender = session.require_identity()?;
        let room_name = session.room().ok_or(RelayError::RoomRequired)?;
        if content.is_empty() {
            return Err(RelayError::EmptyContent);
        }
        let room = self.rooms.get(room_name).ok_or(RelayError::RoomRequired)?;

        let (envelope, recipients) = match (self.config.relay_mode, content) {
            (_, Content::PlainText { text, encrypted }) => (
                Envelope::chat(sender, text, encrypted, None),
                room.others(id),
            ),
            (RelayMode::Broadcast, _) => {
                return Err(RelayError::EncryptionUnsupported);
            }
            (RelayMode::Addressed, Content::AddressedCipher(payload)) => {
                (Envelope::sealed(sender, payload), room.others(id))
            }
            (RelayMode::Addressed, Content::DirectedCipher { content, to }) => {
                let targets: Vec<SessionId> = room
                    .others(id)
                    .into_iter()
                    .filter(|member| {
                        self.sessions
                            .get(*member)
                            .and_then(|s| s.identity())
                            == Some(to.as_str())
                    })
                    .collect();
                (Envelope::chat(sender, content, true, Some(to)), targets)
            }
        };

        tracing::debug!(
            session_id = %id,
            room = %room_name,
            kind = %envelope.kind,
            recipients = recipients.len(),
            "message relayed"
        );
        self.deliver_all(recipients, &envelope);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    fn deliver_all(
        &self,
        recipients: impl IntoIterator<Item = SessionId>,
        envelope: &Envelope,
    ) {
        for recipient in recipients {
            self.sessions.deliver(recipient, envelope.clone());
        }
    }

    /// Sends `envelope` to every member of `room` except `excluded`.
    fn broadcast(&self, room: &str, excluded: Option<SessionId>, envelope: &Envelope) {
        let Some(room) = self.rooms.get(room) else {
            return;
        };
        let members = room.members().filter(|m| Some(*m) != excluded);
        self.deliver_all(members, envelope);
    }

    /// Announces public keys after `subject` entered `room`.
    fn distribute_keys(&self, room: &str, subject: SessionId) {
        let Some(room) = self.rooms.get(room) else {
            return;
        };
        let holders: Vec<KeyHolder<'_>> = room
            .members()
            .filter_map(|id| {
                let session = self.sessions.get(id)?;
                Some(KeyHolder {
                    id,
                    identity: session.identity()?,
                    public_key: session.public_key(),
                })
            })
            .collect();

        let announcements = keys::plan(self.config.key_strategy, subject, &holders);
        tracing::debug!(
            room = %room.name(),
            %subject,
            announcements = announcements.len(),
            "keys distributed"
        );
        for announcement in announcements {
            let (recipient, envelope) = announcement.into_envelope();
            self.sessions.deliver(recipient, envelope);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
