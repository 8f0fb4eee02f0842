//! A single room: a name and the sessions inside it.

use std::collections::BTreeSet;

use veilroom_protocol::SessionId;

/// A named group of sessions that receive each other's messages.
///
/// The name is immutable and compared byte-for-byte. Members are kept in
/// a `BTreeSet` so fan-out order is stable, which keeps logs and tests
/// deterministic; the protocol itself promises no cross-sender order.
#[derive(Debug, Clone)]
pub struct Room {
    name: String,
    members: BTreeSet<SessionId>,
}

impl Room {
    pub(crate) fn new(name: String, creator: SessionId) -> Self {
        Self {
            name,
            members: BTreeSet::from([creator]),
        }
    }

    /// Returns the room's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if `id` is a member.
    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains(&id)
    }

    /// Returns the number of members. Never zero for a registered room.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false` for a room that is still in the registry.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates over all members.
    pub fn members(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.members.iter().copied()
    }

    /// Returns every member except `excluded`.
    pub fn others(&self, excluded: SessionId) -> Vec<SessionId> {
        self.members().filter(|id| *id != excluded).collect()
    }

    pub(crate) fn insert(&mut self, id: SessionId) -> bool {
        self.members.insert(id)
    }

    pub(crate) fn remove(&mut self, id: SessionId) -> bool {
        self.members.remove(&id)
    }
}
