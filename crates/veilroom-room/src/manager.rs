//! Room registry: creates, tracks, and deletes rooms by name.

use std::collections::HashMap;

use veilroom_protocol::SessionId;

use crate::{Room, RoomError};

/// What a successful [`RoomRegistry::leave`] did to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// The leaver was the last member; the room is gone.
    Closed,
    /// The room survives with these members.
    Remaining(Vec<SessionId>),
}

/// All live rooms, keyed by name.
///
/// This registry only knows member sets. Whether a *session* is already
/// in some other room is the caller's check (the session carries that
/// pointer); the hub does both under one lock.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room with `creator` as its only member.
    ///
    /// # Errors
    /// - [`RoomError::EmptyRoomName`]: `name` is empty
    /// - [`RoomError::RoomExists`]: the name is taken
    pub fn create(
        &mut self,
        name: &str,
        creator: SessionId,
    ) -> Result<&Room, RoomError> {
        if name.is_empty() {
            return Err(RoomError::EmptyRoomName);
        }
        if self.rooms.contains_key(name) {
            return Err(RoomError::RoomExists(name.to_string()));
        }

        let room = self
            .rooms
            .entry(name.to_string())
            .or_insert_with(|| Room::new(name.to_string(), creator));
        tracing::info!(room = %name, %creator, "room created");
        Ok(room)
    }

    /// Adds `member` to an existing room.
    ///
    /// # Errors
    /// - [`RoomError::EmptyRoomName`]: `name` is empty
    /// - [`RoomError::RoomNotFound`]: no such room
    /// - [`RoomError::AlreadyInRoom`]: `member` is already inside
    pub fn join(
        &mut self,
        name: &str,
        member: SessionId,
    ) -> Result<&Room, RoomError> {
        if name.is_empty() {
            return Err(RoomError::EmptyRoomName);
        }
        let room = self
            .rooms
            .get_mut(name)
            .ok_or_else(|| RoomError::RoomNotFound(name.to_string()))?;
        if !room.insert(member) {
            return Err(RoomError::AlreadyInRoom);
        }

        tracing::info!(room = %name, %member, members = room.len(), "member joined");
        Ok(room)
    }

    /// Removes `member` from the room, deleting the room if it empties.
    ///
    /// # Errors
    /// Returns [`RoomError::NotInRoom`] if the room doesn't exist or
    /// `member` isn't in it.
    pub fn leave(
        &mut self,
        name: &str,
        member: SessionId,
    ) -> Result<Departure, RoomError> {
        let room = self.rooms.get_mut(name).ok_or(RoomError::NotInRoom)?;
        if !room.remove(member) {
            return Err(RoomError::NotInRoom);
        }

        if room.is_empty() {
            self.rooms.remove(name);
            tracing::info!(room = %name, %member, "last member left, room deleted");
            return Ok(Departure::Closed);
        }

        tracing::info!(room = %name, %member, members = room.len(), "member left");
        Ok(Departure::Remaining(room.members().collect()))
    }

    /// Looks up a room by name.
    pub fn get(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    /// Returns `true` if a room with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.rooms.contains_key(name)
    }

    /// Returns the number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if there are no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Lists the names of all live rooms.
    pub fn names(&self) -> Vec<&str> {
        self.rooms.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(id: u64) -> SessionId {
        SessionId(id)
    }

    #[test]
    fn test_create_adds_creator_as_sole_member() {
        let mut rooms = RoomRegistry::new();
        let room = rooms.create("lobby", sid(1)).unwrap();

        assert_eq!(room.name(), "lobby");
        assert_eq!(room.len(), 1);
        assert!(room.contains(sid(1)));
    }

    #[test]
    fn test_create_duplicate_keeps_first_creator() {
        let mut rooms = RoomRegistry::new();
        rooms.create("lobby", sid(1)).unwrap();

        let result = rooms.create("lobby", sid(2));
        assert!(matches!(result, Err(RoomError::RoomExists(ref n)) if n == "lobby"));

        let room = rooms.get("lobby").unwrap();
        assert_eq!(room.members().collect::<Vec<_>>(), vec![sid(1)]);
    }

    #[test]
    fn test_create_empty_name_is_rejected() {
        let mut rooms = RoomRegistry::new();
        assert!(matches!(rooms.create("", sid(1)), Err(RoomError::EmptyRoomName)));
        assert!(rooms.is_empty());
    }

    #[test]
    fn test_names_are_case_sensitive_and_untrimmed() {
        let mut rooms = RoomRegistry::new();
        rooms.create("Lobby", sid(1)).unwrap();
        rooms.create("lobby", sid(2)).unwrap();
        rooms.create(" lobby", sid(3)).unwrap();

        assert_eq!(rooms.len(), 3);
        assert!(matches!(
            rooms.join("LOBBY", sid(4)),
            Err(RoomError::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_join_missing_room() {
        let mut rooms = RoomRegistry::new();
        let result = rooms.join("nowhere", sid(1));
        assert!(matches!(result, Err(RoomError::RoomNotFound(ref n)) if n == "nowhere"));
    }

    #[test]
    fn test_join_twice_is_already_in_room() {
        let mut rooms = RoomRegistry::new();
        rooms.create("lobby", sid(1)).unwrap();
        rooms.join("lobby", sid(2)).unwrap();

        assert!(matches!(rooms.join("lobby", sid(2)), Err(RoomError::AlreadyInRoom)));
        assert_eq!(rooms.get("lobby").unwrap().len(), 2);
    }

    #[test]
    fn test_leave_last_member_deletes_room() {
        let mut rooms = RoomRegistry::new();
        rooms.create("lobby", sid(1)).unwrap();

        assert_eq!(rooms.leave("lobby", sid(1)).unwrap(), Departure::Closed);
        assert!(!rooms.contains("lobby"));

        // The name is free again.
        rooms.create("lobby", sid(2)).unwrap();
        assert!(rooms.get("lobby").unwrap().contains(sid(2)));
    }

    #[test]
    fn test_leave_reports_remaining_members() {
        let mut rooms = RoomRegistry::new();
        rooms.create("lobby", sid(1)).unwrap();
        rooms.join("lobby", sid(2)).unwrap();
        rooms.join("lobby", sid(3)).unwrap();

        let departure = rooms.leave("lobby", sid(2)).unwrap();
        assert_eq!(departure, Departure::Remaining(vec![sid(1), sid(3)]));
    }

    #[test]
    fn test_leave_non_member() {
        let mut rooms = RoomRegistry::new();
        rooms.create("lobby", sid(1)).unwrap();

        assert!(matches!(rooms.leave("lobby", sid(2)), Err(RoomError::NotInRoom)));
        assert!(matches!(rooms.leave("attic", sid(1)), Err(RoomError::NotInRoom)));
        assert!(rooms.contains("lobby"));
    }

    #[test]
    fn test_others_excludes_one_member() {
        let mut rooms = RoomRegistry::new();
        rooms.create("lobby", sid(1)).unwrap();
        rooms.join("lobby", sid(2)).unwrap();
        rooms.join("lobby", sid(3)).unwrap();

        let room = rooms.get("lobby").unwrap();
        assert_eq!(room.others(sid(2)), vec![sid(1), sid(3)]);
    }
}
