//! Error types for the room layer.

/// Errors that can occur during room operations.
///
/// As with every relay error, the `Display` text is what the client sees.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The session is already in a room; it must leave first.
    #[error("Leave current room first")]
    AlreadyInRoom,

    /// `create`/`join` with an empty room name.
    #[error("Room name required")]
    EmptyRoomName,

    /// A room with this name already exists.
    #[error("Room already exists")]
    RoomExists(String),

    /// No room with this name exists.
    #[error("Room does not exist")]
    RoomNotFound(String),

    /// The session is not in any room.
    #[error("Not in any room")]
    NotInRoom,
}
