//! Unified error type for the Veilroom relay.

use veilroom_protocol::ProtocolError;
use veilroom_room::RoomError;
use veilroom_session::SessionError;
use veilroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapping variant auto-generates `From`
/// impls, so `?` converts sub-crate errors automatically. The `Display`
/// text of every variant is what the originating client receives in its
/// `error` envelope.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A record could not be decoded or an envelope not encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An identity lifecycle error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room membership error.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// `message` outside of any room.
    #[error("Join a room first")]
    RoomRequired,

    /// `message` with empty content.
    #[error("Message content required")]
    EmptyContent,

    /// Cipher content sent to a relay running in broadcast mode.
    #[error("Encrypted messages are not supported")]
    EncryptionUnsupported,
}

/// Coarse classification of a [`RelayError`], for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The record itself was unusable.
    Protocol,
    /// Valid command, wrong session or room state.
    State,
    /// Valid command and state, but a bad argument.
    Validation,
    /// The connection failed.
    Transport,
}

impl RelayError {
    /// Returns which class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) => ErrorClass::Transport,
            Self::Protocol(_) => ErrorClass::Protocol,
            Self::Session(
                SessionError::EmptyName | SessionError::PublicKeyRequired,
            )
            | Self::Room(RoomError::EmptyRoomName)
            | Self::EmptyContent
            | Self::EncryptionUnsupported => ErrorClass::Validation,
            Self::Session(_) | Self::Room(_) | Self::RoomRequired => {
                ErrorClass::State
            }
        }
    }
}
