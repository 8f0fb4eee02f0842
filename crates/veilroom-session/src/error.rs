//! Error types for the session layer.

/// Errors that can occur during the identity lifecycle.
///
/// The `Display` text is sent verbatim to the client in an `error`
/// envelope.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session tried something other than `username` before
    /// identifying.
    #[error("Set username first")]
    IdentityRequired,

    /// The session already has an identity; renaming is not supported.
    #[error("Username already set")]
    AlreadyIdentified,

    /// The claimed name is empty after trimming whitespace.
    #[error("Username cannot be empty")]
    EmptyName,

    /// The relay is configured to require a public key at identify time.
    #[error("Username and public key required")]
    PublicKeyRequired,

    /// No live session has this ID. Usually a command racing its own
    /// connection's close.
    #[error("session {0} not found")]
    NotFound(veilroom_protocol::SessionId),
}
