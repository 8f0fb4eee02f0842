//! Error types for the protocol layer.
//!
//! The `Display` text of each variant is exactly what the relay sends back
//! to the client in an `error` envelope, so keep these human-readable.

/// Errors that can occur while decoding or encoding records.
///
/// Every variant is reported to the originating session only; the
/// connection always stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The record is not valid JSON at all.
    #[error("Invalid JSON format")]
    Decode(#[source] serde_json::Error),

    /// Valid JSON, but not an object with a string `type` and an object
    /// `body`.
    #[error("Invalid message format")]
    Malformed,

    /// The `type` field names a command the relay doesn't know.
    #[error("Invalid message type")]
    UnknownType(String),

    /// A known field is present but has the wrong JSON type, e.g. a
    /// numeric `content` or an encrypted object missing its `keys`.
    #[error("Invalid field: {0}")]
    InvalidField(&'static str),
}
