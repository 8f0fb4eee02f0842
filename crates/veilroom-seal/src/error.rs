//! Error types for sealing and opening messages.

/// Errors from [`seal`](crate::seal) / [`open`](crate::open) and their
/// directed counterparts.
#[derive(Debug, thiserror::Error)]
pub enum SealError {
    /// Nothing to encrypt.
    #[error("plaintext is empty")]
    EmptyPlaintext,

    /// A sealed payload needs at least one recipient.
    #[error("no recipients")]
    NoRecipients,

    /// The payload carries no wrapped key for this recipient.
    #[error("no wrapped key for {0}")]
    MissingKey(String),

    /// A field isn't valid standard base64.
    #[error("invalid base64 in {field}: {source}")]
    Encoding {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A field decoded to the wrong number of bytes.
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A public key is a low-order point, so agreement with it yields
    /// no secret.
    #[error("public key is not usable for key agreement")]
    WeakPublicKey,

    /// HKDF refused the requested output length.
    #[error("key derivation failed")]
    KeyDerivation,

    /// The AEAD refused to encrypt (input too long).
    #[error("encryption failed")]
    Encrypt,

    /// Authentication failed: wrong recipient, wrong key, or tampering.
    #[error("decryption failed")]
    Decrypt,

    /// The decrypted bytes are not UTF-8 text.
    #[error("plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}
