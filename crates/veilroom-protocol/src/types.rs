//! Core protocol types for Veilroom's wire format.
//!
//! Every server → client record is an [`Envelope`]:
//!
//! ```text
//! { "type": <kind>, "body": { ... } }
//! { "type": <kind>, "sender": <identity>, "body": { ... } }
//! ```
//!
//! The `sender` field only appears on envelopes relayed on behalf of a
//! room member. Welcome, system, error and key announcements never carry
//! one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable, opaque handle for one live connection's session.
///
/// Issued at accept time and never reused within a process. This is what
/// the registries key on, so nothing above the transport ever needs to
/// hash or compare socket objects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A client's announced public key.
///
/// The relay treats this as an opaque string (typically base64) and never
/// interprets it; it is only stored at identify time and handed to peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(pub String);

impl PublicKey {
    /// Returns the key as it appears on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PublicKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Kind: the `type` field
// ---------------------------------------------------------------------------

/// Every `type` value the protocol defines, in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// C→S: claim an identity (and optionally announce a public key).
    Username,
    /// C→S: create a room and join it.
    Create,
    /// C→S: join an existing room.
    Join,
    /// C→S: leave the current room.
    Leave,
    /// Both directions: a chat message (plain, opaque, or directed).
    Message,
    /// S→C: a peer's public key.
    #[serde(alias = "pubkey")]
    KeyUpdate,
    /// S→C: status for the acting session only.
    Welcome,
    /// S→C: room-wide notice.
    System,
    /// S→C: an operation failed.
    Error,
    /// S→C: a multi-recipient hybrid-encrypted message.
    EncryptedMessage,
}

impl Kind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Create => "create",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Message => "message",
            Self::KeyUpdate => "key_update",
            Self::Welcome => "welcome",
            Self::System => "system",
            Self::Error => "error",
            Self::EncryptedMessage => "encrypted_message",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SealedPayload: addressed multi-recipient ciphertext
// ---------------------------------------------------------------------------

/// One ciphertext shared by several recipients, with the content key
/// wrapped once per recipient.
///
/// All fields are opaque to the relay. `keys` maps a recipient identity to
/// that recipient's wrapped content key. A `BTreeMap` keeps the encoded
/// form deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Nonce used for the content encryption.
    pub iv: String,
    /// Detached authentication tag of the content encryption.
    pub tag: String,
    /// The encrypted message body.
    pub content: String,
    /// Recipient identity → wrapped content key.
    pub keys: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Body: what's inside an envelope
// ---------------------------------------------------------------------------

/// The kind-specific content of a server → client envelope.
///
/// `#[serde(untagged)]` writes each variant as a plain object, so the
/// envelope's `type` is the only discriminator on the wire. Variant order
/// matters for decoding: the most specific shapes come first, because a
/// bare `{ "content": ... }` would otherwise swallow them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    /// A relayed chat message.
    Chat {
        content: String,
        encrypted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },

    /// A relayed addressed ciphertext.
    Sealed(SealedPayload),

    /// A public key announcement.
    Key {
        username: String,
        #[serde(rename = "publicKey")]
        public_key: PublicKey,
    },

    /// A human-readable status (welcome, system, error).
    Text { content: String },
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level server → client record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The record's `type`.
    #[serde(rename = "type")]
    pub kind: Kind,

    /// Identity of the room member this envelope was relayed for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// Kind-specific content.
    pub body: Body,
}

impl Envelope {
    fn text(kind: Kind, content: impl Into<String>) -> Self {
        Self {
            kind,
            sender: None,
            body: Body::Text {
                content: content.into(),
            },
        }
    }

    /// A status line for the acting session only.
    pub fn welcome(content: impl Into<String>) -> Self {
        Self::text(Kind::Welcome, content)
    }

    /// A room-wide notice.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Kind::System, content)
    }

    /// An error report for the offending session.
    pub fn error(content: impl Into<String>) -> Self {
        Self::text(Kind::Error, content)
    }

    /// Announces `username`'s public key to a peer.
    pub fn key_update(username: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            kind: Kind::KeyUpdate,
            sender: None,
            body: Body::Key {
                username: username.into(),
                public_key,
            },
        }
    }

    /// A chat message relayed on behalf of `sender`.
    pub fn chat(
        sender: impl Into<String>,
        content: impl Into<String>,
        encrypted: bool,
        to: Option<String>,
    ) -> Self {
        Self {
            kind: Kind::Message,
            sender: Some(sender.into()),
            body: Body::Chat {
                content: content.into(),
                encrypted,
                to,
            },
        }
    }

    /// An addressed ciphertext relayed on behalf of `sender`.
    pub fn sealed(sender: impl Into<String>, payload: SealedPayload) -> Self {
        Self {
            kind: Kind::EncryptedMessage,
            sender: Some(sender.into()),
            body: Body::Sealed(payload),
        }
    }

    /// Returns the text content for welcome/system/error envelopes.
    pub fn text_content(&self) -> Option<&str> {
        match &self.body {
            Body::Text { content } => Some(content),
            _ => None,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire shapes are a contract with existing clients, so these
    //! tests pin the exact JSON each constructor produces.

    use super::*;

    fn sample_payload() -> SealedPayload {
        SealedPayload {
            iv: "aXY=".into(),
            tag: "dGFn".into(),
            content: "Y3Q=".into(),
            keys: BTreeMap::from([
                ("bob".to_string(), "d2I=".to_string()),
                ("carol".to_string(), "d2M=".to_string()),
            ]),
        }
    }

    #[test]
    fn test_session_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&SessionId(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(SessionId(7).to_string(), "S-7");
    }

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&Kind::KeyUpdate).unwrap();
        assert_eq!(json, "\"key_update\"");
        let json = serde_json::to_string(&Kind::EncryptedMessage).unwrap();
        assert_eq!(json, "\"encrypted_message\"");
        assert_eq!(Kind::Username.to_string(), "username");
    }

    #[test]
    fn test_kind_accepts_pubkey_alias() {
        let kind: Kind = serde_json::from_str("\"pubkey\"").unwrap();
        assert_eq!(kind, Kind::KeyUpdate);
    }

    #[test]
    fn test_welcome_json_format() {
        let json = serde_json::to_value(Envelope::welcome("Joined room: lobby"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "welcome",
                "body": { "content": "Joined room: lobby" }
            })
        );
    }

    #[test]
    fn test_key_update_json_format() {
        let env = Envelope::key_update("alice", PublicKey::from("QUJD"));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "key_update");
        assert_eq!(json["body"]["username"], "alice");
        assert_eq!(json["body"]["publicKey"], "QUJD");
        assert!(json.get("sender").is_none());
    }

    #[test]
    fn test_chat_json_format_omits_missing_to() {
        let env = Envelope::chat("alice", "hi", false, None);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "message",
                "sender": "alice",
                "body": { "content": "hi", "encrypted": false }
            })
        );
    }

    #[test]
    fn test_sealed_json_format() {
        let env = Envelope::sealed("alice", sample_payload());
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "encrypted_message");
        assert_eq!(json["sender"], "alice");
        assert_eq!(json["body"]["iv"], "aXY=");
        assert_eq!(json["body"]["keys"]["carol"], "d2M=");
    }

    #[test]
    fn test_untagged_body_decodes_most_specific_variant() {
        // Each of these would also satisfy `Text { content }` if the
        // variant order were wrong.
        let chat: Envelope = serde_json::from_value(serde_json::json!({
            "type": "message",
            "sender": "a",
            "body": { "content": "x", "encrypted": true, "to": "b" }
        }))
        .unwrap();
        assert!(matches!(chat.body, Body::Chat { encrypted: true, .. }));

        let sealed: Envelope = serde_json::from_value(
            serde_json::to_value(Envelope::sealed("a", sample_payload()))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(sealed.body, Body::Sealed(sample_payload()));

        let text: Envelope = serde_json::from_str(
            r#"{"type":"system","body":{"content":"bob joined the room"}}"#,
        )
        .unwrap();
        assert_eq!(text.text_content(), Some("bob joined the room"));
    }
}
