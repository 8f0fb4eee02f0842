//! Client → server commands and their decoding.
//!
//! A client record looks like `{ "type": ..., "body": { ... } }`. Decoding
//! happens in two steps: the codec turns bytes into a JSON value (a
//! failure there is "Invalid JSON format"), then [`Command::from_value`]
//! checks the envelope shape and picks the variant. The shape of a
//! `message` body is resolved here, once, into a [`Content`] variant, so
//! nothing downstream has to inspect JSON types.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::{Codec, Kind, ProtocolError, PublicKey, SealedPayload};

/// What a `message` command carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// A string broadcast to the room. `encrypted` is a client hint that
    /// the string is already ciphertext; the relay forwards it either way.
    PlainText { text: String, encrypted: bool },

    /// One ciphertext plus a wrapped key per recipient, broadcast as a
    /// whole to the room.
    AddressedCipher(SealedPayload),

    /// An independent ciphertext meant for the member(s) named `to`.
    DirectedCipher { content: String, to: String },
}

impl Content {
    /// Returns `true` if there is nothing to relay.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::PlainText { text, .. } => text.is_empty(),
            Self::AddressedCipher(payload) => payload.content.is_empty(),
            Self::DirectedCipher { content, .. } => content.is_empty(),
        }
    }
}

/// A decoded client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `username`: claim an identity, optionally with a public key.
    Identify {
        name: String,
        public_key: Option<PublicKey>,
    },
    /// `create`: create a room and become its first member.
    Create { room: String },
    /// `join`: join an existing room.
    Join { room: String },
    /// `leave`: leave the current room.
    Leave,
    /// `message`: relay content to the current room.
    Message(Content),
}

impl Command {
    /// Returns the wire `type` of this command.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Identify { .. } => Kind::Username,
            Self::Create { .. } => Kind::Create,
            Self::Join { .. } => Kind::Join,
            Self::Leave => Kind::Leave,
            Self::Message(_) => Kind::Message,
        }
    }

    /// Builds a command from an already-parsed JSON record.
    ///
    /// A missing or `null` `content` reads as the empty string; the relay
    /// then rejects it with the operation's own validation error.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut frame) = value else {
            return Err(ProtocolError::Malformed);
        };
        let Some(Value::String(kind)) = frame.remove("type") else {
            return Err(ProtocolError::Malformed);
        };
        let Some(Value::Object(body)) = frame.remove("body") else {
            return Err(ProtocolError::Malformed);
        };

        match kind.as_str() {
            "username" => Ok(Self::Identify {
                name: text_field(&body, "content")?,
                public_key: public_key_field(&body)?,
            }),
            "create" => Ok(Self::Create {
                room: text_field(&body, "content")?,
            }),
            "join" => Ok(Self::Join {
                room: text_field(&body, "content")?,
            }),
            "leave" => Ok(Self::Leave),
            "message" => content_field(&body).map(Self::Message),
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }
}

/// Decodes one record into a [`Command`].
///
/// # Errors
/// - [`ProtocolError::Decode`]: the record is not JSON
/// - [`ProtocolError::Malformed`]: no string `type` / object `body`
/// - [`ProtocolError::UnknownType`]: unrecognized `type`
/// - [`ProtocolError::InvalidField`]: a field has the wrong JSON type
pub fn parse_command<C: Codec>(
    codec: &C,
    data: &[u8],
) -> Result<Command, ProtocolError> {
    let value: Value = codec.decode(data)?;
    Command::from_value(value)
}

fn text_field(
    body: &Map<String, Value>,
    name: &'static str,
) -> Result<String, ProtocolError> {
    match body.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ProtocolError::InvalidField(name)),
    }
}

fn public_key_field(
    body: &Map<String, Value>,
) -> Result<Option<PublicKey>, ProtocolError> {
    let raw = body.get("publicKey").or_else(|| body.get("pubkey"));
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(PublicKey(s.clone()))),
        Some(_) => Err(ProtocolError::InvalidField("publicKey")),
    }
}

fn content_field(body: &Map<String, Value>) -> Result<Content, ProtocolError> {
    if let Some(sealed @ Value::Object(_)) = body.get("content") {
        return serde_json::from_value(sealed.clone())
            .map(Content::AddressedCipher)
            .map_err(|_| ProtocolError::InvalidField("content"));
    }

    let text = text_field(body, "content")?;
    let to = text_field(body, "to")?;
    if !to.is_empty() {
        return Ok(Content::DirectedCipher { content: text, to });
    }

    let encrypted = match body.get("encrypted") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(ProtocolError::InvalidField("encrypted")),
    };
    Ok(Content::PlainText { text, encrypted })
}

// ---------------------------------------------------------------------------
// Client-side encoding
// ---------------------------------------------------------------------------

/// The `body` object of a client record.
struct CommandBody<'a>(&'a Command);

impl Serialize for CommandBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self.0 {
            Command::Identify { name, public_key } => {
                map.serialize_entry("content", name)?;
                if let Some(key) = public_key {
                    map.serialize_entry("publicKey", key)?;
                }
            }
            Command::Create { room } | Command::Join { room } => {
                map.serialize_entry("content", room)?;
            }
            Command::Leave => map.serialize_entry("content", "")?,
            Command::Message(Content::PlainText { text, encrypted }) => {
                map.serialize_entry("content", text)?;
                map.serialize_entry("encrypted", encrypted)?;
            }
            Command::Message(Content::AddressedCipher(payload)) => {
                map.serialize_entry("content", payload)?;
            }
            Command::Message(Content::DirectedCipher { content, to }) => {
                map.serialize_entry("content", content)?;
                map.serialize_entry("to", to)?;
                map.serialize_entry("encrypted", &true)?;
            }
        }
        map.end()
    }
}

/// Writes the command in its client wire form, `{ "type", "body" }`.
impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", &self.kind())?;
        map.serialize_entry("body", &CommandBody(self))?;
        map.end()
    }
}
