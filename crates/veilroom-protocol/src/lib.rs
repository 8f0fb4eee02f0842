//! Wire protocol for Veilroom.
//!
//! This crate defines the "language" that clients and the relay speak:
//!
//! - **Types** ([`Envelope`], [`Body`], [`Kind`], [`SealedPayload`]):
//!   the server → client records that travel on the wire.
//! - **Commands** ([`Command`], [`Content`], [`parse_command`]): the
//!   client → server operations, decoded from one record each.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how records are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (whole records) and the
//! relay (session and room state). It doesn't know about connections or
//! rooms; it only knows how to turn a record into a [`Command`] and an
//! [`Envelope`] back into bytes.
//!
//! ```text
//! Transport (record) → Protocol (Command) → Hub (session + room state)
//! ```

mod codec;
mod command;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use command::{Command, Content, parse_command};
pub use error::ProtocolError;
pub use types::{Body, Envelope, Kind, PublicKey, SealedPayload, SessionId};
