//! Room registry and key distribution for Veilroom.
//!
//! Rooms are plain named member sets. A room exists exactly as long as it
//! has members: [`RoomRegistry::create`] brings one into existence with
//! its creator inside, and the [`RoomRegistry::leave`] that removes the
//! last member deletes it in the same call.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/deletes rooms, tracks membership
//! - [`Room`]: one room's name and members
//! - [`keys::plan`]: which public keys to announce to whom after a
//!   membership change

mod error;
pub mod keys;
mod manager;
mod room;

pub use error::RoomError;
pub use keys::{KeyAnnouncement, KeyHolder, KeyStrategy};
pub use manager::{Departure, RoomRegistry};
pub use room::Room;
