//! # Veilroom
//!
//! A relay for end-to-end encrypted group chat.
//!
//! Clients connect, claim a name (optionally announcing a public key),
//! and create or join named rooms. The relay forwards chat messages to
//! the other members of the sender's room and hands each member the public
//! keys of everyone else in it. It never sees plaintext of encrypted
//! messages: ciphertext is produced and consumed client-side (see the
//! `veilroom-seal` crate) and relayed as opaque strings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use veilroom::prelude::*;
//!
//! # async fn run() -> Result<(), RelayError> {
//! let server = VeilroomServer::builder()
//!     .bind("127.0.0.1:1337")
//!     .key_strategy(KeyStrategy::Push)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod hub;
mod server;

pub use config::{RelayConfig, RelayMode};
pub use error::{ErrorClass, RelayError};
pub use hub::Hub;
pub use server::{DEFAULT_BIND_ADDR, VeilroomServer, VeilroomServerBuilder};

/// Everything needed to configure and run a relay.
pub mod prelude {
    pub use crate::{
        RelayConfig, RelayError, RelayMode, VeilroomServer,
        VeilroomServerBuilder,
    };
    pub use veilroom_room::KeyStrategy;
}
