//! Session management for Veilroom.
//!
//! A session is the server's record of one live connection:
//!
//! 1. **Identity**: the self-asserted name and optional public key
//!    ([`Session::identify`])
//! 2. **Membership**: which room, if any, the session is in
//! 3. **Delivery**: the [`Outbox`] the relay pushes envelopes into
//!
//! # How it fits in the stack
//!
//! ```text
//! Hub (above)  ← combines sessions and rooms under one lock
//!     ↕
//! Session Layer (this crate)  ← identity, membership pointer, outbox
//!     ↕
//! Protocol Layer (below)  ← provides SessionId, PublicKey, Envelope
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionRegistry;
pub use session::{Outbox, Session, SessionState};
