//! Session layer for drpc.
//!
//! This crate drives one connection to the local peer:
//!
//! 1. **Handshake**: open the transport, send `{"v":1,"client_id":...}`,
//!    wait for READY ([`Session::connect`]).
//! 2. **Traffic**: drain inbound frames without blocking, answering pings
//!    along the way ([`Session::poll`]), and send commands with fresh
//!    nonces ([`Session::send`]).
//! 3. **Presence caching**: hold the newest presence until the session
//!    is ready for it ([`PresenceCache`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Client actor (above)  ← owns one Session and one PresenceCache
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol + Transport (below)  ← frames, JSON, bytes
//! ```

mod cache;
mod error;
mod session;

pub use cache::{PresenceCache, PresenceUpdate};
pub use error::{ErrorCode, SessionError};
pub use session::{Session, SessionConfig, SessionState};
