//! # drpc
//!
//! Rich presence client for the chat app running on the same machine.
//!
//! drpc connects to the app's local IPC endpoint (a Unix domain socket, or
//! a named pipe on Windows), tells it what the user is doing, and reports
//! back join/spectate actions aimed at the user.
//!
//! All protocol work happens on one actor task. [`RpcClient`] is a cheap
//! handle that enqueues commands; results come back as [`Event`]s on the
//! [`EventStream`] and through optional callbacks.
//!
//! ```text
//! RpcClient ──commands──→ actor (Session + PresenceCache) ──frames──→ peer
//!     ↑                         │
//!     └──── EventStream ←─events┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drpc::prelude::*;
//!
//! # async fn demo() -> Result<(), DrpcError> {
//! let (client, mut events) = RpcClient::spawn();
//! client.on_join_game(|secret| println!("joining {secret}"))?;
//! client.connect(ConnectOptions::new("345229890980937739"))?;
//!
//! if let Some(Event::Ready(user)) = events.recv().await {
//!     println!("connected as {user}");
//! }
//! # Ok(())
//! # }
//! ```

mod actor;
mod client;
mod config;
mod error;
mod event;

pub use client::RpcClient;
pub use config::ConnectOptions;
pub use error::DrpcError;
pub use event::{Event, EventStream};

pub use drpc_protocol::{Presence, Reply, User, ValidationError};
pub use drpc_session::ErrorCode;
pub use drpc_tick::TickPolicy;

/// Everything a typical caller needs.
pub mod prelude {
    pub use crate::{
        ConnectOptions, DrpcError, Event, EventStream, Presence, Reply, RpcClient, User,
    };
}
