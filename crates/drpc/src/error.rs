//! Unified error type for the drpc client.

use drpc_protocol::ValidationError;
use drpc_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// Most failures inside a running session are reported as
/// [`Event::Errored`](crate::Event::Errored) /
/// [`Event::Disconnected`](crate::Event::Disconnected) rather than returned;
/// this type covers what the handle itself can fail with.
#[derive(Debug, thiserror::Error)]
pub enum DrpcError {
    /// A presence field exceeded its length limit.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A session-level error. Transport and framing failures arrive
    /// wrapped in this.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client actor has terminated; no further commands are accepted.
    #[error("client actor has shut down")]
    ChannelClosed,

    /// The operation needs an active session.
    #[error("not connected")]
    NotConnected,

    /// The connect options were rejected before reaching the actor.
    #[error("invalid connect options: {0}")]
    InvalidOptions(String),
}
