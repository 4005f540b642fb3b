//! Error types for the session layer.

use std::time::Duration;

use drpc_protocol::ProtocolError;
use drpc_transport::TransportError;

/// Numeric codes reported alongside Disconnected and Errored events.
///
/// Peer Close frames carry their own codes instead (1000 user logout,
/// 4000 invalid client id, 5005 duplicate secrets, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Uncategorized failure inside the actor.
    Unknown = -1,
    /// Clean shutdown.
    Success = 0,
    /// The stream to the peer closed.
    PipeClosed = 1,
    /// The peer sent bytes that don't form a valid frame.
    ReadCorrupt = 2,
    /// The peer never answered the handshake with READY.
    HandshakeRejected = 3,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

/// Errors that can occur while driving a session.
///
/// Every variant for which [`is_fatal`](Self::is_fatal) is true leaves the
/// session Disconnected with its transport closed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Opening, reading, or writing the transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An outgoing message couldn't be encoded. The session is unaffected.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer sent a malformed frame or a partial payload.
    #[error("read corrupt: {0}")]
    ReadCorrupt(String),

    /// The peer answered the handshake with something other than READY.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// READY did not arrive within the configured handshake timeout.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The peer closed the connection, with a Close frame or by dropping
    /// the stream.
    #[error("connection closed by peer: {code} ({message})")]
    Closed {
        /// Close code from the peer, or [`ErrorCode::PipeClosed`].
        code: i32,
        /// Close message from the peer.
        message: String,
    },

    /// The operation needs an active session.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called on a session that is already connected.
    #[error("already connected")]
    AlreadyConnected,
}

impl SessionError {
    /// The code reported for this error in Disconnected/Errored events.
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport(_) => ErrorCode::PipeClosed.into(),
            Self::Protocol(_) | Self::ReadCorrupt(_) => ErrorCode::ReadCorrupt.into(),
            Self::HandshakeRejected(_) | Self::HandshakeTimeout(_) => {
                ErrorCode::HandshakeRejected.into()
            }
            Self::Closed { code, .. } => *code,
            Self::NotConnected | Self::AlreadyConnected => ErrorCode::Unknown.into(),
        }
    }

    /// Whether the session was torn down by this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Protocol(_) | Self::NotConnected | Self::AlreadyConnected
        )
    }

    /// Whether the peer ended the session in an orderly way (Close frame,
    /// dropped stream, or corrupt framing it is responsible for). These
    /// are reported as Disconnected only, never as Errored.
    pub fn is_peer_close(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::ReadCorrupt(_))
    }

    /// The message reported for this error in Disconnected events.
    pub fn report_message(&self) -> String {
        match self {
            Self::Closed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
