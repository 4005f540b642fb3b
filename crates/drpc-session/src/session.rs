//! The connection state machine.
//!
//! A [`Session`] owns one [`Transport`] and walks it through the
//! handshake, then reads dispatches and writes commands until either side
//! closes:
//!
//! ```text
//!   Disconnected ──(open + Handshake)──→ Handshaking ──(READY)──→ Connected
//!        ↑                                    │                      │
//!        └──────(error / Close / timeout)─────┴──────────────────────┘
//! ```
//!
//! Any fatal error tears the session down on the spot (transport closed,
//! state back to Disconnected) and is remembered in [`Session::last_error`]
//! so the owner can report it.

use std::time::Duration;

use drpc_protocol::{
    CloseReason, Codec, Dispatch, Frame, FrameHeader, Handshake, HEADER_SIZE, IncomingMessage,
    JsonCodec, OpCode, Request, RpcCommand, Subscription, User,
};
use drpc_transport::Transport;
use tracing::{debug, info, trace, warn};

use crate::{ErrorCode, PresenceUpdate, SessionError};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for READY after sending the handshake.
    ///
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,

    /// How long the rest of a frame may take to arrive once its header
    /// has been read. A payload still incomplete after this is treated as
    /// corrupt and ends the session.
    ///
    /// Default: 1 second.
    pub frame_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            frame_timeout: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No transport is open.
    #[default]
    Disconnected,
    /// The handshake was sent; waiting for READY.
    Handshaking,
    /// READY was received; commands may be sent.
    Connected,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connection to the local peer.
///
/// Not thread-safe by itself: it is owned by the client actor, which is
/// the only writer to the transport.
#[derive(Debug)]
pub struct Session<T: Transport> {
    transport: T,
    codec: JsonCodec,
    config: SessionConfig,
    state: SessionState,
    user: Option<User>,
    next_nonce: u64,
    last_error_code: i32,
    last_error_message: String,
}

impl<T: Transport> Session<T> {
    /// Creates a disconnected session over `transport`.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            codec: JsonCodec,
            config,
            state: SessionState::Disconnected,
            user: None,
            next_nonce: 1,
            last_error_code: ErrorCode::Success.into(),
            last_error_message: String::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `true` between READY and the end of the session. Commands can only
    /// be sent in this state.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// The user from the last READY, while connected.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Code and message of the error that ended the last session, or
    /// `(0, "")` if it hasn't ended or ended cleanly.
    pub fn last_error(&self) -> (i32, &str) {
        (self.last_error_code, &self.last_error_message)
    }

    /// Replaces the config used by the next [`connect`](Self::connect).
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Opens the transport, sends the handshake and waits for READY.
    ///
    /// Pings that arrive before READY are answered. A Close frame, a
    /// non-READY message, or the timeout elapsing all fail the handshake
    /// and leave the session Disconnected.
    pub async fn connect(&mut self, client_id: &str) -> Result<User, SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::AlreadyConnected);
        }

        self.last_error_code = ErrorCode::Success.into();
        self.last_error_message.clear();
        self.next_nonce = 1;

        if let Err(e) = self.transport.open().await {
            return Err(self.fail(e.into()).await);
        }
        self.state = SessionState::Handshaking;
        debug!(client_id, "transport open, sending handshake");

        let timeout = self.config.handshake_timeout;
        let outcome = match tokio::time::timeout(timeout, self.handshake(client_id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SessionError::HandshakeTimeout(timeout)),
        };

        match outcome {
            Ok(user) => {
                info!(user_id = %user.user_id, username = %user.username, "session ready");
                self.state = SessionState::Connected;
                self.user = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                let e = self.fail(e).await;
                self.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, client_id: &str) -> Result<User, SessionError> {
        let frame = Frame::json(OpCode::Handshake, &Handshake::new(client_id), &self.codec)?;
        self.write_frame(&frame).await?;

        loop {
            let Some(frame) = self.next_frame(true).await? else {
                continue;
            };
            let message: IncomingMessage = self
                .codec
                .decode(&frame.payload)
                .map_err(|e| SessionError::HandshakeRejected(format!("malformed reply: {e}")))?;

            if !message.is_ready() {
                return Err(SessionError::HandshakeRejected(format!(
                    "expected READY, got {} {}",
                    message.cmd,
                    message.evt.as_deref().unwrap_or("-")
                )));
            }
            return match message.into_dispatch() {
                Ok(Some(Dispatch::Ready(user))) => Ok(user),
                Ok(_) => Err(SessionError::HandshakeRejected("READY without a user".into())),
                Err(e) => Err(SessionError::HandshakeRejected(e.to_string())),
            };
        }
    }

    /// Closes the transport and returns to Disconnected.
    ///
    /// Idempotent. Failures shutting the transport down are logged and
    /// swallowed; [`last_error`](Self::last_error) is left as it was.
    pub async fn close(&mut self) {
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "transport close failed");
        }
        if self.state != SessionState::Disconnected {
            debug!("session closed");
        }
        self.state = SessionState::Disconnected;
        self.user = None;
    }

    /// Records `err` and tears the session down if it is fatal.
    async fn fail(&mut self, err: SessionError) -> SessionError {
        if err.is_fatal() {
            warn!(error = %err, code = err.code(), "session ended");
            self.last_error_code = err.code();
            self.last_error_message = err.report_message();
            self.close().await;
        }
        err
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Reads every complete frame the peer has sent, without waiting for
    /// more, and returns the first dispatch worth acting on.
    ///
    /// `Ok(None)` means nothing is pending. Call again until it returns
    /// `None` to drain everything buffered.
    pub async fn poll(&mut self) -> Result<Option<Dispatch>, SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        match self.poll_inner().await {
            Ok(dispatch) => Ok(dispatch),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn poll_inner(&mut self) -> Result<Option<Dispatch>, SessionError> {
        loop {
            let Some(frame) = self.next_frame(false).await? else {
                return Ok(None);
            };

            let message: IncomingMessage = match self.codec.decode(&frame.payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "discarding malformed message");
                    continue;
                }
            };
            trace!(cmd = %message.cmd, evt = ?message.evt, nonce = ?message.nonce, "message received");

            match message.into_dispatch() {
                Ok(Some(dispatch)) => return Ok(Some(dispatch)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "discarding malformed dispatch");
                    continue;
                }
            }
        }
    }

    /// Reads one frame and handles the control opcodes.
    ///
    /// Returns `Some` only for Frame-opcode frames. Pings are answered with
    /// a Pong carrying the same payload, Pongs are dropped, and Close turns
    /// into [`SessionError::Closed`]. With `wait == false`, `Ok(None)` means
    /// no complete header is buffered.
    ///
    /// Once a header is in, the payload gets at most
    /// [`SessionConfig::frame_timeout`] to arrive in either mode.
    async fn next_frame(&mut self, wait: bool) -> Result<Option<Frame>, SessionError> {
        loop {
            let mut header = [0u8; HEADER_SIZE];
            if !self.transport.read(&mut header, wait).await.map_err(pipe_closed)? {
                return Ok(None);
            }
            let header = FrameHeader::decode(&header)
                .map_err(|e| SessionError::ReadCorrupt(format!("Bad ipc frame: {e}")))?;

            let mut payload = vec![0u8; header.length as usize];
            if !payload.is_empty() {
                let frame_timeout = self.config.frame_timeout;
                let read = self.transport.read(&mut payload, true);
                match tokio::time::timeout(frame_timeout, read).await {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false) | Err(_)) => {
                        return Err(SessionError::ReadCorrupt("Partial data in frame".into()));
                    }
                    Err(_) => {
                        debug!(expected = header.length, ?frame_timeout, "frame payload stalled");
                        return Err(SessionError::ReadCorrupt("Partial data in frame".into()));
                    }
                }
            }

            match header.opcode {
                OpCode::Frame => return Ok(Some(Frame::new(OpCode::Frame, payload))),
                OpCode::Ping => {
                    trace!(len = payload.len(), "ping, answering with pong");
                    self.write_frame(&Frame::new(OpCode::Pong, payload)).await?;
                }
                OpCode::Pong => trace!("pong"),
                OpCode::Close => {
                    let reason: CloseReason = self
                        .codec
                        .decode(&payload)
                        .map_err(|e| SessionError::ReadCorrupt(format!("Bad close frame: {e}")))?;
                    info!(code = reason.code, reason = %reason.message, "peer closed the session");
                    return Err(SessionError::Closed {
                        code: reason.code,
                        message: reason.message,
                    });
                }
                OpCode::Handshake => {
                    return Err(SessionError::ReadCorrupt("Bad ipc frame".into()));
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    async fn write_frame(&mut self, frame: &Frame) -> Result<(), SessionError> {
        let bytes = frame.encode()?;
        self.transport.write(&bytes).await?;
        Ok(())
    }

    /// Sends `command` with the next nonce.
    ///
    /// Encoding failures are returned without touching the session; write
    /// failures tear it down.
    pub async fn send(&mut self, command: RpcCommand) -> Result<(), SessionError> {
        if self.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }

        let nonce = self.next_nonce.to_string();
        let request = Request { command, nonce };
        let frame = Frame::json(OpCode::Frame, &request, &self.codec)?;
        self.next_nonce += 1;

        trace!(nonce = %request.nonce, len = frame.payload.len(), "sending command");
        match self.write_frame(&frame).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Sends `SET_ACTIVITY` for `update`.
    pub async fn send_presence(&mut self, update: &PresenceUpdate) -> Result<(), SessionError> {
        self.send(update.to_command()).await
    }

    /// Subscribes to the join, spectate and join-request events.
    pub async fn subscribe(&mut self) -> Result<(), SessionError> {
        for evt in Subscription::ALL {
            self.send(RpcCommand::Subscribe { evt }).await?;
        }
        Ok(())
    }
}

fn pipe_closed(err: drpc_transport::TransportError) -> SessionError {
    if err.is_closed() {
        SessionError::Closed {
            code: ErrorCode::PipeClosed.into(),
            message: "Pipe closed".into(),
        }
    } else {
        SessionError::Transport(err)
    }
}
