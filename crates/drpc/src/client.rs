//! `RpcClient`: the caller-facing handle to the client actor.

use drpc_protocol::{Presence, Reply, User};
use drpc_session::{PresenceUpdate, Session, SessionConfig};
use drpc_transport::Transport;
use tokio::sync::{mpsc, oneshot};

use crate::actor::{Command, spawn_actor};
use crate::event::Handler;
use crate::{ConnectOptions, DrpcError, EventStream};

/// Handle to a running client actor.
///
/// Cheap to clone and safe to share between tasks and threads: every
/// method only enqueues a command. Commands from all clones are applied
/// in one total order, the order the actor receives them.
///
/// Fire-and-forget methods (`connect`, `update_presence`, ...) fail only
/// with [`DrpcError::ChannelClosed`], once the actor has terminated.
/// Their outcome arrives later as an [`Event`](crate::Event).
///
/// ```rust,no_run
/// use drpc::prelude::*;
///
/// # async fn demo() -> Result<(), DrpcError> {
/// let (client, mut events) = RpcClient::spawn();
/// client.connect(ConnectOptions::new("345229890980937739"))?;
///
/// let mut presence = Presence::new();
/// presence.set_state("In a match")?.set_details("Ranked 2v2")?;
/// client.update_presence(presence)?;
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RpcClient {
    sender: mpsc::UnboundedSender<Command>,
}

impl RpcClient {
    /// Spawns a client that talks to the local IPC endpoint.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn() -> (Self, EventStream) {
        Self::spawn_with(drpc_transport::IpcTransport::new())
    }

    /// Spawns a client over a custom transport.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_with<T: Transport>(transport: T) -> (Self, EventStream) {
        let session = Session::new(transport, SessionConfig::default());
        let (sender, events) = spawn_actor(session);
        (Self { sender }, EventStream::new(events))
    }

    fn send(&self, cmd: Command) -> Result<(), DrpcError> {
        self.sender.send(cmd).map_err(|_| DrpcError::ChannelClosed)
    }

    async fn query<R>(&self, cmd: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R, DrpcError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(cmd(reply_tx))?;
        reply_rx.await.map_err(|_| DrpcError::ChannelClosed)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Connects to the peer, tearing down any current session first.
    ///
    /// Success is reported as [`Event::Ready`](crate::Event::Ready),
    /// failure as `Errored` and/or `Disconnected`.
    pub fn connect(&self, options: ConnectOptions) -> Result<(), DrpcError> {
        if options.client_id.is_empty() {
            return Err(DrpcError::InvalidOptions("client_id must not be empty".into()));
        }
        self.send(Command::Connect(options))
    }

    /// Shows `presence`. Sent right away once the session is ready;
    /// before that only the newest submission is kept.
    pub fn update_presence(&self, presence: Presence) -> Result<(), DrpcError> {
        self.send(Command::UpdatePresence(PresenceUpdate::Set(presence)))
    }

    /// Removes the presence, with the same caching as
    /// [`update_presence`](Self::update_presence).
    pub fn clear_presence(&self) -> Result<(), DrpcError> {
        self.send(Command::UpdatePresence(PresenceUpdate::Clear))
    }

    /// Ends the current session. The actor stays available for a later
    /// [`connect`](Self::connect).
    pub fn disconnect(&self) -> Result<(), DrpcError> {
        self.send(Command::Disconnect)
    }

    /// Ends the current session and stops the actor. Returns once the
    /// actor has terminated; every later call fails with
    /// [`DrpcError::ChannelClosed`].
    pub async fn shutdown(&self) -> Result<(), DrpcError> {
        self.send(Command::Shutdown)?;
        self.sender.closed().await;
        Ok(())
    }

    /// Answers a join request from `user_id`.
    ///
    /// Fails with [`DrpcError::NotConnected`] while Disconnected.
    pub async fn respond(&self, user_id: impl Into<String>, reply: Reply) -> Result<(), DrpcError> {
        let user_id = user_id.into();
        self.query(|result| Command::Respond {
            user_id,
            reply,
            result,
        })
        .await?
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether a session is connected, as of this call's place in the
    /// command order.
    pub async fn is_connected(&self) -> Result<bool, DrpcError> {
        self.query(Command::QueryConnected).await
    }

    /// Whether the current session has been ready long enough to flush the
    /// cached presence.
    pub async fn is_initialized(&self) -> Result<bool, DrpcError> {
        self.query(Command::QueryInitialized).await
    }

    /// The user the current session belongs to.
    pub async fn user(&self) -> Result<Option<User>, DrpcError> {
        self.query(Command::QueryUser).await
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    // Callbacks run on the actor task. A new callback replaces the old one
    // from the next event on.

    /// Called with the session's user after each successful handshake.
    pub fn on_ready(&self, f: impl FnMut(&User) + Send + 'static) -> Result<(), DrpcError> {
        self.send(Command::SetHandler(Handler::Ready(Box::new(f))))
    }

    /// Called with the close code and message.
    pub fn on_disconnected(
        &self,
        f: impl FnMut(i32, &str) + Send + 'static,
    ) -> Result<(), DrpcError> {
        self.send(Command::SetHandler(Handler::Disconnected(Box::new(f))))
    }

    /// Called with `-1` and a description for local failures, or with the
    /// peer's code and message when it rejects a command.
    pub fn on_errored(&self, f: impl FnMut(i32, &str) + Send + 'static) -> Result<(), DrpcError> {
        self.send(Command::SetHandler(Handler::Errored(Box::new(f))))
    }

    /// Called with the join secret.
    pub fn on_join_game(&self, f: impl FnMut(&str) + Send + 'static) -> Result<(), DrpcError> {
        self.send(Command::SetHandler(Handler::JoinGame(Box::new(f))))
    }

    /// Called with the spectate secret.
    pub fn on_spectate_game(&self, f: impl FnMut(&str) + Send + 'static) -> Result<(), DrpcError> {
        self.send(Command::SetHandler(Handler::SpectateGame(Box::new(f))))
    }

    /// Called with the user asking to join. Answer with
    /// [`respond`](Self::respond).
    pub fn on_join_request(&self, f: impl FnMut(&User) + Send + 'static) -> Result<(), DrpcError> {
        self.send(Command::SetHandler(Handler::JoinRequest(Box::new(f))))
    }
}
