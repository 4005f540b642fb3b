//! The client actor: a Tokio task that owns the session.
//!
//! All protocol traffic and every callback runs here, one command or tick
//! at a time. The outside world talks to it through an unbounded mpsc
//! channel ([`Command`]); queries carry a oneshot reply channel.
//!
//! Between commands the actor sleeps on the refresh tick. Each tick it
//! drains whatever commands are queued, then reads everything the peer
//! has sent.

use drpc_protocol::{Dispatch, Reply, RpcCommand, User};
use drpc_session::{ErrorCode, PresenceCache, PresenceUpdate, Session, SessionError};
use drpc_tick::{TickInfo, TickScheduler};
use drpc_transport::Transport;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::event::{EventHandlers, Handler};
use crate::{ConnectOptions, DrpcError, Event};

/// Commands sent to the actor, processed strictly in arrival order.
pub(crate) enum Command {
    /// Tear down any current session and open a new one.
    Connect(ConnectOptions),

    /// Show, replace or clear the presence (cached until ready).
    UpdatePresence(PresenceUpdate),

    /// Answer a join request.
    Respond {
        user_id: String,
        reply: Reply,
        result: oneshot::Sender<Result<(), DrpcError>>,
    },

    /// Register or replace a callback.
    SetHandler(Handler),

    QueryConnected(oneshot::Sender<bool>),
    QueryInitialized(oneshot::Sender<bool>),
    QueryUser(oneshot::Sender<Option<User>>),

    /// End the current session; the actor keeps running.
    Disconnect,

    /// End the current session and stop the actor.
    Shutdown,
}

/// What the loop does after handling a command or tick.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub(crate) struct ClientActor<T: Transport> {
    session: Session<T>,
    cache: PresenceCache,
    handlers: EventHandlers,
    /// Set while a session is open or being opened; cleared by teardown.
    active: bool,
    ticker: Option<TickScheduler>,
    receiver: mpsc::UnboundedReceiver<Command>,
    /// A command pulled off the queue early that still has to run before
    /// anything behind it.
    deferred: Option<Command>,
    events: mpsc::UnboundedSender<Event>,
}

impl<T: Transport> ClientActor<T> {
    pub(crate) fn new(
        session: Session<T>,
        receiver: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            session,
            cache: PresenceCache::new(),
            handlers: EventHandlers::default(),
            active: false,
            ticker: None,
            receiver,
            deferred: None,
            events,
        }
    }

    /// Runs until [`Command::Shutdown`] or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        info!("client actor started");

        loop {
            if let Some(cmd) = self.deferred.take() {
                if self.handle(cmd).await == Flow::Exit {
                    break;
                }
                continue;
            }

            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("all client handles dropped");
                        break;
                    };
                    if self.handle(cmd).await == Flow::Exit {
                        break;
                    }
                }
                info = next_tick(&mut self.ticker) => {
                    if self.on_tick(info).await == Flow::Exit {
                        break;
                    }
                }
            }
        }

        self.teardown().await;
        info!("client actor stopped");
    }

    async fn handle(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Connect(options) => self.handle_connect(options).await,
            Command::UpdatePresence(update) => {
                match self.cache.submit(&mut self.session, update).await {
                    Ok(sent) => trace!(sent, "presence submitted"),
                    Err(e) => self.on_session_error(&e).await,
                }
            }
            Command::Respond {
                user_id,
                reply,
                result,
            } => {
                let outcome = self.handle_respond(user_id, reply).await;
                let _ = result.send(outcome);
            }
            Command::SetHandler(handler) => self.handlers.set(handler),
            Command::QueryConnected(reply) => {
                let _ = reply.send(self.session.is_connected());
            }
            Command::QueryInitialized(reply) => {
                let _ = reply.send(self.session.is_connected() && self.cache.is_flushed());
            }
            Command::QueryUser(reply) => {
                let _ = reply.send(self.session.user().cloned());
            }
            Command::Disconnect => {
                debug!("disconnect requested");
                self.teardown().await;
            }
            Command::Shutdown => {
                debug!("shutdown requested");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    async fn on_tick(&mut self, info: TickInfo) -> Flow {
        trace!(tick = info.tick, "refresh tick");
        if info.overrun {
            debug!(tick = info.tick, skipped = info.ticks_skipped, "refresh tick ran late");
        }

        while let Some(cmd) = self.next_queued() {
            if self.handle(cmd).await == Flow::Exit {
                return Flow::Exit;
            }
        }

        while self.session.is_connected() {
            match self.session.poll().await {
                Ok(Some(dispatch)) => self.on_dispatch(dispatch),
                Ok(None) => break,
                Err(e) => {
                    self.on_session_error(&e).await;
                    break;
                }
            }
        }
        Flow::Continue
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    async fn handle_connect(&mut self, options: ConnectOptions) {
        if self.active {
            info!("connect while a session is active, tearing it down first");
            self.teardown().await;
        }
        if options.auto_register || options.steam_id.is_some() {
            debug!(
                auto_register = options.auto_register,
                steam_id = ?options.steam_id,
                "application registration is not performed"
            );
        }

        self.session.set_config(options.session_config());
        self.active = true;
        info!(client_id = %options.client_id, "connecting");

        let user = match self.session.connect(&options.client_id).await {
            Ok(user) => user,
            Err(e) => {
                self.on_session_error(&e).await;
                return;
            }
        };
        self.emit(Event::Ready(user));
        self.absorb_queued_presence().await;

        let flushed = match self.cache.flush_if_ready(&mut self.session).await {
            Ok(_) => self.session.subscribe().await,
            Err(e) => Err(e),
        };
        if let Err(e) = flushed {
            self.on_session_error(&e).await;
        }

        if self.session.is_connected() {
            self.ticker = Some(TickScheduler::new(options.tick_config()));
        }
    }

    /// Moves presence updates that queued up during the handshake into the
    /// cache so only the newest is flushed. Stops at the first command of
    /// any other kind and defers it.
    async fn absorb_queued_presence(&mut self) {
        while let Ok(cmd) = self.receiver.try_recv() {
            let update = match cmd {
                Command::UpdatePresence(update) => update,
                other => {
                    self.deferred = Some(other);
                    return;
                }
            };
            if let Err(e) = self.cache.submit(&mut self.session, update).await {
                self.on_session_error(&e).await;
                return;
            }
        }
    }

    fn next_queued(&mut self) -> Option<Command> {
        self.deferred
            .take()
            .or_else(|| self.receiver.try_recv().ok())
    }

    async fn handle_respond(&mut self, user_id: String, reply: Reply) -> Result<(), DrpcError> {
        if !self.session.is_connected() {
            return Err(DrpcError::NotConnected);
        }
        debug!(%user_id, ?reply, "answering join request");
        match self.session.send(RpcCommand::reply(user_id, reply)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.on_session_error(&e).await;
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Session outcomes
    // -----------------------------------------------------------------------

    fn on_dispatch(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Ready(_) => debug!("ignoring repeated READY"),
            Dispatch::JoinGame { secret } => self.emit(Event::JoinGame { secret }),
            Dispatch::SpectateGame { secret } => self.emit(Event::SpectateGame { secret }),
            Dispatch::JoinRequest(user) => self.emit(Event::JoinRequest(user)),
            Dispatch::Error { code, message } => {
                warn!(code, reason = %message, "peer reported an error");
                self.emit(Event::Errored { code, message });
            }
        }
    }

    /// Reports `err` and, if it ended the session, runs the teardown.
    ///
    /// Peer-initiated closes are reported as Disconnected only.
    async fn on_session_error(&mut self, err: &SessionError) {
        if !err.is_peer_close() {
            self.emit(Event::Errored {
                code: ErrorCode::Unknown.into(),
                message: err.to_string(),
            });
        }
        if !self.session.is_connected() {
            self.teardown().await;
        }
    }

    /// Closes the session, stops the ticker and fires Disconnected with
    /// the session's last error. No-op when nothing is active.
    async fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.ticker = None;
        self.session.close().await;
        self.cache.reset();

        let (code, message) = self.session.last_error();
        let event = Event::Disconnected {
            code,
            message: message.to_string(),
        };
        info!(code, reason = message, "disconnected");
        self.emit(event);
    }

    /// Runs the callback for `event`, then queues it on the event stream.
    fn emit(&mut self, event: Event) {
        trace!(?event, "event");
        self.handlers.dispatch(&event);
        // A dropped EventStream only means nobody is listening.
        let _ = self.events.send(event);
    }
}

async fn next_tick(ticker: &mut Option<TickScheduler>) -> TickInfo {
    match ticker {
        Some(ticker) => ticker.wait_for_tick().await,
        None => std::future::pending().await,
    }
}

/// Spawns the actor for `session` and returns its command sender and the
/// event receiver.
pub(crate) fn spawn_actor<T: Transport>(
    session: Session<T>,
) -> (
    mpsc::UnboundedSender<Command>,
    mpsc::UnboundedReceiver<Event>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let actor = ClientActor::new(session, cmd_rx, event_tx);
    tokio::spawn(actor.run());

    (cmd_tx, event_rx)
}
