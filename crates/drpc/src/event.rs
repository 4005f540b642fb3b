//! Events delivered to the caller, as a stream and through callbacks.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use drpc_protocol::User;
use futures_util::stream::Stream;
use tokio::sync::mpsc;

/// Something the caller should know about.
///
/// Every event goes to the [`EventStream`] and, if one is registered, to
/// the matching callback. Both happen on the actor, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The handshake succeeded.
    Ready(User),
    /// The session ended. `(0, "")` for a clean local disconnect.
    Disconnected { code: i32, message: String },
    /// Something failed. Code `-1` for local failures, the peer's code for
    /// rejected commands.
    Errored { code: i32, message: String },
    /// The user joined a game through the peer.
    JoinGame { secret: String },
    /// The user chose to spectate through the peer.
    SpectateGame { secret: String },
    /// Another user asked to join. Answer with
    /// [`RpcClient::respond`](crate::RpcClient::respond).
    JoinRequest(User),
}

type UserCallback = Box<dyn FnMut(&User) + Send>;
type StatusCallback = Box<dyn FnMut(i32, &str) + Send>;
type SecretCallback = Box<dyn FnMut(&str) + Send>;

/// A callback for one event kind.
pub(crate) enum Handler {
    Ready(UserCallback),
    Disconnected(StatusCallback),
    Errored(StatusCallback),
    JoinGame(SecretCallback),
    SpectateGame(SecretCallback),
    JoinRequest(UserCallback),
}

/// The actor's callback table. At most one callback per event kind;
/// setting one replaces the previous.
#[derive(Default)]
pub(crate) struct EventHandlers {
    ready: Option<UserCallback>,
    disconnected: Option<StatusCallback>,
    errored: Option<StatusCallback>,
    join_game: Option<SecretCallback>,
    spectate_game: Option<SecretCallback>,
    join_request: Option<UserCallback>,
}

impl EventHandlers {
    pub(crate) fn set(&mut self, handler: Handler) {
        match handler {
            Handler::Ready(f) => self.ready = Some(f),
            Handler::Disconnected(f) => self.disconnected = Some(f),
            Handler::Errored(f) => self.errored = Some(f),
            Handler::JoinGame(f) => self.join_game = Some(f),
            Handler::SpectateGame(f) => self.spectate_game = Some(f),
            Handler::JoinRequest(f) => self.join_request = Some(f),
        }
    }

    /// Invokes the callback registered for `event`, if any.
    pub(crate) fn dispatch(&mut self, event: &Event) {
        match event {
            Event::Ready(user) => {
                if let Some(f) = self.ready.as_mut() {
                    f(user);
                }
            }
            Event::Disconnected { code, message } => {
                if let Some(f) = self.disconnected.as_mut() {
                    f(*code, message);
                }
            }
            Event::Errored { code, message } => {
                if let Some(f) = self.errored.as_mut() {
                    f(*code, message);
                }
            }
            Event::JoinGame { secret } => {
                if let Some(f) = self.join_game.as_mut() {
                    f(secret);
                }
            }
            Event::SpectateGame { secret } => {
                if let Some(f) = self.spectate_game.as_mut() {
                    f(secret);
                }
            }
            Event::JoinRequest(user) => {
                if let Some(f) = self.join_request.as_mut() {
                    f(user);
                }
            }
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("ready", &self.ready.is_some())
            .field("disconnected", &self.disconnected.is_some())
            .field("errored", &self.errored.is_some())
            .field("join_game", &self.join_game.is_some())
            .field("spectate_game", &self.spectate_game.is_some())
            .field("join_request", &self.join_request.is_some())
            .finish()
    }
}

/// The caller's end of the event queue.
///
/// Yields every [`Event`] in the order the actor produced it, and ends
/// once the actor has terminated. Implements [`Stream`], or use
/// [`recv`](Self::recv) directly.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { receiver }
    }

    /// Waits for the next event. `None` once the actor is gone and every
    /// queued event has been received.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// The next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.receiver.poll_recv(cx)
    }
}
