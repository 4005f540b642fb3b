//! Connection options.

use std::time::Duration;

use drpc_session::SessionConfig;
use drpc_tick::{TickConfig, TickPolicy};

/// Everything [`RpcClient::connect`](crate::RpcClient::connect) needs.
///
/// ```rust
/// use std::time::Duration;
/// use drpc::ConnectOptions;
///
/// let options = ConnectOptions::new("345229890980937739")
///     .refresh_rate(Duration::from_millis(250))
///     .handshake_timeout(Duration::from_secs(2));
/// assert_eq!(options.client_id, "345229890980937739");
/// assert!(!options.auto_register);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Application id sent in the handshake.
    pub client_id: String,

    /// Ask for the application to be registered for auto-launch.
    ///
    /// Accepted for compatibility; registration itself isn't performed.
    pub auto_register: bool,

    /// Steam app id to register with, if any. Same caveat as
    /// `auto_register`.
    pub steam_id: Option<String>,

    /// How often the actor polls the peer while connected.
    ///
    /// Default: 500 ms.
    pub refresh_rate: Duration,

    /// What the refresh timer does after a tick fired late, for instance
    /// because a callback blocked the actor.
    ///
    /// Default: [`TickPolicy::Skip`].
    pub tick_policy: TickPolicy,

    /// How long to wait for READY after the handshake.
    ///
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,

    /// How long a frame's payload may trail its header before the session
    /// is dropped as corrupt.
    ///
    /// Default: 1 second.
    pub frame_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            client_id: String::new(),
            auto_register: false,
            steam_id: None,
            refresh_rate: Duration::from_millis(500),
            tick_policy: TickPolicy::default(),
            handshake_timeout: session.handshake_timeout,
            frame_timeout: session.frame_timeout,
        }
    }
}

impl ConnectOptions {
    /// Options for `client_id` with everything else at its default.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    /// Sets [`auto_register`](Self::auto_register).
    pub fn auto_register(mut self, auto_register: bool) -> Self {
        self.auto_register = auto_register;
        self
    }

    /// Sets [`steam_id`](Self::steam_id).
    pub fn steam_id(mut self, steam_id: impl Into<String>) -> Self {
        self.steam_id = Some(steam_id.into());
        self
    }

    /// Sets the poll interval. Shorter means lower latency for inbound
    /// events at the cost of more wakeups.
    pub fn refresh_rate(mut self, refresh_rate: Duration) -> Self {
        self.refresh_rate = refresh_rate;
        self
    }

    /// Sets [`tick_policy`](Self::tick_policy).
    pub fn tick_policy(mut self, policy: TickPolicy) -> Self {
        self.tick_policy = policy;
        self
    }

    /// Sets how long [`connect`](crate::RpcClient::connect) waits for READY.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets [`frame_timeout`](Self::frame_timeout).
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub(crate) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handshake_timeout: self.handshake_timeout,
            frame_timeout: self.frame_timeout,
        }
    }

    pub(crate) fn tick_config(&self) -> TickConfig {
        TickConfig {
            policy: self.tick_policy,
            ..TickConfig::with_interval(self.refresh_rate)
        }
    }
}
