//! Last-writer-wins presence slot.
//!
//! Callers may submit presence at any time, connected or not. Until the
//! session has flushed after READY the newest submission waits here,
//! replacing whatever was waiting before; after that, submissions go
//! straight out.

use drpc_protocol::{Presence, RpcCommand};
use drpc_transport::Transport;
use tracing::debug;

use crate::{Session, SessionError};

/// A pending presence change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceUpdate {
    /// Show this presence.
    Set(Presence),
    /// Remove the presence.
    Clear,
}

impl PresenceUpdate {
    /// The `SET_ACTIVITY` command carrying this update.
    pub fn to_command(&self) -> RpcCommand {
        match self {
            Self::Set(presence) => RpcCommand::set_activity(Some(presence.to_activity())),
            Self::Clear => RpcCommand::set_activity(None),
        }
    }
}

impl From<Presence> for PresenceUpdate {
    fn from(presence: Presence) -> Self {
        Self::Set(presence)
    }
}

/// Holds the presence for a session that isn't ready yet.
///
/// One slot, last writer wins. [`flush_if_ready`](Self::flush_if_ready)
/// empties it right after READY; from then on [`submit`](Self::submit)
/// sends directly until [`reset`](Self::reset) starts the next session.
#[derive(Debug, Default)]
pub struct PresenceCache {
    pending: Option<PresenceUpdate>,
    flushed: bool,
}

impl PresenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The update waiting to be sent, if any.
    pub fn pending(&self) -> Option<&PresenceUpdate> {
        self.pending.as_ref()
    }

    /// Whether the flush for the current session has happened.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Sends `update` now if the current session has been flushed,
    /// otherwise stores it in place of any earlier pending update.
    ///
    /// Returns `true` if it was sent. A failed send puts the update back
    /// in the slot for the next session.
    pub async fn submit<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        update: PresenceUpdate,
    ) -> Result<bool, SessionError> {
        if !(self.flushed && session.is_connected()) {
            if self.pending.replace(update).is_some() {
                debug!("pending presence superseded");
            }
            return Ok(false);
        }

        match session.send_presence(&update).await {
            Ok(()) => Ok(true),
            Err(e) => {
                self.pending = Some(update);
                Err(e)
            }
        }
    }

    /// Sends the pending update, if any, and marks the session flushed.
    ///
    /// Call once, right after READY. Returns `true` if something was sent.
    pub async fn flush_if_ready<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<bool, SessionError> {
        if !session.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.flushed = true;

        let Some(update) = self.pending.take() else {
            return Ok(false);
        };
        debug!(clear = matches!(update, PresenceUpdate::Clear), "flushing cached presence");
        match session.send_presence(&update).await {
            Ok(()) => Ok(true),
            Err(e) => {
                self.pending = Some(update);
                Err(e)
            }
        }
    }

    /// Forgets the flush so the next session caches again. Any pending
    /// update is kept.
    pub fn reset(&mut self) {
        self.flushed = false;
    }
}
