//! Transport abstraction layer for drpc.
//!
//! Provides the [`Transport`] trait: the thin byte-stream contract the
//! session engine talks to. The engine never sees sockets or pipes, only
//! `open`, `close`, `read(buf, wait)` and `write(bytes)`.
//!
//! # Feature Flags
//!
//! - `ipc` (default): [`IpcTransport`], a Unix domain socket on Unix and a
//!   named pipe on Windows
//! - `memory`: [`MemoryTransport`], an in-process duplex pair for tests and
//!   simulated peers

mod error;
#[cfg(feature = "ipc")]
mod ipc;
#[cfg(feature = "memory")]
mod memory;
mod stream;

pub use error::TransportError;
#[cfg(feature = "ipc")]
pub use ipc::{IpcTransport, default_endpoints, IPC_ENDPOINT_COUNT, IPC_ENDPOINT_PREFIX};
#[cfg(feature = "memory")]
pub use memory::{MemoryAcceptor, MemoryTransport};
pub use stream::BufferedStream;

use std::future::Future;

/// A reopenable local byte stream to the peer process.
///
/// Exactly one task owns a transport at a time (the session actor), so
/// every method takes `&mut self`. The returned futures are `Send` so the
/// owner can live inside a spawned Tokio task.
pub trait Transport: Send + 'static {
    /// Connects to the peer. Fails with [`TransportError::AlreadyOpen`] if
    /// a connection is already established.
    fn open(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection. Closing a transport that is not open is a
    /// no-op.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether a connection is currently established.
    fn is_open(&self) -> bool;

    /// Fills `buf` completely from the stream.
    ///
    /// With `wait == false` this never suspends on the peer: it returns
    /// `Ok(false)` when fewer than `buf.len()` bytes are available right
    /// now, leaving the partial data buffered for the next call. With
    /// `wait == true` it suspends until `buf` is full.
    ///
    /// A peer that closes the stream yields
    /// [`TransportError::ConnectionClosed`].
    fn read(
        &mut self,
        buf: &mut [u8],
        wait: bool,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Writes all of `data` to the peer.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;
}
