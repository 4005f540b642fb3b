//! In-process transport backed by `tokio::io::duplex`.
//!
//! Every [`Transport::open`] creates a fresh duplex pair and hands the far
//! end to the [`MemoryAcceptor`], which plays the role of the peer
//! process's listening endpoint.

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use crate::{BufferedStream, Transport, TransportError};

/// Per-direction buffer size of each duplex pair. Large enough to hold a
/// maximum-size frame.
const DUPLEX_CAPACITY: usize = 128 * 1024;

/// A [`Transport`] whose peer lives in the same process.
#[derive(Debug)]
pub struct MemoryTransport {
    connector: mpsc::UnboundedSender<DuplexStream>,
    stream: Option<BufferedStream<DuplexStream>>,
}

/// The peer side of a [`MemoryTransport`]: yields one stream per `open`.
#[derive(Debug)]
pub struct MemoryAcceptor {
    incoming: mpsc::UnboundedReceiver<DuplexStream>,
}

impl MemoryTransport {
    /// Creates a transport and the acceptor its connections arrive at.
    pub fn new() -> (Self, MemoryAcceptor) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                connector: tx,
                stream: None,
            },
            MemoryAcceptor { incoming: rx },
        )
    }

    fn stream(&mut self) -> Result<&mut BufferedStream<DuplexStream>, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl MemoryAcceptor {
    /// Waits for the transport to open a connection.
    ///
    /// Returns `None` once the transport has been dropped.
    pub async fn accept(&mut self) -> Option<DuplexStream> {
        self.incoming.recv().await
    }
}

impl Transport for MemoryTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Err(TransportError::AlreadyOpen);
        }
        let (ours, theirs) = tokio::io::duplex(DUPLEX_CAPACITY);
        self.connector
            .send(theirs)
            .map_err(|_| TransportError::NotFound { tried: 1 })?;
        self.stream = Some(BufferedStream::new(ours));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Dropping our half is what the peer observes as EOF.
        match self.stream.take() {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn read(&mut self, buf: &mut [u8], wait: bool) -> Result<bool, TransportError> {
        let result = self.stream()?.read(buf, wait).await;
        if matches!(&result, Err(e) if e.is_closed()) {
            self.stream = None;
        }
        result
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let result = self.stream()?.write(data).await;
        if result.is_err() {
            self.stream = None;
        }
        result
    }
}
