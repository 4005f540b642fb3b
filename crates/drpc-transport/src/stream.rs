//! Buffered exact-length reads over any async byte stream.

use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Bytes pulled from the stream per read syscall.
const READ_CHUNK: usize = 4096;

/// Wraps a stream with a read-ahead buffer so that non-blocking reads of an
/// exact length never lose partially received data.
#[derive(Debug)]
pub struct BufferedStream<S> {
    stream: S,
    buffer: Vec<u8>,
}

impl<S> BufferedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps `stream` with an empty read buffer.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    /// Number of received bytes not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// See [`Transport::read`](crate::Transport::read).
    pub async fn read(&mut self, buf: &mut [u8], wait: bool) -> Result<bool, TransportError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if self.buffer.len() >= buf.len() {
                let n = buf.len();
                buf.copy_from_slice(&self.buffer[..n]);
                self.buffer.drain(..n);
                return Ok(true);
            }

            // `read` is cancel-safe, so dropping it unresolved loses nothing.
            let result = if wait {
                Some(self.stream.read(&mut chunk).await)
            } else {
                self.stream.read(&mut chunk).now_or_never()
            };

            match result {
                None => return Ok(false),
                Some(Ok(0)) => {
                    return Err(TransportError::ConnectionClosed(
                        "peer closed the stream".into(),
                    ));
                }
                Some(Ok(n)) => self.buffer.extend_from_slice(&chunk[..n]),
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }

    /// Writes and flushes all of `data`.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if data.is_empty() {
            return Ok(());
        }
        self.stream
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)?;
        self.stream.flush().await.map_err(TransportError::SendFailed)
    }

    /// Shuts down the write half and drops any buffered input.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.buffer.clear();
        self.stream
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}
