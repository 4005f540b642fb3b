//! Platform IPC transport: Unix domain socket or Windows named pipe.
//!
//! The chat client listens on the first free endpoint out of
//! [`IPC_ENDPOINT_COUNT`] numbered ones, so opening walks them in order and
//! keeps the first that connects.

use std::path::PathBuf;

use crate::{BufferedStream, Transport, TransportError};

/// Prefix shared by every endpoint name; the index is appended.
pub const IPC_ENDPOINT_PREFIX: &str = "discord-ipc-";

/// Number of numbered endpoints probed on open.
pub const IPC_ENDPOINT_COUNT: usize = 10;

#[cfg(unix)]
type IpcStream = tokio::net::UnixStream;

#[cfg(windows)]
type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

/// Candidate endpoint paths for this platform, in probe order.
///
/// On Unix the socket lives in the first of `XDG_RUNTIME_DIR`, `TMPDIR`,
/// `TMP`, `TEMP` that is set, falling back to `/tmp`.
#[cfg(unix)]
pub fn default_endpoints() -> Vec<PathBuf> {
    let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|key| std::env::var_os(key).filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));

    (0..IPC_ENDPOINT_COUNT)
        .map(|i| base.join(format!("{IPC_ENDPOINT_PREFIX}{i}")))
        .collect()
}

/// Candidate endpoint paths for this platform, in probe order.
#[cfg(windows)]
pub fn default_endpoints() -> Vec<PathBuf> {
    (0..IPC_ENDPOINT_COUNT)
        .map(|i| PathBuf::from(format!(r"\\?\pipe\{IPC_ENDPOINT_PREFIX}{i}")))
        .collect()
}

/// A [`Transport`] over the platform's local IPC endpoint.
#[derive(Debug)]
pub struct IpcTransport {
    endpoints: Vec<PathBuf>,
    stream: Option<BufferedStream<IpcStream>>,
}

impl IpcTransport {
    /// Creates a transport probing the platform's [`default_endpoints`].
    pub fn new() -> Self {
        Self::with_endpoints(default_endpoints())
    }

    /// Creates a transport probing the given endpoints in order.
    pub fn with_endpoints(endpoints: Vec<PathBuf>) -> Self {
        Self {
            endpoints,
            stream: None,
        }
    }

    /// The endpoints probed by [`Transport::open`].
    pub fn endpoints(&self) -> &[PathBuf] {
        &self.endpoints
    }

    fn stream(&mut self) -> Result<&mut BufferedStream<IpcStream>, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Default for IpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn connect(path: &std::path::Path) -> std::io::Result<IpcStream> {
    tokio::net::UnixStream::connect(path).await
}

#[cfg(windows)]
async fn connect(path: &std::path::Path) -> std::io::Result<IpcStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}

impl Transport for IpcTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        for path in &self.endpoints {
            match connect(path).await {
                Ok(stream) => {
                    tracing::debug!(path = %path.display(), "ipc endpoint opened");
                    self.stream = Some(BufferedStream::new(stream));
                    return Ok(());
                }
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "ipc endpoint unavailable");
                }
            }
        }

        Err(TransportError::NotFound {
            tried: self.endpoints.len(),
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        tracing::debug!("closing ipc endpoint");
        stream.shutdown().await
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints_are_numbered_in_order() {
        let endpoints = default_endpoints();
        assert_eq!(endpoints.len(), IPC_ENDPOINT_COUNT);
        for (i, path) in endpoints.iter().enumerate() {
            let name = path.file_name().unwrap().to_string_lossy();
            assert_eq!(name, format!("{IPC_ENDPOINT_PREFIX}{i}"));
        }
    }

    #[tokio::test]
    async fn test_open_with_no_endpoints_is_not_found() {
        let mut transport = IpcTransport::with_endpoints(Vec::new());
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound { tried: 0 }));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_read_before_open_is_not_open() {
        let mut transport = IpcTransport::with_endpoints(Vec::new());
        let mut buf = [0u8; 8];
        let err = transport.read(&mut buf, false).await.unwrap_err();
        assert!(matches!(err, TransportError::NotOpen));
    }

    #[tokio::test]
    async fn test_close_when_not_open_is_noop() {
        let mut transport = IpcTransport::with_endpoints(Vec::new());
        transport.close().await.unwrap();
    }
}
