//! Integration tests for the IPC transport.
//!
//! These bind a real Unix domain socket in the temp directory and point
//! the transport at it, so bytes actually cross the kernel.

#[cfg(all(unix, feature = "ipc"))]
mod unix {
    use std::path::PathBuf;

    use drpc_transport::{IpcTransport, Transport, TransportError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    /// A socket path unique to this test process and test name.
    fn socket_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "drpc-transport-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn test_open_skips_missing_endpoints() {
        let missing = socket_path("missing");
        let live = socket_path("live");
        let listener = UnixListener::bind(&live).expect("should bind");

        let mut transport = IpcTransport::with_endpoints(vec![missing, live.clone()]);
        transport.open().await.expect("second endpoint should open");
        assert!(transport.is_open());

        let (mut peer, _) = listener.accept().await.expect("should accept");

        transport.write(b"hello").await.expect("write should succeed");
        let mut got = [0u8; 5];
        peer.read_exact(&mut got).await.unwrap();
        assert_eq!(&got, b"hello");

        peer.write_all(b"world").await.unwrap();
        let mut buf = [0u8; 5];
        assert!(transport.read(&mut buf, true).await.unwrap());
        assert_eq!(&buf, b"world");

        transport.close().await.unwrap();
        let _ = std::fs::remove_file(&live);
    }

    #[tokio::test]
    async fn test_open_fails_when_no_endpoint_listens() {
        let mut transport = IpcTransport::with_endpoints(vec![
            socket_path("none-0"),
            socket_path("none-1"),
        ]);
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound { tried: 2 }));
    }

    #[tokio::test]
    async fn test_peer_close_surfaces_as_connection_closed() {
        let path = socket_path("peer-close");
        let listener = UnixListener::bind(&path).expect("should bind");

        let mut transport = IpcTransport::with_endpoints(vec![path.clone()]);
        transport.open().await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        drop(peer);

        let mut buf = [0u8; 8];
        let err = transport.read(&mut buf, true).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
        assert!(!transport.is_open(), "closed stream should be released");
        let _ = std::fs::remove_file(&path);
    }
}
