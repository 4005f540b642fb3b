/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// None of the candidate endpoints accepted a connection.
    #[error("no ipc endpoint available (tried {tried} paths)")]
    NotFound {
        /// How many endpoint paths were attempted.
        tried: usize,
    },

    /// `open` was called on a transport that is already open.
    #[error("transport is already open")]
    AlreadyOpen,

    /// A read or write was attempted before `open` succeeded.
    #[error("transport is not open")]
    NotOpen,

    /// The peer closed the stream.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if the error means the peer went away, as opposed
    /// to a local misuse of the transport.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed(_) | Self::SendFailed(_) | Self::ReceiveFailed(_)
        )
    }
}
