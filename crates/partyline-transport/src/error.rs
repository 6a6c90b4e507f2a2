use partyline_protocol::{PeerId, ProtocolError};

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the host listener failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Dialing the host failed before the handshake began.
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The admission handshake did not finish within the timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// The host refused admission and closed the connection.
    #[error("admission rejected: {reason}")]
    Rejected { reason: String },

    /// The remote side broke the handshake sequence.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A send was addressed to a peer that is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(PeerId),

    /// The link's writer is gone; the connection is dead.
    #[error("link closed")]
    LinkClosed,

    /// Encoding or decoding a frame failed.
    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),
}
