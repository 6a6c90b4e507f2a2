use std::io;

use partyline_transport::TransportError;

/// Errors from session-mode transitions and outbound traffic.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The owned tokio runtime failed to start.
    #[error("async runtime failed to start")]
    Runtime(#[source] io::Error),

    /// A transport operation failed; connection errors, rejections and
    /// encode failures all arrive through here.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
