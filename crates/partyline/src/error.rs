//! Unified error type for the Partyline stack.

use partyline_lobby::LobbyError;
use partyline_protocol::ProtocolError;
use partyline_session::SessionError;
use partyline_sync::SyncError;
use partyline_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `partyline` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PartylineError {
    /// A protocol-level error (encode, decode, frame limits).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A transport-level error (bind, connect, rejection, dead link).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A session-level error (runtime startup, mode transitions).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A lobby-level error (roster membership, readiness).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A replication-level error (entity registration, id ranges).
    #[error(transparent)]
    Sync(#[from] SyncError),
}
