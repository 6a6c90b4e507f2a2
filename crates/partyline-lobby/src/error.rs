use partyline_protocol::PeerId;

/// Errors that can occur in lobby operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The peer already has a roster entry.
    #[error("{0} is already in the lobby")]
    AlreadyJoined(PeerId),

    /// The peer has no roster entry.
    #[error("{0} is not in the lobby")]
    NotInLobby(PeerId),

    /// A start was requested with nobody in the lobby.
    #[error("lobby is empty")]
    Empty,

    /// A start was requested before every player readied up.
    #[error("only {ready} of {total} players are ready")]
    NotAllReady { ready: usize, total: usize },
}
