//! Notifications the driver surfaces to the game.
//!
//! Events accumulate inside the driver while it dispatches network
//! traffic and are handed over in order through
//! [`drain_events`](crate::SessionDriver::drain_events), once per
//! frame, on the same thread that called
//! [`tick`](crate::SessionDriver::tick). They are facts about what
//! already happened; reacting to them never requires answering on the
//! wire, the standard handlers have done that part.
//!
//! High-frequency state deliberately does not appear here: remote
//! poses land in the game through [`GameWorld::apply_pose`] every tick
//! rather than as per-snapshot events.
//!
//! [`GameWorld::apply_pose`]: partyline_sync::GameWorld::apply_pose

use partyline_protocol::{
    CharacterId, InteractOutcome, LobbyPlayer, NetId, PeerId, Pose,
    SpawnDesc, StartEntry,
};

/// Something the session wants the game to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// This process's own join was answered with the full roster.
    /// Fires on clients; the hosting process builds the roster itself
    /// and sees its own entry via [`SessionEvent::PeerJoined`].
    JoinedLobby { players: Vec<LobbyPlayer> },

    /// A player entered the lobby.
    PeerJoined { peer: PeerId, name: String },

    /// A player left, voluntarily or by disconnect; the reason string
    /// is what the wire carried ("disconnected", "session already
    /// started", "host closed the session", ...).
    PeerLeft { peer: PeerId, reason: String },

    /// A player picked a character.
    CharacterSelected { peer: PeerId, character: CharacterId },

    /// A player toggled readiness.
    ReadyChanged { peer: PeerId, ready: bool },

    /// The session begins: authoritative character and spawn
    /// assignments for every player. The game places its player
    /// entities from these entries.
    GameStarted { entries: Vec<StartEntry> },

    /// A replicated entity came into existence.
    EntitySpawned { desc: SpawnDesc },

    /// A replicated entity is gone.
    EntityDespawned { net_id: NetId },

    /// The host answered an interaction request. Grants arrive on
    /// every peer; denials only on the requester's process.
    InteractionResolved {
        requester: NetId,
        target: NetId,
        outcome: InteractOutcome,
    },

    /// The host corrected an entity's pose after a collision; the
    /// world has already snapped to it.
    CollisionCorrected { net_id: NetId, pose: Pose },

    /// A ping came back; round trip measured on this process's clock.
    RttMeasured { rtt_ms: u64 },

    /// The link to the host is gone. The driver has already torn the
    /// session down; the game should return to its menu or retry.
    HostLost,
}
