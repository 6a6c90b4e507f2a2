//! The closed set of wire messages and their tag bytes.
//!
//! Every message kind owns exactly one tag. Decoding is a single
//! exhaustive match over that byte: there is no runtime type registry
//! to register against or forget to register against. Tags the core
//! does not know decode to [`Message::Unknown`], which carries the raw
//! payload for a later, game-side lookup; the protocol layer
//! deliberately does not know about game-specific message shapes.
//!
//! # Message flow
//!
//! ```text
//! client                         host
//!   | -- Hello(version, key) ---> |   admission
//!   | <-- Welcome(peerId) ------- |   (or Reject(reason) + close)
//!   | -- JoinLobby(id, name) ---> |
//!   | <-- LobbyState(all) ------- |   private full snapshot
//!   | <=> select/ready traffic => |   relayed to the other peers
//!   | <-- GameStart(entries) ---- |
//!   | <=> transforms, AI state,   |
//!   |     interactions, spawns    |   the synchronized session
//! ```

use crate::types::{
    AiBehavior, CharacterId, ContainerSnapshot, DeliveryMode, InteractAction,
    InteractOutcome, LobbyPlayer, Movement, NetId, PeerId, Pose, SpawnDesc,
    StartEntry, Vec2,
};

/// Protocol revision carried in [`Message::Hello`]. Bump on any wire
/// layout change; mismatched peers are rejected during admission.
pub const PROTOCOL_VERSION: u16 = 1;

/// Tag bytes, one per message kind.
///
/// Values below `0x80` are reserved for the core protocol. Games that
/// ride custom messages over the session should use `0x80` and above;
/// those arrive as [`Message::Unknown`] and are resolved by whatever
/// handler the game registered for the tag.
pub mod tag {
    pub const HELLO: u8 = 0x01;
    pub const WELCOME: u8 = 0x02;
    pub const REJECT: u8 = 0x03;
    pub const PING: u8 = 0x04;
    pub const PONG: u8 = 0x05;

    pub const JOIN_LOBBY: u8 = 0x10;
    pub const LOBBY_STATE: u8 = 0x11;
    pub const CHARACTER_SELECT: u8 = 0x12;
    pub const READY: u8 = 0x13;
    pub const LEAVE_LOBBY: u8 = 0x14;
    pub const GAME_START: u8 = 0x15;

    pub const TRANSFORM: u8 = 0x20;
    pub const PLAYER_INPUT: u8 = 0x21;
    pub const AI_STATE: u8 = 0x22;
    pub const ENTITY_SPAWN: u8 = 0x23;
    pub const ENTITY_DESPAWN: u8 = 0x24;
    pub const COLLISION_REPORT: u8 = 0x25;
    pub const COLLISION_RESULT: u8 = 0x26;
    pub const INTERACT_REQUEST: u8 = 0x27;
    pub const INTERACT_RESPONSE: u8 = 0x28;
    pub const INVENTORY_STATE: u8 = 0x29;

    /// First tag value available to game-defined messages.
    pub const GAME_BASE: u8 = 0x80;
}

/// A wire message. Immutable once constructed; encoding is
/// deterministic with a fixed field order per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // --- Admission & liveness -------------------------------------------

    /// First message a connecting client sends. Carries the protocol
    /// revision and the pre-shared session key; nothing else is
    /// accepted until the host has answered.
    Hello {
        protocol_version: u16,
        session_key: String,
    },
    /// Host's admission grant: the one and only way a client learns
    /// its own peer id.
    Welcome { peer_id: PeerId },
    /// Host's admission refusal, sent before closing the connection.
    Reject { reason: String },
    /// Client liveness/latency check. The envelope timestamp carries
    /// the send time; there is no body.
    Ping,
    /// Host's answer to [`Message::Ping`], echoing the send timestamp
    /// so the client can compute a round trip from its own clock.
    Pong { echo_ms: u64 },

    // --- Lobby ----------------------------------------------------------

    JoinLobby { peer: PeerId, name: String },
    /// Private full-roster snapshot sent to a (late) joiner, never an
    /// incremental replay.
    LobbyState { players: Vec<LobbyPlayer> },
    CharacterSelect { peer: PeerId, character: CharacterId },
    Ready { peer: PeerId, ready: bool },
    LeaveLobby { peer: PeerId, reason: String },
    /// Authoritative per-player start data; every peer (host included)
    /// transitions into the session on receiving it.
    GameStart { entries: Vec<StartEntry> },

    // --- Session state --------------------------------------------------

    /// Unreliable position/rotation snapshot for one entity.
    Transform { net_id: NetId, pose: Pose },
    /// Unreliable movement descriptor for remote animation.
    PlayerInput { net_id: NetId, movement: Movement },
    /// Unreliable AI snapshot: position plus behavior descriptor.
    AiState {
        net_id: NetId,
        pos: Vec2,
        behavior: AiBehavior,
    },
    EntitySpawn { desc: SpawnDesc },
    EntityDespawn { net_id: NetId },
    /// Client-reported contact between its player and another entity.
    CollisionReport { reporter: NetId, other: NetId },
    /// Host-computed result of a collision: the entity snaps to the
    /// new authoritative pose.
    CollisionResult { net_id: NetId, pose: Pose },
    InteractRequest {
        requester: NetId,
        target: NetId,
        action: InteractAction,
    },
    InteractResponse {
        requester: NetId,
        target: NetId,
        outcome: InteractOutcome,
    },
    /// Full container resync outside of a transfer response.
    InventoryState { snapshot: ContainerSnapshot },

    // --- Escape hatch ---------------------------------------------------

    /// A tag the core does not define. Held opaque for game-side
    /// resolution; re-encoding an unknown message with a game-range
    /// tag reproduces the original bytes, while a core-range tag
    /// refuses to encode.
    Unknown { tag: u8, payload: Vec<u8> },
}

impl Message {
    /// The tag byte this message encodes under.
    pub fn tag(&self) -> u8 {
        match self {
            Message::Hello { .. } => tag::HELLO,
            Message::Welcome { .. } => tag::WELCOME,
            Message::Reject { .. } => tag::REJECT,
            Message::Ping => tag::PING,
            Message::Pong { .. } => tag::PONG,
            Message::JoinLobby { .. } => tag::JOIN_LOBBY,
            Message::LobbyState { .. } => tag::LOBBY_STATE,
            Message::CharacterSelect { .. } => tag::CHARACTER_SELECT,
            Message::Ready { .. } => tag::READY,
            Message::LeaveLobby { .. } => tag::LEAVE_LOBBY,
            Message::GameStart { .. } => tag::GAME_START,
            Message::Transform { .. } => tag::TRANSFORM,
            Message::PlayerInput { .. } => tag::PLAYER_INPUT,
            Message::AiState { .. } => tag::AI_STATE,
            Message::EntitySpawn { .. } => tag::ENTITY_SPAWN,
            Message::EntityDespawn { .. } => tag::ENTITY_DESPAWN,
            Message::CollisionReport { .. } => tag::COLLISION_REPORT,
            Message::CollisionResult { .. } => tag::COLLISION_RESULT,
            Message::InteractRequest { .. } => tag::INTERACT_REQUEST,
            Message::InteractResponse { .. } => tag::INTERACT_RESPONSE,
            Message::InventoryState { .. } => tag::INVENTORY_STATE,
            Message::Unknown { tag, .. } => *tag,
        }
    }

    /// The delivery guarantee this message kind travels under.
    ///
    /// Fixed per kind rather than per send: high-frequency snapshots
    /// are always superseded by the next one and go unreliable, every
    /// one-shot fact goes reliable. An [`Unknown`](Message::Unknown)
    /// payload is assumed to matter and goes reliable.
    pub fn delivery_mode(&self) -> DeliveryMode {
        match self {
            Message::Transform { .. }
            | Message::PlayerInput { .. }
            | Message::AiState { .. } => DeliveryMode::Unreliable,
            _ => DeliveryMode::ReliableOrdered,
        }
    }

    /// Short name for logging, without the payload.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "Hello",
            Message::Welcome { .. } => "Welcome",
            Message::Reject { .. } => "Reject",
            Message::Ping => "Ping",
            Message::Pong { .. } => "Pong",
            Message::JoinLobby { .. } => "JoinLobby",
            Message::LobbyState { .. } => "LobbyState",
            Message::CharacterSelect { .. } => "CharacterSelect",
            Message::Ready { .. } => "Ready",
            Message::LeaveLobby { .. } => "LeaveLobby",
            Message::GameStart { .. } => "GameStart",
            Message::Transform { .. } => "Transform",
            Message::PlayerInput { .. } => "PlayerInput",
            Message::AiState { .. } => "AiState",
            Message::EntitySpawn { .. } => "EntitySpawn",
            Message::EntityDespawn { .. } => "EntityDespawn",
            Message::CollisionReport { .. } => "CollisionReport",
            Message::CollisionResult { .. } => "CollisionResult",
            Message::InteractRequest { .. } => "InteractRequest",
            Message::InteractResponse { .. } => "InteractResponse",
            Message::InventoryState { .. } => "InventoryState",
            Message::Unknown { .. } => "Unknown",
        }
    }
}

/// A message plus the sender's monotonic send timestamp.
///
/// The timestamp is milliseconds on the *sender's* session clock. It is
/// never compared across peers; receivers only compare timestamps from
/// the same sender to reject out-of-order unreliable snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sent_at_ms: u64,
    pub message: Message,
}

impl Envelope {
    pub fn new(sent_at_ms: u64, message: Message) -> Self {
        Envelope {
            sent_at_ms,
            message,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// One value of every core message kind, used to sweep the tag
    /// space.
    fn one_of_each() -> Vec<Message> {
        vec![
            Message::Hello {
                protocol_version: PROTOCOL_VERSION,
                session_key: "k".into(),
            },
            Message::Welcome { peer_id: PeerId(1) },
            Message::Reject { reason: "r".into() },
            Message::Ping,
            Message::Pong { echo_ms: 5 },
            Message::JoinLobby {
                peer: PeerId(1),
                name: "n".into(),
            },
            Message::LobbyState { players: vec![] },
            Message::CharacterSelect {
                peer: PeerId(1),
                character: CharacterId(0),
            },
            Message::Ready {
                peer: PeerId(1),
                ready: true,
            },
            Message::LeaveLobby {
                peer: PeerId(1),
                reason: "bye".into(),
            },
            Message::GameStart { entries: vec![] },
            Message::Transform {
                net_id: NetId(1),
                pose: Pose::default(),
            },
            Message::PlayerInput {
                net_id: NetId(1),
                movement: Movement::default(),
            },
            Message::AiState {
                net_id: NetId(1000),
                pos: Vec2::ZERO,
                behavior: AiBehavior::default(),
            },
            Message::EntitySpawn {
                desc: SpawnDesc {
                    net_id: NetId(1000),
                    archetype: 0,
                    pose: Pose::default(),
                    owner: None,
                },
            },
            Message::EntityDespawn { net_id: NetId(1000) },
            Message::CollisionReport {
                reporter: NetId(1),
                other: NetId(1000),
            },
            Message::CollisionResult {
                net_id: NetId(1000),
                pose: Pose::default(),
            },
            Message::InteractRequest {
                requester: NetId(1),
                target: NetId(2000),
                action: InteractAction::PickUp,
            },
            Message::InteractResponse {
                requester: NetId(1),
                target: NetId(2000),
                outcome: InteractOutcome::Denied {
                    reason: crate::types::DenyReason::OutOfRange,
                },
            },
            Message::InventoryState {
                snapshot: ContainerSnapshot {
                    container: NetId(2000),
                    slots: vec![],
                },
            },
        ]
    }

    #[test]
    fn test_every_core_kind_has_a_unique_tag() {
        let msgs = one_of_each();
        let tags: HashSet<u8> = msgs.iter().map(|m| m.tag()).collect();
        assert_eq!(tags.len(), msgs.len(), "two kinds share a tag byte");
    }

    #[test]
    fn test_only_snapshot_kinds_go_unreliable() {
        for msg in one_of_each() {
            let unreliable = matches!(
                msg,
                Message::Transform { .. }
                    | Message::PlayerInput { .. }
                    | Message::AiState { .. }
            );
            let expected = if unreliable {
                DeliveryMode::Unreliable
            } else {
                DeliveryMode::ReliableOrdered
            };
            assert_eq!(msg.delivery_mode(), expected, "{}", msg.name());
        }
    }

    #[test]
    fn test_core_tags_stay_below_game_base() {
        for msg in one_of_each() {
            assert!(
                msg.tag() < tag::GAME_BASE,
                "{} uses a tag in the game-reserved range",
                msg.name()
            );
        }
    }

    #[test]
    fn test_unknown_reports_its_own_tag() {
        let msg = Message::Unknown {
            tag: 0x9c,
            payload: vec![1, 2, 3],
        };
        assert_eq!(msg.tag(), 0x9c);
        assert_eq!(msg.name(), "Unknown");
    }
}
