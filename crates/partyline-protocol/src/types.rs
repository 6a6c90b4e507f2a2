//! Core protocol types: ids, wire value types, delivery modes.
//!
//! These are the vocabulary shared by every layer above the socket.
//! Everything here is a plain value: cheap to copy or clone, comparable,
//! and free of any I/O concern. The wire layout of each type is owned by
//! the codec module; this file only defines the shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Unique identifier for a connected peer.
///
/// Assigned by the host, starting at 1 and counting up for the lifetime
/// of a hosting run. Ids are never reused within a run: a peer that
/// disconnects retires its id. The host's own loopback player holds a
/// peer id like anyone else.
///
/// Newtype over `u32` so a peer id cannot be confused with a network
/// entity id at a call site.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Returns the raw integer value.
    pub fn into_inner(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Globally unique identifier for a replicated entity within a session.
///
/// The id space is namespaced by range so the entity class is readable
/// straight off the id:
///
/// ```text
/// 1..=999       players   (a player's net id equals its peer id value)
/// 1000..=1999   AI
/// 2000..        items and containers
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetId(pub u32);

/// First id in the AI range.
pub const NET_ID_AI_START: u32 = 1000;
/// First id in the item/container range.
pub const NET_ID_ITEM_START: u32 = 2000;

/// Coarse entity class, derived from the [`NetId`] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Ai,
    Item,
}

impl NetId {
    /// The net id of a player entity is its owner's peer id value.
    pub fn for_player(peer: PeerId) -> Self {
        NetId(peer.0)
    }

    /// Classifies the id by its range.
    ///
    /// Id 0 is never assigned; it classifies as `Player` but callers
    /// that care should treat it as absent.
    pub fn kind(self) -> EntityKind {
        match self.0 {
            n if n >= NET_ID_ITEM_START => EntityKind::Item,
            n if n >= NET_ID_AI_START => EntityKind::Ai,
            _ => EntityKind::Player,
        }
    }

    /// Returns the raw integer value.
    pub fn into_inner(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net-{}", self.0)
    }
}

/// Character class chosen in the lobby. The meaning of each value is
/// game-defined; the protocol only moves the byte around.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CharacterId(pub u8);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial value types
// ---------------------------------------------------------------------------

/// 2D position or direction in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear blend: `t = 0` gives `self`, `t = 1` gives `other`.
    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Position plus facing rotation (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub pos: Vec2,
    pub rot: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, rot: f32) -> Self {
        Pose {
            pos: Vec2::new(x, y),
            rot,
        }
    }
}

/// Movement descriptor for remote animation: which way an entity is
/// heading and whether it is sprinting. Velocity is never transmitted;
/// receivers derive motion from interpolated positions and use this
/// descriptor only to pick animations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Movement {
    /// Normalized heading; zero when standing still.
    pub dir: Vec2,
    pub sprinting: bool,
}

/// Discrete AI behavior descriptor replicated alongside AI positions.
///
/// `mode` is a game-defined behavior id (idle, patrol, chase, ...);
/// `patrol_index` is the current waypoint for patrol-style behaviors.
/// Remote processes use this to drive animation and local-only logic
/// without ever simulating the AI themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AiBehavior {
    pub mode: u8,
    pub patrol_index: u16,
}

// ---------------------------------------------------------------------------
// Delivery & routing
// ---------------------------------------------------------------------------

/// Per-send delivery guarantee.
///
/// The choice is the central bandwidth/latency trade-off of the whole
/// system and is fixed per message kind:
///
/// - [`ReliableOrdered`](DeliveryMode::ReliableOrdered) for one-shot
///   facts that cannot be superseded (spawns, pickups, lobby traffic).
/// - [`Unreliable`](DeliveryMode::Unreliable) for high-frequency
///   snapshots where the next update makes a lost one irrelevant
///   (transform and AI-state ticks). Unreliable frames may be dropped
///   under backpressure and carry no ordering guarantee.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum DeliveryMode {
    #[default]
    ReliableOrdered,
    Unreliable,
}

/// Where an outbound message should go.
///
/// Handlers return `(Recipient, message)` pairs instead of sending
/// directly; the session layer resolves the recipient against the
/// current role and peer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected peer (host role).
    All,
    /// Every connected peer except one (host role; used to avoid
    /// echoing a peer's own change back at it).
    AllExcept(PeerId),
    /// One specific peer (host role).
    Peer(PeerId),
    /// The host (client role).
    Host,
}

// ---------------------------------------------------------------------------
// Lobby & session value types
// ---------------------------------------------------------------------------

/// One roster entry in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub peer: PeerId,
    pub name: String,
    pub character: CharacterId,
    pub ready: bool,
    /// True for the hosting process's own player entry.
    pub host: bool,
}

/// Per-player start data distributed with game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEntry {
    pub peer: PeerId,
    pub character: CharacterId,
    pub spawn_index: u8,
}

/// One inventory slot: which item entity sits in it and what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSlot {
    pub item: NetId,
    /// Game-defined item archetype.
    pub kind: u16,
    pub count: u16,
}

/// Complete contents of one container, sent wholesale.
///
/// Containers are always resynced as full snapshots rather than
/// per-slot deltas: a single lost delta on an unreliable link would
/// desync the container permanently, while a full snapshot makes every
/// update self-healing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub container: NetId,
    pub slots: Vec<ItemSlot>,
}

/// Everything a remote process needs to instantiate a replicated entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnDesc {
    pub net_id: NetId,
    /// Game-defined archetype selecting which entity to instantiate.
    pub archetype: u16,
    pub pose: Pose,
    /// Owning peer for client-authoritative entities; `None` for
    /// host-owned ones.
    pub owner: Option<PeerId>,
}

// ---------------------------------------------------------------------------
// Interaction value types
// ---------------------------------------------------------------------------

/// What an interaction request asks the host to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractAction {
    /// Pick the target item up off the ground into the requester's
    /// inventory.
    PickUp,
    /// Move `item` from the requester's inventory into the target
    /// container.
    Deposit { item: NetId },
    /// Move `item` out of the target container into the requester's
    /// inventory.
    Withdraw { item: NetId },
}

/// Why the host denied an interaction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Requester or target entity is not known to the host.
    NoSuchEntity,
    /// Requester is too far from the target.
    OutOfRange,
    /// Destination container has no free slot.
    ContainerFull,
    /// The item was already taken by someone else.
    AlreadyClaimed,
    /// The sender does not own the entity it claims to act as.
    NotPermitted,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::NoSuchEntity => "no such entity",
            DenyReason::OutOfRange => "out of range",
            DenyReason::ContainerFull => "container full",
            DenyReason::AlreadyClaimed => "already claimed",
            DenyReason::NotPermitted => "not permitted",
        };
        f.write_str(s)
    }
}

/// Authoritative outcome of an interaction request.
///
/// Successful pickups carry the minimal delta (who owns the item now).
/// Successful transfers carry complete snapshots of both affected
/// containers; see [`ContainerSnapshot`] for why.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractOutcome {
    Denied { reason: DenyReason },
    PickedUp { item: NetId, new_owner: NetId },
    Transferred {
        from: ContainerSnapshot,
        to: ContainerSnapshot,
    },
}

impl InteractOutcome {
    /// True for any non-denied outcome.
    pub fn is_success(&self) -> bool {
        !matches!(self, InteractOutcome::Denied { .. })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // --- Ids ---

    #[test]
    fn test_peer_id_display_has_prefix() {
        assert_eq!(PeerId(7).to_string(), "peer-7");
        assert_eq!(NetId(1042).to_string(), "net-1042");
    }

    #[test]
    fn test_net_id_kind_ranges() {
        assert_eq!(NetId(1).kind(), EntityKind::Player);
        assert_eq!(NetId(999).kind(), EntityKind::Player);
        assert_eq!(NetId(1000).kind(), EntityKind::Ai);
        assert_eq!(NetId(1999).kind(), EntityKind::Ai);
        assert_eq!(NetId(2000).kind(), EntityKind::Item);
        assert_eq!(NetId(u32::MAX).kind(), EntityKind::Item);
    }

    #[test]
    fn test_player_net_id_mirrors_peer_id() {
        assert_eq!(NetId::for_player(PeerId(3)), NetId(3));
        assert_eq!(NetId::for_player(PeerId(3)).kind(), EntityKind::Player);
    }

    // --- Vec2 math ---

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(b.distance(a), 5.0);
    }

    #[test]
    fn test_vec2_lerp_endpoints_and_midpoint() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, -2.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Vec2::new(5.0, -1.0));
    }

    // --- Delivery mode ---

    #[test]
    fn test_delivery_mode_default_is_reliable() {
        assert_eq!(DeliveryMode::default(), DeliveryMode::ReliableOrdered);
    }

    // --- Outcomes ---

    #[test]
    fn test_interact_outcome_success_flag() {
        let denied = InteractOutcome::Denied {
            reason: DenyReason::OutOfRange,
        };
        assert!(!denied.is_success());

        let picked = InteractOutcome::PickedUp {
            item: NetId(2001),
            new_owner: NetId(1),
        };
        assert!(picked.is_success());
    }
}
