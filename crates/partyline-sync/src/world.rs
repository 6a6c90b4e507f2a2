//! The `GameWorld` trait: the seam between the sync layer and the game.
//!
//! The replication machinery never holds gameplay state of its own. It
//! reads poses and inventories out of the game through this trait when
//! broadcasting or arbitrating, and writes authoritative results back
//! through it when messages arrive. The game implements these methods
//! against whatever its actual world representation is; the sync layer
//! calls them at the right moments and nowhere else.

use partyline_protocol::{
    AiBehavior, ContainerSnapshot, Movement, NetId, Pose, SpawnDesc, Vec2,
};

/// Game-side world state as the sync layer sees it.
///
/// Read methods feed the broadcasters and the host's interaction
/// checks; `apply_*` methods deliver remote authoritative state into
/// the local world. Methods for aspects a game never replicates can be
/// left as their defaults.
///
/// Mutations initiated by the host's arbitration ([`claim_item`],
/// [`move_item`]) happen exactly once per granted request, on the host
/// only; clients see the result as an applied snapshot, never as a
/// local re-run of the rules.
///
/// [`claim_item`]: GameWorld::claim_item
/// [`move_item`]: GameWorld::move_item
pub trait GameWorld: Send + 'static {
    // --- Spatial state ---------------------------------------------------

    /// Current pose of an entity, or `None` if the world has no body
    /// for it (despawned, not yet instantiated).
    fn pose(&self, net_id: NetId) -> Option<Pose>;

    /// Writes an authoritative pose into the world. Used both for the
    /// per-tick interpolated poses of remote entities and for hard
    /// snaps from collision results.
    fn apply_pose(&mut self, net_id: NetId, pose: Pose);

    /// Current movement descriptor of a locally simulated entity.
    /// `None` means nothing to broadcast this tick.
    fn movement(&self, _net_id: NetId) -> Option<Movement> {
        None
    }

    /// Applies a remote entity's movement descriptor. Default: ignore.
    fn apply_movement(&mut self, _net_id: NetId, _movement: Movement) {}

    /// Position and behavior of a locally simulated AI entity.
    /// Only the host is asked. `None` means skip this entity.
    fn ai_state(&self, _net_id: NetId) -> Option<(Vec2, AiBehavior)> {
        None
    }

    /// Applies a remote AI behavior descriptor. The position half of an
    /// AI snapshot goes through interpolation and arrives via
    /// [`apply_pose`](GameWorld::apply_pose); only the discrete
    /// behavior comes through here. Default: ignore.
    fn apply_ai_behavior(&mut self, _net_id: NetId, _behavior: AiBehavior) {}

    // --- Entity lifecycle ------------------------------------------------

    /// Instantiates a replicated entity described by a spawn message.
    fn apply_spawn(&mut self, desc: &SpawnDesc);

    /// Removes a replicated entity from the world.
    fn apply_despawn(&mut self, net_id: NetId);

    // --- Inventory (host arbitration) ------------------------------------

    /// Whether an item entity is on the ground and claimable.
    fn item_available(&self, _item: NetId) -> bool {
        false
    }

    /// Free slot count of a player's or container's inventory, or
    /// `None` if the entity has no inventory at all.
    fn free_slots(&self, _holder: NetId) -> Option<usize> {
        None
    }

    /// Whether `holder`'s inventory currently contains `item`.
    fn holds_item(&self, _holder: NetId, _item: NetId) -> bool {
        false
    }

    /// Moves a ground item into an inventory. Returns `false` if the
    /// world could not perform the move; the request is then denied.
    /// Host only.
    fn claim_item(&mut self, _item: NetId, _new_owner: NetId) -> bool {
        false
    }

    /// Moves an item between two inventories. Returns `false` if the
    /// world could not perform the move. Host only.
    fn move_item(&mut self, _item: NetId, _from: NetId, _to: NetId) -> bool {
        false
    }

    /// Full contents of an inventory, for the self-healing snapshots
    /// that ride on transfer results.
    fn container_snapshot(&self, _holder: NetId) -> Option<ContainerSnapshot> {
        None
    }

    /// Overwrites a local inventory with an authoritative snapshot.
    /// Clients apply these wholesale; a snapshot is never merged.
    fn apply_container(&mut self, _snapshot: &ContainerSnapshot) {}

    /// Marks an item as claimed after a remote pickup: it leaves the
    /// ground and joins `new_owner`'s inventory. Clients only; the host
    /// already mutated through [`claim_item`](GameWorld::claim_item).
    fn apply_pickup(&mut self, _item: NetId, _new_owner: NetId) {}

    // --- Collisions ------------------------------------------------------

    /// Decides the authoritative consequence of a reported contact.
    ///
    /// Host only. Returns the entity that must relocate and its new
    /// pose, or `None` if the contact has no spatial consequence. The
    /// sync layer applies the returned pose exactly once and broadcasts
    /// it; the world must not move the entity itself here.
    fn resolve_collision(
        &mut self,
        _reporter: NetId,
        _other: NetId,
    ) -> Option<(NetId, Pose)> {
        None
    }
}
