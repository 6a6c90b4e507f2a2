//! Replicated-entity bookkeeping: who exists, who owns what, which
//! aspects of it move over the wire.
//!
//! The registry holds replication metadata only. Gameplay state (poses,
//! inventories, behavior) lives in the game's own world and is reached
//! through the [`GameWorld`](crate::GameWorld) trait; keeping the two
//! apart means the sync layer never has an opinion about what an entity
//! *is*, only about who may speak for it.

use std::collections::HashMap;
use std::fmt;

use partyline_protocol::{
    EntityKind, NetId, PeerId, NET_ID_AI_START, NET_ID_ITEM_START,
};

use crate::SyncError;

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

/// Who simulates an entity and publishes its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    /// The host simulates and broadcasts; everyone else mirrors.
    /// AI and world items live here.
    HostOwned,
    /// One client simulates and publishes; the host relays. Used for
    /// client-side projectiles and similar fire-and-forget effects.
    ClientOwned,
    /// Split per aspect: the owning client publishes spatial state,
    /// the host arbitrates inventory. Player entities live here.
    Shared,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Authority::HostOwned => "host-owned",
            Authority::ClientOwned => "client-owned",
            Authority::Shared => "shared",
        };
        f.write_str(s)
    }
}

/// One replicable facet of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aspect {
    /// Position and rotation snapshots.
    Transform,
    /// Heading/sprint descriptor for remote animation.
    Movement,
    /// Carried or contained items.
    Inventory,
}

/// Which aspects of an entity are replicated at all.
///
/// An aspect that is off is simply never broadcast for the entity; a
/// static scenery container, say, syncs inventory but not transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncAspects {
    pub transform: bool,
    pub movement: bool,
    pub inventory: bool,
}

impl SyncAspects {
    /// Everything a player entity replicates.
    pub fn player() -> Self {
        SyncAspects {
            transform: true,
            movement: true,
            inventory: true,
        }
    }

    /// Transform only; the usual choice for AI and loose items.
    pub fn transform_only() -> Self {
        SyncAspects {
            transform: true,
            movement: false,
            inventory: false,
        }
    }

    /// Inventory only; static containers.
    pub fn inventory_only() -> Self {
        SyncAspects {
            transform: false,
            movement: false,
            inventory: true,
        }
    }

    /// Whether a given aspect is flagged on.
    pub fn includes(self, aspect: Aspect) -> bool {
        match aspect {
            Aspect::Transform => self.transform,
            Aspect::Movement => self.movement,
            Aspect::Inventory => self.inventory,
        }
    }
}

/// Resolved controller of one aspect of one entity: the single process
/// allowed to publish authoritative state for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    Host,
    Peer(PeerId),
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Replication record for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetEntity {
    pub net_id: NetId,
    pub authority: Authority,
    /// Owning peer; required for client-owned and shared entities,
    /// meaningless for host-owned ones.
    pub owner: Option<PeerId>,
    pub aspects: SyncAspects,
}

impl NetEntity {
    /// Resolves who controls the given aspect.
    ///
    /// Host-owned entities answer `Host` for everything. Client-owned
    /// entities answer their owner for everything. Shared entities
    /// split: spatial aspects belong to the owner, inventory to the
    /// host, so a client steers its own player while every pickup still
    /// goes through host arbitration.
    pub fn controller(&self, aspect: Aspect) -> Controller {
        match (self.authority, aspect) {
            (Authority::HostOwned, _) => Controller::Host,
            (Authority::Shared, Aspect::Inventory) => Controller::Host,
            (Authority::ClientOwned, _) | (Authority::Shared, _) => {
                match self.owner {
                    Some(peer) => Controller::Peer(peer),
                    None => Controller::Host,
                }
            }
        }
    }

    /// Whether the local process is the one that publishes this aspect.
    ///
    /// `local` is the local peer id and `is_host` its role; the host's
    /// own player entity is `Shared` with `owner = Some(host peer)`, so
    /// both arms can be true for it.
    pub fn controlled_locally(
        &self,
        aspect: Aspect,
        local: PeerId,
        is_host: bool,
    ) -> bool {
        match self.controller(aspect) {
            Controller::Host => is_host,
            Controller::Peer(peer) => peer == local,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All replicated entities of one session, with range-based id
/// allocation for host-spawned entities.
///
/// Ids are handed out monotonically per range and never reused within a
/// session; a despawned AI's id stays dead. Player ids are not
/// allocated here at all, they are fixed by the owning peer's id.
///
/// Owned by the simulation thread; not thread-safe by design.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<NetId, NetEntity>,
    next_ai: u32,
    next_item: u32,
}

impl EntityRegistry {
    pub fn new() -> Self {
        EntityRegistry {
            entities: HashMap::new(),
            next_ai: NET_ID_AI_START,
            next_item: NET_ID_ITEM_START,
        }
    }

    /// Registers an entity under an id chosen by the caller.
    ///
    /// Host-spawned entities normally go through [`allocate_ai`] or
    /// [`allocate_item`] instead; direct registration exists for player
    /// entities and for entities whose ids arrive in a spawn message.
    ///
    /// # Errors
    /// - [`SyncError::ReservedId`] for id 0, which is never valid.
    /// - [`SyncError::DuplicateEntity`] if the id is already taken.
    /// - [`SyncError::OwnerRequired`] for client-owned or shared
    ///   entities without an owner.
    ///
    /// [`allocate_ai`]: EntityRegistry::allocate_ai
    /// [`allocate_item`]: EntityRegistry::allocate_item
    pub fn register(&mut self, entity: NetEntity) -> Result<(), SyncError> {
        if entity.net_id.0 == 0 {
            return Err(SyncError::ReservedId);
        }
        if self.entities.contains_key(&entity.net_id) {
            return Err(SyncError::DuplicateEntity(entity.net_id));
        }
        if entity.owner.is_none()
            && matches!(
                entity.authority,
                Authority::ClientOwned | Authority::Shared
            )
        {
            return Err(SyncError::OwnerRequired(entity.authority));
        }

        tracing::debug!(
            net_id = %entity.net_id,
            authority = %entity.authority,
            "entity registered"
        );
        self.entities.insert(entity.net_id, entity);
        Ok(())
    }

    /// Registers a player entity for a peer: shared authority, id equal
    /// to the peer id value, all aspects on.
    ///
    /// # Errors
    /// [`SyncError::RangeExhausted`] when the peer id falls outside the
    /// player id range. Admission hands out peer ids monotonically
    /// without reuse, so a long-lived session can walk past the range;
    /// such a peer cannot be given a player entity.
    pub fn register_player(
        &mut self,
        peer: PeerId,
    ) -> Result<NetId, SyncError> {
        if peer.0 >= NET_ID_AI_START {
            return Err(SyncError::RangeExhausted(EntityKind::Player));
        }
        let net_id = NetId::for_player(peer);
        self.register(NetEntity {
            net_id,
            authority: Authority::Shared,
            owner: Some(peer),
            aspects: SyncAspects::player(),
        })?;
        Ok(net_id)
    }

    /// Registers a host-owned AI entity under the next free AI id.
    ///
    /// # Errors
    /// [`SyncError::RangeExhausted`] once the AI range is used up.
    pub fn allocate_ai(
        &mut self,
        aspects: SyncAspects,
    ) -> Result<NetId, SyncError> {
        while self.next_ai < NET_ID_ITEM_START {
            let id = NetId(self.next_ai);
            self.next_ai += 1;
            if !self.entities.contains_key(&id) {
                self.register(NetEntity {
                    net_id: id,
                    authority: Authority::HostOwned,
                    owner: None,
                    aspects,
                })?;
                return Ok(id);
            }
        }
        Err(SyncError::RangeExhausted(EntityKind::Ai))
    }

    /// Registers a host-owned item or container under the next free
    /// item id.
    pub fn allocate_item(
        &mut self,
        aspects: SyncAspects,
    ) -> Result<NetId, SyncError> {
        loop {
            let Some(raw) = self.next_item.checked_add(1) else {
                return Err(SyncError::RangeExhausted(EntityKind::Item));
            };
            let id = NetId(self.next_item);
            self.next_item = raw;
            if !self.entities.contains_key(&id) {
                self.register(NetEntity {
                    net_id: id,
                    authority: Authority::HostOwned,
                    owner: None,
                    aspects,
                })?;
                return Ok(id);
            }
        }
    }

    /// Removes an entity's record, returning it.
    pub fn unregister(
        &mut self,
        net_id: NetId,
    ) -> Result<NetEntity, SyncError> {
        let entity = self
            .entities
            .remove(&net_id)
            .ok_or(SyncError::UnknownEntity(net_id))?;
        tracing::debug!(%net_id, "entity unregistered");
        Ok(entity)
    }

    /// Removes every entity owned by a peer, returning their ids.
    /// Called when a peer leaves mid-session.
    pub fn unregister_owned_by(&mut self, peer: PeerId) -> Vec<NetId> {
        let ids: Vec<NetId> = self.owned_by(peer).map(|e| e.net_id).collect();
        for id in &ids {
            self.entities.remove(id);
        }
        if !ids.is_empty() {
            tracing::debug!(%peer, count = ids.len(), "owned entities dropped");
        }
        ids
    }

    pub fn get(&self, net_id: NetId) -> Option<&NetEntity> {
        self.entities.get(&net_id)
    }

    pub fn contains(&self, net_id: NetId) -> bool {
        self.entities.contains_key(&net_id)
    }

    /// Iterates all entities in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &NetEntity> {
        self.entities.values()
    }

    /// Iterates entities that replicate the given aspect.
    pub fn with_aspect(
        &self,
        aspect: Aspect,
    ) -> impl Iterator<Item = &NetEntity> {
        self.entities
            .values()
            .filter(move |e| e.aspects.includes(aspect))
    }

    /// Iterates entities owned by the given peer.
    pub fn owned_by(&self, peer: PeerId) -> impl Iterator<Item = &NetEntity> {
        self.entities
            .values()
            .filter(move |e| e.owner == Some(peer))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drops every record. Allocation cursors keep advancing; a cleared
    /// registry still never re-issues an id it already handed out.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> PeerId {
        PeerId(n)
    }

    fn host_item(net_id: NetId) -> NetEntity {
        NetEntity {
            net_id,
            authority: Authority::HostOwned,
            owner: None,
            aspects: SyncAspects::inventory_only(),
        }
    }

    // --- Controller resolution ---

    #[test]
    fn test_controller_host_owned_all_aspects_host() {
        let e = host_item(NetId(2000));
        assert_eq!(e.controller(Aspect::Transform), Controller::Host);
        assert_eq!(e.controller(Aspect::Movement), Controller::Host);
        assert_eq!(e.controller(Aspect::Inventory), Controller::Host);
    }

    #[test]
    fn test_controller_shared_splits_by_aspect() {
        let e = NetEntity {
            net_id: NetId(3),
            authority: Authority::Shared,
            owner: Some(pid(3)),
            aspects: SyncAspects::player(),
        };
        assert_eq!(e.controller(Aspect::Transform), Controller::Peer(pid(3)));
        assert_eq!(e.controller(Aspect::Movement), Controller::Peer(pid(3)));
        assert_eq!(e.controller(Aspect::Inventory), Controller::Host);
    }

    #[test]
    fn test_controller_client_owned_owner_everything() {
        let e = NetEntity {
            net_id: NetId(2500),
            authority: Authority::ClientOwned,
            owner: Some(pid(2)),
            aspects: SyncAspects::transform_only(),
        };
        assert_eq!(e.controller(Aspect::Transform), Controller::Peer(pid(2)));
        assert_eq!(e.controller(Aspect::Inventory), Controller::Peer(pid(2)));
    }

    #[test]
    fn test_controlled_locally_host_player_both_roles() {
        let e = NetEntity {
            net_id: NetId(1),
            authority: Authority::Shared,
            owner: Some(pid(1)),
            aspects: SyncAspects::player(),
        };
        // Host process, host's own player: controls transform as owner
        // and inventory as host.
        assert!(e.controlled_locally(Aspect::Transform, pid(1), true));
        assert!(e.controlled_locally(Aspect::Inventory, pid(1), true));
        // Client process looking at the host's player: controls neither.
        assert!(!e.controlled_locally(Aspect::Transform, pid(2), false));
        assert!(!e.controlled_locally(Aspect::Inventory, pid(2), false));
    }

    #[test]
    fn test_controlled_locally_remote_player_on_client() {
        let e = NetEntity {
            net_id: NetId(2),
            authority: Authority::Shared,
            owner: Some(pid(2)),
            aspects: SyncAspects::player(),
        };
        assert!(e.controlled_locally(Aspect::Transform, pid(2), false));
        assert!(!e.controlled_locally(Aspect::Inventory, pid(2), false));
        assert!(!e.controlled_locally(Aspect::Transform, pid(3), false));
    }

    // --- Aspect flags ---

    #[test]
    fn test_aspects_includes_matches_flags() {
        let a = SyncAspects::player();
        assert!(a.includes(Aspect::Transform));
        assert!(a.includes(Aspect::Movement));
        assert!(a.includes(Aspect::Inventory));

        let t = SyncAspects::transform_only();
        assert!(t.includes(Aspect::Transform));
        assert!(!t.includes(Aspect::Inventory));
    }

    // --- Registration ---

    #[test]
    fn test_register_rejects_id_zero() {
        let mut reg = EntityRegistry::new();
        let err = reg.register(host_item(NetId(0))).unwrap_err();
        assert!(matches!(err, SyncError::ReservedId));
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let mut reg = EntityRegistry::new();
        reg.register(host_item(NetId(2000))).unwrap();
        let err = reg.register(host_item(NetId(2000))).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateEntity(NetId(2000))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_shared_without_owner_rejected() {
        let mut reg = EntityRegistry::new();
        let err = reg
            .register(NetEntity {
                net_id: NetId(5),
                authority: Authority::Shared,
                owner: None,
                aspects: SyncAspects::player(),
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::OwnerRequired(Authority::Shared)));
    }

    #[test]
    fn test_register_player_uses_peer_id_value() {
        let mut reg = EntityRegistry::new();
        let id = reg.register_player(pid(4)).unwrap();
        assert_eq!(id, NetId(4));
        let e = reg.get(id).unwrap();
        assert_eq!(e.authority, Authority::Shared);
        assert_eq!(e.owner, Some(pid(4)));
        assert!(e.aspects.includes(Aspect::Inventory));
    }

    #[test]
    fn test_register_player_twice_rejected() {
        let mut reg = EntityRegistry::new();
        reg.register_player(pid(4)).unwrap();
        let err = reg.register_player(pid(4)).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateEntity(NetId(4))));
    }

    #[test]
    fn test_register_player_peer_id_outside_range_rejected() {
        // A peer id at or past the AI range start would mint a player
        // net id that classifies as an AI entity.
        let mut reg = EntityRegistry::new();
        reg.register_player(pid(999)).unwrap();
        let err = reg.register_player(pid(NET_ID_AI_START)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::RangeExhausted(EntityKind::Player)
        ));
        let err = reg.register_player(pid(5000)).unwrap_err();
        assert!(matches!(
            err,
            SyncError::RangeExhausted(EntityKind::Player)
        ));
        assert_eq!(reg.len(), 1);
    }

    // --- Allocation ---

    #[test]
    fn test_allocate_ai_starts_at_range_start() {
        let mut reg = EntityRegistry::new();
        let a = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        let b = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        assert_eq!(a, NetId(1000));
        assert_eq!(b, NetId(1001));
        assert_eq!(reg.get(a).unwrap().authority, Authority::HostOwned);
    }

    #[test]
    fn test_allocate_item_starts_at_range_start() {
        let mut reg = EntityRegistry::new();
        let a = reg.allocate_item(SyncAspects::inventory_only()).unwrap();
        let b = reg.allocate_item(SyncAspects::transform_only()).unwrap();
        assert_eq!(a, NetId(2000));
        assert_eq!(b, NetId(2001));
    }

    #[test]
    fn test_allocate_ai_skips_manually_registered_id() {
        let mut reg = EntityRegistry::new();
        reg.register(NetEntity {
            net_id: NetId(1000),
            authority: Authority::HostOwned,
            owner: None,
            aspects: SyncAspects::transform_only(),
        })
        .unwrap();
        let id = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        assert_eq!(id, NetId(1001));
    }

    #[test]
    fn test_allocate_ai_exhausts_at_range_end() {
        let mut reg = EntityRegistry::new();
        reg.next_ai = NET_ID_ITEM_START - 1;
        let last = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        assert_eq!(last, NetId(1999));
        let err = reg.allocate_ai(SyncAspects::transform_only()).unwrap_err();
        assert!(matches!(err, SyncError::RangeExhausted(EntityKind::Ai)));
    }

    #[test]
    fn test_ids_never_reused_after_unregister() {
        let mut reg = EntityRegistry::new();
        let a = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        reg.unregister(a).unwrap();
        let b = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        assert_ne!(a, b);
        assert_eq!(b, NetId(1001));
    }

    #[test]
    fn test_clear_keeps_allocation_cursor() {
        let mut reg = EntityRegistry::new();
        reg.allocate_item(SyncAspects::inventory_only()).unwrap();
        reg.clear();
        assert!(reg.is_empty());
        let next = reg.allocate_item(SyncAspects::inventory_only()).unwrap();
        assert_eq!(next, NetId(2001));
    }

    // --- Removal & queries ---

    #[test]
    fn test_unregister_unknown_errors() {
        let mut reg = EntityRegistry::new();
        let err = reg.unregister(NetId(77)).unwrap_err();
        assert!(matches!(err, SyncError::UnknownEntity(NetId(77))));
    }

    #[test]
    fn test_unregister_owned_by_drops_only_that_peer() {
        let mut reg = EntityRegistry::new();
        reg.register_player(pid(2)).unwrap();
        reg.register_player(pid(3)).unwrap();
        reg.allocate_ai(SyncAspects::transform_only()).unwrap();

        let dropped = reg.unregister_owned_by(pid(2));
        assert_eq!(dropped, vec![NetId(2)]);
        assert_eq!(reg.len(), 2);
        assert!(reg.contains(NetId(3)));
        assert!(reg.contains(NetId(1000)));
    }

    #[test]
    fn test_with_aspect_filters() {
        let mut reg = EntityRegistry::new();
        reg.register_player(pid(2)).unwrap();
        reg.allocate_item(SyncAspects::inventory_only()).unwrap();

        let transforms: Vec<NetId> =
            reg.with_aspect(Aspect::Transform).map(|e| e.net_id).collect();
        assert_eq!(transforms, vec![NetId(2)]);
        assert_eq!(reg.with_aspect(Aspect::Inventory).count(), 2);
    }
}
