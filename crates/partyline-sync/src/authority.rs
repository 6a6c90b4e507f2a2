//! Host-side arbitration of client intents.
//!
//! Clients never mutate shared state directly; they ask. The engine
//! validates each request against the registry and the world, applies
//! the mutation exactly once on a grant, and answers with the
//! authoritative outcome. Two clients grabbing the same item in the
//! same tick therefore resolve to one winner no matter which request
//! the host happens to process first: the second one fails the
//! availability check because the first mutation already happened.
//!
//! Grants broadcast to everyone, the requester included, so the
//! requester's own world only changes when the host's does. Denials go
//! back to the requesting peer alone; the rest of the session never
//! asked and has nothing to apply.

use partyline_protocol::{
    ContainerSnapshot, DenyReason, EntityKind, InteractAction,
    InteractOutcome, Message, NetId, PeerId, Recipient,
};

use crate::{EntityRegistry, GameWorld};

/// How close a requester must be to its target, in world units.
pub const DEFAULT_PICKUP_RANGE: f32 = 48.0;

/// Arbitration settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthorityConfig {
    /// Maximum requester-to-target distance for any interaction.
    pub pickup_range: f32,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        AuthorityConfig {
            pickup_range: DEFAULT_PICKUP_RANGE,
        }
    }
}

/// Validates and applies interaction requests and collision reports.
/// Lives on the host only; clients send requests and apply outcomes.
#[derive(Debug, Default)]
pub struct AuthorityEngine {
    config: AuthorityConfig,
}

impl AuthorityEngine {
    pub fn new(config: AuthorityConfig) -> Self {
        AuthorityEngine { config }
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Arbitrates one interaction request from `sender`.
    ///
    /// Checks run in a fixed order: both entities must exist, the
    /// sender must own the entity it is acting as, requester and
    /// target must be in range, and the action's own preconditions
    /// must hold. Only then is the world mutated, once, and the grant
    /// broadcast to [`Recipient::All`]. Any failed check produces a
    /// denial addressed to the sender alone and leaves the world
    /// untouched.
    pub fn handle_interact<W: GameWorld>(
        &self,
        registry: &EntityRegistry,
        world: &mut W,
        sender: PeerId,
        requester: NetId,
        target: NetId,
        action: InteractAction,
    ) -> Vec<(Recipient, Message)> {
        match self.arbitrate(registry, world, sender, requester, target, action)
        {
            Ok(outcome) => {
                tracing::info!(
                    %sender,
                    %requester,
                    %target,
                    ?action,
                    "interaction granted"
                );
                vec![(
                    Recipient::All,
                    Message::InteractResponse {
                        requester,
                        target,
                        outcome,
                    },
                )]
            }
            Err(reason) => {
                tracing::debug!(
                    %sender,
                    %requester,
                    %target,
                    ?action,
                    %reason,
                    "interaction denied"
                );
                vec![(
                    Recipient::Peer(sender),
                    Message::InteractResponse {
                        requester,
                        target,
                        outcome: InteractOutcome::Denied { reason },
                    },
                )]
            }
        }
    }

    fn arbitrate<W: GameWorld>(
        &self,
        registry: &EntityRegistry,
        world: &mut W,
        sender: PeerId,
        requester: NetId,
        target: NetId,
        action: InteractAction,
    ) -> Result<InteractOutcome, DenyReason> {
        let requester_entity =
            registry.get(requester).ok_or(DenyReason::NoSuchEntity)?;
        if !registry.contains(target) {
            return Err(DenyReason::NoSuchEntity);
        }
        if requester_entity.owner != Some(sender) {
            return Err(DenyReason::NotPermitted);
        }

        let requester_pose =
            world.pose(requester).ok_or(DenyReason::NoSuchEntity)?;
        let target_pose = world.pose(target).ok_or(DenyReason::NoSuchEntity)?;
        if requester_pose.pos.distance(target_pose.pos)
            > self.config.pickup_range
        {
            return Err(DenyReason::OutOfRange);
        }

        match action {
            InteractAction::PickUp => {
                if target.kind() != EntityKind::Item {
                    return Err(DenyReason::NotPermitted);
                }
                if !world.item_available(target) {
                    return Err(DenyReason::AlreadyClaimed);
                }
                require_free_slot(world, requester)?;
                if !world.claim_item(target, requester) {
                    return Err(DenyReason::AlreadyClaimed);
                }
                Ok(InteractOutcome::PickedUp {
                    item: target,
                    new_owner: requester,
                })
            }
            InteractAction::Deposit { item } => {
                if !world.holds_item(requester, item) {
                    return Err(DenyReason::NotPermitted);
                }
                require_free_slot(world, target)?;
                if !world.move_item(item, requester, target) {
                    return Err(DenyReason::ContainerFull);
                }
                Ok(transfer_outcome(world, requester, target))
            }
            InteractAction::Withdraw { item } => {
                if !world.holds_item(target, item) {
                    return Err(DenyReason::AlreadyClaimed);
                }
                require_free_slot(world, requester)?;
                if !world.move_item(item, target, requester) {
                    return Err(DenyReason::AlreadyClaimed);
                }
                Ok(transfer_outcome(world, target, requester))
            }
        }
    }

    /// Arbitrates a client's collision report.
    ///
    /// The world decides whether the contact has a consequence; if so
    /// the returned pose is applied once and broadcast for everyone to
    /// snap to. Reports for entities the sender does not own, or
    /// involving unknown entities, are dropped without an answer; the
    /// next genuine contact produces a fresh report anyway.
    pub fn handle_collision<W: GameWorld>(
        &self,
        registry: &EntityRegistry,
        world: &mut W,
        sender: PeerId,
        reporter: NetId,
        other: NetId,
    ) -> Vec<(Recipient, Message)> {
        let Some(reporter_entity) = registry.get(reporter) else {
            tracing::debug!(%sender, %reporter, "collision for unknown reporter");
            return Vec::new();
        };
        if reporter_entity.owner != Some(sender) {
            tracing::debug!(%sender, %reporter, "collision report not from owner");
            return Vec::new();
        }
        if !registry.contains(other) {
            tracing::debug!(%sender, %other, "collision with unknown entity");
            return Vec::new();
        }

        match world.resolve_collision(reporter, other) {
            Some((net_id, pose)) => {
                world.apply_pose(net_id, pose);
                tracing::debug!(%reporter, %other, %net_id, "collision resolved");
                vec![(Recipient::All, Message::CollisionResult { net_id, pose })]
            }
            None => Vec::new(),
        }
    }
}

fn require_free_slot<W: GameWorld>(
    world: &W,
    holder: NetId,
) -> Result<(), DenyReason> {
    match world.free_slots(holder) {
        Some(n) if n > 0 => Ok(()),
        _ => Err(DenyReason::ContainerFull),
    }
}

/// Post-mutation snapshots of both containers touched by a transfer.
/// A holder the world cannot snapshot reports as empty rather than
/// poisoning the grant.
fn transfer_outcome<W: GameWorld>(
    world: &W,
    from: NetId,
    to: NetId,
) -> InteractOutcome {
    let snap = |holder: NetId| {
        world.container_snapshot(holder).unwrap_or(ContainerSnapshot {
            container: holder,
            slots: Vec::new(),
        })
    };
    InteractOutcome::Transferred {
        from: snap(from),
        to: snap(to),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use partyline_protocol::{ItemSlot, Pose, SpawnDesc};

    use super::*;
    use crate::SyncAspects;

    struct MockWorld {
        poses: HashMap<NetId, Pose>,
        ground: HashSet<NetId>,
        inventories: HashMap<NetId, Vec<NetId>>,
        slot_limit: HashMap<NetId, usize>,
        collision_resolution: Option<(NetId, Pose)>,
        collisions_resolved: u32,
    }

    impl MockWorld {
        fn new() -> Self {
            MockWorld {
                poses: HashMap::new(),
                ground: HashSet::new(),
                inventories: HashMap::new(),
                slot_limit: HashMap::new(),
                collision_resolution: None,
                collisions_resolved: 0,
            }
        }

        fn add_holder(&mut self, id: NetId, pose: Pose, limit: usize) {
            self.poses.insert(id, pose);
            self.inventories.insert(id, Vec::new());
            self.slot_limit.insert(id, limit);
        }

        fn add_ground_item(&mut self, id: NetId, pose: Pose) {
            self.poses.insert(id, pose);
            self.ground.insert(id);
        }

        fn held_by(&self, holder: NetId) -> &[NetId] {
            self.inventories.get(&holder).map_or(&[], |v| v.as_slice())
        }
    }

    impl GameWorld for MockWorld {
        fn pose(&self, net_id: NetId) -> Option<Pose> {
            self.poses.get(&net_id).copied()
        }

        fn apply_pose(&mut self, net_id: NetId, pose: Pose) {
            self.poses.insert(net_id, pose);
        }

        fn apply_spawn(&mut self, desc: &SpawnDesc) {
            self.poses.insert(desc.net_id, desc.pose);
        }

        fn apply_despawn(&mut self, net_id: NetId) {
            self.poses.remove(&net_id);
        }

        fn item_available(&self, item: NetId) -> bool {
            self.ground.contains(&item)
        }

        fn free_slots(&self, holder: NetId) -> Option<usize> {
            let held = self.inventories.get(&holder)?.len();
            Some(self.slot_limit.get(&holder)?.saturating_sub(held))
        }

        fn holds_item(&self, holder: NetId, item: NetId) -> bool {
            self.held_by(holder).contains(&item)
        }

        fn claim_item(&mut self, item: NetId, new_owner: NetId) -> bool {
            if !self.ground.remove(&item) {
                return false;
            }
            self.inventories.entry(new_owner).or_default().push(item);
            true
        }

        fn move_item(&mut self, item: NetId, from: NetId, to: NetId) -> bool {
            let Some(src) = self.inventories.get_mut(&from) else {
                return false;
            };
            let Some(idx) = src.iter().position(|i| *i == item) else {
                return false;
            };
            src.remove(idx);
            self.inventories.entry(to).or_default().push(item);
            true
        }

        fn container_snapshot(&self, holder: NetId) -> Option<ContainerSnapshot> {
            let held = self.inventories.get(&holder)?;
            Some(ContainerSnapshot {
                container: holder,
                slots: held
                    .iter()
                    .map(|item| ItemSlot {
                        item: *item,
                        kind: 7,
                        count: 1,
                    })
                    .collect(),
            })
        }

        fn resolve_collision(
            &mut self,
            _reporter: NetId,
            _other: NetId,
        ) -> Option<(NetId, Pose)> {
            self.collisions_resolved += 1;
            self.collision_resolution
        }
    }

    fn pid(n: u32) -> PeerId {
        PeerId(n)
    }

    const ITEM: NetId = NetId(2000);
    const BIN: NetId = NetId(2100);

    /// Two players close to a ground item and a container; everyone in
    /// range of everything.
    fn fixture() -> (AuthorityEngine, EntityRegistry, MockWorld) {
        let mut reg = EntityRegistry::new();
        reg.register_player(pid(1)).unwrap();
        reg.register_player(pid(2)).unwrap();
        reg.register(crate::NetEntity {
            net_id: ITEM,
            authority: crate::Authority::HostOwned,
            owner: None,
            aspects: SyncAspects::default(),
        })
        .unwrap();
        reg.register(crate::NetEntity {
            net_id: BIN,
            authority: crate::Authority::HostOwned,
            owner: None,
            aspects: SyncAspects::inventory_only(),
        })
        .unwrap();

        let mut world = MockWorld::new();
        world.add_holder(NetId(1), Pose::new(0.0, 0.0, 0.0), 4);
        world.add_holder(NetId(2), Pose::new(10.0, 0.0, 0.0), 4);
        world.add_holder(BIN, Pose::new(0.0, 10.0, 0.0), 8);
        world.add_ground_item(ITEM, Pose::new(5.0, 0.0, 0.0));

        (AuthorityEngine::default(), reg, world)
    }

    fn pickup(
        engine: &AuthorityEngine,
        reg: &EntityRegistry,
        world: &mut MockWorld,
        peer: u32,
    ) -> Vec<(Recipient, Message)> {
        engine.handle_interact(
            reg,
            world,
            pid(peer),
            NetId(peer),
            ITEM,
            InteractAction::PickUp,
        )
    }

    fn outcome_of(out: &[(Recipient, Message)]) -> &InteractOutcome {
        match &out[0].1 {
            Message::InteractResponse { outcome, .. } => outcome,
            other => panic!("unexpected message {other:?}"),
        }
    }

    // --- Pickup ---

    #[test]
    fn test_pickup_grant_broadcasts_to_all() {
        let (engine, reg, mut world) = fixture();
        let out = pickup(&engine, &reg, &mut world, 2);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, Recipient::All);
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::PickedUp {
                item: ITEM,
                new_owner: NetId(2)
            }
        );
        assert!(!world.item_available(ITEM));
        assert_eq!(world.held_by(NetId(2)), &[ITEM]);
    }

    #[test]
    fn test_contention_one_winner_either_order() {
        // Same tick, both players grab the same item. Whoever the host
        // processes first wins; the other is denied AlreadyClaimed.
        for (first, second) in [(1, 2), (2, 1)] {
            let (engine, reg, mut world) = fixture();

            let a = pickup(&engine, &reg, &mut world, first);
            let b = pickup(&engine, &reg, &mut world, second);

            assert!(outcome_of(&a).is_success(), "first request wins");
            assert_eq!(
                *outcome_of(&b),
                InteractOutcome::Denied {
                    reason: DenyReason::AlreadyClaimed
                }
            );
            assert_eq!(world.held_by(NetId(first)), &[ITEM]);
            assert!(world.held_by(NetId(second)).is_empty());
        }
    }

    #[test]
    fn test_denial_goes_to_requester_only() {
        let (engine, reg, mut world) = fixture();
        pickup(&engine, &reg, &mut world, 1);
        let out = pickup(&engine, &reg, &mut world, 2);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, Recipient::Peer(pid(2)));
    }

    #[test]
    fn test_pickup_out_of_range_denied_world_untouched() {
        let (engine, reg, mut world) = fixture();
        world
            .poses
            .insert(NetId(2), Pose::new(1000.0, 0.0, 0.0));

        let out = pickup(&engine, &reg, &mut world, 2);
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::Denied {
                reason: DenyReason::OutOfRange
            }
        );
        assert!(world.item_available(ITEM));
    }

    #[test]
    fn test_pickup_at_exact_range_boundary_granted() {
        let (engine, reg, mut world) = fixture();
        world.poses.insert(
            NetId(2),
            Pose::new(5.0 + DEFAULT_PICKUP_RANGE, 0.0, 0.0),
        );

        let out = pickup(&engine, &reg, &mut world, 2);
        assert!(outcome_of(&out).is_success());
    }

    #[test]
    fn test_pickup_with_full_inventory_denied() {
        let (engine, reg, mut world) = fixture();
        world.slot_limit.insert(NetId(2), 0);

        let out = pickup(&engine, &reg, &mut world, 2);
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::Denied {
                reason: DenyReason::ContainerFull
            }
        );
        assert!(world.item_available(ITEM));
    }

    #[test]
    fn test_pickup_of_player_entity_not_permitted() {
        let (engine, reg, mut world) = fixture();
        let out = engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            NetId(1),
            InteractAction::PickUp,
        );
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::Denied {
                reason: DenyReason::NotPermitted
            }
        );
    }

    #[test]
    fn test_spoofed_requester_not_permitted() {
        let (engine, reg, mut world) = fixture();
        // Peer 2 pretends to act as peer 1's player.
        let out = engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(1),
            ITEM,
            InteractAction::PickUp,
        );
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::Denied {
                reason: DenyReason::NotPermitted
            }
        );
        assert!(world.item_available(ITEM));
    }

    #[test]
    fn test_unknown_target_denied() {
        let (engine, reg, mut world) = fixture();
        let out = engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            NetId(9999),
            InteractAction::PickUp,
        );
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::Denied {
                reason: DenyReason::NoSuchEntity
            }
        );
    }

    // --- Transfers ---

    #[test]
    fn test_deposit_moves_item_and_snapshots_both_sides() {
        let (engine, reg, mut world) = fixture();
        pickup(&engine, &reg, &mut world, 2);

        let out = engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            BIN,
            InteractAction::Deposit { item: ITEM },
        );

        assert_eq!(out[0].0, Recipient::All);
        let InteractOutcome::Transferred { from, to } = outcome_of(&out) else {
            panic!("expected transfer, got {:?}", outcome_of(&out));
        };
        assert_eq!(from.container, NetId(2));
        assert!(from.slots.is_empty());
        assert_eq!(to.container, BIN);
        assert_eq!(to.slots.len(), 1);
        assert_eq!(to.slots[0].item, ITEM);
        assert_eq!(world.held_by(BIN), &[ITEM]);
    }

    #[test]
    fn test_deposit_of_item_not_held_not_permitted() {
        let (engine, reg, mut world) = fixture();
        let out = engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            BIN,
            InteractAction::Deposit { item: ITEM },
        );
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::Denied {
                reason: DenyReason::NotPermitted
            }
        );
    }

    #[test]
    fn test_deposit_into_full_container_denied() {
        let (engine, reg, mut world) = fixture();
        pickup(&engine, &reg, &mut world, 2);
        world.slot_limit.insert(BIN, 0);

        let out = engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            BIN,
            InteractAction::Deposit { item: ITEM },
        );
        assert_eq!(
            *outcome_of(&out),
            InteractOutcome::Denied {
                reason: DenyReason::ContainerFull
            }
        );
        assert_eq!(world.held_by(NetId(2)), &[ITEM]);
    }

    #[test]
    fn test_withdraw_mirrors_deposit() {
        let (engine, reg, mut world) = fixture();
        pickup(&engine, &reg, &mut world, 2);
        engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            BIN,
            InteractAction::Deposit { item: ITEM },
        );

        let out = engine.handle_interact(
            &reg,
            &mut world,
            pid(1),
            NetId(1),
            BIN,
            InteractAction::Withdraw { item: ITEM },
        );

        let InteractOutcome::Transferred { from, to } = outcome_of(&out) else {
            panic!("expected transfer");
        };
        assert_eq!(from.container, BIN);
        assert_eq!(to.container, NetId(1));
        assert_eq!(world.held_by(NetId(1)), &[ITEM]);
    }

    #[test]
    fn test_withdraw_contention_second_denied() {
        let (engine, reg, mut world) = fixture();
        pickup(&engine, &reg, &mut world, 2);
        engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            BIN,
            InteractAction::Deposit { item: ITEM },
        );

        let first = engine.handle_interact(
            &reg,
            &mut world,
            pid(1),
            NetId(1),
            BIN,
            InteractAction::Withdraw { item: ITEM },
        );
        let second = engine.handle_interact(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            BIN,
            InteractAction::Withdraw { item: ITEM },
        );

        assert!(outcome_of(&first).is_success());
        assert_eq!(
            *outcome_of(&second),
            InteractOutcome::Denied {
                reason: DenyReason::AlreadyClaimed
            }
        );
    }

    // --- Collisions ---

    #[test]
    fn test_collision_result_applied_once_and_broadcast() {
        let (engine, mut reg, mut world) = fixture();
        let ai = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        world.poses.insert(ai, Pose::new(11.0, 0.0, 0.0));
        let reset = Pose::new(50.0, 50.0, 0.0);
        world.collision_resolution = Some((ai, reset));

        let out =
            engine.handle_collision(&reg, &mut world, pid(2), NetId(2), ai);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, Recipient::All);
        assert!(matches!(
            out[0].1,
            Message::CollisionResult { net_id, pose }
                if net_id == ai && pose == reset
        ));
        assert_eq!(world.pose(ai), Some(reset));
        assert_eq!(world.collisions_resolved, 1);
    }

    #[test]
    fn test_collision_without_consequence_stays_silent() {
        let (engine, mut reg, mut world) = fixture();
        let ai = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        world.poses.insert(ai, Pose::new(11.0, 0.0, 0.0));

        let out =
            engine.handle_collision(&reg, &mut world, pid(2), NetId(2), ai);
        assert!(out.is_empty());
        assert_eq!(world.collisions_resolved, 1);
    }

    #[test]
    fn test_collision_report_from_non_owner_dropped() {
        let (engine, mut reg, mut world) = fixture();
        let ai = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        world.collision_resolution = Some((ai, Pose::default()));

        // Peer 2 reports for peer 1's player.
        let out =
            engine.handle_collision(&reg, &mut world, pid(2), NetId(1), ai);
        assert!(out.is_empty());
        assert_eq!(world.collisions_resolved, 0, "world never consulted");
    }

    #[test]
    fn test_collision_with_unknown_entity_dropped() {
        let (engine, reg, mut world) = fixture();
        let out = engine.handle_collision(
            &reg,
            &mut world,
            pid(2),
            NetId(2),
            NetId(1500),
        );
        assert!(out.is_empty());
        assert_eq!(world.collisions_resolved, 0);
    }
}
