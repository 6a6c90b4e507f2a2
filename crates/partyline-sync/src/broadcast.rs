//! Periodic state publication.
//!
//! Every process publishes the entities *it* controls and nothing
//! else: the host its own player, the AI and anything else host-owned;
//! a client exactly its own player. Remote entities are never
//! re-published here, so a process can never echo another's state back
//! into the session. The host's relay of client state to the other
//! clients happens on receipt, in the session layer, not on a timer.
//!
//! Two cadences, both deliberately below sim rate: transforms are
//! small and smooth out fine at 20 Hz under interpolation, AI bundles
//! a behavior descriptor and changes course less often, so 10 Hz is
//! plenty. Snapshots supersede each other, which is what lets them
//! ride the unreliable lane.

use std::time::{Duration, Instant};

use partyline_protocol::{EntityKind, Message, PeerId, Recipient};
use partyline_tick::Pacer;

use crate::{Aspect, EntityRegistry, GameWorld};

/// Transform snapshot rate in Hz.
pub const DEFAULT_TRANSFORM_HZ: u32 = 20;
/// AI snapshot rate in Hz.
pub const DEFAULT_AI_HZ: u32 = 10;

/// Broadcast cadence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub transform_hz: u32,
    pub ai_hz: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            transform_hz: DEFAULT_TRANSFORM_HZ,
            ai_hz: DEFAULT_AI_HZ,
        }
    }
}

impl SyncConfig {
    /// Expected gap between transform snapshots; also the blend window
    /// handed to the interpolator for player entities.
    pub fn transform_interval(&self) -> Duration {
        rate_interval(self.transform_hz)
    }

    /// Expected gap between AI snapshots.
    pub fn ai_interval(&self) -> Duration {
        rate_interval(self.ai_hz)
    }
}

fn rate_interval(hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1)))
}

/// Paced publisher of locally controlled entity state.
///
/// Created when a session starts, polled once per sim tick, dropped
/// when the session ends. Messages come back as `(recipient, message)`
/// pairs; stamping and sending is the session layer's job.
#[derive(Debug)]
pub struct StateBroadcaster {
    transform: Pacer,
    ai: Pacer,
}

impl StateBroadcaster {
    pub fn new(config: &SyncConfig) -> Self {
        StateBroadcaster {
            transform: Pacer::with_rate(config.transform_hz),
            ai: Pacer::with_rate(config.ai_hz),
        }
    }

    /// Collects every snapshot due at `now`.
    ///
    /// A due transform tick emits one `Transform` per locally
    /// controlled non-AI entity that has a pose, plus a `PlayerInput`
    /// for those whose world reports a movement descriptor. A due AI
    /// tick emits one `AiState` per locally controlled AI entity. On
    /// the host everything goes to [`Recipient::All`], on a client to
    /// [`Recipient::Host`].
    pub fn poll<W: GameWorld>(
        &mut self,
        now: Instant,
        registry: &EntityRegistry,
        world: &W,
        local: PeerId,
        is_host: bool,
    ) -> Vec<(Recipient, Message)> {
        let mut out = Vec::new();
        if self.transform.poll(now) > 0 {
            self.collect_transforms(registry, world, local, is_host, &mut out);
        }
        if self.ai.poll(now) > 0 {
            self.collect_ai(registry, world, local, is_host, &mut out);
        }
        out
    }

    fn collect_transforms<W: GameWorld>(
        &self,
        registry: &EntityRegistry,
        world: &W,
        local: PeerId,
        is_host: bool,
        out: &mut Vec<(Recipient, Message)>,
    ) {
        let recipient = scope(is_host);
        for entity in registry.with_aspect(Aspect::Transform) {
            if entity.net_id.kind() == EntityKind::Ai {
                continue;
            }
            if !entity.controlled_locally(Aspect::Transform, local, is_host) {
                continue;
            }
            let Some(pose) = world.pose(entity.net_id) else {
                continue;
            };
            out.push((
                recipient,
                Message::Transform {
                    net_id: entity.net_id,
                    pose,
                },
            ));
            if entity.aspects.movement {
                if let Some(movement) = world.movement(entity.net_id) {
                    out.push((
                        recipient,
                        Message::PlayerInput {
                            net_id: entity.net_id,
                            movement,
                        },
                    ));
                }
            }
        }
    }

    fn collect_ai<W: GameWorld>(
        &self,
        registry: &EntityRegistry,
        world: &W,
        local: PeerId,
        is_host: bool,
        out: &mut Vec<(Recipient, Message)>,
    ) {
        let recipient = scope(is_host);
        for entity in registry.with_aspect(Aspect::Transform) {
            if entity.net_id.kind() != EntityKind::Ai {
                continue;
            }
            if !entity.controlled_locally(Aspect::Transform, local, is_host) {
                continue;
            }
            let Some((pos, behavior)) = world.ai_state(entity.net_id) else {
                continue;
            };
            out.push((
                recipient,
                Message::AiState {
                    net_id: entity.net_id,
                    pos,
                    behavior,
                },
            ));
        }
    }
}

fn scope(is_host: bool) -> Recipient {
    if is_host {
        Recipient::All
    } else {
        Recipient::Host
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use partyline_protocol::{
        AiBehavior, Movement, NetId, Pose, SpawnDesc, Vec2,
    };

    use super::*;
    use crate::SyncAspects;

    #[derive(Default)]
    struct MockWorld {
        poses: HashMap<NetId, Pose>,
        movements: HashMap<NetId, Movement>,
        ai: HashMap<NetId, (Vec2, AiBehavior)>,
    }

    impl GameWorld for MockWorld {
        fn pose(&self, net_id: NetId) -> Option<Pose> {
            self.poses.get(&net_id).copied()
        }

        fn apply_pose(&mut self, net_id: NetId, pose: Pose) {
            self.poses.insert(net_id, pose);
        }

        fn movement(&self, net_id: NetId) -> Option<Movement> {
            self.movements.get(&net_id).copied()
        }

        fn ai_state(&self, net_id: NetId) -> Option<(Vec2, AiBehavior)> {
            self.ai.get(&net_id).copied()
        }

        fn apply_spawn(&mut self, desc: &SpawnDesc) {
            self.poses.insert(desc.net_id, desc.pose);
        }

        fn apply_despawn(&mut self, net_id: NetId) {
            self.poses.remove(&net_id);
        }
    }

    fn pid(n: u32) -> PeerId {
        PeerId(n)
    }

    /// Registry with the host player (peer 1), a remote player
    /// (peer 2) and one AI entity; world has poses for all three.
    fn session_fixture() -> (EntityRegistry, MockWorld) {
        let mut reg = EntityRegistry::new();
        let mut world = MockWorld::default();

        reg.register_player(pid(1)).unwrap();
        world.poses.insert(NetId(1), Pose::new(1.0, 1.0, 0.0));

        reg.register_player(pid(2)).unwrap();
        world.poses.insert(NetId(2), Pose::new(2.0, 2.0, 0.0));

        let ai = reg.allocate_ai(SyncAspects::transform_only()).unwrap();
        world.poses.insert(ai, Pose::new(9.0, 9.0, 0.0));
        world
            .ai
            .insert(ai, (Vec2::new(9.0, 9.0), AiBehavior::default()));

        (reg, world)
    }

    /// Arms both pacers (first poll only schedules) and returns a time
    /// comfortably past both start jitters.
    fn armed(
        b: &mut StateBroadcaster,
        reg: &EntityRegistry,
        world: &MockWorld,
        local: PeerId,
        is_host: bool,
    ) -> Instant {
        let t0 = Instant::now();
        let first = b.poll(t0, reg, world, local, is_host);
        assert!(first.is_empty(), "first poll only arms");
        t0
    }

    fn transforms_for(out: &[(Recipient, Message)]) -> Vec<NetId> {
        out.iter()
            .filter_map(|(_, m)| match m {
                Message::Transform { net_id, .. } => Some(*net_id),
                _ => None,
            })
            .collect()
    }

    // --- Scope ---

    #[test]
    fn test_host_publishes_own_entities_only() {
        let (reg, world) = session_fixture();
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(1), true);

        // Past the transform interval but short of the AI one.
        let out = b.poll(
            t0 + Duration::from_millis(55),
            &reg,
            &world,
            pid(1),
            true,
        );

        let ids = transforms_for(&out);
        assert_eq!(ids, vec![NetId(1)], "host player only, never peer 2");
        assert!(out.iter().all(|(r, _)| *r == Recipient::All));
        assert!(!out
            .iter()
            .any(|(_, m)| matches!(m, Message::AiState { .. })));
    }

    #[test]
    fn test_client_publishes_to_host_only() {
        let (reg, world) = session_fixture();
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(2), false);

        let out = b.poll(
            t0 + Duration::from_millis(55),
            &reg,
            &world,
            pid(2),
            false,
        );

        assert_eq!(transforms_for(&out), vec![NetId(2)]);
        assert!(out.iter().all(|(r, _)| *r == Recipient::Host));
    }

    #[test]
    fn test_client_never_publishes_ai() {
        let (reg, world) = session_fixture();
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(2), false);

        // Both cadences due.
        let out = b.poll(
            t0 + Duration::from_millis(150),
            &reg,
            &world,
            pid(2),
            false,
        );
        assert!(!out
            .iter()
            .any(|(_, m)| matches!(m, Message::AiState { .. })));
    }

    // --- Cadence ---

    #[test]
    fn test_ai_rides_its_own_slower_cadence() {
        let (reg, world) = session_fixture();
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(1), true);

        // 55 ms: transform due, AI (100 ms) not yet.
        let first = b.poll(
            t0 + Duration::from_millis(55),
            &reg,
            &world,
            pid(1),
            true,
        );
        assert!(!first
            .iter()
            .any(|(_, m)| matches!(m, Message::AiState { .. })));

        // 110 ms: AI due now.
        let second = b.poll(
            t0 + Duration::from_millis(110),
            &reg,
            &world,
            pid(1),
            true,
        );
        let ai: Vec<_> = second
            .iter()
            .filter(|(_, m)| matches!(m, Message::AiState { .. }))
            .collect();
        assert_eq!(ai.len(), 1);
        assert!(matches!(
            ai[0].1,
            Message::AiState {
                net_id: NetId(1000),
                ..
            }
        ));
    }

    #[test]
    fn test_not_due_yields_nothing() {
        let (reg, world) = session_fixture();
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(1), true);

        let out =
            b.poll(t0 + Duration::from_millis(5), &reg, &world, pid(1), true);
        assert!(out.is_empty());
    }

    // --- Payload selection ---

    #[test]
    fn test_movement_rides_along_when_world_reports_it() {
        let (reg, mut world) = session_fixture();
        world.movements.insert(
            NetId(1),
            Movement {
                dir: Vec2::new(0.0, 1.0),
                sprinting: true,
            },
        );
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(1), true);

        let out = b.poll(
            t0 + Duration::from_millis(55),
            &reg,
            &world,
            pid(1),
            true,
        );
        assert!(out.iter().any(|(_, m)| matches!(
            m,
            Message::PlayerInput {
                net_id: NetId(1),
                movement: Movement { sprinting: true, .. },
            }
        )));
    }

    #[test]
    fn test_entity_without_world_pose_skipped() {
        let (reg, mut world) = session_fixture();
        world.poses.remove(&NetId(1));
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(1), true);

        let out = b.poll(
            t0 + Duration::from_millis(55),
            &reg,
            &world,
            pid(1),
            true,
        );
        assert!(transforms_for(&out).is_empty());
    }

    #[test]
    fn test_inventory_only_entities_never_broadcast() {
        let (mut reg, mut world) = session_fixture();
        let bin = reg.allocate_item(SyncAspects::inventory_only()).unwrap();
        world.poses.insert(bin, Pose::new(4.0, 4.0, 0.0));
        let mut b = StateBroadcaster::new(&SyncConfig::default());
        let t0 = armed(&mut b, &reg, &world, pid(1), true);

        let out = b.poll(
            t0 + Duration::from_millis(150),
            &reg,
            &world,
            pid(1),
            true,
        );
        assert!(!transforms_for(&out).contains(&bin));
    }

    // --- Config ---

    #[test]
    fn test_intervals_follow_rates() {
        let config = SyncConfig::default();
        assert_eq!(config.transform_interval(), Duration::from_millis(50));
        assert_eq!(config.ai_interval(), Duration::from_millis(100));

        let slow = SyncConfig {
            transform_hz: 8,
            ai_hz: 4,
        };
        assert_eq!(slow.transform_interval(), Duration::from_millis(125));
        assert_eq!(slow.ai_interval(), Duration::from_millis(250));
    }
}
