//! Junkyard: a headless scavenging session for kicking the tires.
//!
//! Every process drives one scripted scavenger that wanders the yard,
//! grabs any scrap it walks past, taunts the others about it, and gets
//! shoved around by the patroller when it strays too close. Run one
//! host and any number of joiners and watch the logs agree.
//!
//! ```text
//! junkyard host [bind_addr]     # default 0.0.0.0:7777
//! junkyard join <host:port>
//! ```

use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::{Duration, Instant};

use partyline::prelude::*;
use partyline::{
    tag, AiBehavior, ContainerSnapshot, EntityKind, ItemSlot, Movement, Pacer,
    StartEntry,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// The yard
// ---------------------------------------------------------------------------

const YARD: f32 = 240.0;
const SIM_HZ: u32 = 60;
const WALK_SPEED: f32 = 40.0;
const PATROL_SPEED: f32 = 25.0;
const GRAB_RANGE: f32 = 24.0;
const SHOVE_RANGE: f32 = 10.0;
const SHOVE_DISTANCE: f32 = 12.0;
const SCRAP_COUNT: usize = 8;
const PACK_SIZE: usize = 6;

const SCRAP_ARCHETYPE: u16 = 1;
const PATROLLER_ARCHETYPE: u16 = 2;
const MODE_PATROL: u8 = 1;

const YARD_KEY: &str = "junkyard";
const TAUNT_TAG: u8 = tag::GAME_BASE;

#[derive(Default)]
struct JunkWorld {
    poses: HashMap<NetId, Pose>,
    moving: HashMap<NetId, Movement>,
    ai: HashMap<NetId, AiBehavior>,
    ground: HashSet<NetId>,
    packs: HashMap<NetId, Vec<NetId>>,
}

impl JunkWorld {
    fn set_pose(&mut self, net_id: NetId, pose: Pose) {
        self.poses.insert(net_id, pose);
    }

    fn pack(&self, holder: NetId) -> &[NetId] {
        self.packs.get(&holder).map_or(&[], |p| p.as_slice())
    }
}

impl GameWorld for JunkWorld {
    fn pose(&self, net_id: NetId) -> Option<Pose> {
        self.poses.get(&net_id).copied()
    }

    fn apply_pose(&mut self, net_id: NetId, pose: Pose) {
        self.poses.insert(net_id, pose);
    }

    fn movement(&self, net_id: NetId) -> Option<Movement> {
        self.moving.get(&net_id).copied()
    }

    fn apply_movement(&mut self, net_id: NetId, movement: Movement) {
        self.moving.insert(net_id, movement);
    }

    fn ai_state(&self, net_id: NetId) -> Option<(Vec2, AiBehavior)> {
        let behavior = *self.ai.get(&net_id)?;
        Some((self.pose(net_id)?.pos, behavior))
    }

    fn apply_ai_behavior(&mut self, net_id: NetId, behavior: AiBehavior) {
        self.ai.insert(net_id, behavior);
    }

    fn apply_spawn(&mut self, desc: &SpawnDesc) {
        self.poses.insert(desc.net_id, desc.pose);
        if desc.net_id.kind() == EntityKind::Item {
            self.ground.insert(desc.net_id);
        }
    }

    fn apply_despawn(&mut self, net_id: NetId) {
        self.poses.remove(&net_id);
        self.moving.remove(&net_id);
        self.ai.remove(&net_id);
        self.ground.remove(&net_id);
        self.packs.remove(&net_id);
    }

    fn item_available(&self, item: NetId) -> bool {
        self.ground.contains(&item)
    }

    fn free_slots(&self, holder: NetId) -> Option<usize> {
        Some(PACK_SIZE.saturating_sub(self.pack(holder).len()))
    }

    fn holds_item(&self, holder: NetId, item: NetId) -> bool {
        self.pack(holder).contains(&item)
    }

    fn claim_item(&mut self, item: NetId, new_owner: NetId) -> bool {
        if !self.ground.remove(&item) {
            return false;
        }
        self.packs.entry(new_owner).or_default().push(item);
        true
    }

    fn move_item(&mut self, item: NetId, from: NetId, to: NetId) -> bool {
        let Some(src) = self.packs.get_mut(&from) else {
            return false;
        };
        let Some(idx) = src.iter().position(|i| *i == item) else {
            return false;
        };
        src.remove(idx);
        self.packs.entry(to).or_default().push(item);
        true
    }

    fn container_snapshot(&self, holder: NetId) -> Option<ContainerSnapshot> {
        Some(ContainerSnapshot {
            container: holder,
            slots: self
                .pack(holder)
                .iter()
                .map(|item| ItemSlot {
                    item: *item,
                    kind: SCRAP_ARCHETYPE,
                    count: 1,
                })
                .collect(),
        })
    }

    fn apply_container(&mut self, snapshot: &ContainerSnapshot) {
        self.packs.insert(
            snapshot.container,
            snapshot.slots.iter().map(|s| s.item).collect(),
        );
    }

    fn apply_pickup(&mut self, item: NetId, new_owner: NetId) {
        self.ground.remove(&item);
        self.packs.entry(new_owner).or_default().push(item);
    }

    fn resolve_collision(
        &mut self,
        reporter: NetId,
        other: NetId,
    ) -> Option<(NetId, Pose)> {
        // Only the patroller shoves; players brushing each other is
        // nobody's business.
        if other.kind() != EntityKind::Ai {
            return None;
        }
        let me = self.poses.get(&reporter)?.pos;
        let patroller = self.poses.get(&other)?.pos;
        let gap = me.distance(patroller).max(0.001);
        let scale = SHOVE_DISTANCE / gap;
        let pos = Vec2::new(
            me.x + (me.x - patroller.x) * scale,
            me.y + (me.y - patroller.y) * scale,
        );
        let rot = self.poses.get(&reporter)?.rot;
        Some((reporter, Pose { pos, rot }))
    }
}

fn random_point() -> Vec2 {
    let mut rng = rand::rng();
    Vec2::new(
        rng.random_range(15.0..YARD - 15.0),
        rng.random_range(15.0..YARD - 15.0),
    )
}

/// Moves `dist` toward `to`, stopping exactly on it rather than
/// overshooting.
fn step_toward(from: Vec2, to: Vec2, dist: f32) -> Vec2 {
    let gap = from.distance(to);
    if gap <= dist || gap == 0.0 {
        return to;
    }
    from.lerp(to, dist / gap)
}

fn spawn_point(index: u8) -> Vec2 {
    let angle = f32::from(index) * (std::f32::consts::TAU / 8.0);
    Vec2::new(
        YARD / 2.0 + angle.cos() * 40.0,
        YARD / 2.0 + angle.sin() * 40.0,
    )
}

fn patrol_point(index: u16) -> Vec2 {
    const INSET: f32 = 30.0;
    match index % 4 {
        0 => Vec2::new(INSET, INSET),
        1 => Vec2::new(YARD - INSET, INSET),
        2 => Vec2::new(YARD - INSET, YARD - INSET),
        _ => Vec2::new(INSET, YARD - INSET),
    }
}

// ---------------------------------------------------------------------------
// Scripted scavenger
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct Taunt {
    scavenger: String,
    line: String,
}

const TAUNTS: &[&str] = &[
    "first dibs!",
    "that one's mine",
    "hands off the good scrap",
    "too slow",
];

struct Scavenger {
    name: String,
    frame: u64,
    waypoint: Vec2,
    pending_grab: Option<NetId>,
    shove_cooldown: u32,
    readied: bool,
}

impl Scavenger {
    fn new(name: String) -> Scavenger {
        Scavenger {
            name,
            frame: 0,
            waypoint: random_point(),
            pending_grab: None,
            shove_cooldown: 0,
            readied: false,
        }
    }

    fn frame(
        &mut self,
        driver: &mut SessionDriver<JunkWorld>,
    ) -> Result<(), PartylineError> {
        self.frame += 1;
        match driver.phase() {
            SessionPhase::Offline => Ok(()),
            SessionPhase::Lobby => self.lobby_frame(driver),
            SessionPhase::InGame => self.game_frame(driver),
        }
    }

    /// Linger a second for company, then commit.
    fn lobby_frame(
        &mut self,
        driver: &mut SessionDriver<JunkWorld>,
    ) -> Result<(), PartylineError> {
        if !self.readied && self.frame > u64::from(SIM_HZ) {
            driver.select_character(CharacterId(
                rand::rng().random_range(0..4),
            ))?;
            driver.set_ready(true)?;
            self.readied = true;
            tracing::info!(name = %self.name, "ready to scavenge");
        }
        Ok(())
    }

    fn game_frame(
        &mut self,
        driver: &mut SessionDriver<JunkWorld>,
    ) -> Result<(), PartylineError> {
        let Some(own) = driver.local_entity() else {
            return Ok(());
        };
        let dt = 1.0 / SIM_HZ as f32;

        // Wander between random waypoints.
        let Some(me) = driver.world().pose(own) else {
            return Ok(());
        };
        if me.pos.distance(self.waypoint) < 3.0 {
            self.waypoint = random_point();
        }
        let next = step_toward(me.pos, self.waypoint, WALK_SPEED * dt);
        let rot =
            (self.waypoint.y - me.pos.y).atan2(self.waypoint.x - me.pos.x);
        let gap = me.pos.distance(self.waypoint).max(0.001);
        let dir = Vec2::new(
            (self.waypoint.x - me.pos.x) / gap,
            (self.waypoint.y - me.pos.y) / gap,
        );
        let world = driver.world_mut();
        world.set_pose(own, Pose { pos: next, rot });
        world.moving.insert(
            own,
            Movement {
                dir,
                sprinting: false,
            },
        );

        if driver.is_host() {
            step_patrollers(driver.world_mut(), dt);
        }

        // Grab whatever scrap is in reach, one request at a time.
        if self.pending_grab.is_none() {
            let world = driver.world();
            let near = world.ground.iter().copied().find(|item| {
                world
                    .poses
                    .get(item)
                    .is_some_and(|p| p.pos.distance(next) < GRAB_RANGE)
            });
            if let Some(item) = near {
                tracing::debug!(%item, "reaching for scrap");
                driver.request_interact(own, item, InteractAction::PickUp)?;
                self.pending_grab = Some(item);
            }
        }

        // Getting close to the patroller earns a shove.
        if self.shove_cooldown > 0 {
            self.shove_cooldown -= 1;
        } else {
            let world = driver.world();
            let bumped = world.ai.keys().copied().find(|id| {
                world
                    .poses
                    .get(id)
                    .is_some_and(|p| p.pos.distance(next) < SHOVE_RANGE)
            });
            if let Some(other) = bumped {
                driver.report_collision(own, other)?;
                self.shove_cooldown = SIM_HZ;
            }
        }
        Ok(())
    }

    /// Returns `false` when the session is over and the loop should
    /// exit.
    fn on_event(
        &mut self,
        driver: &mut SessionDriver<JunkWorld>,
        event: SessionEvent,
    ) -> Result<bool, PartylineError> {
        match event {
            SessionEvent::JoinedLobby { players } => {
                tracing::info!(scavengers = players.len(), "in the yard lobby");
            }
            SessionEvent::PeerJoined { peer, name } => {
                tracing::info!(%peer, %name, "wandered in");
            }
            SessionEvent::PeerLeft { peer, reason } => {
                tracing::info!(%peer, %reason, "gone");
            }
            SessionEvent::CharacterSelected { peer, character } => {
                tracing::debug!(%peer, %character, "picked a kit");
            }
            SessionEvent::ReadyChanged { peer, ready } => {
                tracing::debug!(%peer, ready, "ready changed");
            }
            SessionEvent::GameStarted { entries } => {
                self.on_game_start(driver, &entries)?;
            }
            SessionEvent::EntitySpawned { desc } => {
                tracing::debug!(net_id = %desc.net_id, archetype = desc.archetype, "appeared");
            }
            SessionEvent::EntityDespawned { net_id } => {
                tracing::debug!(%net_id, "gone from the yard");
            }
            SessionEvent::InteractionResolved {
                requester, outcome, ..
            } => {
                self.on_interaction(driver, requester, outcome)?;
            }
            SessionEvent::CollisionCorrected { net_id, .. } => {
                tracing::debug!(%net_id, "shoved");
            }
            SessionEvent::RttMeasured { rtt_ms } => {
                tracing::trace!(rtt_ms, "ping");
            }
            SessionEvent::HostLost => {
                tracing::warn!("host went away; leaving the yard");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn on_game_start(
        &mut self,
        driver: &mut SessionDriver<JunkWorld>,
        entries: &[StartEntry],
    ) -> Result<(), PartylineError> {
        for entry in entries {
            let pose = Pose {
                pos: spawn_point(entry.spawn_index),
                rot: 0.0,
            };
            driver
                .world_mut()
                .set_pose(NetId::for_player(entry.peer), pose);
        }
        tracing::info!(scavengers = entries.len(), "scavenging begins");
        if driver.is_host() {
            scatter_scrap(driver)?;
        }
        Ok(())
    }

    fn on_interaction(
        &mut self,
        driver: &SessionDriver<JunkWorld>,
        requester: NetId,
        outcome: InteractOutcome,
    ) -> Result<(), PartylineError> {
        let own = driver.local_entity();
        if Some(requester) == own {
            self.pending_grab = None;
        }
        match outcome {
            InteractOutcome::PickedUp { item, new_owner } => {
                if Some(new_owner) == own {
                    tracing::info!(%item, "grabbed it");
                    let taunt = Taunt {
                        scavenger: self.name.clone(),
                        line: TAUNTS
                            [rand::rng().random_range(0..TAUNTS.len())]
                        .to_string(),
                    };
                    if let Ok(payload) = serde_json::to_vec(&taunt) {
                        driver.send_custom(
                            Recipient::Host,
                            TAUNT_TAG,
                            payload,
                        )?;
                    }
                } else {
                    tracing::info!(%item, owner = %new_owner, "beaten to it");
                }
            }
            InteractOutcome::Denied { reason } => {
                tracing::debug!(%reason, "grab denied");
            }
            InteractOutcome::Transferred { .. } => {}
        }
        Ok(())
    }
}

fn step_patrollers(world: &mut JunkWorld, dt: f32) {
    let ids: Vec<NetId> = world.ai.keys().copied().collect();
    for id in ids {
        let Some(pose) = world.poses.get(&id).copied() else {
            continue;
        };
        let Some(mut behavior) = world.ai.get(&id).copied() else {
            continue;
        };
        let target = patrol_point(behavior.patrol_index);
        if pose.pos.distance(target) < 2.0 {
            behavior.patrol_index = behavior.patrol_index.wrapping_add(1) % 4;
            world.ai.insert(id, behavior);
            continue;
        }
        let pos = step_toward(pose.pos, target, PATROL_SPEED * dt);
        let rot = (target.y - pose.pos.y).atan2(target.x - pose.pos.x);
        world.poses.insert(id, Pose { pos, rot });
    }
}

fn scatter_scrap(
    driver: &mut SessionDriver<JunkWorld>,
) -> Result<(), PartylineError> {
    for _ in 0..SCRAP_COUNT {
        let pose = Pose {
            pos: random_point(),
            rot: 0.0,
        };
        driver.spawn_item(SCRAP_ARCHETYPE, pose)?;
    }
    let post = Pose {
        pos: patrol_point(0),
        rot: 0.0,
    };
    if let Some(id) = driver.spawn_ai(PATROLLER_ARCHETYPE, post)? {
        driver.world_mut().ai.insert(
            id,
            AiBehavior {
                mode: MODE_PATROL,
                patrol_index: 0,
            },
        );
        tracing::info!(%id, "patroller on duty");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn pick_name() -> String {
    const NAMES: &[&str] = &["ada", "mira", "jun", "kip", "rosa", "tove"];
    let pick = NAMES[rand::rng().random_range(0..NAMES.len())];
    format!("{pick}-{}", rand::rng().random_range(10..100))
}

fn install_taunts(driver: &mut SessionDriver<JunkWorld>) {
    driver
        .on_custom_from_client(TAUNT_TAG, |_state, sender, envelope| {
            let Message::Unknown { tag, payload } = &envelope.message else {
                return Vec::new();
            };
            vec![(
                Recipient::AllExcept(sender),
                Message::Unknown {
                    tag: *tag,
                    payload: payload.clone(),
                },
            )]
        });
    driver.on_custom_from_host(TAUNT_TAG, |_state, envelope| {
        let Message::Unknown { payload, .. } = &envelope.message else {
            return Vec::new();
        };
        match serde_json::from_slice::<Taunt>(payload) {
            Ok(t) => tracing::info!(from = %t.scavenger, "\u{201c}{}\u{201d}", t.line),
            Err(e) => tracing::debug!(error = %e, "garbled taunt"),
        }
        Vec::new()
    });
}

fn run(
    mut driver: SessionDriver<JunkWorld>,
    name: String,
) -> Result<(), PartylineError> {
    let mut scavenger = Scavenger::new(name);
    let mut pacer = Pacer::with_rate(SIM_HZ);
    loop {
        for _ in 0..pacer.poll(Instant::now()) {
            driver.tick();
            scavenger.frame(&mut driver)?;
            for event in driver.drain_events() {
                if !scavenger.on_event(&mut driver, event)? {
                    driver.leave();
                    return Ok(());
                }
            }
        }
        thread::sleep(Duration::from_millis(2));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mode = args.next().unwrap_or_default();
    let name = pick_name();
    let mut driver =
        SessionDriver::new(JunkWorld::default(), DriverConfig::default())?;
    install_taunts(&mut driver);

    match mode.as_str() {
        "host" => {
            let config = match args.next() {
                Some(bind) => HostConfig {
                    bind_addr: bind,
                    session_key: YARD_KEY.into(),
                    ..HostConfig::default()
                },
                None => HostConfig::with_key(YARD_KEY),
            };
            let peer = driver.host(config, &name)?;
            if let Some(addr) = driver.host_addr() {
                tracing::info!(%addr, %peer, %name, "hosting the yard");
            }
        }
        "join" => {
            let addr = args
                .next()
                .ok_or("usage: junkyard join <host:port>")?;
            let peer = driver.join(ClientConfig::new(addr, YARD_KEY), &name)?;
            tracing::info!(%peer, %name, "joined the yard");
        }
        _ => {
            eprintln!("usage: junkyard host [bind_addr] | junkyard join <host:port>");
            std::process::exit(2);
        }
    }

    run(driver, name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yard_with_scrap() -> JunkWorld {
        let mut world = JunkWorld::default();
        world.poses.insert(NetId(1), Pose::new(100.0, 100.0, 0.0));
        world.poses.insert(NetId(2), Pose::new(110.0, 100.0, 0.0));
        world.apply_spawn(&SpawnDesc {
            net_id: NetId(2000),
            archetype: SCRAP_ARCHETYPE,
            pose: Pose::new(105.0, 100.0, 0.0),
            owner: None,
        });
        world
    }

    #[test]
    fn test_spawned_scrap_lands_on_the_ground() {
        let world = yard_with_scrap();
        assert!(world.item_available(NetId(2000)));
        assert_eq!(world.pose(NetId(2000)), Some(Pose::new(105.0, 100.0, 0.0)));
    }

    #[test]
    fn test_claim_takes_scrap_off_the_ground() {
        let mut world = yard_with_scrap();
        assert!(world.claim_item(NetId(2000), NetId(1)));
        assert!(!world.item_available(NetId(2000)));
        assert!(world.holds_item(NetId(1), NetId(2000)));

        // A second claim finds nothing to take.
        assert!(!world.claim_item(NetId(2000), NetId(2)));
        assert!(!world.holds_item(NetId(2), NetId(2000)));
    }

    #[test]
    fn test_pack_capacity_is_enforced_through_free_slots() {
        let mut world = yard_with_scrap();
        for n in 0..PACK_SIZE as u32 {
            world.packs.entry(NetId(1)).or_default().push(NetId(2100 + n));
        }
        assert_eq!(world.free_slots(NetId(1)), Some(0));
        assert_eq!(world.free_slots(NetId(2)), Some(PACK_SIZE));
    }

    #[test]
    fn test_move_item_between_packs_and_snapshot() {
        let mut world = yard_with_scrap();
        world.claim_item(NetId(2000), NetId(1));

        assert!(world.move_item(NetId(2000), NetId(1), NetId(2)));
        assert!(!world.holds_item(NetId(1), NetId(2000)));
        assert!(world.holds_item(NetId(2), NetId(2000)));

        let snap = world.container_snapshot(NetId(2)).expect("snapshot");
        assert_eq!(snap.container, NetId(2));
        assert_eq!(snap.slots.len(), 1);
        assert_eq!(snap.slots[0].item, NetId(2000));

        // Moving it again out of the emptied pack fails.
        assert!(!world.move_item(NetId(2000), NetId(1), NetId(2)));
    }

    #[test]
    fn test_container_snapshot_overwrites_wholesale() {
        let mut world = yard_with_scrap();
        world.packs.insert(NetId(1), vec![NetId(2990), NetId(2991)]);

        world.apply_container(&ContainerSnapshot {
            container: NetId(1),
            slots: vec![ItemSlot {
                item: NetId(2000),
                kind: SCRAP_ARCHETYPE,
                count: 1,
            }],
        });
        assert_eq!(world.pack(NetId(1)), &[NetId(2000)]);
    }

    #[test]
    fn test_shove_pushes_reporter_away_from_patroller() {
        let mut world = JunkWorld::default();
        world.poses.insert(NetId(1), Pose::new(100.0, 100.0, 0.3));
        world.poses.insert(NetId(1000), Pose::new(104.0, 100.0, 0.0));

        let (moved, pose) = world
            .resolve_collision(NetId(1), NetId(1000))
            .expect("patroller contact shoves");

        assert_eq!(moved, NetId(1));
        let patroller = Vec2::new(104.0, 100.0);
        assert!(
            pose.pos.distance(patroller) > 4.0,
            "reporter should end up farther than it started"
        );
        assert!(pose.pos.x < 100.0, "shoved directly away");
        assert_eq!(pose.rot, 0.3, "a shove does not spin you around");
    }

    #[test]
    fn test_players_brushing_each_other_is_no_collision() {
        let mut world = JunkWorld::default();
        world.poses.insert(NetId(1), Pose::new(100.0, 100.0, 0.0));
        world.poses.insert(NetId(2), Pose::new(101.0, 100.0, 0.0));
        assert_eq!(world.resolve_collision(NetId(1), NetId(2)), None);
    }

    #[test]
    fn test_step_toward_never_overshoots() {
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(10.0, 0.0);
        assert_eq!(step_toward(from, to, 4.0), Vec2::new(4.0, 0.0));
        assert_eq!(step_toward(from, to, 40.0), to);
        assert_eq!(step_toward(to, to, 4.0), to);
    }

    #[test]
    fn test_patrol_route_wraps_at_four_corners() {
        assert_eq!(patrol_point(0), patrol_point(4));
        let corners: Vec<Vec2> = (0..4).map(patrol_point).collect();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert!(
                    corners[i].distance(corners[j]) > 1.0,
                    "corners {i} and {j} must differ"
                );
            }
        }
    }

    #[test]
    fn test_patroller_advances_its_route() {
        let mut world = JunkWorld::default();
        let id = NetId(1000);
        world.poses.insert(id, Pose::new(31.0, 30.0, 0.0));
        world.ai.insert(
            id,
            AiBehavior {
                mode: MODE_PATROL,
                patrol_index: 0,
            },
        );

        // Within reach of corner 0: the next step turns the route.
        step_patrollers(&mut world, 1.0 / 60.0);
        assert_eq!(world.ai[&id].patrol_index, 1);

        // Subsequent steps head for corner 1.
        let before = world.poses[&id].pos.distance(patrol_point(1));
        for _ in 0..60 {
            step_patrollers(&mut world, 1.0 / 60.0);
        }
        let after = world.poses[&id].pos.distance(patrol_point(1));
        assert!(after < before, "patroller should close on its corner");
    }

    #[test]
    fn test_spawn_points_are_distinct_per_index() {
        let points: Vec<Vec2> = (0..8).map(spawn_point).collect();
        for i in 0..8 {
            for j in (i + 1)..8 {
                assert!(
                    points[i].distance(points[j]) > 1.0,
                    "spawn spots {i} and {j} must differ"
                );
            }
        }
    }
}
