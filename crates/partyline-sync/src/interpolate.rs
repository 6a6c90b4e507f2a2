//! Smoothed rendering of remote entity motion.
//!
//! Remote transforms arrive as discrete snapshots at broadcast rate,
//! well below frame rate. Rather than teleporting entities snapshot to
//! snapshot, each update starts a short eased blend from the pose the
//! entity is currently rendered at toward the incoming one, sized to
//! the expected gap between updates. When the blend completes before
//! the next snapshot arrives the entity holds at the target; there is
//! no extrapolation, a late packet shows as a brief pause instead of a
//! rubber-band correction.
//!
//! Locally simulated entities never go through here. Rendering them
//! from their own echoed snapshots would lag input by a full round
//! trip; their world pose is already the truth.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::time::{Duration, Instant};

use partyline_protocol::{NetId, Pose};

/// Hermite ease: `3t^2 - 2t^3`, clamped to `[0, 1]`.
///
/// Zero slope at both ends, so motion ramps in and out instead of
/// starting and stopping abruptly. At `t = 0.5` the eased value is
/// exactly `0.5`, which makes blends time-symmetric.
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Blend between two angles in radians along the shortest arc.
///
/// A naive lerp from `3.1` to `-3.1` would spin the long way through
/// zero; this wraps the delta into `[-PI, PI]` first.
fn angle_lerp(a: f32, b: f32, t: f32) -> f32 {
    let mut delta = (b - a) % (2.0 * PI);
    if delta > PI {
        delta -= 2.0 * PI;
    } else if delta < -PI {
        delta += 2.0 * PI;
    }
    a + delta * t
}

fn blend(prev: Pose, target: Pose, eased: f32) -> Pose {
    Pose {
        pos: prev.pos.lerp(target.pos, eased),
        rot: angle_lerp(prev.rot, target.rot, eased),
    }
}

/// Blend state for one tracked entity.
#[derive(Debug, Clone, Copy)]
struct Track {
    previous: Pose,
    target: Pose,
    /// Receiver-clock arrival time of the current target. Sender
    /// clocks are never compared against local time.
    received_at: Instant,
    /// Highest sender timestamp applied so far; unreliable delivery
    /// can reorder frames and a stale snapshot must not win.
    last_stamp: Option<u64>,
    /// Expected gap between snapshots; the blend window.
    interval: Duration,
    /// True once the blend has landed; nothing left to emit.
    settled: bool,
}

/// Per-entity interpolation driver for everything remote.
///
/// Owned by the simulation thread. The session layer pushes incoming
/// snapshots in as targets and calls [`advance`](Interpolator::advance)
/// once per sim tick, applying each returned pose to the world.
#[derive(Debug, Default)]
pub struct Interpolator {
    tracks: HashMap<NetId, Track>,
    stale_dropped: u64,
}

impl Interpolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts following an entity at its spawn pose. Until a snapshot
    /// arrives the entity renders exactly there.
    pub fn track(&mut self, net_id: NetId, pose: Pose, interval: Duration) {
        self.tracks.insert(
            net_id,
            Track {
                previous: pose,
                target: pose,
                received_at: Instant::now(),
                last_stamp: None,
                interval,
                settled: true,
            },
        );
    }

    /// Stops following an entity. Returns whether it was tracked.
    pub fn untrack(&mut self, net_id: NetId) -> bool {
        self.tracks.remove(&net_id).is_some()
    }

    pub fn is_tracked(&self, net_id: NetId) -> bool {
        self.tracks.contains_key(&net_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Snapshots dropped by the stale-stamp guard so far.
    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }

    /// Feeds an incoming snapshot in as the new blend target.
    ///
    /// The blend starts from wherever the entity is currently rendered,
    /// not from the old target, so a retarget mid-blend never jumps.
    /// Snapshots whose sender timestamp is older than the last applied
    /// one are dropped; returns whether the target was accepted.
    pub fn push_target(
        &mut self,
        net_id: NetId,
        pose: Pose,
        sender_stamp: u64,
        now: Instant,
    ) -> bool {
        let Some(track) = self.tracks.get_mut(&net_id) else {
            // Snapshot raced ahead of the spawn that introduces the
            // entity; the next one lands after the spawn is applied.
            tracing::trace!(%net_id, "snapshot for untracked entity dropped");
            return false;
        };
        if let Some(last) = track.last_stamp {
            if sender_stamp < last {
                self.stale_dropped += 1;
                tracing::trace!(
                    %net_id,
                    sender_stamp,
                    last,
                    "stale snapshot dropped"
                );
                return false;
            }
        }

        track.previous = rendered_at(track, now);
        track.target = pose;
        track.received_at = now;
        track.last_stamp = Some(sender_stamp);
        track.settled = false;
        true
    }

    /// Hard-sets an entity's pose, cancelling any blend in flight.
    /// Used for authoritative corrections such as collision results.
    pub fn snap(&mut self, net_id: NetId, pose: Pose) {
        if let Some(track) = self.tracks.get_mut(&net_id) {
            track.previous = pose;
            track.target = pose;
            track.settled = true;
        }
    }

    /// The pose an entity renders at right now, blend or hold.
    pub fn rendered(&self, net_id: NetId, now: Instant) -> Option<Pose> {
        self.tracks.get(&net_id).map(|t| rendered_at(t, now))
    }

    /// Steps every active blend and returns the poses to apply.
    ///
    /// A blend that reaches its target emits the exact target once and
    /// then goes quiet; the world keeps the last applied pose, so
    /// settled tracks cost nothing per tick.
    pub fn advance(&mut self, now: Instant) -> Vec<(NetId, Pose)> {
        let mut out = Vec::new();
        for (net_id, track) in &mut self.tracks {
            if track.settled {
                continue;
            }
            let progress = progress_at(track, now);
            if progress >= 1.0 {
                track.settled = true;
                out.push((*net_id, track.target));
            } else {
                let eased = smoothstep(progress);
                out.push((*net_id, blend(track.previous, track.target, eased)));
            }
        }
        out
    }
}

fn progress_at(track: &Track, now: Instant) -> f32 {
    if track.interval.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_duration_since(track.received_at);
    (elapsed.as_secs_f32() / track.interval.as_secs_f32()).clamp(0.0, 1.0)
}

fn rendered_at(track: &Track, now: Instant) -> Pose {
    if track.settled {
        return track.target;
    }
    let eased = smoothstep(progress_at(track, now));
    blend(track.previous, track.target, eased)
}

// ===========================================================================
// Tests
// ===========================================================================
