//! The shared state every handler works against.
//!
//! One value of [`DriverState`] holds everything a message handler may
//! read or mutate: the game's world, the lobby roster, the entity
//! registry, interpolation tracks, and the authority engine. The
//! driver owns it alongside the dispatcher and the session context;
//! handlers receive `&mut DriverState<W>` and nothing else, so every
//! mutation funnels through one place on one thread.
//!
//! Side effects that need the session context (locking admission,
//! kicking a peer) are requested through flags here and applied by the
//! driver right after dispatch returns.

use std::time::Instant;

use partyline_lobby::Roster;
use partyline_protocol::PeerId;
use partyline_sync::{
    AuthorityEngine, EntityRegistry, GameWorld, Interpolator,
    StateBroadcaster, SyncConfig,
};

use crate::SessionEvent;

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session: single-player, nothing replicated.
    Offline,
    /// Connected and gathered, waiting for everyone to ready up.
    Lobby,
    /// The synchronized session proper.
    InGame,
}

/// Everything the standard and game-registered handlers share.
///
/// Game code touches this in two places: custom-message handlers
/// receive it mutably, and the driver re-exposes the world and roster
/// through its own accessors.
pub struct DriverState<W> {
    pub(crate) world: W,
    pub(crate) roster: Roster,
    pub(crate) registry: EntityRegistry,
    pub(crate) interpolator: Interpolator,
    pub(crate) authority: AuthorityEngine,
    pub(crate) broadcaster: Option<StateBroadcaster>,
    pub(crate) sync: SyncConfig,
    pub(crate) phase: SessionPhase,
    pub(crate) local_peer: Option<PeerId>,
    pub(crate) is_host: bool,
    /// Refreshed by the driver at the top of every tick; handlers use
    /// these instead of sampling clocks themselves.
    pub(crate) tick_now: Instant,
    pub(crate) now_ms: u64,
    pub(crate) events: Vec<SessionEvent>,
    /// Set by handlers, drained by the driver after dispatch.
    pub(crate) lock_session: bool,
    pub(crate) kicks: Vec<PeerId>,
}

impl<W: GameWorld> DriverState<W> {
    pub(crate) fn new(
        world: W,
        sync: SyncConfig,
        authority: AuthorityEngine,
    ) -> Self {
        DriverState {
            world,
            roster: Roster::new(),
            registry: EntityRegistry::new(),
            interpolator: Interpolator::new(),
            authority,
            broadcaster: None,
            sync,
            phase: SessionPhase::Offline,
            local_peer: None,
            is_host: false,
            tick_now: Instant::now(),
            now_ms: 0,
            events: Vec::new(),
            lock_session: false,
            kicks: Vec::new(),
        }
    }

    /// Drops all session-scoped state. The world stays: what survives
    /// a disconnect is the game's decision, made from the events.
    pub(crate) fn reset(&mut self) {
        self.roster = Roster::new();
        self.registry.clear();
        self.interpolator.clear();
        self.broadcaster = None;
        self.phase = SessionPhase::Offline;
        self.local_peer = None;
        self.is_host = false;
        self.lock_session = false;
        self.kicks.clear();
    }

    /// The game's world.
    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// The lobby roster as this process currently sees it.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The replicated entity set.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// This process's own peer id, once welcomed.
    pub fn local_peer(&self) -> Option<PeerId> {
        self.local_peer
    }

    /// Whether this process is the session's authority.
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Milliseconds on the session send clock as of this tick.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Queues an event for the game to pick up on its next drain.
    pub fn push_event(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}
