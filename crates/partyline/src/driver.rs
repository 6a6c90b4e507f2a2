//! The session driver: one object between the game loop and the
//! network.
//!
//! The contract is a single [`tick`](SessionDriver::tick) call per
//! simulation frame. Inside it the driver drains the link, dispatches
//! every envelope through the handler tables, sends whatever the
//! handlers produced, runs the due state broadcasts, and steps remote
//! entities along their interpolation curves. Everything else
//! (hosting, joining, readying up, spawning) is a plain method call
//! that queues a message and returns.

use std::mem;
use std::net::SocketAddr;
use std::time::Instant;

use partyline_lobby::Roster;
use partyline_protocol::{
    tag, CharacterId, Envelope, InteractAction, Message, NetId, PeerId, Pose,
    Recipient, SpawnDesc,
};
use partyline_session::{
    Dispatcher, HandlerOutput, LinkEvent, SessionContext, SessionMode,
};
use partyline_sync::{
    AuthorityConfig, AuthorityEngine, EntityRegistry, GameWorld, SyncAspects,
    SyncConfig,
};
use partyline_tick::Pacer;
use partyline_transport::{ClientConfig, HostConfig};

use crate::error::PartylineError;
use crate::event::SessionEvent;
use crate::handlers;
use crate::state::{DriverState, SessionPhase};

/// Ping cadence while connected to a remote host.
pub const DEFAULT_PING_HZ: u32 = 1;

/// Tuning knobs for a [`SessionDriver`]. The defaults are the rates
/// the whole stack is designed around; change them only with matched
/// peers, since every process in a session should pace alike.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Broadcast cadence for transforms and AI state.
    pub sync: SyncConfig,
    /// Host-side arbitration settings (interaction range and so on).
    pub authority: AuthorityConfig,
    /// How often a client pings the host for an RTT reading.
    pub ping_hz: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            sync: SyncConfig::default(),
            authority: AuthorityConfig::default(),
            ping_hz: DEFAULT_PING_HZ,
        }
    }
}

/// Owns a whole multiplayer session on behalf of one process: the
/// link, the handler tables, the lobby roster, the entity registry,
/// and the replication machinery, wrapped around the game's `W`.
///
/// A driver starts in single-player and moves between modes through
/// [`host`](SessionDriver::host), [`join`](SessionDriver::join) and
/// [`leave`](SessionDriver::leave). The game reads results back in two
/// ways with different cadences: continuous state lands directly in
/// the world via [`GameWorld`] writes during `tick`, discrete
/// happenings queue as [`SessionEvent`]s for
/// [`drain_events`](SessionDriver::drain_events).
pub struct SessionDriver<W: GameWorld> {
    context: SessionContext,
    dispatcher: Dispatcher<DriverState<W>>,
    state: DriverState<W>,
    ping: Pacer,
    config: DriverConfig,
}

impl<W: GameWorld> SessionDriver<W> {
    /// Builds a driver over the game's world. Spins up the network
    /// runtime immediately; no sockets open until a mode change.
    pub fn new(world: W, config: DriverConfig) -> Result<Self, PartylineError> {
        let context = SessionContext::new()?;
        let mut dispatcher = Dispatcher::new();
        handlers::register_host_handlers(&mut dispatcher);
        handlers::register_client_handlers(&mut dispatcher);
        let state = DriverState::new(
            world,
            config.sync,
            AuthorityEngine::new(config.authority),
        );
        Ok(SessionDriver {
            context,
            dispatcher,
            state,
            ping: Pacer::with_rate(config.ping_hz),
            config,
        })
    }

    // --- Mode changes ----------------------------------------------------

    /// Opens a session: binds the listener, connects the local player
    /// over loopback, and enters the lobby under `name`.
    ///
    /// Returns the local peer id (the host's player is always the
    /// first admitted). Any previous session is torn down first.
    pub fn host(
        &mut self,
        config: HostConfig,
        name: &str,
    ) -> Result<PeerId, PartylineError> {
        self.reset_session();
        let peer = self.context.start_host(config)?;
        self.begin(peer, true, name)?;
        Ok(peer)
    }

    /// Joins a remote session and enters its lobby under `name`.
    ///
    /// Blocks until admission completes or fails within the config's
    /// timeout. On failure the driver is back in single-player.
    pub fn join(
        &mut self,
        config: ClientConfig,
        name: &str,
    ) -> Result<PeerId, PartylineError> {
        self.reset_session();
        let peer = self.context.join(config)?;
        self.begin(peer, false, name)?;
        Ok(peer)
    }

    fn begin(
        &mut self,
        peer: PeerId,
        is_host: bool,
        name: &str,
    ) -> Result<(), PartylineError> {
        self.state.local_peer = Some(peer);
        self.state.is_host = is_host;
        self.state.phase = SessionPhase::Lobby;
        self.ping = Pacer::with_rate(self.config.ping_hz);
        self.context.send_to_host(Message::JoinLobby {
            peer,
            name: name.to_string(),
        })?;
        Ok(())
    }

    /// Leaves the current session and returns to single-player.
    ///
    /// A host tells every connected peer the session is over before
    /// the sockets close; a client tells the host it is going. Safe to
    /// call in any mode.
    pub fn leave(&mut self) {
        if let Some(local) = self.state.local_peer {
            let notice = if self.state.is_host {
                self.context.broadcast_except(
                    local,
                    Message::LeaveLobby {
                        peer: local,
                        reason: "host closed the session".into(),
                    },
                )
            } else {
                self.context.send_to_host(Message::LeaveLobby {
                    peer: local,
                    reason: "left".into(),
                })
            };
            if let Err(e) = notice {
                tracing::debug!(error = %e, "leave notice not sent");
            }
        }
        self.reset_session();
    }

    fn reset_session(&mut self) {
        self.context.leave();
        self.state.reset();
    }

    // --- The frame step --------------------------------------------------

    /// Runs one frame of session work. Call once per simulation tick,
    /// from the game loop; never blocks.
    ///
    /// Order within the frame: inbound envelopes first (so broadcasts
    /// reflect what just arrived), then due outbound state, then the
    /// interpolation step that writes remote poses into the world.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.state.tick_now = now;
        self.state.now_ms = self.context.now_ms();

        for event in self.context.poll() {
            match event {
                LinkEvent::PeerJoined { peer } => {
                    tracing::debug!(%peer, "peer connected");
                }
                LinkEvent::PeerLeft { peer } => self.handle_peer_loss(peer),
                LinkEvent::FromClient { peer, envelope } => {
                    let out = self.dispatcher.dispatch_from_client(
                        &mut self.state,
                        peer,
                        &envelope,
                    );
                    self.deliver(out);
                }
                LinkEvent::FromHost { envelope } => {
                    let out = self
                        .dispatcher
                        .dispatch_from_host(&mut self.state, &envelope);
                    self.deliver(out);
                }
                LinkEvent::LostHost => {
                    tracing::warn!("connection to host lost");
                    self.state.push_event(SessionEvent::HostLost);
                    self.reset_session();
                    return;
                }
            }
            self.apply_side_effects();
        }

        if self.state.phase == SessionPhase::InGame {
            self.broadcast_due(now);
        }
        for (net_id, pose) in self.state.interpolator.advance(now) {
            self.state.world.apply_pose(net_id, pose);
        }

        if self.context.mode() == SessionMode::Client && self.ping.poll(now) > 0
        {
            if let Err(e) = self.context.send_to_host(Message::Ping) {
                tracing::debug!(error = %e, "ping not sent");
            }
        }
    }

    /// Handlers cannot reach the link, so requests that need it are
    /// left as flags on the state and honored here, after their
    /// replies have been queued.
    fn apply_side_effects(&mut self) {
        if mem::take(&mut self.state.lock_session) {
            self.context.set_locked(true);
            tracing::info!("session locked to new connections");
        }
        for peer in mem::take(&mut self.state.kicks) {
            if let Err(e) = self.context.disconnect_peer(peer) {
                tracing::debug!(%peer, error = %e, "kick failed");
            }
        }
    }

    /// A peer's link dropped without a leave message. The host
    /// synthesizes what the peer would have sent: a leave notice for
    /// the roster and despawns for everything it owned.
    fn handle_peer_loss(&mut self, peer: PeerId) {
        tracing::info!(%peer, "peer connection lost");
        let mut out = Vec::new();
        if self.state.roster.leave(peer).is_ok() {
            self.state.push_event(SessionEvent::PeerLeft {
                peer,
                reason: "disconnected".into(),
            });
            out.push((
                Recipient::AllExcept(peer),
                Message::LeaveLobby {
                    peer,
                    reason: "disconnected".into(),
                },
            ));
        }
        out.extend(handlers::despawn_owned_by(&mut self.state, peer));
        self.deliver(out);
    }

    fn broadcast_due(&mut self, now: Instant) {
        let Some(local) = self.state.local_peer else {
            return;
        };
        let is_host = self.state.is_host;
        let state = &mut self.state;
        let Some(broadcaster) = state.broadcaster.as_mut() else {
            return;
        };
        let out =
            broadcaster.poll(now, &state.registry, &state.world, local, is_host);
        self.deliver(out);
    }

    fn deliver(&self, out: HandlerOutput) {
        for (recipient, message) in out {
            if let Err(e) = self.context.deliver(recipient, message) {
                tracing::debug!(error = %e, "delivery failed");
            }
        }
    }

    // --- Lobby actions ---------------------------------------------------

    /// Picks a character class, updating the local roster right away
    /// and emitting [`SessionEvent::CharacterSelected`]. The host
    /// relays the change to every other peer; it never echoes it back,
    /// so the local application here is the only one the caller gets.
    pub fn select_character(
        &mut self,
        character: CharacterId,
    ) -> Result<(), PartylineError> {
        let Some(peer) = self.state.local_peer else {
            return Ok(());
        };
        self.context
            .send_to_host(Message::CharacterSelect { peer, character })?;
        // On the host the loopback dispatch applies and announces the
        // change; applying here too would double the event.
        if !self.state.is_host {
            if let Err(e) = self.state.roster.select_character(peer, character)
            {
                tracing::debug!(%peer, error = %e, "local select refused");
                return Ok(());
            }
            self.state
                .push_event(SessionEvent::CharacterSelected { peer, character });
        }
        Ok(())
    }

    /// Sets or clears the ready flag, updating the local roster and
    /// emitting [`SessionEvent::ReadyChanged`] immediately. When the
    /// last player readies up the host starts the game for everyone.
    pub fn set_ready(&mut self, ready: bool) -> Result<(), PartylineError> {
        let Some(peer) = self.state.local_peer else {
            return Ok(());
        };
        self.context.send_to_host(Message::Ready { peer, ready })?;
        if !self.state.is_host {
            if let Err(e) = self.state.roster.set_ready(peer, ready) {
                tracing::debug!(%peer, error = %e, "local ready refused");
                return Ok(());
            }
            self.state
                .push_event(SessionEvent::ReadyChanged { peer, ready });
        }
        Ok(())
    }

    // --- In-game actions -------------------------------------------------

    /// Asks the host to arbitrate an interaction (pickup, deposit,
    /// withdraw). The verdict arrives as a
    /// [`SessionEvent::InteractionResolved`]; nothing changes locally
    /// until it does.
    pub fn request_interact(
        &self,
        requester: NetId,
        target: NetId,
        action: InteractAction,
    ) -> Result<(), PartylineError> {
        if self.state.local_peer.is_none() {
            return Ok(());
        }
        self.context.send_to_host(Message::InteractRequest {
            requester,
            target,
            action,
        })?;
        Ok(())
    }

    /// Reports a collision between a locally controlled entity and
    /// another for the host to resolve. The authoritative outcome
    /// arrives as a [`SessionEvent::CollisionCorrected`].
    pub fn report_collision(
        &self,
        reporter: NetId,
        other: NetId,
    ) -> Result<(), PartylineError> {
        if self.state.local_peer.is_none() {
            return Ok(());
        }
        self.context
            .send_to_host(Message::CollisionReport { reporter, other })?;
        Ok(())
    }

    // --- Host-only entity management -------------------------------------

    /// Spawns a host-simulated AI entity and announces it. Returns the
    /// assigned id, or `None` when not hosting (spawning is the host's
    /// call alone).
    pub fn spawn_ai(
        &mut self,
        archetype: u16,
        pose: Pose,
    ) -> Result<Option<NetId>, PartylineError> {
        if !self.state.is_host {
            tracing::warn!("spawn requested while not hosting");
            return Ok(None);
        }
        let net_id = self
            .state
            .registry
            .allocate_ai(SyncAspects::transform_only())?;
        let desc = SpawnDesc {
            net_id,
            archetype,
            pose,
            owner: None,
        };
        self.state.world.apply_spawn(&desc);
        self.state.push_event(SessionEvent::EntitySpawned { desc });
        self.context.broadcast_as_host(Message::EntitySpawn { desc })?;
        Ok(Some(net_id))
    }

    /// Spawns a world item or container and announces it. Host only,
    /// like [`spawn_ai`](SessionDriver::spawn_ai).
    pub fn spawn_item(
        &mut self,
        archetype: u16,
        pose: Pose,
    ) -> Result<Option<NetId>, PartylineError> {
        if !self.state.is_host {
            tracing::warn!("spawn requested while not hosting");
            return Ok(None);
        }
        let net_id = self
            .state
            .registry
            .allocate_item(SyncAspects::inventory_only())?;
        let desc = SpawnDesc {
            net_id,
            archetype,
            pose,
            owner: None,
        };
        self.state.world.apply_spawn(&desc);
        self.state.push_event(SessionEvent::EntitySpawned { desc });
        self.context.broadcast_as_host(Message::EntitySpawn { desc })?;
        Ok(Some(net_id))
    }

    /// Removes a replicated entity everywhere. Host only; returns
    /// whether anything was removed.
    pub fn despawn(&mut self, net_id: NetId) -> Result<bool, PartylineError> {
        if !self.state.is_host {
            return Ok(false);
        }
        self.state.registry.unregister(net_id)?;
        self.state.interpolator.untrack(net_id);
        self.state.world.apply_despawn(net_id);
        self.state.push_event(SessionEvent::EntityDespawned { net_id });
        self.context
            .broadcast_as_host(Message::EntityDespawn { net_id })?;
        Ok(true)
    }

    /// Pushes a full inventory snapshot for `holder` to every peer.
    /// The host calls this after local mutations the normal
    /// interaction flow did not cover. No-op without a snapshot or off
    /// the host.
    pub fn resync_container(&self, holder: NetId) -> Result<(), PartylineError> {
        if !self.state.is_host {
            return Ok(());
        }
        let Some(snapshot) = self.state.world.container_snapshot(holder) else {
            return Ok(());
        };
        self.context
            .broadcast_as_host(Message::InventoryState { snapshot })?;
        Ok(())
    }

    // --- Game-defined messages -------------------------------------------

    /// Sends a game-defined message. Tags below
    /// [`tag::GAME_BASE`] belong to the session layer and are refused.
    pub fn send_custom(
        &self,
        recipient: Recipient,
        tag: u8,
        payload: Vec<u8>,
    ) -> Result<(), PartylineError> {
        if tag < tag::GAME_BASE {
            tracing::warn!(tag, "custom tags start at {:#04x}", tag::GAME_BASE);
            return Ok(());
        }
        self.context
            .deliver(recipient, Message::Unknown { tag, payload })?;
        Ok(())
    }

    /// Registers a handler for a game-defined tag arriving from a
    /// client (runs on the host). Tags below [`tag::GAME_BASE`] are
    /// refused; the standard tables own them.
    pub fn on_custom_from_client<F>(&mut self, tag: u8, handler: F)
    where
        F: FnMut(&mut DriverState<W>, PeerId, &Envelope) -> HandlerOutput
            + Send
            + 'static,
    {
        if tag < tag::GAME_BASE {
            tracing::warn!(tag, "custom tags start at {:#04x}", tag::GAME_BASE);
            return;
        }
        self.dispatcher.on_from_client(tag, handler);
    }

    /// Registers a handler for a game-defined tag arriving from the
    /// host (runs on every client, the host's loopback included).
    pub fn on_custom_from_host<F>(&mut self, tag: u8, handler: F)
    where
        F: FnMut(&mut DriverState<W>, &Envelope) -> HandlerOutput
            + Send
            + 'static,
    {
        if tag < tag::GAME_BASE {
            tracing::warn!(tag, "custom tags start at {:#04x}", tag::GAME_BASE);
            return;
        }
        self.dispatcher.on_from_host(tag, handler);
    }

    // --- Reads -----------------------------------------------------------

    /// Discrete session happenings since the last drain, in arrival
    /// order. Call once per frame after [`tick`](SessionDriver::tick).
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        mem::take(&mut self.state.events)
    }

    pub fn world(&self) -> &W {
        self.state.world()
    }

    pub fn world_mut(&mut self) -> &mut W {
        self.state.world_mut()
    }

    /// The lobby roster as this process currently sees it.
    pub fn roster(&self) -> &Roster {
        self.state.roster()
    }

    /// The replicated-entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        self.state.registry()
    }

    pub fn mode(&self) -> SessionMode {
        self.context.mode()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn local_peer(&self) -> Option<PeerId> {
        self.state.local_peer()
    }

    /// The net id of the local player's entity, once in a session.
    pub fn local_entity(&self) -> Option<NetId> {
        self.state.local_peer().map(NetId::for_player)
    }

    pub fn is_host(&self) -> bool {
        self.state.is_host()
    }

    /// Host role: the bound listen address. Binding port 0 picks a
    /// free port; this is how callers learn which.
    pub fn host_addr(&self) -> Option<SocketAddr> {
        self.context.host_addr()
    }

    /// Peers currently connected (host role; empty otherwise).
    pub fn peers(&self) -> Vec<PeerId> {
        self.context.peers()
    }
}
