//! The standard handler sets for both dispatch tables.
//!
//! Host handlers answer client traffic: lobby membership, liveness
//! checks, state reports to validate and relay, and requests to
//! arbitrate. Client handlers apply what the host says. The hosting
//! process runs both tables over the same [`DriverState`]: its own
//! authoritative mutations happen in the host handlers, so every
//! client handler that would re-apply relayed state starts by checking
//! `is_host` and stepping aside. That check is also what implements
//! self-feedback suppression for the host's own broadcasts arriving
//! back through its loopback client.
//!
//! Every handler is total over its tag: a payload that does not match
//! the tag's message kind (impossible through the codec, cheap to
//! guard anyway) falls through to an empty output.

use partyline_protocol::{
    Envelope, EntityKind, Message, NetId, PeerId, Pose, Recipient, SpawnDesc,
};
use partyline_session::{Dispatcher, HandlerOutput};
use partyline_sync::{
    Aspect, Authority, Controller, GameWorld, NetEntity, StateBroadcaster,
    SyncAspects,
};
use partyline_protocol::tag;

use crate::event::SessionEvent;
use crate::state::{DriverState, SessionPhase};

/// Wires the host-side table: traffic arriving from clients.
pub(crate) fn register_host_handlers<W: GameWorld>(
    dispatcher: &mut Dispatcher<DriverState<W>>,
) {
    dispatcher.on_from_client(tag::JOIN_LOBBY, host_join_lobby);
    dispatcher.on_from_client(tag::CHARACTER_SELECT, host_character_select);
    dispatcher.on_from_client(tag::READY, host_ready);
    dispatcher.on_from_client(tag::LEAVE_LOBBY, host_leave_lobby);
    dispatcher.on_from_client(tag::PING, host_ping);
    dispatcher.on_from_client(tag::TRANSFORM, host_transform);
    dispatcher.on_from_client(tag::PLAYER_INPUT, host_player_input);
    dispatcher.on_from_client(tag::COLLISION_REPORT, host_collision_report);
    dispatcher.on_from_client(tag::INTERACT_REQUEST, host_interact_request);
}

/// Wires the client-side table: traffic arriving from the host.
pub(crate) fn register_client_handlers<W: GameWorld>(
    dispatcher: &mut Dispatcher<DriverState<W>>,
) {
    dispatcher.on_from_host(tag::PONG, client_pong);
    dispatcher.on_from_host(tag::JOIN_LOBBY, client_join_lobby);
    dispatcher.on_from_host(tag::LOBBY_STATE, client_lobby_state);
    dispatcher.on_from_host(tag::CHARACTER_SELECT, client_character_select);
    dispatcher.on_from_host(tag::READY, client_ready);
    dispatcher.on_from_host(tag::LEAVE_LOBBY, client_leave_lobby);
    dispatcher.on_from_host(tag::GAME_START, client_game_start);
    dispatcher.on_from_host(tag::TRANSFORM, client_transform);
    dispatcher.on_from_host(tag::PLAYER_INPUT, client_player_input);
    dispatcher.on_from_host(tag::AI_STATE, client_ai_state);
    dispatcher.on_from_host(tag::ENTITY_SPAWN, client_entity_spawn);
    dispatcher.on_from_host(tag::ENTITY_DESPAWN, client_entity_despawn);
    dispatcher.on_from_host(tag::COLLISION_RESULT, client_collision_result);
    dispatcher.on_from_host(tag::INTERACT_RESPONSE, client_interact_response);
    dispatcher.on_from_host(tag::INVENTORY_STATE, client_inventory_state);
}

// ---------------------------------------------------------------------------
// Host table
// ---------------------------------------------------------------------------

fn host_join_lobby<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::JoinLobby { name, .. } = &envelope.message else {
        return Vec::new();
    };

    // The roster is only open between hosting and game start; a peer
    // admitted during the lock race gets a leave notice and the door.
    if state.phase == SessionPhase::InGame {
        tracing::info!(%sender, "join after start refused");
        state.kicks.push(sender);
        return vec![(
            Recipient::Peer(sender),
            Message::LeaveLobby {
                peer: sender,
                reason: "session already started".into(),
            },
        )];
    }

    let host = state.local_peer == Some(sender);
    if let Err(e) = state.roster.join(sender, name, host) {
        tracing::debug!(%sender, error = %e, "lobby join refused");
        return Vec::new();
    }
    let name = match state.roster.get(sender) {
        Some(entry) => entry.name.clone(),
        None => name.clone(),
    };
    state.push_event(SessionEvent::PeerJoined {
        peer: sender,
        name: name.clone(),
    });

    vec![
        (
            Recipient::AllExcept(sender),
            Message::JoinLobby { peer: sender, name },
        ),
        // Private full snapshot: a late joiner's view is complete in
        // one message, never an incremental replay.
        (
            Recipient::Peer(sender),
            Message::LobbyState {
                players: state.roster.snapshot(),
            },
        ),
    ]
}

fn host_character_select<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::CharacterSelect { character, .. } = envelope.message else {
        return Vec::new();
    };
    if let Err(e) = state.roster.select_character(sender, character) {
        tracing::debug!(%sender, error = %e, "character select refused");
        return Vec::new();
    }
    state.push_event(SessionEvent::CharacterSelected {
        peer: sender,
        character,
    });
    vec![(
        Recipient::AllExcept(sender),
        Message::CharacterSelect {
            peer: sender,
            character,
        },
    )]
}

fn host_ready<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::Ready { ready, .. } = envelope.message else {
        return Vec::new();
    };
    if let Err(e) = state.roster.set_ready(sender, ready) {
        tracing::debug!(%sender, error = %e, "ready change refused");
        return Vec::new();
    }
    state.push_event(SessionEvent::ReadyChanged {
        peer: sender,
        ready,
    });

    let mut out = vec![(
        Recipient::AllExcept(sender),
        Message::Ready {
            peer: sender,
            ready,
        },
    )];

    // The last ready starts the game for everyone, host included: the
    // transition itself happens in the GameStart handler when the
    // broadcast loops back. Only a lobby can start; a ready toggled
    // mid-game must not reshuffle spawns and rebroadcast the start.
    if state.phase == SessionPhase::Lobby && state.roster.all_ready() {
        match state.roster.start_entries() {
            Ok(entries) => {
                tracing::info!(players = entries.len(), "all ready, starting");
                out.push((Recipient::All, Message::GameStart { entries }));
            }
            Err(e) => tracing::debug!(error = %e, "start withheld"),
        }
    }
    out
}

fn host_leave_lobby<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::LeaveLobby { reason, .. } = &envelope.message else {
        return Vec::new();
    };
    let mut out = Vec::new();
    if state.roster.leave(sender).is_ok() {
        state.push_event(SessionEvent::PeerLeft {
            peer: sender,
            reason: reason.clone(),
        });
        out.push((
            Recipient::AllExcept(sender),
            Message::LeaveLobby {
                peer: sender,
                reason: reason.clone(),
            },
        ));
    }
    out.extend(despawn_owned_by(state, sender));
    out
}

fn host_ping<W: GameWorld>(
    _state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    vec![(
        Recipient::Peer(sender),
        Message::Pong {
            echo_ms: envelope.sent_at_ms,
        },
    )]
}

fn host_transform<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::Transform { net_id, pose } = envelope.message else {
        return Vec::new();
    };
    if !sender_controls(state, sender, net_id, Aspect::Transform) {
        return Vec::new();
    }
    // The host's authoritative view of a remote-owned entity is the
    // latest report; relayed onward minus the owner, who must never
    // see its own state come back.
    state.world.apply_pose(net_id, pose);
    vec![(
        Recipient::AllExcept(sender),
        Message::Transform { net_id, pose },
    )]
}

fn host_player_input<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::PlayerInput { net_id, movement } = envelope.message else {
        return Vec::new();
    };
    if !sender_controls(state, sender, net_id, Aspect::Movement) {
        return Vec::new();
    }
    state.world.apply_movement(net_id, movement);
    vec![(
        Recipient::AllExcept(sender),
        Message::PlayerInput { net_id, movement },
    )]
}

fn host_collision_report<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::CollisionReport { reporter, other } = envelope.message
    else {
        return Vec::new();
    };
    state.authority.handle_collision(
        &state.registry,
        &mut state.world,
        sender,
        reporter,
        other,
    )
}

fn host_interact_request<W: GameWorld>(
    state: &mut DriverState<W>,
    sender: PeerId,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::InteractRequest {
        requester,
        target,
        action,
    } = envelope.message
    else {
        return Vec::new();
    };
    state.authority.handle_interact(
        &state.registry,
        &mut state.world,
        sender,
        requester,
        target,
        action,
    )
}

// ---------------------------------------------------------------------------
// Client table
// ---------------------------------------------------------------------------

fn client_pong<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::Pong { echo_ms } = envelope.message else {
        return Vec::new();
    };
    let rtt_ms = state.now_ms.saturating_sub(echo_ms);
    tracing::debug!(rtt_ms, "pong");
    state.push_event(SessionEvent::RttMeasured { rtt_ms });
    Vec::new()
}

fn client_join_lobby<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::JoinLobby { peer, name } = &envelope.message else {
        return Vec::new();
    };
    if state.roster.join(*peer, name, false).is_ok() {
        let name = state
            .roster
            .get(*peer)
            .map(|entry| entry.name.clone())
            .unwrap_or_default();
        state.push_event(SessionEvent::PeerJoined { peer: *peer, name });
    }
    Vec::new()
}

fn client_lobby_state<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::LobbyState { players } = &envelope.message else {
        return Vec::new();
    };
    state.roster.replace(players.clone());
    state.push_event(SessionEvent::JoinedLobby {
        players: players.clone(),
    });
    Vec::new()
}

fn client_character_select<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::CharacterSelect { peer, character } = envelope.message
    else {
        return Vec::new();
    };
    if let Err(e) = state.roster.select_character(peer, character) {
        tracing::debug!(%peer, error = %e, "relayed select ignored");
        return Vec::new();
    }
    state.push_event(SessionEvent::CharacterSelected { peer, character });
    Vec::new()
}

fn client_ready<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::Ready { peer, ready } = envelope.message else {
        return Vec::new();
    };
    if let Err(e) = state.roster.set_ready(peer, ready) {
        tracing::debug!(%peer, error = %e, "relayed ready ignored");
        return Vec::new();
    }
    state.push_event(SessionEvent::ReadyChanged { peer, ready });
    Vec::new()
}

fn client_leave_lobby<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::LeaveLobby { peer, reason } = &envelope.message else {
        return Vec::new();
    };
    // Entities of the departed arrive as explicit despawns; a notice
    // addressed to a peer the host never admitted to the roster (the
    // join-after-start refusal) carries no entry to remove.
    let _ = state.roster.leave(*peer);
    state.push_event(SessionEvent::PeerLeft {
        peer: *peer,
        reason: reason.clone(),
    });
    Vec::new()
}

fn client_game_start<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::GameStart { entries } = &envelope.message else {
        return Vec::new();
    };
    if state.phase == SessionPhase::InGame {
        tracing::debug!("duplicate game start ignored");
        return Vec::new();
    }

    // Runs on every process, the host included via its loopback: one
    // code path into the session for all roles.
    state.phase = SessionPhase::InGame;
    for entry in entries {
        if let Err(e) = state.registry.register_player(entry.peer) {
            tracing::warn!(peer = %entry.peer, error = %e, "player not registered");
        }
    }
    state.broadcaster = Some(StateBroadcaster::new(&state.sync));
    if state.is_host {
        state.lock_session = true;
    }
    tracing::info!(players = entries.len(), "game started");
    state.push_event(SessionEvent::GameStarted {
        entries: entries.clone(),
    });
    Vec::new()
}

fn client_transform<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        // The host's view is maintained by its own table; what loops
        // back here is its own broadcast.
        return Vec::new();
    }
    let Message::Transform { net_id, pose } = envelope.message else {
        return Vec::new();
    };
    if !remote_controlled(state, net_id, Aspect::Transform) {
        return Vec::new();
    }
    feed_interpolator(state, net_id, pose, envelope.sent_at_ms, false);
    Vec::new()
}

fn client_player_input<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::PlayerInput { net_id, movement } = envelope.message else {
        return Vec::new();
    };
    if !remote_controlled(state, net_id, Aspect::Movement) {
        return Vec::new();
    }
    state.world.apply_movement(net_id, movement);
    Vec::new()
}

fn client_ai_state<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::AiState {
        net_id,
        pos,
        behavior,
    } = envelope.message
    else {
        return Vec::new();
    };
    if !remote_controlled(state, net_id, Aspect::Transform) {
        return Vec::new();
    }
    let pose = Pose {
        pos,
        ..Pose::default()
    };
    feed_interpolator(state, net_id, pose, envelope.sent_at_ms, true);
    state.world.apply_ai_behavior(net_id, behavior);
    Vec::new()
}

fn client_entity_spawn<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::EntitySpawn { desc } = envelope.message else {
        return Vec::new();
    };
    let entity = entity_for_desc(&desc);
    if let Err(e) = state.registry.register(entity) {
        tracing::debug!(net_id = %desc.net_id, error = %e, "spawn ignored");
        return Vec::new();
    }
    state.world.apply_spawn(&desc);
    if entity.aspects.includes(Aspect::Transform)
        && !locally_controlled(state, &entity, Aspect::Transform)
    {
        let interval = match desc.net_id.kind() {
            EntityKind::Ai => state.sync.ai_interval(),
            _ => state.sync.transform_interval(),
        };
        state.interpolator.track(desc.net_id, desc.pose, interval);
    }
    state.push_event(SessionEvent::EntitySpawned { desc });
    Vec::new()
}

fn client_entity_despawn<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::EntityDespawn { net_id } = envelope.message else {
        return Vec::new();
    };
    if state.registry.unregister(net_id).is_err() {
        return Vec::new();
    }
    state.interpolator.untrack(net_id);
    state.world.apply_despawn(net_id);
    state.push_event(SessionEvent::EntityDespawned { net_id });
    Vec::new()
}

fn client_collision_result<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::CollisionResult { net_id, pose } = envelope.message else {
        return Vec::new();
    };
    if !state.is_host {
        // A correction is discrete: snap, never ease toward it.
        state.interpolator.snap(net_id, pose);
        state.world.apply_pose(net_id, pose);
    }
    state.push_event(SessionEvent::CollisionCorrected { net_id, pose });
    Vec::new()
}

fn client_interact_response<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    let Message::InteractResponse {
        requester,
        target,
        outcome,
    } = &envelope.message
    else {
        return Vec::new();
    };
    if !state.is_host {
        // The host already mutated through the authority engine.
        match outcome {
            partyline_protocol::InteractOutcome::PickedUp {
                item,
                new_owner,
            } => state.world.apply_pickup(*item, *new_owner),
            partyline_protocol::InteractOutcome::Transferred { from, to } => {
                state.world.apply_container(from);
                state.world.apply_container(to);
            }
            partyline_protocol::InteractOutcome::Denied { .. } => {}
        }
    }
    state.push_event(SessionEvent::InteractionResolved {
        requester: *requester,
        target: *target,
        outcome: outcome.clone(),
    });
    Vec::new()
}

fn client_inventory_state<W: GameWorld>(
    state: &mut DriverState<W>,
    envelope: &Envelope,
) -> HandlerOutput {
    if state.is_host {
        return Vec::new();
    }
    let Message::InventoryState { snapshot } = &envelope.message else {
        return Vec::new();
    };
    state.world.apply_container(snapshot);
    Vec::new()
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// Host-side ownership gate: the transport-verified sender must be the
/// controller of the aspect it is reporting.
fn sender_controls<W: GameWorld>(
    state: &DriverState<W>,
    sender: PeerId,
    net_id: NetId,
    aspect: Aspect,
) -> bool {
    match state.registry.get(net_id) {
        Some(entity) if entity.controller(aspect) == Controller::Peer(sender) => {
            true
        }
        Some(_) => {
            tracing::debug!(%sender, %net_id, "report from non-controller dropped");
            false
        }
        None => {
            tracing::trace!(%sender, %net_id, "report for unknown entity dropped");
            false
        }
    }
}

/// Client-side gate: known entity, not under local control. The local
/// player renders its simulated state directly and must never have it
/// overwritten by an inbound snapshot.
fn remote_controlled<W: GameWorld>(
    state: &DriverState<W>,
    net_id: NetId,
    aspect: Aspect,
) -> bool {
    match state.registry.get(net_id) {
        Some(entity) => !locally_controlled(state, entity, aspect),
        // Unreliable snapshots can outrun the reliable spawn that
        // introduces the entity; the next one lands.
        None => {
            tracing::trace!(%net_id, "snapshot before spawn dropped");
            false
        }
    }
}

fn locally_controlled<W: GameWorld>(
    state: &DriverState<W>,
    entity: &NetEntity,
    aspect: Aspect,
) -> bool {
    match state.local_peer {
        Some(local) => {
            entity.controlled_locally(aspect, local, state.is_host)
        }
        None => false,
    }
}

/// Every snapshot, the first included, becomes a blend target. A first
/// sighting anchors the track at the pose the world currently renders
/// the entity at, so the entity eases from its spawn pose toward the
/// snapshot instead of the snapshot being swallowed as the anchor.
fn feed_interpolator<W: GameWorld>(
    state: &mut DriverState<W>,
    net_id: NetId,
    pose: Pose,
    sender_stamp: u64,
    ai: bool,
) {
    if !state.interpolator.is_tracked(net_id) {
        let interval = if ai {
            state.sync.ai_interval()
        } else {
            state.sync.transform_interval()
        };
        let anchor = state.world.pose(net_id).unwrap_or(pose);
        state.interpolator.track(net_id, anchor, interval);
    }
    state
        .interpolator
        .push_target(net_id, pose, sender_stamp, state.tick_now);
}

/// Replication record for an entity announced in a spawn message,
/// derived from its id range.
fn entity_for_desc(desc: &SpawnDesc) -> NetEntity {
    match desc.net_id.kind() {
        EntityKind::Player => NetEntity {
            net_id: desc.net_id,
            authority: Authority::Shared,
            owner: desc.owner,
            aspects: SyncAspects::player(),
        },
        EntityKind::Ai => NetEntity {
            net_id: desc.net_id,
            authority: Authority::HostOwned,
            owner: None,
            aspects: SyncAspects::transform_only(),
        },
        EntityKind::Item => NetEntity {
            net_id: desc.net_id,
            authority: Authority::HostOwned,
            owner: None,
            aspects: SyncAspects::inventory_only(),
        },
    }
}

/// Host-side cleanup when a peer is gone mid-session: drop everything
/// it owned, locally and on every remaining peer.
pub(crate) fn despawn_owned_by<W: GameWorld>(
    state: &mut DriverState<W>,
    peer: PeerId,
) -> HandlerOutput {
    let mut out = Vec::new();
    for net_id in state.registry.unregister_owned_by(peer) {
        state.interpolator.untrack(net_id);
        state.world.apply_despawn(net_id);
        state.push_event(SessionEvent::EntityDespawned { net_id });
        out.push((Recipient::All, Message::EntityDespawn { net_id }));
    }
    out
}
