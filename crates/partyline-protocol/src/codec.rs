//! Binary wire codec.
//!
//! Frame layout:
//!
//! ```text
//! [ tag: u8 ][ sent_at_ms: u64 ][ body: fixed field order per kind ]
//! ```
//!
//! All integers are big-endian, floats are IEEE-754 single precision in
//! big-endian byte order, strings and lists carry a `u16` length/count
//! prefix. Encoding the same message twice produces identical bytes;
//! there is no padding, no alignment, and no optional-field bitmap.
//!
//! Decoding is total over the tag space: a tag the core does not define
//! yields [`Message::Unknown`] with the raw body preserved, and for a
//! game-range tag re-encoding that value reproduces the original frame
//! byte for byte. Encode refuses a [`Message::Unknown`] whose tag sits
//! below the game range; those bytes belong to the core kinds.
//! Everything else that can go wrong (truncation, bad discriminants,
//! trailing garbage) is a [`ProtocolError`] the receive loop logs and
//! drops.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::message::{tag, Envelope, Message};
use crate::types::{
    AiBehavior, CharacterId, ContainerSnapshot, DenyReason, InteractAction,
    InteractOutcome, ItemSlot, LobbyPlayer, Movement, NetId, PeerId, Pose,
    SpawnDesc, StartEntry, Vec2,
};

/// Hard ceiling on a single frame. Anything larger is refused on both
/// encode and decode; the largest legitimate frame (a full lobby or
/// container snapshot) sits orders of magnitude below this.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Longest string any field accepts, in bytes.
const MAX_STR_BYTES: usize = 1024;

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encodes an envelope into a wire frame.
pub fn encode(envelope: &Envelope) -> Result<Bytes, ProtocolError> {
    let mut w = Writer::new(envelope.message.tag());
    w.buf.put_u64(envelope.sent_at_ms);

    match &envelope.message {
        Message::Hello {
            protocol_version,
            session_key,
        } => {
            w.buf.put_u16(*protocol_version);
            w.str(session_key, "session key")?;
        }
        Message::Welcome { peer_id } => w.peer(*peer_id),
        Message::Reject { reason } => w.str(reason, "reject reason")?,
        Message::Ping => {}
        Message::Pong { echo_ms } => w.buf.put_u64(*echo_ms),

        Message::JoinLobby { peer, name } => {
            w.peer(*peer);
            w.str(name, "player name")?;
        }
        Message::LobbyState { players } => {
            w.count(players.len(), "lobby roster")?;
            for p in players {
                w.lobby_player(p)?;
            }
        }
        Message::CharacterSelect { peer, character } => {
            w.peer(*peer);
            w.buf.put_u8(character.0);
        }
        Message::Ready { peer, ready } => {
            w.peer(*peer);
            w.bool(*ready);
        }
        Message::LeaveLobby { peer, reason } => {
            w.peer(*peer);
            w.str(reason, "leave reason")?;
        }
        Message::GameStart { entries } => {
            w.count(entries.len(), "start entries")?;
            for e in entries {
                w.peer(e.peer);
                w.buf.put_u8(e.character.0);
                w.buf.put_u8(e.spawn_index);
            }
        }

        Message::Transform { net_id, pose } => {
            w.net(*net_id);
            w.pose(*pose);
        }
        Message::PlayerInput { net_id, movement } => {
            w.net(*net_id);
            w.vec2(movement.dir);
            w.bool(movement.sprinting);
        }
        Message::AiState {
            net_id,
            pos,
            behavior,
        } => {
            w.net(*net_id);
            w.vec2(*pos);
            w.buf.put_u8(behavior.mode);
            w.buf.put_u16(behavior.patrol_index);
        }
        Message::EntitySpawn { desc } => {
            w.net(desc.net_id);
            w.buf.put_u16(desc.archetype);
            w.pose(desc.pose);
            // Peer ids are 1-based, so 0 is free to mean "host owned".
            w.buf.put_u32(desc.owner.map_or(0, |p| p.0));
        }
        Message::EntityDespawn { net_id } => w.net(*net_id),
        Message::CollisionReport { reporter, other } => {
            w.net(*reporter);
            w.net(*other);
        }
        Message::CollisionResult { net_id, pose } => {
            w.net(*net_id);
            w.pose(*pose);
        }
        Message::InteractRequest {
            requester,
            target,
            action,
        } => {
            w.net(*requester);
            w.net(*target);
            match action {
                InteractAction::PickUp => w.buf.put_u8(1),
                InteractAction::Deposit { item } => {
                    w.buf.put_u8(2);
                    w.net(*item);
                }
                InteractAction::Withdraw { item } => {
                    w.buf.put_u8(3);
                    w.net(*item);
                }
            }
        }
        Message::InteractResponse {
            requester,
            target,
            outcome,
        } => {
            w.net(*requester);
            w.net(*target);
            match outcome {
                InteractOutcome::Denied { reason } => {
                    w.buf.put_u8(0);
                    w.buf.put_u8(deny_reason_code(*reason));
                }
                InteractOutcome::PickedUp { item, new_owner } => {
                    w.buf.put_u8(1);
                    w.net(*item);
                    w.net(*new_owner);
                }
                InteractOutcome::Transferred { from, to } => {
                    w.buf.put_u8(2);
                    w.container(from)?;
                    w.container(to)?;
                }
            }
        }
        Message::InventoryState { snapshot } => w.container(snapshot)?,

        Message::Unknown { tag, payload } => {
            // An opaque body under a core tag would decode as whatever
            // kind owns that byte. Only the game range round-trips.
            if *tag < tag::GAME_BASE {
                return Err(ProtocolError::InvalidValue {
                    what: "unknown tag",
                    value: *tag as u32,
                });
            }
            w.buf.put_slice(payload);
        }
    }

    w.finish()
}

/// Growing frame buffer plus the guarded helpers for variable-width
/// fields. Fixed-width fields go straight through [`BufMut`].
struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new(tag: u8) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(tag);
        Writer { buf }
    }

    fn peer(&mut self, p: PeerId) {
        self.buf.put_u32(p.0);
    }

    fn net(&mut self, n: NetId) {
        self.buf.put_u32(n.0);
    }

    fn bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    fn vec2(&mut self, v: Vec2) {
        self.buf.put_f32(v.x);
        self.buf.put_f32(v.y);
    }

    fn pose(&mut self, p: Pose) {
        self.vec2(p.pos);
        self.buf.put_f32(p.rot);
    }

    fn str(&mut self, s: &str, what: &'static str) -> Result<(), ProtocolError> {
        if s.len() > MAX_STR_BYTES {
            return Err(ProtocolError::FieldTooLong {
                what,
                len: s.len(),
                max: MAX_STR_BYTES,
            });
        }
        self.buf.put_u16(s.len() as u16);
        self.buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn count(&mut self, len: usize, what: &'static str) -> Result<(), ProtocolError> {
        if len > u16::MAX as usize {
            return Err(ProtocolError::FieldTooLong {
                what,
                len,
                max: u16::MAX as usize,
            });
        }
        self.buf.put_u16(len as u16);
        Ok(())
    }

    fn lobby_player(&mut self, p: &LobbyPlayer) -> Result<(), ProtocolError> {
        self.peer(p.peer);
        self.str(&p.name, "player name")?;
        self.buf.put_u8(p.character.0);
        self.bool(p.ready);
        self.bool(p.host);
        Ok(())
    }

    fn container(&mut self, c: &ContainerSnapshot) -> Result<(), ProtocolError> {
        self.net(c.container);
        self.count(c.slots.len(), "container slots")?;
        for slot in &c.slots {
            self.net(slot.item);
            self.buf.put_u16(slot.kind);
            self.buf.put_u16(slot.count);
        }
        Ok(())
    }

    fn finish(self) -> Result<Bytes, ProtocolError> {
        if self.buf.len() > MAX_FRAME_BYTES {
            return Err(ProtocolError::FrameTooLarge {
                len: self.buf.len(),
                max: MAX_FRAME_BYTES,
            });
        }
        Ok(self.buf.freeze())
    }
}

fn deny_reason_code(r: DenyReason) -> u8 {
    match r {
        DenyReason::NoSuchEntity => 1,
        DenyReason::OutOfRange => 2,
        DenyReason::ContainerFull => 3,
        DenyReason::AlreadyClaimed => 4,
        DenyReason::NotPermitted => 5,
    }
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes one wire frame into an envelope.
///
/// Pure transform: no side effects, no partial application. Either the
/// whole frame parses or an error describes why it cannot.
pub fn decode(frame: &[u8]) -> Result<Envelope, ProtocolError> {
    if frame.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if frame.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            len: frame.len(),
            max: MAX_FRAME_BYTES,
        });
    }

    let mut r = Reader {
        tag: frame[0],
        buf: &frame[1..],
    };
    let sent_at_ms = r.u64()?;

    let message = match r.tag {
        tag::HELLO => Message::Hello {
            protocol_version: r.u16()?,
            session_key: r.str()?,
        },
        tag::WELCOME => Message::Welcome { peer_id: r.peer()? },
        tag::REJECT => Message::Reject { reason: r.str()? },
        tag::PING => Message::Ping,
        tag::PONG => Message::Pong { echo_ms: r.u64()? },

        tag::JOIN_LOBBY => Message::JoinLobby {
            peer: r.peer()?,
            name: r.str()?,
        },
        tag::LOBBY_STATE => {
            let count = r.u16()?;
            let mut players = Vec::with_capacity(count as usize);
            for _ in 0..count {
                players.push(r.lobby_player()?);
            }
            Message::LobbyState { players }
        }
        tag::CHARACTER_SELECT => Message::CharacterSelect {
            peer: r.peer()?,
            character: CharacterId(r.u8()?),
        },
        tag::READY => Message::Ready {
            peer: r.peer()?,
            ready: r.bool()?,
        },
        tag::LEAVE_LOBBY => Message::LeaveLobby {
            peer: r.peer()?,
            reason: r.str()?,
        },
        tag::GAME_START => {
            let count = r.u16()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(StartEntry {
                    peer: r.peer()?,
                    character: CharacterId(r.u8()?),
                    spawn_index: r.u8()?,
                });
            }
            Message::GameStart { entries }
        }

        tag::TRANSFORM => Message::Transform {
            net_id: r.net()?,
            pose: r.pose()?,
        },
        tag::PLAYER_INPUT => Message::PlayerInput {
            net_id: r.net()?,
            movement: Movement {
                dir: r.vec2()?,
                sprinting: r.bool()?,
            },
        },
        tag::AI_STATE => Message::AiState {
            net_id: r.net()?,
            pos: r.vec2()?,
            behavior: AiBehavior {
                mode: r.u8()?,
                patrol_index: r.u16()?,
            },
        },
        tag::ENTITY_SPAWN => {
            let net_id = r.net()?;
            let archetype = r.u16()?;
            let pose = r.pose()?;
            let owner_raw = r.u32()?;
            Message::EntitySpawn {
                desc: SpawnDesc {
                    net_id,
                    archetype,
                    pose,
                    owner: (owner_raw != 0).then_some(PeerId(owner_raw)),
                },
            }
        }
        tag::ENTITY_DESPAWN => Message::EntityDespawn { net_id: r.net()? },
        tag::COLLISION_REPORT => Message::CollisionReport {
            reporter: r.net()?,
            other: r.net()?,
        },
        tag::COLLISION_RESULT => Message::CollisionResult {
            net_id: r.net()?,
            pose: r.pose()?,
        },
        tag::INTERACT_REQUEST => {
            let requester = r.net()?;
            let target = r.net()?;
            let action = match r.u8()? {
                1 => InteractAction::PickUp,
                2 => InteractAction::Deposit { item: r.net()? },
                3 => InteractAction::Withdraw { item: r.net()? },
                other => {
                    return Err(ProtocolError::InvalidValue {
                        what: "interact action",
                        value: other as u32,
                    });
                }
            };
            Message::InteractRequest {
                requester,
                target,
                action,
            }
        }
        tag::INTERACT_RESPONSE => {
            let requester = r.net()?;
            let target = r.net()?;
            let outcome = match r.u8()? {
                0 => InteractOutcome::Denied {
                    reason: r.deny_reason()?,
                },
                1 => InteractOutcome::PickedUp {
                    item: r.net()?,
                    new_owner: r.net()?,
                },
                2 => InteractOutcome::Transferred {
                    from: r.container()?,
                    to: r.container()?,
                },
                other => {
                    return Err(ProtocolError::InvalidValue {
                        what: "interact outcome",
                        value: other as u32,
                    });
                }
            };
            Message::InteractResponse {
                requester,
                target,
                outcome,
            }
        }
        tag::INVENTORY_STATE => Message::InventoryState {
            snapshot: r.container()?,
        },

        // Not a core tag: hold the body opaque for game-side handlers.
        unknown => Message::Unknown {
            tag: unknown,
            payload: r.rest(),
        },
    };

    if !r.buf.is_empty() {
        return Err(ProtocolError::TrailingBytes {
            tag: r.tag,
            extra: r.buf.len(),
        });
    }

    Ok(Envelope {
        sent_at_ms,
        message,
    })
}

/// Cursor over a frame body with remaining-length checks on every read.
/// `bytes::Buf` on the underlying slice does the actual byte handling.
struct Reader<'a> {
    tag: u8,
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn need(&self, n: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < n {
            return Err(ProtocolError::Truncated {
                tag: self.tag,
                needed: n - self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self) -> Result<u64, ProtocolError> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    fn f32(&mut self) -> Result<f32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_f32())
    }

    fn bool(&mut self) -> Result<bool, ProtocolError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidValue {
                what: "bool",
                value: other as u32,
            }),
        }
    }

    fn peer(&mut self) -> Result<PeerId, ProtocolError> {
        Ok(PeerId(self.u32()?))
    }

    fn net(&mut self) -> Result<NetId, ProtocolError> {
        Ok(NetId(self.u32()?))
    }

    fn vec2(&mut self) -> Result<Vec2, ProtocolError> {
        Ok(Vec2 {
            x: self.f32()?,
            y: self.f32()?,
        })
    }

    fn pose(&mut self) -> Result<Pose, ProtocolError> {
        Ok(Pose {
            pos: self.vec2()?,
            rot: self.f32()?,
        })
    }

    fn str(&mut self) -> Result<String, ProtocolError> {
        let len = self.u16()? as usize;
        self.need(len)?;
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(String::from_utf8(head.to_vec())?)
    }

    fn deny_reason(&mut self) -> Result<DenyReason, ProtocolError> {
        match self.u8()? {
            1 => Ok(DenyReason::NoSuchEntity),
            2 => Ok(DenyReason::OutOfRange),
            3 => Ok(DenyReason::ContainerFull),
            4 => Ok(DenyReason::AlreadyClaimed),
            5 => Ok(DenyReason::NotPermitted),
            other => Err(ProtocolError::InvalidValue {
                what: "deny reason",
                value: other as u32,
            }),
        }
    }

    fn lobby_player(&mut self) -> Result<LobbyPlayer, ProtocolError> {
        Ok(LobbyPlayer {
            peer: self.peer()?,
            name: self.str()?,
            character: CharacterId(self.u8()?),
            ready: self.bool()?,
            host: self.bool()?,
        })
    }

    fn container(&mut self) -> Result<ContainerSnapshot, ProtocolError> {
        let container = self.net()?;
        let count = self.u16()?;
        let mut slots = Vec::with_capacity(count as usize);
        for _ in 0..count {
            slots.push(ItemSlot {
                item: self.net()?,
                kind: self.u16()?,
                count: self.u16()?,
            });
        }
        Ok(ContainerSnapshot { container, slots })
    }

    /// Consumes and returns everything left in the frame.
    fn rest(&mut self) -> Vec<u8> {
        let out = self.buf.to_vec();
        self.buf = &[];
        out
    }
}

// ===========================================================================
// Tests
// ===========================================================================
