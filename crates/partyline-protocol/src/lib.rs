//! Wire protocol for Partyline.
//!
//! This crate defines the "language" the host and its peers speak:
//!
//! - **Types** ([`PeerId`], [`NetId`], [`Pose`], [`DeliveryMode`], ...):
//!   the plain values that travel on the wire.
//! - **Messages** ([`Message`], [`Envelope`], the [`tag`] bytes): the
//!   closed set of message kinds, plus the opaque
//!   [`Message::Unknown`] escape hatch for game-defined tags.
//! - **Codec** ([`codec::encode`], [`codec::decode`]): the
//!   deterministic binary layout of one tag byte, the sender timestamp,
//!   then fixed-order fields.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding
//!   or decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (opaque frames) and
//! the session (peer identity, routing). It knows nothing about
//! sockets, entities, or who is host:
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session (dispatch)
//! ```
//!
//! Everything here is a pure transform: encoding and decoding have no
//! side effects and no shared state.

mod codec;
mod error;
mod message;
mod types;

pub use codec::{decode, encode, MAX_FRAME_BYTES};
pub use error::ProtocolError;
pub use message::{tag, Envelope, Message, PROTOCOL_VERSION};
pub use types::{
    AiBehavior, CharacterId, ContainerSnapshot, DeliveryMode, DenyReason,
    EntityKind, InteractAction, InteractOutcome, ItemSlot, LobbyPlayer,
    Movement, NetId, PeerId, Pose, Recipient, SpawnDesc, StartEntry, Vec2,
    NET_ID_AI_START, NET_ID_ITEM_START,
};
