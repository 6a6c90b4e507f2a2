//! Entity replication for Partyline.
//!
//! Everything between "a message arrived" and "the world changed":
//!
//! - **Registry** ([`EntityRegistry`], [`NetEntity`], [`Authority`]):
//!   which entities replicate, under whose authority, with which
//!   aspects.
//! - **World seam** ([`GameWorld`]): the trait the game implements so
//!   the sync layer can read state for broadcast and write
//!   authoritative state back.
//! - **Broadcast** ([`StateBroadcaster`], [`SyncConfig`]): paced
//!   publication of locally controlled state.
//! - **Interpolation** ([`Interpolator`], [`smoothstep`]): eased
//!   rendering of remote motion between snapshots.
//! - **Arbitration** ([`AuthorityEngine`]): the host's validate-once,
//!   mutate-once, broadcast-once handling of client intents.
//!
//! The crate owns no sockets and spawns no tasks; everything is polled
//! from the single simulation thread that owns the world. The session
//! layer wires these pieces to the transport.

mod authority;
mod broadcast;
mod entity;
mod error;
mod interpolate;
mod world;

pub use authority::{AuthorityConfig, AuthorityEngine, DEFAULT_PICKUP_RANGE};
pub use broadcast::{
    StateBroadcaster, SyncConfig, DEFAULT_AI_HZ, DEFAULT_TRANSFORM_HZ,
};
pub use entity::{
    Aspect, Authority, Controller, EntityRegistry, NetEntity, SyncAspects,
};
pub use error::SyncError;
pub use interpolate::{smoothstep, Interpolator};
pub use world::GameWorld;
