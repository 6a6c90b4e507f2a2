//! # Partyline
//!
//! Host-authoritative state sync for small co-op game sessions.
//!
//! One player hosts; up to seven peers connect in a star. The host's
//! process referees everything contested, from admission to item
//! pickups, while continuous state (poses, inputs, AI) streams
//! peer-to-host-to-peers at a fixed cadence and is eased on arrival so
//! remote entities glide instead of teleport.
//!
//! The game integrates at two seams:
//!
//! - **[`GameWorld`]**: a trait over the game's own state. The sync
//!   layer reads local state out through it when broadcasting and
//!   writes authoritative remote state back in. No framework world,
//!   no double bookkeeping.
//! - **[`SessionDriver`]**: the one object the game owns. Call
//!   [`tick`](SessionDriver::tick) once per simulation frame and
//!   [`drain_events`](SessionDriver::drain_events) after it; everything
//!   else is a method call that queues a message.
//!
//! Networking runs on a background runtime; the game's thread never
//! blocks on the socket and never sees a lock.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use partyline::prelude::*;
//!
//! struct World; // your game state
//!
//! impl GameWorld for World {
//!     fn pose(&self, _: NetId) -> Option<Pose> { None }
//!     fn apply_pose(&mut self, _: NetId, _: Pose) {}
//!     fn apply_spawn(&mut self, _: &SpawnDesc) {}
//!     fn apply_despawn(&mut self, _: NetId) {}
//! }
//!
//! fn main() -> Result<(), PartylineError> {
//!     let mut driver = SessionDriver::new(World, DriverConfig::default())?;
//!     driver.host(HostConfig::with_key("fixed-shindig"), "ada")?;
//!     loop {
//!         driver.tick();
//!         for _event in driver.drain_events() {
//!             // lobby changes, game start, interaction verdicts…
//!         }
//!         // simulate, render, sleep to your frame cadence
//!     }
//! }
//! ```
//!
//! The sub-crates are re-exported through here; a game depends on
//! `partyline` alone.

mod driver;
mod error;
mod event;
mod handlers;
mod state;

pub use driver::{DriverConfig, SessionDriver, DEFAULT_PING_HZ};
pub use error::PartylineError;
pub use event::SessionEvent;
pub use state::{DriverState, SessionPhase};

pub use partyline_lobby::{LobbyError, Roster};
pub use partyline_protocol::{
    tag, AiBehavior, CharacterId, ContainerSnapshot, DenyReason, EntityKind,
    Envelope, InteractAction, InteractOutcome, ItemSlot, LobbyPlayer, Message,
    Movement, NetId, PeerId, Pose, ProtocolError, Recipient, SpawnDesc,
    StartEntry, Vec2,
};
pub use partyline_session::{HandlerOutput, SessionError, SessionMode};
pub use partyline_sync::{
    Aspect, Authority, AuthorityConfig, Controller, EntityRegistry, GameWorld,
    NetEntity, SyncAspects, SyncConfig, SyncError,
};
pub use partyline_tick::{PaceConfig, Pacer};
pub use partyline_transport::{ClientConfig, HostConfig, TransportError};

/// The common imports for a game built on Partyline.
pub mod prelude {
    pub use crate::{
        CharacterId, ClientConfig, DriverConfig, DriverState, Envelope,
        GameWorld, HandlerOutput, HostConfig, InteractAction, InteractOutcome,
        Message, NetId, PartylineError, PeerId, Pose, Recipient, SessionDriver,
        SessionEvent, SessionMode, SessionPhase, SpawnDesc, Vec2,
    };
}
