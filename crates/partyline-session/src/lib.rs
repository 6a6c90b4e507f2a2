//! Session coordination for Partyline.
//!
//! This crate answers two questions the layers around it each answer
//! half of:
//!
//! - **Who am I right now?** [`SessionContext`] holds the process's
//!   [`SessionMode`] (single-player, host, or client) and the live
//!   links that mode implies. The hosting process runs a listener
//!   *plus* a loopback client connected to it, so the host's own
//!   player is an ordinary admitted peer rather than a special case.
//! - **Who handles this envelope?** [`Dispatcher`] keeps two
//!   tag-indexed handler tables, one per direction: requests *from
//!   clients* belong to the host table, authoritative state *from the
//!   host* to the client table. The hosting process runs both.
//!
//! # How it fits in the stack
//!
//! ```text
//! Driver (above)      ← registers handlers, ticks poll/dispatch/deliver
//!     ↕
//! Session (this crate)  ← mode, links, clock, routing
//!     ↕
//! Transport (below)   ← sockets, admission, delivery lanes
//! ```
//!
//! The context owns its tokio runtime; mode transitions block briefly,
//! everything on the steady-state path is a queue push or channel
//! drain the simulation thread can call every tick.

mod context;
mod dispatch;
mod error;

pub use context::{LinkEvent, SessionContext, SessionMode};
pub use dispatch::{ClientHandler, Dispatcher, HandlerOutput, HostHandler};
pub use error::SessionError;
