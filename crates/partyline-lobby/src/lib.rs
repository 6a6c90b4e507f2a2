//! Pre-game lobby state for Partyline.
//!
//! Covers the stretch between admission and game start: the roster of
//! joined players, their character picks and ready flags, and the
//! shuffled spawn assignments handed out when the host starts the game.
//! The lobby is pure state with no sockets and no clocks; the session
//! layer feeds it messages and broadcasts its snapshots.

mod error;
mod roster;

pub use error::LobbyError;
pub use roster::{MAX_NAME_CHARS, Roster};
