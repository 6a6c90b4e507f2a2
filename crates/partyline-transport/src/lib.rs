//! WebSocket transport for Partyline: the async edge of the system.
//!
//! Everything that touches a socket lives in this crate, behind two
//! endpoint types:
//!
//! - [`HostEndpoint`] listens, admits clients, and fans frames out to
//!   every connected peer.
//! - [`ClientEndpoint`] dials a host, completes admission, and speaks
//!   to it alone.
//!
//! Both expose the same shape to the layer above: synchronous sends
//! that queue a frame and return immediately, and a synchronous
//! [`poll_event`](HostEndpoint::poll_event) the simulation thread
//! drains once per tick. Socket I/O happens on background Tokio tasks;
//! nothing upstairs ever awaits.
//!
//! # Admission
//!
//! The host answers the first frame of every connection before the
//! peer exists anywhere else in the system:
//!
//! 1. frame must be `Hello` within the handshake timeout
//! 2. protocol version must match
//! 3. session key must match
//! 4. the session must not be locked (a started game admits nobody)
//! 5. a capacity slot must be free
//!
//! Only then is a peer id assigned and `Welcome` sent; any earlier
//! failure gets `Reject` and a closed socket, and no id is consumed.
//! Ids count up from 1 and are never reused within a hosting run. The
//! endpoint plays no favorites: the hosting process's own player joins
//! through a regular [`ClientEndpoint`] pointed at the loopback
//! address, and because the session layer completes that connect before
//! the address is shared with anyone else, the host's player is always
//! peer 1.
//!
//! # Delivery modes
//!
//! Each link to a peer carries two outbound lanes. The reliable lane is
//! unbounded and ordered. The unreliable lane is a small bounded queue
//! drained at lower priority; pushing into a full queue drops the frame
//! on the floor. Over a single TCP socket that is as unreliable as
//! delivery honestly gets, and it is exactly the right failure mode for
//! per-tick snapshots.

mod client;
mod error;
mod host;
mod pump;

pub use client::ClientEndpoint;
pub use error::TransportError;
pub use host::HostEndpoint;

use partyline_protocol::{Envelope, PeerId};

/// Default listen/connect port.
pub const DEFAULT_PORT: u16 = 7777;

/// Default session capacity, local player included.
pub const DEFAULT_MAX_PEERS: u8 = 8;

/// Default admission and connect timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

/// Default per-link unreliable queue depth, in frames.
pub const DEFAULT_UNRELIABLE_QUEUE: usize = 64;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for [`HostEndpoint::bind`].
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address to listen on. Port 0 picks a free port; read it back
    /// with [`HostEndpoint::local_addr`].
    pub bind_addr: String,
    /// Pre-shared key every `Hello` must carry.
    pub session_key: String,
    /// Total session capacity. The host's own loopback client takes a
    /// slot like everyone else.
    pub max_peers: u8,
    /// How long a fresh connection may take to present its `Hello`.
    pub handshake_timeout_ms: u64,
    /// Per-link unreliable queue depth.
    pub unreliable_queue: usize,
}

impl HostConfig {
    /// Config listening on all interfaces at the default port with the
    /// given key.
    pub fn with_key(session_key: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            ..Self::default()
        }
    }

    /// Clamps nonsense values instead of erroring.
    pub fn validated(mut self) -> Self {
        if self.max_peers == 0 {
            tracing::warn!("max_peers of 0 clamped to 1");
            self.max_peers = 1;
        }
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            session_key: String::new(),
            max_peers: DEFAULT_MAX_PEERS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            unreliable_queue: DEFAULT_UNRELIABLE_QUEUE,
        }
    }
}

/// Settings for [`ClientEndpoint::connect`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host address, `host:port`.
    pub server_addr: String,
    /// Pre-shared key to present in `Hello`.
    pub session_key: String,
    /// Budget for the whole connect: dial, `Hello`, verdict.
    pub connect_timeout_ms: u64,
    /// Unreliable queue depth for the host link.
    pub unreliable_queue: usize,
}

impl ClientConfig {
    pub fn new(server_addr: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            session_key: session_key.into(),
            connect_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            unreliable_queue: DEFAULT_UNRELIABLE_QUEUE,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What a [`HostEndpoint`] reports when polled.
#[derive(Debug)]
pub enum HostEvent {
    /// A client passed admission and holds a fresh peer id. Always
    /// precedes any [`HostEvent::Frame`] from that peer.
    PeerJoined { peer: PeerId },
    /// A decoded frame from a connected peer.
    Frame { peer: PeerId, envelope: Envelope },
    /// The peer's connection is gone; its id is retired.
    PeerLeft { peer: PeerId },
}

/// What a [`ClientEndpoint`] reports when polled.
#[derive(Debug)]
pub enum ClientEvent {
    /// A decoded frame from the host.
    Frame { envelope: Envelope },
    /// The link to the host is gone.
    Disconnected,
}
