//! The session context: one process's network identity and links.
//!
//! A process is always in exactly one mode. `SinglePlayer` has no
//! sockets at all; `Host` runs a listener *plus* a loopback client
//! connected to it, so the host's own player joins, speaks and listens
//! exactly like a remote one; `Client` runs a single connection to a
//! remote host. Mode switches tear the old links down completely and
//! build fresh ones, never reconfigure in place.
//!
//! The context owns a tokio runtime and hides it: transitions block
//! (bounded by the connect timeout), steady-state operations are
//! synchronous queue pushes and channel drains. Outbound helpers are
//! no-ops outside the mode they apply to, so callers need no mode
//! guards around ordinary traffic.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use partyline_protocol::{Envelope, Message, PeerId, Recipient};
use partyline_transport::{
    ClientConfig, ClientEndpoint, ClientEvent, HostConfig, HostEndpoint,
    HostEvent,
};
use tokio::runtime::Runtime;

use crate::SessionError;

/// Which role this process currently plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// No networking; every outbound helper is a no-op.
    SinglePlayer,
    /// Authoritative listener plus the local player's loopback client.
    Host,
    /// Connected to a remote host.
    Client,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionMode::SinglePlayer => "single-player",
            SessionMode::Host => "host",
            SessionMode::Client => "client",
        };
        f.write_str(s)
    }
}

/// A transport-level occurrence, already routed by which dispatch
/// table it belongs to.
#[derive(Debug)]
pub enum LinkEvent {
    /// Host role: a peer passed admission. The host's own loopback
    /// client shows up here too, first.
    PeerJoined { peer: PeerId },
    /// Host role: a peer's link is gone.
    PeerLeft { peer: PeerId },
    /// Host role: traffic for the host-side dispatch table.
    FromClient { peer: PeerId, envelope: Envelope },
    /// Traffic for the client-side dispatch table. On a client this is
    /// everything the host sends; on the host it is what its own
    /// loopback client receives.
    FromHost { envelope: Envelope },
    /// The link to the host is gone. Fatal to the session on a client;
    /// on the host it means the loopback client died, which is just as
    /// fatal.
    LostHost,
}

struct HostLink {
    endpoint: HostEndpoint,
    /// The host's own player connection, admitted like anyone else.
    local: ClientEndpoint,
}

enum Link {
    None,
    Host(HostLink),
    Client(ClientEndpoint),
}

/// One process's session state: mode, links, clock, identity.
pub struct SessionContext {
    runtime: Runtime,
    link: Link,
    local_peer: Option<PeerId>,
    epoch: Instant,
}

impl SessionContext {
    /// Builds an offline context with its own multi-thread runtime.
    pub fn new() -> Result<Self, SessionError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(SessionError::Runtime)?;
        Ok(Self {
            runtime,
            link: Link::None,
            local_peer: None,
            epoch: Instant::now(),
        })
    }

    pub fn mode(&self) -> SessionMode {
        match self.link {
            Link::None => SessionMode::SinglePlayer,
            Link::Host(_) => SessionMode::Host,
            Link::Client(_) => SessionMode::Client,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.link, Link::Host(_))
    }

    pub fn is_online(&self) -> bool {
        !matches!(self.link, Link::None)
    }

    /// The peer id this process was welcomed with. `None` until a
    /// `Welcome` has been received, including in single-player.
    pub fn local_peer(&self) -> Option<PeerId> {
        self.local_peer
    }

    /// Milliseconds on this session's send clock. Only ever compared
    /// against other stamps from the same process.
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    // --- Mode transitions ------------------------------------------------

    /// Switches to `Host`: binds the listener, then joins it through a
    /// loopback client so the local player holds a real admitted peer
    /// id (the first one, since nobody else has the address yet).
    ///
    /// Returns the local player's peer id. On any failure the context
    /// is back in `SinglePlayer`.
    pub fn start_host(
        &mut self,
        config: HostConfig,
    ) -> Result<PeerId, SessionError> {
        self.leave();
        self.epoch = Instant::now();

        let session_key = config.session_key.clone();
        let (endpoint, local) = self.runtime.block_on(async move {
            let endpoint = HostEndpoint::bind(config).await?;
            let loopback = format!("127.0.0.1:{}", endpoint.local_addr().port());
            match ClientEndpoint::connect(ClientConfig::new(
                loopback,
                session_key,
            ))
            .await
            {
                Ok(local) => Ok((endpoint, local)),
                Err(e) => {
                    endpoint.shutdown();
                    Err(e)
                }
            }
        })?;

        let peer = local.peer_id();
        tracing::info!(addr = %endpoint.local_addr(), %peer, "hosting");
        self.link = Link::Host(HostLink { endpoint, local });
        self.local_peer = Some(peer);
        Ok(peer)
    }

    /// Switches to `Client`: dials the host and completes admission
    /// within the config's timeout budget.
    ///
    /// Returns the assigned peer id. On failure (refused, timed out,
    /// unreachable) the context is back in `SinglePlayer`.
    pub fn join(
        &mut self,
        config: ClientConfig,
    ) -> Result<PeerId, SessionError> {
        self.leave();
        self.epoch = Instant::now();

        let endpoint =
            self.runtime.block_on(ClientEndpoint::connect(config))?;
        let peer = endpoint.peer_id();
        tracing::info!(%peer, "joined session");
        self.link = Link::Client(endpoint);
        self.local_peer = Some(peer);
        Ok(peer)
    }

    /// Returns to `SinglePlayer`, closing whatever links exist. Safe to
    /// call in any mode.
    pub fn leave(&mut self) {
        match std::mem::replace(&mut self.link, Link::None) {
            Link::None => {}
            Link::Host(HostLink { endpoint, local }) => {
                local.close();
                endpoint.shutdown();
                tracing::info!("left host mode");
            }
            Link::Client(endpoint) => {
                endpoint.close();
                tracing::info!("left client mode");
            }
        }
        self.local_peer = None;
    }

    // --- Outbound --------------------------------------------------------

    /// Sends to the host: the remote host as a client, or this
    /// process's own listener through the loopback client as the host.
    /// No-op in single-player.
    pub fn send_to_host(&self, message: Message) -> Result<(), SessionError> {
        let envelope = self.stamp(message);
        let mode = envelope.message.delivery_mode();
        match &self.link {
            Link::None => Ok(()),
            Link::Host(link) => Ok(link.local.send(&envelope, mode)?),
            Link::Client(endpoint) => Ok(endpoint.send(&envelope, mode)?),
        }
    }

    /// Host role: sends to every connected peer, the loopback client
    /// included. No-op otherwise.
    pub fn broadcast_as_host(
        &self,
        message: Message,
    ) -> Result<(), SessionError> {
        let Link::Host(link) = &self.link else {
            return Ok(());
        };
        let envelope = self.stamp(message);
        let mode = envelope.message.delivery_mode();
        Ok(link.endpoint.broadcast(&envelope, mode)?)
    }

    /// Host role: broadcast minus one peer, for not echoing a peer's
    /// own change back at it. No-op otherwise.
    pub fn broadcast_except(
        &self,
        skip: PeerId,
        message: Message,
    ) -> Result<(), SessionError> {
        let Link::Host(link) = &self.link else {
            return Ok(());
        };
        let envelope = self.stamp(message);
        let mode = envelope.message.delivery_mode();
        Ok(link.endpoint.broadcast_except(skip, &envelope, mode)?)
    }

    /// Host role: sends to one peer. Sending to the local player's own
    /// id goes through its loopback link like any other. No-op
    /// otherwise.
    pub fn send_to_peer(
        &self,
        peer: PeerId,
        message: Message,
    ) -> Result<(), SessionError> {
        let Link::Host(link) = &self.link else {
            return Ok(());
        };
        let envelope = self.stamp(message);
        let mode = envelope.message.delivery_mode();
        Ok(link.endpoint.send(peer, &envelope, mode)?)
    }

    /// Routes one message by [`Recipient`]. Handlers express *where* a
    /// message goes; this is the single place that resolves it against
    /// the current links.
    pub fn deliver(
        &self,
        recipient: Recipient,
        message: Message,
    ) -> Result<(), SessionError> {
        match recipient {
            Recipient::All => self.broadcast_as_host(message),
            Recipient::AllExcept(skip) => {
                self.broadcast_except(skip, message)
            }
            Recipient::Peer(peer) => self.send_to_peer(peer, message),
            Recipient::Host => self.send_to_host(message),
        }
    }

    // --- Inbound ---------------------------------------------------------

    /// Drains everything the links have produced since the last poll.
    /// Called once per simulation tick; never blocks.
    pub fn poll(&mut self) -> Vec<LinkEvent> {
        let mut out = Vec::new();
        match &mut self.link {
            Link::None => {}
            Link::Host(link) => {
                while let Some(ev) = link.endpoint.poll_event() {
                    out.push(match ev {
                        HostEvent::PeerJoined { peer } => {
                            LinkEvent::PeerJoined { peer }
                        }
                        HostEvent::Frame { peer, envelope } => {
                            LinkEvent::FromClient { peer, envelope }
                        }
                        HostEvent::PeerLeft { peer } => {
                            LinkEvent::PeerLeft { peer }
                        }
                    });
                }
                while let Some(ev) = link.local.poll_event() {
                    out.push(match ev {
                        ClientEvent::Frame { envelope } => {
                            LinkEvent::FromHost { envelope }
                        }
                        ClientEvent::Disconnected => LinkEvent::LostHost,
                    });
                }
            }
            Link::Client(endpoint) => {
                while let Some(ev) = endpoint.poll_event() {
                    out.push(match ev {
                        ClientEvent::Frame { envelope } => {
                            LinkEvent::FromHost { envelope }
                        }
                        ClientEvent::Disconnected => LinkEvent::LostHost,
                    });
                }
            }
        }
        out
    }

    /// Host role: currently connected peer ids, ascending. Empty
    /// otherwise.
    pub fn peers(&self) -> Vec<PeerId> {
        match &self.link {
            Link::Host(link) => link.endpoint.peers(),
            _ => Vec::new(),
        }
    }

    /// Host role: the address the listener actually bound. Binding
    /// port 0 picks a free port, and this is how callers learn it.
    pub fn host_addr(&self) -> Option<SocketAddr> {
        match &self.link {
            Link::Host(link) => Some(link.endpoint.local_addr()),
            _ => None,
        }
    }

    /// Host role: stops or resumes admitting new connections. Locked
    /// hosts reject joins with "session already started".
    pub fn set_locked(&self, locked: bool) {
        if let Link::Host(link) = &self.link {
            link.endpoint.set_locked(locked);
        }
    }

    /// Host role: drops one peer's connection.
    pub fn disconnect_peer(&self, peer: PeerId) -> Result<(), SessionError> {
        match &self.link {
            Link::Host(link) => Ok(link.endpoint.disconnect(peer)?),
            _ => Ok(()),
        }
    }

    fn stamp(&self, message: Message) -> Envelope {
        Envelope::new(self.now_ms(), message)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("mode", &self.mode())
            .field("local_peer", &self.local_peer)
            .finish()
    }
}
