//! Host endpoint: listener, admission, and the per-peer link fan-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use partyline_protocol::{
    DeliveryMode, Envelope, Message, PROTOCOL_VERSION, PeerId, decode, encode,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::pump::{self, SendQueues};
use crate::{HostConfig, HostEvent, TransportError};

type WsStream = WebSocketStream<TcpStream>;

/// State shared between the endpoint, the accept loop, and every link
/// task. The peer map lock is only ever held for a lookup or removal,
/// never across an await.
struct Shared {
    config: HostConfig,
    peers: Mutex<HashMap<PeerId, SendQueues>>,
    events: mpsc::UnboundedSender<HostEvent>,
    /// Admitted peers, the host's own loopback client included;
    /// bounded by `max_peers`.
    claimed: AtomicU32,
    /// Monotonic 1-based id allocator. Ids are never handed out twice
    /// within a hosting run, even after the original holder
    /// disconnects.
    next_peer: AtomicU32,
    locked: AtomicBool,
    epoch: Instant,
}

impl Shared {
    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, SendQueues>> {
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Milliseconds on the host's own session clock.
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// The hosting side of a session.
///
/// Owns the listener and one link per admitted peer. Sends are
/// synchronous queue pushes; inbound traffic surfaces through
/// [`poll_event`](HostEndpoint::poll_event).
pub struct HostEndpoint {
    shared: Arc<Shared>,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl HostEndpoint {
    /// Binds the listener and starts admitting connections.
    pub async fn bind(config: HostConfig) -> Result<Self, TransportError> {
        let config = config.validated();
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(TransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            config,
            peers: Mutex::new(HashMap::new()),
            events: events_tx,
            claimed: AtomicU32::new(0),
            next_peer: AtomicU32::new(1),
            locked: AtomicBool::new(false),
            epoch: Instant::now(),
        });

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&shared)));
        tracing::info!(%local_addr, "host listening");

        Ok(Self {
            shared,
            events_rx,
            local_addr,
            accept_task,
        })
    }

    /// The bound address; useful when the config asked for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queues one envelope for one peer.
    pub fn send(
        &self,
        peer: PeerId,
        envelope: &Envelope,
        mode: DeliveryMode,
    ) -> Result<(), TransportError> {
        let bytes = encode(envelope)?;
        let peers = self.shared.peers();
        let link = peers
            .get(&peer)
            .ok_or(TransportError::PeerNotConnected(peer))?;
        link.push(bytes, mode)
    }

    /// Queues one envelope for every connected peer. A link that fails
    /// to accept the frame is logged and skipped; the peer is on its
    /// way out and will surface as [`HostEvent::PeerLeft`].
    pub fn broadcast(&self, envelope: &Envelope, mode: DeliveryMode) -> Result<(), TransportError> {
        self.broadcast_filtered(envelope, mode, None)
    }

    /// [`broadcast`](Self::broadcast), minus one peer. Used to avoid
    /// echoing a peer's own state back at it.
    pub fn broadcast_except(
        &self,
        skip: PeerId,
        envelope: &Envelope,
        mode: DeliveryMode,
    ) -> Result<(), TransportError> {
        self.broadcast_filtered(envelope, mode, Some(skip))
    }

    fn broadcast_filtered(
        &self,
        envelope: &Envelope,
        mode: DeliveryMode,
        skip: Option<PeerId>,
    ) -> Result<(), TransportError> {
        let bytes = encode(envelope)?;
        let peers = self.shared.peers();
        for (peer, link) in peers.iter() {
            if Some(*peer) == skip {
                continue;
            }
            if let Err(e) = link.push(bytes.clone(), mode) {
                tracing::debug!(%peer, error = %e, "broadcast push failed");
            }
        }
        Ok(())
    }

    /// Returns the next pending event, if any. Non-blocking; the sim
    /// thread drains this in a loop once per tick.
    pub fn poll_event(&mut self) -> Option<HostEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Connected peers, ascending.
    pub fn peers(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.shared.peers().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of connected peers.
    pub fn peer_count(&self) -> usize {
        self.shared.peers().len()
    }

    /// Locks or unlocks admission. A locked host rejects every new
    /// `Hello` with "session already started"; peers already admitted
    /// are unaffected.
    pub fn set_locked(&self, locked: bool) {
        self.shared.locked.store(locked, Ordering::SeqCst);
    }

    /// Closes one peer's link and retires its id.
    pub fn disconnect(&self, peer: PeerId) -> Result<(), TransportError> {
        if retire(&self.shared, peer) {
            Ok(())
        } else {
            Err(TransportError::PeerNotConnected(peer))
        }
    }

    /// Stops admitting, closes every link, and drops the listener.
    pub fn shutdown(self) {
        self.accept_task.abort();
        let links: Vec<(PeerId, SendQueues)> = self.shared.peers().drain().collect();
        for (peer, link) in links {
            tracing::debug!(%peer, "closing link on shutdown");
            link.close();
        }
        tracing::info!("host endpoint shut down");
    }
}

impl Drop for HostEndpoint {
    fn drop(&mut self) {
        // Without this an endpoint dropped without shutdown() would
        // keep the listener alive and admitting forever.
        self.accept_task.abort();
    }
}

// ---------------------------------------------------------------------------
// Accept loop and admission
// ---------------------------------------------------------------------------

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = admit(stream, addr, shared).await {
                        tracing::debug!(%addr, error = %e, "admission failed");
                    }
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "accept failed");
            }
        }
    }
}

/// Runs one connection from raw TCP to admitted peer: WebSocket
/// upgrade, `Hello` checks, capacity claim, `Welcome`, link spawn.
async fn admit(
    stream: TcpStream,
    addr: SocketAddr,
    shared: Arc<Shared>,
) -> Result<(), TransportError> {
    let mut ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
        TransportError::Connect(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            e,
        ))
    })?;

    let timeout = Duration::from_millis(shared.config.handshake_timeout_ms);
    let first = match tokio::time::timeout(timeout, ws.next()).await {
        Ok(Some(Ok(WsMessage::Binary(data)))) => decode(&data)?,
        Ok(Some(Ok(_))) | Ok(None) => {
            return Err(TransportError::Handshake(
                "connection closed before hello".into(),
            ));
        }
        Ok(Some(Err(e))) => {
            return Err(TransportError::Connect(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                e,
            )));
        }
        Err(_) => return Err(TransportError::HandshakeTimeout),
    };

    let Message::Hello {
        protocol_version,
        session_key,
    } = first.message
    else {
        return reject(&mut ws, &shared, "expected hello").await;
    };

    if protocol_version != PROTOCOL_VERSION {
        let reason = format!(
            "protocol version {protocol_version} unsupported, host speaks {PROTOCOL_VERSION}"
        );
        return reject(&mut ws, &shared, &reason).await;
    }
    if session_key != shared.config.session_key {
        return reject(&mut ws, &shared, "bad session key").await;
    }
    if shared.locked.load(Ordering::SeqCst) {
        return reject(&mut ws, &shared, "session already started").await;
    }

    // Claim a capacity slot atomically so two racing handshakes cannot
    // both take the last one.
    let max = u32::from(shared.config.max_peers);
    let claim = shared
        .claimed
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
            (c < max).then_some(c + 1)
        });
    if claim.is_err() {
        return reject(&mut ws, &shared, "session full").await;
    }

    let peer = PeerId(shared.next_peer.fetch_add(1, Ordering::SeqCst));
    let welcome = Envelope::new(shared.now_ms(), Message::Welcome { peer_id: peer });
    let bytes = encode(&welcome)?;
    if let Err(e) = ws.send(WsMessage::Binary(bytes.into())).await {
        shared.claimed.fetch_sub(1, Ordering::SeqCst);
        return Err(TransportError::Connect(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            e,
        )));
    }

    let (link, source) = pump::start_writer(ws, shared.config.unreliable_queue, peer.to_string());
    shared.peers().insert(peer, link);
    let _ = shared.events.send(HostEvent::PeerJoined { peer });
    tracing::info!(%peer, %addr, "peer admitted");

    tokio::spawn(read_loop(peer, source, shared));
    Ok(())
}

/// Sends `Reject` and closes. Always returns the refusal as an error
/// so `admit` has a single exit shape.
async fn reject(
    ws: &mut WsStream,
    shared: &Shared,
    reason: &str,
) -> Result<(), TransportError> {
    tracing::info!(reason, "rejecting connection");
    let envelope = Envelope::new(
        shared.now_ms(),
        Message::Reject {
            reason: reason.to_string(),
        },
    );
    if let Ok(bytes) = encode(&envelope) {
        let _ = ws.send(WsMessage::Binary(bytes.into())).await;
    }
    let _ = ws.close(None).await;
    Err(TransportError::Handshake(reason.to_string()))
}

/// Pulls frames off one admitted peer's socket until it dies, then
/// retires the peer.
async fn read_loop(peer: PeerId, mut source: SplitStream<WsStream>, shared: Arc<Shared>) {
    loop {
        match source.next().await {
            Some(Ok(WsMessage::Binary(data))) => match decode(&data) {
                Ok(envelope) => {
                    if matches!(envelope.message, Message::Hello { .. }) {
                        tracing::warn!(%peer, "hello after admission, ignoring");
                        continue;
                    }
                    if shared
                        .events
                        .send(HostEvent::Frame { peer, envelope })
                        .is_err()
                    {
                        // Endpoint dropped; nobody is listening.
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "dropping undecodable frame");
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => continue, // text/ping/pong
            Some(Err(e)) => {
                tracing::debug!(%peer, error = %e, "link read error");
                break;
            }
        }
    }
    retire(&shared, peer);
}

/// Removes the peer's link, frees its capacity slot, and announces the
/// departure. Only the first caller for a given peer does any of this,
/// so the reader task and an explicit disconnect cannot double-retire.
fn retire(shared: &Shared, peer: PeerId) -> bool {
    let removed = shared.peers().remove(&peer);
    match removed {
        Some(link) => {
            link.close();
            shared.claimed.fetch_sub(1, Ordering::SeqCst);
            let _ = shared.events.send(HostEvent::PeerLeft { peer });
            tracing::info!(%peer, "peer retired");
            true
        }
        None => false,
    }
}
