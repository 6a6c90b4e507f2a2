//! Client endpoint: dial, admission, and the single link to the host.

use std::time::{Duration, Instant};

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use partyline_protocol::{
    DeliveryMode, Envelope, Message, PROTOCOL_VERSION, PeerId, decode, encode,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::pump::{self, SendQueues};
use crate::{ClientConfig, ClientEvent, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The joining side of a session.
///
/// Construction *is* admission: a `ClientEndpoint` only exists once
/// the host has said `Welcome`, so it always knows its own peer id.
pub struct ClientEndpoint {
    peer_id: PeerId,
    link: SendQueues,
    events_rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl ClientEndpoint {
    /// Dials the host and runs the admission exchange: upgrade, send
    /// `Hello`, await the verdict. The whole sequence shares one
    /// timeout budget; a `Reject` comes back as
    /// [`TransportError::Rejected`].
    pub async fn connect(config: ClientConfig) -> Result<Self, TransportError> {
        let deadline = Instant::now() + Duration::from_millis(config.connect_timeout_ms);
        let url = format!("ws://{}", config.server_addr);

        let (mut ws, _) =
            tokio::time::timeout(remaining(deadline), tokio_tungstenite::connect_async(url))
                .await
                .map_err(|_| TransportError::HandshakeTimeout)?
                .map_err(|e| {
                    TransportError::Connect(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        e,
                    ))
                })?;

        // Hello carries time zero: this endpoint's clock starts now.
        let hello = Envelope::new(
            0,
            Message::Hello {
                protocol_version: PROTOCOL_VERSION,
                session_key: config.session_key.clone(),
            },
        );
        ws.send(WsMessage::Binary(encode(&hello)?.into()))
            .await
            .map_err(|e| {
                TransportError::Connect(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
            })?;

        let peer_id = await_verdict(&mut ws, deadline).await?;

        let (link, source) = pump::start_writer(ws, config.unreliable_queue, "host".to_string());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(read_loop(source, events_tx));

        tracing::info!(%peer_id, addr = %config.server_addr, "connected to host");
        Ok(Self {
            peer_id,
            link,
            events_rx,
        })
    }

    /// The id the host assigned during admission.
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Queues one envelope for the host.
    pub fn send(&self, envelope: &Envelope, mode: DeliveryMode) -> Result<(), TransportError> {
        self.link.push(encode(envelope)?, mode)
    }

    /// Returns the next pending event, if any. Non-blocking.
    pub fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Asks the writer to close the socket after queued reliable
    /// frames have gone out.
    pub fn close(&self) {
        self.link.close();
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Reads frames until the host answers the `Hello`.
async fn await_verdict(ws: &mut WsStream, deadline: Instant) -> Result<PeerId, TransportError> {
    loop {
        let frame = tokio::time::timeout(remaining(deadline), ws.next())
            .await
            .map_err(|_| TransportError::HandshakeTimeout)?;
        match frame {
            Some(Ok(WsMessage::Binary(data))) => match decode(&data)?.message {
                Message::Welcome { peer_id } => return Ok(peer_id),
                Message::Reject { reason } => return Err(TransportError::Rejected { reason }),
                other => {
                    // The host never does this; tolerate and keep waiting.
                    tracing::debug!(kind = other.name(), "frame before verdict, ignoring");
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(TransportError::Handshake("closed before welcome".into()));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(TransportError::Connect(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    e,
                )));
            }
        }
    }
}

/// Pulls frames off the host link until it dies.
async fn read_loop(mut source: SplitStream<WsStream>, events: mpsc::UnboundedSender<ClientEvent>) {
    loop {
        match source.next().await {
            Some(Ok(WsMessage::Binary(data))) => match decode(&data) {
                Ok(envelope) => {
                    if matches!(
                        envelope.message,
                        Message::Welcome { .. } | Message::Reject { .. }
                    ) {
                        tracing::warn!("admission frame after admission, ignoring");
                        continue;
                    }
                    if events.send(ClientEvent::Frame { envelope }).is_err() {
                        // Endpoint dropped; nobody is listening.
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "dropping undecodable frame");
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => continue, // text/ping/pong
            Some(Err(e)) => {
                tracing::debug!(error = %e, "host link read error");
                break;
            }
        }
    }
    let _ = events.send(ClientEvent::Disconnected);
    tracing::info!("host link closed");
}
