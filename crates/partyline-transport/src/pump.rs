//! Shared per-link plumbing: the dual outbound queues and the writer
//! task that drains them into one WebSocket sink.
//!
//! Reliable sends ride an unbounded queue and are never dropped.
//! Unreliable sends ride a small bounded queue; when it is full the
//! frame is discarded at the sender, which is the whole point of the
//! unreliable mode: a stale snapshot must never delay a fresh one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use partyline_protocol::DeliveryMode;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::TransportError;

/// Commands consumed by a link's writer task.
pub(crate) enum WriterCmd {
    Frame(Bytes),
    Close,
}

/// Sender half of one link's outbound queues. Cheap to clone; all
/// methods are synchronous and safe to call from the sim thread.
#[derive(Clone)]
pub(crate) struct SendQueues {
    reliable: mpsc::UnboundedSender<WriterCmd>,
    unreliable: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
}

impl SendQueues {
    /// Queues one encoded frame for delivery.
    ///
    /// Unreliable pushes against a full queue succeed and silently
    /// drop the frame. Either mode fails once the writer is gone.
    pub(crate) fn push(&self, bytes: Bytes, mode: DeliveryMode) -> Result<(), TransportError> {
        match mode {
            DeliveryMode::ReliableOrdered => self
                .reliable
                .send(WriterCmd::Frame(bytes))
                .map_err(|_| TransportError::LinkClosed),
            DeliveryMode::Unreliable => match self.unreliable.try_send(bytes) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
                Err(TrySendError::Closed(_)) => Err(TransportError::LinkClosed),
            },
        }
    }

    /// Asks the writer to close the socket after the frames already
    /// queued on the reliable lane.
    pub(crate) fn close(&self) {
        let _ = self.reliable.send(WriterCmd::Close);
    }
}

/// Splits a WebSocket stream, spawns the writer task over the sink,
/// and hands the read half back for the caller's own receive loop.
pub(crate) fn start_writer<S>(
    ws: WebSocketStream<S>,
    unreliable_capacity: usize,
    label: String,
) -> (SendQueues, SplitStream<WebSocketStream<S>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, source) = ws.split();
    let (reliable_tx, reliable_rx) = mpsc::unbounded_channel();
    let (unreliable_tx, unreliable_rx) = mpsc::channel(unreliable_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    let queues = SendQueues {
        reliable: reliable_tx,
        unreliable: unreliable_tx,
        dropped: Arc::clone(&dropped),
    };

    tokio::spawn(run_writer(sink, reliable_rx, unreliable_rx, dropped, label));

    (queues, source)
}

/// Drains both queues into the sink until a close command arrives, the
/// queues are dropped, or the socket errors. Reliable frames win when
/// both lanes are ready.
async fn run_writer<S>(
    mut sink: SplitSink<WebSocketStream<S>, WsMessage>,
    mut reliable_rx: mpsc::UnboundedReceiver<WriterCmd>,
    mut unreliable_rx: mpsc::Receiver<Bytes>,
    dropped: Arc<AtomicU64>,
    label: String,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            biased;

            cmd = reliable_rx.recv() => match cmd {
                Some(WriterCmd::Frame(bytes)) => {
                    if let Err(e) = sink.send(WsMessage::Binary(bytes.into())).await {
                        tracing::debug!(link = %label, error = %e, "reliable send failed");
                        break;
                    }
                }
                Some(WriterCmd::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },

            frame = unreliable_rx.recv() => match frame {
                Some(bytes) => {
                    if let Err(e) = sink.send(WsMessage::Binary(bytes.into())).await {
                        tracing::debug!(link = %label, error = %e, "unreliable send failed");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let lost = dropped.load(Ordering::Relaxed);
    if lost > 0 {
        tracing::debug!(link = %label, lost, "writer stopped; unreliable frames were dropped");
    } else {
        tracing::trace!(link = %label, "writer stopped");
    }
}
