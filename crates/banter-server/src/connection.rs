//! Per-connection plumbing: send handles, connection ids, the writer task.
//!
//! Each accepted socket gets a bounded outbound queue. Registry code queues
//! frames through [`ClientHandle::try_send`] without ever blocking, and a
//! dedicated writer task drains the queue into the socket. Dropping the last
//! handle closes the queue, which is how session removal shuts the writer
//! down.

use futures_util::{SinkExt, stream::SplitSink};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{Message, Utf8Bytes},
};

/// Cheap-to-clone handle that queues frames for one connection's writer.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::Sender<Utf8Bytes>,
}

impl ClientHandle {
    /// Wrap the sending half of a connection's outbound queue.
    pub fn new(tx: mpsc::Sender<Utf8Bytes>) -> Self {
        Self { tx }
    }

    /// Queue a frame without waiting.
    ///
    /// Fails with `Full` when the outbound queue is at capacity and with
    /// `Closed` when the writer task is gone.
    pub fn try_send(&self, frame: Utf8Bytes) -> Result<(), mpsc::error::TrySendError<Utf8Bytes>> {
        self.tx.try_send(frame)
    }
}

/// Mint a random connection id.
///
/// Ids distinguish a user's successive connections, so teardown for a
/// superseded socket cannot evict its replacement.
///
/// # Panics
///
/// Panics if the operating system RNG fails.
#[allow(clippy::expect_used)]
pub(crate) fn random_conn_id() -> u64 {
    let mut buf = [0u8; 8];
    getrandom::fill(&mut buf)
        .expect("invariant: OS RNG failure is unrecoverable - cannot mint connection ids");
    u64::from_le_bytes(buf)
}

/// Drain a connection's outbound queue into its WebSocket sink.
///
/// Runs until the queue closes (session dropped from the registry) or a write
/// fails, then closes the socket.
pub(crate) async fn write_outbound(
    mut rx: mpsc::Receiver<Utf8Bytes>,
    mut sink: SplitSink<WebSocketStream<TcpStream>, Message>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send(Message::Text(frame)).await {
            tracing::debug!("Outbound write failed: {}", e);
            break;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!("Socket close failed: {}", e);
    }
}
