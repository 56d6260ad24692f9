//! Banter chat server.
//!
//! Production server implementation using tokio-tungstenite for WebSocket
//! transport and Tokio for the async runtime.
//!
//! # Architecture
//!
//! This crate provides production "glue" around [`banter_core`]'s pure
//! registries. The [`Hub`] holds sessions and room membership behind per-map
//! locks and fans events out through bounded per-connection queues. The
//! connection layer feeds it: each accepted socket passes the identity gate
//! during the WebSocket upgrade, gets registered under its user, and is then
//! split into a read loop for room commands and a writer task that drains
//! the session's outbound queue.
//!
//! # Components
//!
//! - [`Hub`]: session registry, room membership, broadcast and presence
//! - [`WsTransport`]: TCP listener the accept loop runs on
//! - [`GroupDirectory`]: group membership source consulted on connect
//! - [`Server`]: accept loop tying the above together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod connection;
mod directory;
mod error;
mod hub;
mod transport;

use std::{net::SocketAddr, sync::Arc};

use banter_proto::{ClientCommand, UserId};
pub use connection::ClientHandle;
pub use directory::{DirectoryError, GroupDirectory, MemoryDirectory};
pub use error::ServerError;
use futures_util::{StreamExt, stream::SplitStream};
pub use hub::Hub;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{
        Message,
        handshake::server::{Request, Response},
    },
};
pub use transport::WsTransport;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:5001")
    pub bind_address: String,
    /// Outbound queue capacity per connection, in frames.
    ///
    /// A connection whose queue is full when a frame arrives is disconnected
    /// rather than allowed to stall broadcasts.
    pub queue_depth: usize,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:5001".to_string(), queue_depth: 64 }
    }
}

/// Production Banter server.
///
/// Wraps a [`Hub`] with the TCP accept loop and per-connection session
/// plumbing.
pub struct Server<D: GroupDirectory> {
    /// Shared connection hub
    hub: Arc<Hub<D>>,
    /// TCP listener
    transport: WsTransport,
    /// Runtime settings
    config: ServerRuntimeConfig,
}

impl<D: GroupDirectory> Server<D> {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig, directory: D) -> Result<Self, ServerError> {
        if config.queue_depth == 0 {
            return Err(ServerError::Config("queue depth must be at least 1".to_string()));
        }

        let transport = WsTransport::bind(&config.bind_address).await?;
        let hub = Arc::new(Hub::new(directory));

        Ok(Self { hub, transport, config })
    }

    /// Shared handle to the hub, for request-handling code that pushes group
    /// events to connected users.
    pub fn hub(&self) -> Arc<Hub<D>> {
        Arc::clone(&self.hub)
    }

    /// Run the server, accepting connections until shut down externally.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server listening on {}", self.transport.local_addr()?);

        loop {
            match self.transport.accept().await {
                Ok((stream, peer)) => {
                    let hub = Arc::clone(&self.hub);
                    let queue_depth = self.config.queue_depth;

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, hub, queue_depth).await {
                            tracing::error!("Connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Upgrade one TCP connection and run its session to completion.
async fn handle_connection<D: GroupDirectory>(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<Hub<D>>,
    queue_depth: usize,
) -> Result<(), ServerError> {
    let mut identity = None;

    let callback = |request: &Request, response: Response| {
        match auth::user_id_from_request(request) {
            Some(user) => {
                identity = Some(user);
                Ok(response)
            },
            None => Err(auth::unauthorized_response()),
        }
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            // Includes upgrades refused by the identity gate.
            tracing::warn!("Handshake with {} failed: {}", peer, e);
            return Ok(());
        },
    };

    let Some(user) = identity else {
        return Err(ServerError::Internal("handshake accepted without identity".to_string()));
    };

    tracing::debug!("New session for {} from {}", user, peer);

    let (sink, mut frames) = ws.split();
    let (tx, rx) = mpsc::channel(queue_depth);
    let conn_id = connection::random_conn_id();

    let writer = tokio::spawn(connection::write_outbound(rx, sink));

    let result = match hub.on_connect(user.clone(), ClientHandle::new(tx), conn_id).await {
        Ok(()) => {
            read_loop(&mut frames, &hub, &user).await;
            Ok(())
        },
        Err(e) => Err(e),
    };

    if let Err(e) = hub.on_disconnect(&user, conn_id).await {
        tracing::warn!("Teardown for {} failed: {}", user, e);
    }

    // With the registry entry gone the outbound queue is closed, so the
    // writer drains whatever is left and exits.
    if let Err(e) = writer.await {
        tracing::debug!("Writer task for {} ended abnormally: {}", user, e);
    }

    result
}

/// Consume inbound frames until the socket ends.
///
/// Text frames carry room commands. Anything unparseable is logged and
/// dropped without ending the session. Binary frames are not part of the
/// protocol and are dropped the same way.
async fn read_loop<D: GroupDirectory>(
    frames: &mut SplitStream<WebSocketStream<TcpStream>>,
    hub: &Hub<D>,
    user: &UserId,
) {
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientCommand::decode(&text) {
                Ok(ClientCommand::JoinGroup(room)) => {
                    hub.on_join_room_request(user, room).await;
                },
                Ok(ClientCommand::LeaveGroup(room)) => {
                    hub.on_leave_room_request(user, &room).await;
                },
                Err(e) => {
                    tracing::warn!("Ignoring malformed command from {}: {}", user, e);
                },
            },
            Ok(Message::Binary(_)) => {
                tracing::warn!("Ignoring binary frame from {}", user);
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                tracing::debug!("Read error for {}: {}", user, e);
                break;
            },
        }
    }
}
