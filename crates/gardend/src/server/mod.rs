//! WebSocket relay server.
//!
//! The server:
//! - Listens on one TCP port for WebSocket upgrades
//! - Routes each upgrade to a channel by request path (`/config`,
//!   `/screen`, `/client`); unknown paths get HTTP 404
//! - Spawns a ConnectionHandler for each accepted peer
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept() + upgrade
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│    HubHandle    │
//! │   (per peer)    │     └─────────────────┘
//! └───────┬─────────┘
//!         │ client frames
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   InputRelay    │────▶│  ScreenFanout   │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept and handshake failures are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use garden_core::Group;

use crate::effects::ScreenFanout;
use crate::hub::HubHandle;
use crate::registry::PeerId;
use crate::relay::InputRelay;

/// WebSocket server for config, screen and client peers.
pub struct RelayServer {
    /// Address to listen on
    addr: SocketAddr,

    /// Handle to the hub actor
    hub: HubHandle,

    /// Screen fan-out, subscribed to by screen peers
    screens: ScreenFanout,

    /// Relay for client input frames
    relay: InputRelay,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating peer ids
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Creates a new relay server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind
    /// * `hub` - Handle to the hub actor
    /// * `screens` - Screen fan-out shared with the hub's effects
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        addr: SocketAddr,
        hub: HubHandle,
        screens: ScreenFanout,
        cancel_token: CancellationToken,
    ) -> Self {
        let relay = InputRelay::new(screens.clone());
        Self {
            addr,
            hub,
            screens,
            relay,
            cancel_token,
            connection_counter: AtomicU64::new(0),
        }
    }

    /// Binds and runs the server until the cancellation token fires.
    pub async fn run(&self) -> Result<(), ServerError> {
        let (listener, _) = self.bind().await?;
        self.serve(listener).await
    }

    /// Binds the configured address and returns the actual local address.
    ///
    /// Binding port 0 yields an OS-assigned port, which tests rely on.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr), ServerError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind listener");
            ServerError::Bind {
                addr: self.addr,
                error: e.to_string(),
            }
        })?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Relay server listening");
        Ok((listener, local_addr))
    }

    /// Runs the accept loop on a pre-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, remote)) => {
                            let id = self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
                            self.handle_connection(stream, remote, PeerId::new(id));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Performs the upgrade handshake and spawns the peer's handler.
    fn handle_connection(&self, stream: TcpStream, remote: SocketAddr, peer_id: PeerId) {
        let hub = self.hub.clone();
        let relay = self.relay.clone();
        let screens = self.screens.clone();
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            let mut group = None;
            let handshake = tokio_tungstenite::accept_hdr_async(
                stream,
                |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    group = Some(route_request(req)?);
                    Ok(resp)
                },
            )
            .await;

            let ws = match handshake {
                Ok(ws) => ws,
                Err(e) => {
                    debug!(remote = %remote, error = %e, "WebSocket handshake failed");
                    return;
                }
            };
            let Some(group) = group else {
                return;
            };

            debug!(remote = %remote, peer = %peer_id, group = %group, "Peer upgraded");

            let screen_events = (group == Group::Screen).then(|| screens.subscribe());
            ConnectionHandler::new(peer_id, group, hub, relay, screen_events, cancel_token)
                .run(ws)
                .await;
        });
    }
}

/// Selects the channel for an upgrade request from its path.
///
/// # Errors
///
/// Returns a 404 response for any path other than the three channels.
fn route_request(req: &Request) -> Result<Group, ErrorResponse> {
    let path = req.uri().path();
    Group::from_path(path).ok_or_else(|| {
        debug!(path = %path, "Rejecting upgrade for unknown path");
        let mut response = ErrorResponse::new(Some(format!("No channel at {path}")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    })
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
