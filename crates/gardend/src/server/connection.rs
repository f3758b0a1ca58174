//! Per-peer WebSocket connection handling.
//!
//! Each accepted socket gets its own `ConnectionHandler` that:
//! - Registers the peer with the hub
//! - Routes inbound text frames by channel (config commands, client input)
//! - Forwards hub messages and screen events to the socket
//! - Unregisters the peer when the socket ends, whatever the cause
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Malformed frames are logged and dropped; the connection stays open
//! - Transport errors end only this connection

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use garden_core::Group;
use garden_protocol::{ConfigCommand, ScreenEvent};

use crate::hub::{HubError, HubHandle};
use crate::registry::{Peer, PeerId};
use crate::relay::InputRelay;

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for a single WebSocket peer.
pub struct ConnectionHandler {
    peer_id: PeerId,
    group: Group,
    hub: HubHandle,
    relay: InputRelay,

    /// Screen fan-out subscription, present for screen peers only
    screen_events: Option<broadcast::Receiver<ScreenEvent>>,

    cancel_token: CancellationToken,
}

impl ConnectionHandler {
    /// Creates a handler for a peer that completed the upgrade handshake.
    ///
    /// # Arguments
    ///
    /// * `peer_id` - Process-unique id assigned at accept time
    /// * `group` - Channel selected by the request path
    /// * `hub` - Handle to the hub actor
    /// * `relay` - Input relay used by client peers
    /// * `screen_events` - Screen subscription, `Some` only for screen peers
    /// * `cancel_token` - Shutdown token
    pub fn new(
        peer_id: PeerId,
        group: Group,
        hub: HubHandle,
        relay: InputRelay,
        screen_events: Option<broadcast::Receiver<ScreenEvent>>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            peer_id,
            group,
            hub,
            relay,
            screen_events,
            cancel_token,
        }
    }

    /// Runs the connection until the socket closes or shutdown is requested.
    ///
    /// The peer is always unregistered before this returns, so the group
    /// count is re-announced exactly once per connection.
    pub async fn run<S>(mut self, ws: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (peer, outbound) = Peer::channel(self.peer_id, self.group);

        match self.hub.connect(peer).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(peer = %self.peer_id, "Peer id already registered, dropping connection");
                return;
            }
            Err(e) => {
                warn!(peer = %self.peer_id, error = %e, "Hub unavailable, dropping connection");
                return;
            }
        }

        if let Err(e) = self.process(ws, outbound).await {
            debug!(peer = %self.peer_id, group = %self.group, error = %e, "Connection ended with error");
        }

        if let Err(e) = self.hub.disconnect(self.peer_id).await {
            debug!(peer = %self.peer_id, error = %e, "Hub gone before disconnect");
        }
    }

    /// Main receive/forward loop.
    async fn process<S>(
        &mut self,
        ws: WebSocketStream<S>,
        mut outbound: mpsc::Receiver<String>,
    ) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut ws_tx, mut ws_rx) = ws.split();
        let mut screen_events = self.screen_events.take();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!(peer = %self.peer_id, "Closing connection for shutdown");
                    // Best effort; the peer may already be gone
                    let _ = send_frame(&mut ws_tx, Message::Close(None)).await;
                    return Ok(());
                }

                msg = ws_rx.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => return Err(ConnectionError::websocket(e)),
                        None => return Ok(()),
                    };

                    match msg {
                        Message::Text(text) => self.handle_text(&text).await?,
                        Message::Ping(data) => send_frame(&mut ws_tx, Message::Pong(data)).await?,
                        Message::Close(_) => {
                            debug!(peer = %self.peer_id, "Peer sent close frame");
                            return Ok(());
                        }
                        // Binary frames carry nothing on any channel
                        _ => {}
                    }
                }

                Some(text) = outbound.recv() => {
                    send_frame(&mut ws_tx, Message::Text(text)).await?;
                }

                event = recv_screen_event(&mut screen_events) => {
                    match event {
                        Ok(event) => match serde_json::to_string(&event) {
                            Ok(json) => send_frame(&mut ws_tx, Message::Text(json)).await?,
                            Err(e) => warn!(peer = %self.peer_id, error = %e, "Failed to serialize screen event"),
                        },
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %self.peer_id, skipped = n, "Screen lagged, skipped events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!(peer = %self.peer_id, "Screen fan-out closed");
                            screen_events = None;
                        }
                    }
                }
            }
        }
    }

    /// Handles one inbound text frame according to the peer's channel.
    ///
    /// Only a closed hub is an error; every other failure drops the frame.
    async fn handle_text(&self, text: &str) -> Result<(), ConnectionError> {
        match self.group {
            Group::Config => match ConfigCommand::parse(text) {
                Ok(Some(command)) => {
                    let name = command.name();
                    match self.hub.dispatch(self.peer_id, command).await {
                        Ok(()) => trace!(peer = %self.peer_id, command = name, "Applied config command"),
                        Err(HubError::ChannelClosed) => return Err(ConnectionError::HubClosed),
                        Err(HubError::Domain(e)) => {
                            warn!(peer = %self.peer_id, command = name, error = %e, "Rejected config command");
                        }
                    }
                }
                Ok(None) => {
                    trace!(peer = %self.peer_id, "Ignoring unknown config command");
                }
                Err(e) => {
                    debug!(peer = %self.peer_id, error = %e, "Dropping config frame");
                }
            },
            Group::Client => {
                if let Err(e) = self.relay.relay(self.peer_id, text) {
                    debug!(peer = %self.peer_id, error = %e, "Dropping client frame");
                }
            }
            Group::Screen => {
                trace!(peer = %self.peer_id, "Ignoring inbound screen frame");
            }
        }
        Ok(())
    }
}

/// Waits on the screen subscription, or forever when there is none.
async fn recv_screen_event(
    events: &mut Option<broadcast::Receiver<ScreenEvent>>,
) -> Result<ScreenEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Sends one frame with a write timeout.
async fn send_frame<W>(sink: &mut W, message: Message) -> Result<(), ConnectionError>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    match timeout(WRITE_TIMEOUT, sink.send(message)).await {
        Ok(result) => result.map_err(ConnectionError::websocket),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Errors that end a single connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Hub closed")]
    HubClosed,
}

impl ConnectionError {
    fn websocket(err: tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}
