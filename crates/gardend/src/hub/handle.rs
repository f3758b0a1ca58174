//! Client interface for interacting with the HubActor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `HubError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use garden_core::{ConnectedCounts, CountdownState};
use garden_protocol::ConfigCommand;

use super::commands::{HubCommand, HubError, HubEvent};
use crate::registry::{Peer, PeerId};

/// Handle for interacting with the hub actor.
///
/// Cheap to clone; every connection task holds one. The actor stops once
/// all handles are dropped.
#[derive(Clone)]
pub struct HubHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<HubCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<HubEvent>,
}

impl HubHandle {
    pub fn new(sender: mpsc::Sender<HubCommand>, event_sender: broadcast::Sender<HubEvent>) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Registers a peer and announces its group's new count.
    ///
    /// Returns `false` if a peer with the same id was already registered.
    ///
    /// # Errors
    ///
    /// - `HubError::ChannelClosed` if the actor has shut down
    pub async fn connect(&self, peer: Peer) -> Result<bool, HubError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(HubCommand::Connect {
                peer,
                respond_to: tx,
            })
            .await
            .map_err(|_| HubError::ChannelClosed)?;

        rx.await.map_err(|_| HubError::ChannelClosed)
    }

    /// Unregisters a peer and announces its group's new count.
    ///
    /// Returns `false` if the peer was already gone.
    ///
    /// # Errors
    ///
    /// - `HubError::ChannelClosed` if the actor has shut down
    pub async fn disconnect(&self, peer_id: PeerId) -> Result<bool, HubError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(HubCommand::Disconnect {
                peer_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| HubError::ChannelClosed)?;

        rx.await.map_err(|_| HubError::ChannelClosed)
    }

    /// Applies a config command on behalf of `peer_id`.
    ///
    /// # Errors
    ///
    /// - `HubError::Domain` if the command carries an invalid duration
    /// - `HubError::ChannelClosed` if the actor has shut down
    pub async fn dispatch(&self, peer_id: PeerId, command: ConfigCommand) -> Result<(), HubError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(HubCommand::Dispatch {
                peer_id,
                command,
                respond_to: tx,
            })
            .await
            .map_err(|_| HubError::ChannelClosed)?;

        rx.await.map_err(|_| HubError::ChannelClosed)?
    }

    /// Live counts for every group.
    ///
    /// Returns zero counts if communication with the actor fails.
    pub async fn counts(&self) -> ConnectedCounts {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(HubCommand::GetCounts { respond_to: tx })
            .await
            .is_err()
        {
            return ConnectedCounts::default();
        }

        rx.await.unwrap_or_default()
    }

    /// Current countdown state, or `None` if the actor is gone.
    pub async fn countdown(&self) -> Option<CountdownState> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(HubCommand::GetCountdown { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Subscribes to hub events.
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.event_sender.subscribe()
    }

    /// Returns true while the actor is running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_reports_closed_actor() {
        let (tx, rx) = mpsc::channel(4);
        let (event_tx, _) = broadcast::channel(4);
        let handle = HubHandle::new(tx, event_tx);
        drop(rx);

        assert!(!handle.is_connected());
        assert_eq!(
            handle.dispatch(PeerId::new(1), ConfigCommand::TimerStart).await,
            Err(HubError::ChannelClosed)
        );
        assert_eq!(handle.disconnect(PeerId::new(1)).await, Err(HubError::ChannelClosed));
        assert_eq!(handle.counts().await, ConnectedCounts::default());
        assert_eq!(handle.countdown().await, None);
    }
}
