//! Hub actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `HubActor`:
//! - `HubCommand`: Commands sent to the actor
//! - `HubError`: Errors that can occur during hub operations
//! - `HubEvent`: Events published by the hub for observers

use garden_core::{ConnectedCounts, CountdownState, DomainError, Group};
use garden_protocol::ConfigCommand;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::registry::{Peer, PeerId};

// ============================================================================
// Hub Commands
// ============================================================================

/// Commands sent to the hub actor.
///
/// Request-style commands carry a oneshot channel for the response.
#[derive(Debug)]
pub enum HubCommand {
    /// Register a newly accepted peer.
    ///
    /// Responds `false` if a peer with the same id was already registered.
    Connect {
        peer: Peer,
        respond_to: oneshot::Sender<bool>,
    },

    /// Unregister a peer whose connection ended.
    ///
    /// Responds `false` if the peer was already gone.
    Disconnect {
        peer_id: PeerId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Apply a command received from a config peer.
    ///
    /// # Errors
    /// - `HubError::Domain` if a duration value is invalid
    Dispatch {
        peer_id: PeerId,
        command: ConfigCommand,
        respond_to: oneshot::Sender<Result<(), HubError>>,
    },

    /// Get live counts for every group.
    GetCounts {
        respond_to: oneshot::Sender<ConnectedCounts>,
    },

    /// Get the current countdown state.
    GetCountdown {
        respond_to: oneshot::Sender<CountdownState>,
    },

    /// Advance the countdown by one tick interval.
    ///
    /// Fire-and-forget, sent by the tick task.
    Tick,

    /// Broadcast the counts of every group.
    ///
    /// Fire-and-forget, sent when a config connection's grace delay ends.
    AnnounceCounts,
}

// ============================================================================
// Hub Errors
// ============================================================================

/// Errors that can occur during hub operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("hub channel closed")]
    ChannelClosed,

    /// A command carried a value the domain rejects.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

// ============================================================================
// Hub Events
// ============================================================================

/// Events published by the hub to in-process observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    PeerConnected { peer_id: PeerId, group: Group },

    PeerDisconnected { peer_id: PeerId, group: Group },

    /// A group's count was announced to config peers.
    CountAnnounced { group: Group, count: usize },

    /// The countdown changed (command or tick).
    Countdown(CountdownState),

    /// The countdown reached zero on its own.
    CountdownFinished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_error_display() {
        assert_eq!(HubError::ChannelClosed.to_string(), "hub channel closed");

        let err = HubError::from(DomainError::InvalidDuration {
            value: "\"soon\"".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Invalid duration: \"soon\" (expected a non-negative integer of milliseconds)"
        );
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        let (tx, rx) = oneshot::channel::<Result<(), HubError>>();
        drop(tx);
        assert!(rx.await.is_err());
    }
}
