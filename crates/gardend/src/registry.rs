//! Membership bookkeeping for connected peers.
//!
//! The registry stores each peer's outbound sender, never its socket. A
//! peer counts as connected only while that sender's channel is open, so
//! counts stay correct even when a connection task dies before its
//! unregister command reaches the hub.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use garden_core::{ConnectedCounts, Group};

/// Outbound buffer per peer. A peer that falls this far behind misses
/// broadcasts until it catches up.
pub const PEER_BUFFER: usize = 64;

/// Sender half of a peer's outbound text queue.
pub type PeerSender = mpsc::Sender<String>;

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// One connected, group-tagged channel.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    pub group: Group,
    pub connected_at: DateTime<Utc>,
    sender: PeerSender,
}

impl Peer {
    /// Creates a peer around the sender its connection task drains.
    pub fn new(id: PeerId, group: Group, sender: PeerSender) -> Self {
        Self {
            id,
            group,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Creates a peer together with the receiver for its outbound queue.
    pub fn channel(id: PeerId, group: Group) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(PEER_BUFFER);
        (Self::new(id, group, tx), rx)
    }

    /// Returns true while the connection task still drains this peer.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queues a text frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns `SendFailure` if the connection is gone or its queue is full.
    /// The frame is dropped either way.
    pub fn send(&self, text: String) -> Result<(), SendFailure> {
        self.sender.try_send(text).map_err(|e| match e {
            TrySendError::Closed(_) => SendFailure::Closed(self.id),
            TrySendError::Full(_) => SendFailure::Full(self.id),
        })
    }
}

/// A frame could not be queued for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendFailure {
    #[error("send to {0} failed: channel closed")]
    Closed(PeerId),

    #[error("send to {0} failed: queue full")]
    Full(PeerId),
}

/// Live peers keyed by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    peers: BTreeMap<PeerId, Peer>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer to its group.
    ///
    /// Returns `false` (and changes nothing) if a peer with the same id is
    /// already registered.
    pub fn register(&mut self, peer: Peer) -> bool {
        if self.peers.contains_key(&peer.id) {
            return false;
        }
        self.peers.insert(peer.id, peer);
        true
    }

    /// Removes a peer from whichever group holds it.
    ///
    /// Returns the removed peer, or `None` if it was already gone.
    pub fn unregister(&mut self, peer_id: PeerId) -> Option<Peer> {
        self.peers.remove(&peer_id)
    }

    /// Number of peers in `group` whose channel is still open.
    pub fn count_of(&self, group: Group) -> usize {
        self.open_in(group).count()
    }

    /// Counts for all groups, read from current channel state.
    pub fn counts(&self) -> ConnectedCounts {
        ConnectedCounts::collect(|group| self.count_of(group))
    }

    /// Copies the open peers of a group so callers can send without
    /// holding a borrow on the registry.
    pub fn snapshot(&self, group: Group) -> Vec<Peer> {
        self.open_in(group).cloned().collect()
    }

    pub fn get(&self, peer_id: PeerId) -> Option<&Peer> {
        self.peers.get(&peer_id)
    }

    /// Total registered peers, open or not.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn open_in(&self, group: Group) -> impl Iterator<Item = &Peer> {
        self.peers
            .values()
            .filter(move |p| p.group == group && p.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let mut registry = SessionRegistry::new();
        let mut receivers = Vec::new();
        for id in 0..3 {
            let (peer, rx) = Peer::channel(PeerId::new(id), Group::Config);
            assert!(registry.register(peer));
            receivers.push(rx);
        }
        let (screen, _screen_rx) = Peer::channel(PeerId::new(10), Group::Screen);
        registry.register(screen);

        assert_eq!(registry.count_of(Group::Config), 3);
        assert_eq!(registry.count_of(Group::Screen), 1);
        assert_eq!(registry.count_of(Group::Client), 0);

        registry.unregister(PeerId::new(1));
        assert_eq!(registry.count_of(Group::Config), 2);
    }

    #[test]
    fn test_register_same_peer_twice_does_not_double_count() {
        let mut registry = SessionRegistry::new();
        let (peer, _rx) = Peer::channel(PeerId::new(4), Group::Client);

        assert!(registry.register(peer.clone()));
        assert!(!registry.register(peer));
        assert_eq!(registry.count_of(Group::Client), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = SessionRegistry::new();
        let (peer, _rx) = Peer::channel(PeerId::new(4), Group::Screen);
        registry.register(peer);

        assert!(registry.unregister(PeerId::new(4)).is_some());
        assert!(registry.unregister(PeerId::new(4)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_closed_channel_is_not_counted() {
        let mut registry = SessionRegistry::new();
        let (open, _open_rx) = Peer::channel(PeerId::new(1), Group::Config);
        let (closed, closed_rx) = Peer::channel(PeerId::new(2), Group::Config);
        registry.register(open);
        registry.register(closed);

        drop(closed_rx);

        assert_eq!(registry.count_of(Group::Config), 1);
        assert_eq!(registry.len(), 2);
        let snapshot = registry.snapshot(Group::Config);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, PeerId::new(1));
    }

    #[test]
    fn test_counts_cover_every_group() {
        let mut registry = SessionRegistry::new();
        let mut receivers = Vec::new();
        for (id, group) in [
            (1, Group::Config),
            (2, Group::Screen),
            (3, Group::Client),
            (4, Group::Client),
        ] {
            let (peer, rx) = Peer::channel(PeerId::new(id), group);
            registry.register(peer);
            receivers.push(rx);
        }

        let counts = registry.counts();
        assert_eq!(
            counts,
            ConnectedCounts {
                configs: 1,
                screens: 1,
                clients: 2
            }
        );
    }

    #[test]
    fn test_send_failure_reasons() {
        let (tx, rx) = mpsc::channel(1);
        let peer = Peer::new(PeerId::new(9), Group::Config, tx);

        assert!(peer.send("one".to_string()).is_ok());
        let full = peer.send("two".to_string()).unwrap_err();
        assert_eq!(full, SendFailure::Full(PeerId::new(9)));
        assert_eq!(full.to_string(), "send to peer-9 failed: queue full");

        drop(rx);
        let closed = peer.send("three".to_string()).unwrap_err();
        assert_eq!(closed, SendFailure::Closed(PeerId::new(9)));
        assert_eq!(closed.to_string(), "send to peer-9 failed: channel closed");
        assert!(!peer.is_open());
    }
}
