//! Peer registry
//!
//! Resolves an announced peer name plus source address to a stable
//! identity. One registry instance is shared by every connection and is
//! the single source of truth mapping announcements to later protocol
//! exchanges.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// A discovered CITP participant
#[derive(Debug)]
pub struct Peer {
    pub id: Uuid,
    pub name: String,
    pub addr: IpAddr,
    pub first_seen: Instant,
}

/// Shared peer table keyed by (name, address)
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: DashMap<(String, IpAddr), Arc<Peer>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-match lookup; no fuzzy matching.
    pub fn find_peer(&self, name: &str, addr: IpAddr) -> Option<Arc<Peer>> {
        self.peers
            .get(&(name.to_owned(), addr))
            .map(|entry| Arc::clone(&entry))
    }

    /// Creates and stores a new identity, replacing any previous entry
    /// for the same key.
    pub fn add_peer(&self, name: &str, addr: IpAddr) -> Arc<Peer> {
        let peer = Arc::new(Peer {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            addr,
            first_seen: Instant::now(),
        });
        debug!(name = %peer.name, %addr, "registered peer");
        self.peers.insert((name.to_owned(), addr), Arc::clone(&peer));
        peer
    }

    /// Looks the peer up, creating it on first contact.
    pub fn find_or_add(&self, name: &str, addr: IpAddr) -> Arc<Peer> {
        self.find_peer(name, addr)
            .unwrap_or_else(|| self.add_peer(name, addr))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
