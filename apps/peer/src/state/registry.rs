// [apps/peer/src/state/registry.rs]
//! Peer registry: node-id -> connection, address -> node-id. Not durable —
//! rebuilt from scratch every time a peer restarts, via discovery and the
//! hello handshake.

use fleetmesh_domain::{NodeId, Peer};
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct PeerRegistry {
    by_node: HashMap<NodeId, Peer>,
    addr_to_node: HashMap<SocketAddr, NodeId>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a peer learned from an inbound HELLO. Enforces
    /// uniqueness by node-id: if `peer.node_id` is already registered under a
    /// different address, the old mapping is dropped in favour of the new
    /// one — the caller is responsible for actually closing the superseded
    /// connection in the transport layer.
    pub fn upsert(&mut self, addr: SocketAddr, peer: Peer) -> Option<SocketAddr> {
        let mut superseded = None;
        if let Some(existing) = self.by_node.get(&peer.node_id) {
            if existing.p2p_socket() != addr {
                superseded = Some(existing.p2p_socket());
                self.addr_to_node.remove(&existing.p2p_socket());
                info!(node_id = %peer.node_id, old = %existing.p2p_socket(), new = %addr, "peer reconnected from a new address, evicting stale mapping");
            }
        }
        self.addr_to_node.insert(addr, peer.node_id);
        self.by_node.insert(peer.node_id, peer);
        superseded
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<Peer> {
        let node_id = self.addr_to_node.remove(addr)?;
        let peer = self.by_node.remove(&node_id);
        debug!(%node_id, %addr, "peer removed from registry");
        peer
    }

    pub fn remove_by_node(&mut self, node_id: &NodeId) -> Option<Peer> {
        let peer = self.by_node.remove(node_id)?;
        self.addr_to_node.remove(&peer.p2p_socket());
        Some(peer)
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&Peer> {
        self.by_node.get(node_id)
    }

    pub fn node_for_addr(&self, addr: &SocketAddr) -> Option<NodeId> {
        self.addr_to_node.get(addr).copied()
    }

    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.by_node.contains_key(node_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Peer> {
        self.by_node.values()
    }

    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.addr_to_node.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// A random subset of known peer addresses, for peer-exchange gossip.
    pub fn random_sample(&self, n: usize) -> Vec<SocketAddr> {
        use rand::seq::SliceRandom;
        let mut addrs = self.addresses();
        addrs.shuffle(&mut rand::thread_rng());
        addrs.truncate(n);
        addrs
    }

    /// A single random peer address, used by the anti-entropy loop.
    pub fn random_peer(&self) -> Option<SocketAddr> {
        use rand::seq::SliceRandom;
        self.addresses().choose(&mut rand::thread_rng()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmesh_domain::PeerRole;
    use std::net::IpAddr;

    fn peer_at(port: u16) -> (SocketAddr, Peer) {
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        (addr, Peer::new(NodeId::new(), ip, port, port + 1000, PeerRole::Worker))
    }

    #[test]
    fn upsert_then_lookup_round_trips() {
        let mut reg = PeerRegistry::new();
        let (addr, peer) = peer_at(7001);
        let node_id = peer.node_id;
        reg.upsert(addr, peer);
        assert_eq!(reg.node_for_addr(&addr), Some(node_id));
        assert!(reg.contains_node(&node_id));
    }

    #[test]
    fn upsert_from_new_address_evicts_old_mapping() {
        let mut reg = PeerRegistry::new();
        let (addr1, peer) = peer_at(7002);
        let node_id = peer.node_id;
        reg.upsert(addr1, peer.clone());

        let addr2: SocketAddr = "127.0.0.1:7999".parse().unwrap();
        let moved = Peer::new(node_id, peer.address, 7999, peer.http_port, peer.role);
        let superseded = reg.upsert(addr2, moved);

        assert_eq!(superseded, Some(addr1));
        assert_eq!(reg.node_for_addr(&addr1), None);
        assert_eq!(reg.node_for_addr(&addr2), Some(node_id));
    }

    #[test]
    fn remove_by_addr_clears_both_indexes() {
        let mut reg = PeerRegistry::new();
        let (addr, peer) = peer_at(7003);
        let node_id = peer.node_id;
        reg.upsert(addr, peer);
        reg.remove_by_addr(&addr);
        assert!(!reg.contains_node(&node_id));
        assert_eq!(reg.node_for_addr(&addr), None);
    }
}
