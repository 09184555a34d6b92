// [libs/domain/mesh-domain/src/peer.rs]
//! Peer — what one node knows about another member of the mesh.
//!
//! `Peer` is the registry's unit of record. It is distinct from `Agent`:
//! a peer is a *process* taking part in the coordination plane, an agent is
//! *work hosted on* a peer.

use crate::ids::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRole {
    Leader,
    Worker,
    Gateway,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub node_id: NodeId,
    pub address: IpAddr,
    pub p2p_port: u16,
    pub http_port: u16,
    pub role: PeerRole,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Peer {
    pub fn new(node_id: NodeId, address: IpAddr, p2p_port: u16, http_port: u16, role: PeerRole) -> Self {
        let now = Utc::now();
        Self {
            node_id,
            address,
            p2p_port,
            http_port,
            role,
            first_seen: now,
            last_seen: now,
        }
    }

    pub fn p2p_socket(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.address, self.p2p_port)
    }

    pub fn http_socket(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.address, self.http_port)
    }

    pub fn seen_now(&self) -> Self {
        let mut next = self.clone();
        next.last_seen = Utc::now();
        next
    }

    pub fn with_role(&self, role: PeerRole) -> Self {
        let mut next = self.clone();
        next.role = role;
        next
    }

    pub fn is_stale(&self, stale_after_secs: i64) -> bool {
        Utc::now().signed_duration_since(self.last_seen).num_seconds() >= stale_after_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample() -> Peer {
        Peer::new(NodeId::new(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 7700, 8080, PeerRole::Worker)
    }

    #[test]
    fn new_peer_defaults_to_worker_role() {
        let p = sample();
        assert_eq!(p.role, PeerRole::Worker);
    }

    #[test]
    fn with_role_does_not_mutate_the_original() {
        let p = sample();
        let leader = p.with_role(PeerRole::Leader);
        assert_eq!(p.role, PeerRole::Worker);
        assert_eq!(leader.role, PeerRole::Leader);
    }

    #[test]
    fn staleness_is_relative_to_last_seen() {
        let mut p = sample();
        p.last_seen = Utc::now() - chrono::Duration::seconds(60);
        assert!(p.is_stale(30));
        assert!(!p.is_stale(120));
    }
}
