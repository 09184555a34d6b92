// [libs/infra/mesh-transport/src/pool.rs]
//! A registry of live outbound sockets, keyed by remote address. The gossip
//! engine broadcasts through this pool rather than tracking sockets itself;
//! the pool is the only thing that needs to know which sender maps to which
//! address.

use crate::connection::PeerConnection;
use crate::error::{Result, TransportError};
use fleetmesh_domain::Envelope;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use tracing::instrument;

#[derive(Default)]
pub struct ConnectionPool {
    connections: RwLock<HashMap<SocketAddr, PeerConnection>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conn: PeerConnection) {
        self.connections.write().unwrap().insert(conn.remote_addr, conn);
    }

    pub fn remove(&self, addr: &SocketAddr) {
        self.connections.write().unwrap().remove(addr);
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.connections.read().unwrap().contains_key(addr)
    }

    pub fn len(&self) -> usize {
        self.connections.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.connections.read().unwrap().keys().copied().collect()
    }

    pub fn send_to(&self, addr: &SocketAddr, envelope: Envelope) -> Result<()> {
        let conns = self.connections.read().unwrap();
        let conn = conns.get(addr).ok_or(TransportError::NoSuchPeer(*addr))?;
        if !conn.send(envelope) {
            return Err(TransportError::NoSuchPeer(*addr));
        }
        Ok(())
    }

    /// Forward `envelope` to every connected peer other than `exclude`.
    /// This is the mechanism behind the gossip engine's re-broadcast rule:
    /// a mutation received from one peer is fanned out to everyone else,
    /// never echoed back to its sender.
    #[instrument(skip(self, envelope), fields(kind = ?envelope.kind))]
    pub fn broadcast(&self, envelope: Envelope, exclude: Option<SocketAddr>) {
        let conns = self.connections.read().unwrap();
        for (addr, conn) in conns.iter() {
            if Some(*addr) == exclude {
                continue;
            }
            conn.send(envelope.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmesh_domain::{MessageKind, NodeId};
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn fake_conn(addr: SocketAddr) -> (PeerConnection, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PeerConnection::for_test(addr, tx), rx)
    }

    #[tokio::test]
    async fn broadcast_skips_the_excluded_address() {
        let pool = ConnectionPool::new();
        let addr_a: SocketAddr = "127.0.0.1:7001".parse().unwrap();
        let addr_b: SocketAddr = "127.0.0.1:7002".parse().unwrap();
        let (conn_a, mut rx_a) = fake_conn(addr_a);
        let (conn_b, mut rx_b) = fake_conn(addr_b);
        pool.insert(conn_a);
        pool.insert(conn_b);

        let env = Envelope::new(MessageKind::Ping, NodeId::new(), 1, Value::Null);
        pool.broadcast(env, Some(addr_a));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_unknown_peer_errors() {
        let pool = ConnectionPool::new();
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let env = Envelope::new(MessageKind::Ping, NodeId::new(), 1, Value::Null);
        assert!(pool.send_to(&addr, env).is_err());
    }
}
