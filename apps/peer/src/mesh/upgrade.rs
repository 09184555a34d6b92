// [apps/peer/src/mesh/upgrade.rs]
//! Optional rolling upgrade coordinator. Not part of the consistency core —
//! it rides the same gossip transport as everything else, one
//! `UPGRADE_REQUEST` at a time, workers first and the leader last.

use crate::state::PeerState;
use fleetmesh_client::LeaderClient;
use fleetmesh_domain::{Envelope, MessageKind, NodeId};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

pub struct UpgradeCoordinator {
    state: PeerState,
    client: LeaderClient,
}

impl UpgradeCoordinator {
    pub fn new(state: PeerState) -> Self {
        Self {
            state,
            client: LeaderClient::new(),
        }
    }

    /// Restart every other peer in turn, then this node if it is the
    /// leader. Returns the node-ids that never came back within
    /// `reappear_timeout`, so the caller can decide whether to roll back.
    #[instrument(skip(self))]
    pub async fn run(&self, target_version: &str, reappear_timeout: Duration) -> Vec<NodeId> {
        let mut failures = Vec::new();
        let workers: Vec<(NodeId, SocketAddr, SocketAddr)> = self
            .state
            .registry
            .read()
            .unwrap()
            .all()
            .filter(|p| !self.state.is_leader() || p.node_id != self.state.node_id)
            .map(|p| (p.node_id, p.p2p_socket(), p.http_socket()))
            .collect();

        for (node_id, p2p_addr, http_addr) in workers {
            info!(%node_id, "sending upgrade request");
            if !self.upgrade_one(node_id, p2p_addr, http_addr, target_version, reappear_timeout).await {
                warn!(%node_id, "worker did not come back healthy after upgrade request");
                failures.push(node_id);
            }
        }

        if self.state.is_leader() {
            info!("restarting self as leader, last in the upgrade sequence");
            let lamport_ts = self.state.clock.tick();
            let envelope = Envelope::new(
                MessageKind::UpgradeRequest,
                self.state.node_id,
                lamport_ts,
                serde_json::json!({ "target_version": target_version, "self_restart": true }),
            );
            self.state.pool.broadcast(envelope, None);
            self.state.shut_down();
        }

        failures
    }

    async fn upgrade_one(
        &self,
        node_id: NodeId,
        p2p_addr: SocketAddr,
        http_addr: SocketAddr,
        target_version: &str,
        reappear_timeout: Duration,
    ) -> bool {
        let lamport_ts = self.state.clock.tick();
        let payload = serde_json::json!({ "target_version": target_version, "self_restart": false });
        let envelope = Envelope::new(MessageKind::UpgradeRequest, self.state.node_id, lamport_ts, payload);
        if self.state.pool.send_to(&p2p_addr, envelope).is_err() {
            warn!(%node_id, %p2p_addr, "upgrade request could not be delivered, peer already gone");
        }

        let deadline = tokio::time::Instant::now() + reappear_timeout;
        let poll_interval = Duration::from_millis(500);
        let mut seen_disconnect = false;
        loop {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            let connected = self.state.registry.read().unwrap().contains_node(&node_id);
            if !connected {
                seen_disconnect = true;
            }
            if seen_disconnect && connected {
                break;
            }
            sleep(poll_interval).await;
        }

        match self.client.health_check(http_addr, Duration::from_secs(5)).await {
            Ok(true) => true,
            Ok(false) | Err(_) => false,
        }
    }
}
