// [apps/gateway/src/state.rs]
//! The gateway's only mutable state: its current belief about who the
//! leader is, and the set of currently open upstream WebSocket pumps so a
//! leader change can close all of them at once.

use crate::config::Config;
use fleetmesh_client::LeaderClient;
use fleetmesh_domain::NodeId;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct LeaderInfo {
    pub node_id: Option<NodeId>,
    pub host: Option<IpAddr>,
    pub http_port: Option<u16>,
    pub lamport_ts: i64,
}

impl LeaderInfo {
    pub fn http_addr(&self) -> Option<std::net::SocketAddr> {
        Some(std::net::SocketAddr::new(self.host?, self.http_port?))
    }
}

#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub node_id: NodeId,
    pub client: LeaderClient,
    pub leader: Arc<RwLock<LeaderInfo>>,
    pub running: Arc<AtomicBool>,
    sessions: Arc<RwLock<HashMap<u64, CancellationToken>>>,
    next_session_id: Arc<AtomicU64>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            node_id: NodeId::new(),
            client: LeaderClient::new(),
            leader: Arc::new(RwLock::new(LeaderInfo::default())),
            running: Arc::new(AtomicBool::new(true)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_session_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shut_down(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.close_all_upstream_sockets();
    }

    pub fn current_leader(&self) -> LeaderInfo {
        self.leader.read().unwrap().clone()
    }

    /// Adopt `candidate` if it is unknown or has a lower node-id than the
    /// one currently recorded — the same bully comparison the mesh itself
    /// uses, so the gateway converges on the same leader every peer does.
    pub fn consider_leader(&self, candidate: NodeId, host: IpAddr, http_port: u16, lamport_ts: i64) {
        let mut current = self.leader.write().unwrap();
        let should_adopt = match current.node_id {
            None => true,
            Some(existing) => candidate < existing,
        };
        if should_adopt {
            *current = LeaderInfo {
                node_id: Some(candidate),
                host: Some(host),
                http_port: Some(http_port),
                lamport_ts,
            };
        }
    }

    /// Register a freshly dialed upstream WebSocket pump so a leader change
    /// can cancel it. Returns the token the pump task should select on.
    pub fn register_upstream_session(&self) -> (u64, CancellationToken) {
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        self.sessions.write().unwrap().insert(id, token.clone());
        (id, token)
    }

    pub fn deregister_upstream_session(&self, id: u64) {
        self.sessions.write().unwrap().remove(&id);
    }

    /// Close every currently open upstream WebSocket pump. Called on
    /// `ELECTION_VICTORY` so clients reconnect and bind to the new leader.
    pub fn close_all_upstream_sockets(&self) {
        let sessions = std::mem::take(&mut *self.sessions.write().unwrap());
        for (_, token) in sessions {
            token.cancel();
        }
    }
}
