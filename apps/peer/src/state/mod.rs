// [apps/peer/src/state/mod.rs]
//! Shared state for one mesh peer. Every background loop and every HTTP
//! handler holds a clone of `PeerState` — it is the composition root's
//! single source of truth, handed out once in `kernel.rs` and never
//! rebuilt.

pub mod registry;

use crate::config::Config;
use crate::mesh::dedup::SeenSet;
use fleetmesh_domain::{LamportClock, NodeId};
use fleetmesh_store::{AgentRepository, DhtRepository, MeshStoreClient, StateRepository, TaskRepository};
use fleetmesh_transport::ConnectionPool;
use registry::PeerRegistry;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// The mesh's current belief about who the leader is. Updated by the
/// election engine on every HELLO, EMPEROR_HEARTBEAT and ELECTION_VICTORY,
/// per the gateway-tracking rule in the coordination design.
#[derive(Debug, Clone, Default)]
pub struct LeaderInfo {
    pub node_id: Option<NodeId>,
    pub host: Option<IpAddr>,
    pub http_port: Option<u16>,
    pub lamport_ts: i64,
}

#[derive(Clone)]
pub struct PeerState {
    pub node_id: NodeId,
    pub config: Arc<Config>,
    pub clock: Arc<LamportClock>,
    pub store: MeshStoreClient,
    pub tasks: Arc<TaskRepository>,
    pub agents: Arc<AgentRepository>,
    pub dht: Arc<DhtRepository>,
    pub kv: Arc<StateRepository>,
    pub pool: Arc<ConnectionPool>,
    pub registry: Arc<RwLock<PeerRegistry>>,
    pub seen: Arc<Mutex<SeenSet>>,
    pub leader: Arc<RwLock<LeaderInfo>>,
    pub is_leader: Arc<AtomicBool>,
    pub running: Arc<AtomicBool>,
}

impl PeerState {
    pub fn new(config: Arc<Config>, node_id: NodeId, clock: LamportClock, store: MeshStoreClient) -> Self {
        let seen_capacity = config.seen_set_capacity;
        Self {
            node_id,
            config,
            clock: Arc::new(clock),
            tasks: Arc::new(TaskRepository::new(store.clone())),
            agents: Arc::new(AgentRepository::new(store.clone())),
            dht: Arc::new(DhtRepository::new(store.clone())),
            kv: Arc::new(StateRepository::new(store.clone())),
            store,
            pool: Arc::new(ConnectionPool::new()),
            registry: Arc::new(RwLock::new(PeerRegistry::new())),
            seen: Arc::new(Mutex::new(SeenSet::new(seen_capacity))),
            leader: Arc::new(RwLock::new(LeaderInfo::default())),
            is_leader: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub fn set_leader(&self, info: LeaderInfo) {
        let am_leader = info.node_id == Some(self.node_id);
        self.is_leader.store(am_leader, Ordering::SeqCst);
        *self.leader.write().unwrap() = info;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shut_down(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
