// [apps/peer/src/kernel.rs]
//! Composition root. Builds the single `Arc<MeshEngines>` shared by every
//! connection and background loop, then spawns the listener's accept loop
//! alongside discovery, gossip housekeeping, election, anti-entropy, DHT
//! GC, and the HTTP server.

use crate::handlers::http::{self, ApiState};
use crate::mesh::dispatch::MeshEngines;
use crate::mesh::{discovery, handshake};
use crate::state::PeerState;
use fleetmesh_store::repositories::state::KEY_LAMPORT_CLOCK;
use fleetmesh_transport::MeshListener;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{info, instrument, warn};

pub struct Kernel {
    state: PeerState,
    engines: Arc<MeshEngines>,
}

impl Kernel {
    pub fn new(state: PeerState) -> Self {
        let engines = Arc::new(MeshEngines::new(state.clone()));
        Self { state, engines }
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = MeshListener::bind(self.state.config.bind_addr).await?;
        info!(addr = %self.state.config.bind_addr, "p2p listener bound");

        tokio::spawn(accept_loop(self.state.clone(), self.engines.clone(), listener));
        tokio::spawn(discovery::run_seed_dial_loop(self.state.clone(), self.engines.clone()));
        tokio::spawn(discovery::run_beacon_loop(self.state.clone(), self.engines.clone()));
        tokio::spawn(discovery::run_pex_loop(self.state.clone()));
        tokio::spawn(clock_persist_loop(self.state.clone()));
        tokio::spawn(agent_tombstone_sweep_loop(self.state.clone()));

        let election = self.engines.election.clone();
        let heartbeat_election = election.clone();
        tokio::spawn(async move { heartbeat_election.run_heartbeat_loop().await });
        tokio::spawn(async move { election.run_failure_detector_loop().await });

        tokio::spawn(run_dht_gc(self.engines.clone()));
        tokio::spawn(run_task_anti_entropy(self.engines.clone()));
        tokio::spawn(run_agent_anti_entropy(self.engines.clone()));
        tokio::spawn(run_dht_anti_entropy(self.engines.clone()));

        let api_state = ApiState {
            state: self.state.clone(),
            engines: self.engines.clone(),
        };
        let app = http::router(api_state);
        let http_addr = std::net::SocketAddr::new(self.state.config.bind_addr.ip(), self.state.config.http_port);
        let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
        info!(addr = %http_addr, "http listener bound");

        axum::serve(http_listener, app).await?;
        Ok(())
    }
}

async fn accept_loop(state: PeerState, engines: Arc<MeshEngines>, listener: MeshListener) {
    loop {
        if !state.is_running() {
            return;
        }
        match listener.accept().await {
            Ok((conn, inbound, addr)) => {
                tokio::spawn(handshake::run(state.clone(), engines.clone(), conn, inbound, addr, false));
            }
            Err(err) => warn!(%err, "accept failed"),
        }
    }
}

async fn clock_persist_loop(state: PeerState) {
    let mut ticker = interval(state.config.clock_persist_interval());
    loop {
        ticker.tick().await;
        if !state.is_running() {
            return;
        }
        if let Err(err) = state.kv.set_i64(KEY_LAMPORT_CLOCK, state.clock.current()).await {
            warn!(%err, "failed to persist lamport clock");
        }
    }
}

async fn agent_tombstone_sweep_loop(state: PeerState) {
    let sweep_secs = (state.config.tombstone_ttl_secs.max(2) as u64) / 2;
    let mut ticker = interval(std::time::Duration::from_secs(sweep_secs));
    loop {
        ticker.tick().await;
        if !state.is_running() {
            return;
        }
        match state.agents.prune_expired_tombstones().await {
            Ok(0) => {}
            Ok(n) => info!(pruned = n, "swept expired agent tombstones"),
            Err(err) => warn!(%err, "agent tombstone sweep failed"),
        }
    }
}

async fn run_dht_gc(engines: Arc<MeshEngines>) {
    engines.dht.run_gc_loop().await;
}

async fn run_task_anti_entropy(engines: Arc<MeshEngines>) {
    engines.anti_entropy.run_task_anti_entropy_loop().await;
}

async fn run_agent_anti_entropy(engines: Arc<MeshEngines>) {
    engines.anti_entropy.run_agent_anti_entropy_loop().await;
}

async fn run_dht_anti_entropy(engines: Arc<MeshEngines>) {
    engines.anti_entropy.run_dht_anti_entropy_loop().await;
}
