// [apps/peer/src/mesh/anti_entropy.rs]
//! Periodic repair for whatever gossip missed. Each loop picks one random
//! connected peer, tells it the highest lamport timestamp already on disk,
//! and lets the peer reply with everything newer. Tasks get an extra rule:
//! a leader's response never includes archived rows, and a leader's
//! ingestion of a sync response never imports a foreign task wholesale —
//! it only patches the branch name in, per the authority-asymmetry rule.

use crate::state::PeerState;
use anyhow::{Context, Result};
use fleetmesh_domain::{Agent, DhtEntry, Envelope, MessageKind, Task};
use std::net::SocketAddr;
use tokio::time::interval;
use tracing::{instrument, warn};

pub struct AntiEntropyEngine {
    state: PeerState,
}

impl AntiEntropyEngine {
    pub fn new(state: PeerState) -> Self {
        Self { state }
    }

    /// Fire all three sync requests at a peer immediately after it says
    /// hello, rather than waiting for the next periodic tick.
    pub fn trigger_eager_sync(&self, addr: SocketAddr) {
        self.request_task_sync(addr);
        self.request_agent_sync(addr);
        self.request_dht_sync(addr);
    }

    fn request_task_sync(&self, addr: SocketAddr) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let since = state.tasks.max_lamport_ts().await.unwrap_or(0);
            let payload = serde_json::json!({ "since_lamport_ts": since });
            let envelope = Envelope::new(MessageKind::TaskSyncReq, state.node_id, state.clock.current(), payload);
            state.pool.send_to(&addr, envelope).ok();
        });
    }

    fn request_agent_sync(&self, addr: SocketAddr) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let since = state.agents.max_lamport_ts().await.unwrap_or(0);
            let payload = serde_json::json!({ "since_lamport_ts": since });
            let envelope = Envelope::new(MessageKind::AgentSyncReq, state.node_id, state.clock.current(), payload);
            state.pool.send_to(&addr, envelope).ok();
        });
    }

    fn request_dht_sync(&self, addr: SocketAddr) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let since = state.dht.max_lamport_ts().await.unwrap_or(0);
            let payload = serde_json::json!({ "since_lamport_ts": since });
            let envelope = Envelope::new(MessageKind::DhtSyncReq, state.node_id, state.clock.current(), payload);
            state.pool.send_to(&addr, envelope).ok();
        });
    }

    // ---------------------------------------------------------------
    // Requests (inbound SYNC_REQ -> respond with what's newer)
    // ---------------------------------------------------------------

    #[instrument(skip(self, envelope))]
    pub async fn handle_task_sync_req(&self, envelope: &Envelope, from_addr: SocketAddr) -> Result<()> {
        let since = since_lamport_ts(envelope)?;
        let tasks = if self.state.is_leader() {
            self.state.tasks.list_since_excluding_archived(since).await?
        } else {
            self.state.tasks.list_since(since).await?
        };
        let response = Envelope::new(
            MessageKind::TaskSyncRsp,
            self.state.node_id,
            self.state.clock.current(),
            serde_json::to_value(&tasks)?,
        );
        self.state.pool.send_to(&from_addr, response).ok();
        Ok(())
    }

    #[instrument(skip(self, envelope))]
    pub async fn handle_agent_sync_req(&self, envelope: &Envelope, from_addr: SocketAddr) -> Result<()> {
        let since = since_lamport_ts(envelope)?;
        let agents = self.state.agents.list_since(since).await?;
        let response = Envelope::new(
            MessageKind::AgentSyncRsp,
            self.state.node_id,
            self.state.clock.current(),
            serde_json::to_value(&agents)?,
        );
        self.state.pool.send_to(&from_addr, response).ok();
        Ok(())
    }

    #[instrument(skip(self, envelope))]
    pub async fn handle_dht_sync_req(&self, envelope: &Envelope, from_addr: SocketAddr) -> Result<()> {
        let since = since_lamport_ts(envelope)?;
        let entries = self.state.dht.list_since(since).await?;
        let response = Envelope::new(
            MessageKind::DhtSyncRsp,
            self.state.node_id,
            self.state.clock.current(),
            serde_json::to_value(&entries)?,
        );
        self.state.pool.send_to(&from_addr, response).ok();
        Ok(())
    }

    // ---------------------------------------------------------------
    // Responses (inbound SYNC_RSP -> apply under each entity's rules)
    // ---------------------------------------------------------------

    #[instrument(skip(self, envelope))]
    pub async fn handle_task_sync_rsp(&self, envelope: &Envelope) -> Result<()> {
        let tasks: Vec<Task> = serde_json::from_value(envelope.payload.clone()).context("decoding task sync response")?;
        for task in tasks {
            let engine = crate::mesh::gossip::GossipEngine::new(self.state.clone());
            if let Err(err) = engine.apply_synced_task(task).await {
                warn!(%err, "failed to apply synced task");
            }
        }
        Ok(())
    }

    #[instrument(skip(self, envelope))]
    pub async fn handle_agent_sync_rsp(&self, envelope: &Envelope) -> Result<()> {
        let agents: Vec<Agent> = serde_json::from_value(envelope.payload.clone()).context("decoding agent sync response")?;
        for agent in agents {
            let engine = crate::mesh::gossip::GossipEngine::new(self.state.clone());
            if let Err(err) = engine.apply_synced_agent(agent).await {
                warn!(%err, "failed to apply synced agent");
            }
        }
        Ok(())
    }

    #[instrument(skip(self, envelope))]
    pub async fn handle_dht_sync_rsp(&self, envelope: &Envelope) -> Result<()> {
        let entries: Vec<DhtEntry> = serde_json::from_value(envelope.payload.clone()).context("decoding dht sync response")?;
        let dht = crate::mesh::dht::DhtEngine::new(self.state.clone());
        for entry in entries {
            if let Err(err) = dht.sync_apply(entry).await {
                warn!(%err, "failed to apply synced dht entry");
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Periodic loops
    // ---------------------------------------------------------------

    pub async fn run_task_anti_entropy_loop(&self) {
        let mut ticker = interval(self.state.config.anti_entropy_interval());
        loop {
            ticker.tick().await;
            if !self.state.is_running() {
                return;
            }
            if let Some(addr) = self.state.registry.read().unwrap().random_peer() {
                self.request_task_sync(addr);
            }
        }
    }

    pub async fn run_agent_anti_entropy_loop(&self) {
        let mut ticker = interval(self.state.config.anti_entropy_agent_interval());
        loop {
            ticker.tick().await;
            if !self.state.is_running() {
                return;
            }
            if let Some(addr) = self.state.registry.read().unwrap().random_peer() {
                self.request_agent_sync(addr);
            }
        }
    }

    pub async fn run_dht_anti_entropy_loop(&self) {
        let mut ticker = interval(self.state.config.anti_entropy_dht_interval());
        loop {
            ticker.tick().await;
            if !self.state.is_running() {
                return;
            }
            if let Some(addr) = self.state.registry.read().unwrap().random_peer() {
                self.request_dht_sync(addr);
            }
        }
    }
}

fn since_lamport_ts(envelope: &Envelope) -> Result<i64> {
    envelope.payload["since_lamport_ts"]
        .as_i64()
        .context("sync request missing since_lamport_ts")
}
