// [apps/peer/src/mesh/gossip.rs]
//! The gossip engine: `originate` assigns a timestamp, persists, and
//! broadcasts; `receive` dedups, witnesses the clock, applies under each
//! entity's invariants, and forwards to everyone except the sender. Every
//! `apply_*` method here is the single place an entity's invariant from the
//! coordination design is enforced — nothing else is allowed to write these
//! tables.

use crate::mesh::claim::remote_claim_wins;
use crate::state::PeerState;
use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use fleetmesh_domain::{
    Agent, AgentHeartbeatPayload, AgentId, AgentStatus, AgentTombstone, Envelope, MessageKind, NodeId, Task,
    TaskClaimPayload, TaskId, TaskStatus,
};
use serde_json::Value;
use std::net::SocketAddr;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub struct GossipEngine {
    state: PeerState,
}

impl GossipEngine {
    pub fn new(state: PeerState) -> Self {
        Self { state }
    }

    fn broadcast(&self, kind: MessageKind, lamport_ts: i64, payload: Value, exclude: Option<SocketAddr>) {
        let envelope = Envelope::new(kind, self.state.node_id, lamport_ts, payload);
        self.state.pool.broadcast(envelope, exclude);
    }

    fn mark_seen(&self, entity_kind: &str, entity_id: impl std::fmt::Display, kind: MessageKind, lamport_ts: i64) -> bool {
        let key = format!("{entity_kind}:{entity_id}:{kind:?}:{lamport_ts}");
        self.state.seen.lock().unwrap().check_and_insert(&key)
    }

    // ---------------------------------------------------------------
    // Origination (local leader/worker action -> gossip out)
    // ---------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn originate_task_create(&self, task: Task) -> Result<Task> {
        let mut task = task;
        task.lamport_ts = self.state.clock.tick();
        self.state.tasks.put(&task).await.context("persisting new task")?;
        self.mark_seen("task", task.id, MessageKind::TaskCreate, task.lamport_ts);
        self.broadcast(MessageKind::TaskCreate, task.lamport_ts, serde_json::to_value(&task)?, None);
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn originate_task_claim(&self, task_id: TaskId, agent_id: AgentId) -> Result<Option<Task>> {
        let Some(local) = self.state.tasks.get(task_id).await? else {
            return Ok(None);
        };
        if local.status != TaskStatus::Pending {
            return Ok(None);
        }
        let lamport_ts = self.state.clock.tick();
        let claimed = local.claimed(agent_id, self.state.node_id.0, lamport_ts);
        self.state.tasks.put(&claimed).await.context("persisting claim")?;
        self.mark_seen("task", task_id, MessageKind::TaskClaim, lamport_ts);
        let payload = TaskClaimPayload {
            task_id,
            agent_id,
            node_id: self.state.node_id.0,
        };
        self.broadcast(MessageKind::TaskClaim, lamport_ts, serde_json::to_value(&payload)?, None);
        Ok(Some(claimed))
    }

    #[instrument(skip(self, result))]
    pub async fn originate_task_complete(&self, task_id: TaskId, result: impl Into<String>) -> Result<Option<Task>> {
        self.originate_task_terminal(task_id, MessageKind::TaskComplete, |t, ts| t.completed(result, ts))
            .await
    }

    #[instrument(skip(self, error))]
    pub async fn originate_task_fail(&self, task_id: TaskId, error: impl Into<String>) -> Result<Option<Task>> {
        self.originate_task_terminal(task_id, MessageKind::TaskFail, |t, ts| t.failed(error, ts))
            .await
    }

    #[instrument(skip(self))]
    pub async fn originate_task_cancel(&self, task_id: TaskId) -> Result<Option<Task>> {
        self.originate_task_terminal(task_id, MessageKind::TaskCancel, |t, ts| t.cancelled(ts))
            .await
    }

    #[instrument(skip(self))]
    pub async fn originate_task_archive(&self, task_id: TaskId) -> Result<Option<Task>> {
        let Some(local) = self.state.tasks.get(task_id).await? else {
            return Ok(None);
        };
        let lamport_ts = self.state.clock.tick();
        let archived = local.archived(lamport_ts);
        self.state.tasks.put(&archived).await.context("persisting archive")?;
        self.mark_seen("task", task_id, MessageKind::TaskArchive, lamport_ts);
        self.broadcast(MessageKind::TaskArchive, lamport_ts, serde_json::to_value(&archived)?, None);
        Ok(Some(archived))
    }

    async fn originate_task_terminal(
        &self,
        task_id: TaskId,
        kind: MessageKind,
        transition: impl FnOnce(&Task, i64) -> Task,
    ) -> Result<Option<Task>> {
        let Some(local) = self.state.tasks.get(task_id).await? else {
            return Ok(None);
        };
        if local.status.is_terminal() {
            return Ok(None);
        }
        let lamport_ts = self.state.clock.tick();
        let next = transition(&local, lamport_ts);
        self.state.tasks.put(&next).await.context("persisting task transition")?;
        self.mark_seen("task", task_id, kind, lamport_ts);
        self.broadcast(kind, lamport_ts, serde_json::to_value(&next)?, None);
        Ok(Some(next))
    }

    #[instrument(skip(self))]
    pub async fn originate_agent_register(&self, agent: Agent) -> Result<Agent> {
        let mut agent = agent;
        agent.lamport_ts = self.state.clock.tick();
        self.state.agents.put(&agent).await.context("persisting agent")?;
        self.mark_seen("agent", agent.id, MessageKind::AgentRegister, agent.lamport_ts);
        self.broadcast(MessageKind::AgentRegister, agent.lamport_ts, serde_json::to_value(&agent)?, None);
        Ok(agent)
    }

    #[instrument(skip(self))]
    pub async fn originate_agent_heartbeat(
        &self,
        agent_id: AgentId,
        status: AgentStatus,
        current_task_id: Option<TaskId>,
    ) -> Result<Option<Agent>> {
        let Some(local) = self.state.agents.get(agent_id).await? else {
            return Ok(None);
        };
        let lamport_ts = self.state.clock.tick();
        let next = local.heartbeat(status, current_task_id, lamport_ts);
        self.state.agents.put(&next).await.context("persisting heartbeat")?;
        self.mark_seen("agent", agent_id, MessageKind::AgentHeartbeat, lamport_ts);
        let payload = AgentHeartbeatPayload {
            agent_id,
            host_node: next.host_node,
            status,
            current_task_id,
        };
        self.broadcast(MessageKind::AgentHeartbeat, lamport_ts, serde_json::to_value(&payload)?, None);
        Ok(Some(next))
    }

    #[instrument(skip(self))]
    pub async fn originate_agent_deregister(&self, agent_id: AgentId) -> Result<()> {
        let lamport_ts = self.state.clock.tick();
        let tombstone = AgentTombstone::new(agent_id, lamport_ts, ChronoDuration::seconds(self.state.config.tombstone_ttl_secs));
        self.state.agents.put_tombstone(&tombstone).await.context("writing tombstone")?;
        self.state.agents.delete(agent_id).await.context("deleting agent")?;
        self.mark_seen("agent", agent_id, MessageKind::AgentDeregister, lamport_ts);
        self.broadcast(
            MessageKind::AgentDeregister,
            lamport_ts,
            serde_json::json!({ "agent_id": agent_id }),
            None,
        );
        Ok(())
    }

    // ---------------------------------------------------------------
    // Reception (inbound mutation -> dedup, witness, apply, forward)
    // ---------------------------------------------------------------

    #[instrument(skip(self, envelope), fields(kind = ?envelope.kind, from = %envelope.from))]
    pub async fn receive(&self, envelope: Envelope, from_addr: SocketAddr) -> Result<()> {
        let entity_kind = entity_kind_for(envelope.kind);
        let entity_id = entity_id_for(&envelope)?;
        let dedup_key = envelope.dedup_key(entity_kind, entity_id);

        if !self.state.seen.lock().unwrap().check_and_insert(&dedup_key) {
            debug!(%dedup_key, "dropping duplicate gossip message");
            return Ok(());
        }

        self.state.clock.witness(envelope.lamport_ts);

        match envelope.kind {
            MessageKind::TaskCreate => self.apply_task_create(&envelope.payload).await?,
            MessageKind::TaskClaim => self.apply_task_claim(&envelope).await?,
            MessageKind::TaskUpdate | MessageKind::TaskComplete | MessageKind::TaskFail => {
                self.apply_task_merge(&envelope.payload).await?
            }
            MessageKind::TaskCancel => self.apply_task_status_gated(&envelope.payload).await?,
            MessageKind::TaskArchive => self.apply_task_status_gated(&envelope.payload).await?,
            MessageKind::AgentRegister => self.apply_agent_register(&envelope).await?,
            MessageKind::AgentHeartbeat => self.apply_agent_heartbeat(&envelope).await?,
            MessageKind::AgentDeregister => self.apply_agent_deregister(&envelope).await?,
            other => {
                warn!(kind = ?other, "gossip engine received a non-mutation kind, ignoring");
                return Ok(());
            }
        }

        self.broadcast_forward(envelope, from_addr);
        Ok(())
    }

    fn broadcast_forward(&self, envelope: Envelope, from_addr: SocketAddr) {
        self.state.pool.broadcast(envelope, Some(from_addr));
    }

    async fn apply_task_create(&self, payload: &Value) -> Result<()> {
        let incoming: Task = serde_json::from_value(payload.clone())?;
        if self.state.tasks.get(incoming.id).await?.is_some() {
            return Ok(());
        }
        self.state.tasks.put(&incoming).await?;
        Ok(())
    }

    async fn apply_task_claim(&self, envelope: &Envelope) -> Result<()> {
        let payload: TaskClaimPayload = serde_json::from_value(envelope.payload.clone())?;
        let Some(local) = self.state.tasks.get(payload.task_id).await? else {
            return Ok(());
        };

        match local.status {
            TaskStatus::Pending => {
                let claimed = local.claimed(payload.agent_id, payload.node_id, envelope.lamport_ts);
                self.state.tasks.put(&claimed).await?;
            }
            TaskStatus::Claimed => {
                let local_node = local.assigned_node.map(NodeId).unwrap_or(self.state.node_id);
                if remote_claim_wins(envelope.lamport_ts, envelope.from, local.lamport_ts, local_node) {
                    let claimed = local.claimed(payload.agent_id, payload.node_id, envelope.lamport_ts);
                    self.state.tasks.put(&claimed).await?;
                }
                // else: local claim already wins, remote claim silently disappears.
            }
            _ => { /* terminal or in-progress: claims on it are absorbed */ }
        }
        Ok(())
    }

    async fn apply_task_merge(&self, payload: &Value) -> Result<()> {
        let incoming: Task = serde_json::from_value(payload.clone())?;
        let Some(local) = self.state.tasks.get(incoming.id).await? else {
            return Ok(());
        };
        if local.status.is_terminal() {
            return Ok(());
        }
        let merged = local.merge_update(&incoming, incoming.lamport_ts);
        self.state.tasks.put(&merged).await?;
        Ok(())
    }

    async fn apply_task_status_gated(&self, payload: &Value) -> Result<()> {
        let incoming: Task = serde_json::from_value(payload.clone())?;
        let Some(local) = self.state.tasks.get(incoming.id).await? else {
            return Ok(());
        };
        if incoming.status.is_terminal() && local.status.is_terminal() {
            return Ok(());
        }
        self.state.tasks.put(&incoming).await?;
        Ok(())
    }

    /// `true` if `agent_id` belongs to this node and was created here — the
    /// host-node-ownership invariant from the coordination design's agent
    /// entity: a remote message must never overwrite a locally-owned row.
    async fn owns_agent_locally(&self, host_node: Uuid, from: NodeId) -> bool {
        host_node == self.state.node_id.0 && from != self.state.node_id
    }

    async fn apply_agent_register(&self, envelope: &Envelope) -> Result<()> {
        let incoming: Agent = serde_json::from_value(envelope.payload.clone())?;
        if self.owns_agent_locally(incoming.host_node, envelope.from).await {
            return Ok(());
        }
        if self.state.agents.is_tombstoned(incoming.id).await? {
            return Ok(());
        }
        self.state.agents.put(&incoming).await?;
        Ok(())
    }

    async fn apply_agent_heartbeat(&self, envelope: &Envelope) -> Result<()> {
        let payload: AgentHeartbeatPayload = serde_json::from_value(envelope.payload.clone())?;
        if self.owns_agent_locally(payload.host_node, envelope.from).await {
            return Ok(());
        }
        if self.state.agents.is_tombstoned(payload.agent_id).await? {
            return Ok(());
        }
        let next = match self.state.agents.get(payload.agent_id).await? {
            Some(local) => local.heartbeat(payload.status, payload.current_task_id, envelope.lamport_ts),
            None => Agent::stub_from_heartbeat(
                payload.agent_id,
                payload.host_node,
                payload.status,
                payload.current_task_id,
                envelope.lamport_ts,
            ),
        };
        self.state.agents.put(&next).await?;
        Ok(())
    }

    async fn apply_agent_deregister(&self, envelope: &Envelope) -> Result<()> {
        let agent_id: AgentId = serde_json::from_value(envelope.payload["agent_id"].clone())?;
        let tombstone = AgentTombstone::new(
            agent_id,
            envelope.lamport_ts,
            ChronoDuration::seconds(self.state.config.tombstone_ttl_secs),
        );
        self.state.agents.put_tombstone(&tombstone).await?;
        self.state.agents.delete(agent_id).await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Anti-entropy ingestion (same invariants as `receive`, no forwarding)
    // ---------------------------------------------------------------

    /// Apply a task learned from a sync response. A leader never imports a
    /// full foreign task record — it only merges the branch name in, bumping
    /// its own clock so the patch still wins the store's last-writer-wins
    /// check against what it already has.
    pub async fn apply_synced_task(&self, incoming: Task) -> Result<()> {
        let Some(local) = self.state.tasks.get(incoming.id).await? else {
            if !self.state.is_leader() {
                self.state.tasks.put(&incoming).await?;
            }
            return Ok(());
        };

        if self.state.is_leader() {
            if local.git_branch.is_none() && incoming.git_branch.is_some() {
                let mut patched = local;
                patched.git_branch = incoming.git_branch;
                patched.lamport_ts = self.state.clock.tick();
                patched.updated_at = chrono::Utc::now();
                self.state.tasks.put(&patched).await?;
            }
            return Ok(());
        }

        if local.status.is_terminal() {
            return Ok(());
        }
        let merged = local.merge_update(&incoming, incoming.lamport_ts);
        self.state.tasks.put(&merged).await?;
        Ok(())
    }

    /// Apply an agent learned from a sync response, respecting the same
    /// host-node-ownership and tombstone rules as a live gossip message.
    pub async fn apply_synced_agent(&self, incoming: Agent) -> Result<()> {
        if incoming.host_node == self.state.node_id.0 {
            return Ok(());
        }
        if self.state.agents.is_tombstoned(incoming.id).await? {
            return Ok(());
        }
        self.state.agents.put(&incoming).await?;
        Ok(())
    }
}

fn entity_kind_for(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::TaskCreate
        | MessageKind::TaskClaim
        | MessageKind::TaskUpdate
        | MessageKind::TaskComplete
        | MessageKind::TaskFail
        | MessageKind::TaskCancel
        | MessageKind::TaskArchive
        | MessageKind::TaskAssign => "task",
        MessageKind::AgentRegister | MessageKind::AgentHeartbeat | MessageKind::AgentDeregister => "agent",
        MessageKind::DhtPut | MessageKind::DhtDelete => "dht",
        _ => "other",
    }
}

fn entity_id_for(envelope: &Envelope) -> Result<String> {
    Ok(match envelope.kind {
        MessageKind::TaskClaim => serde_json::from_value::<TaskClaimPayload>(envelope.payload.clone())?
            .task_id
            .to_string(),
        MessageKind::TaskCreate
        | MessageKind::TaskUpdate
        | MessageKind::TaskComplete
        | MessageKind::TaskFail
        | MessageKind::TaskCancel
        | MessageKind::TaskArchive => serde_json::from_value::<Task>(envelope.payload.clone())?.id.to_string(),
        MessageKind::AgentRegister => serde_json::from_value::<Agent>(envelope.payload.clone())?.id.to_string(),
        MessageKind::AgentHeartbeat => {
            serde_json::from_value::<AgentHeartbeatPayload>(envelope.payload.clone())?.agent_id.to_string()
        }
        MessageKind::AgentDeregister => envelope.payload["agent_id"].to_string(),
        MessageKind::DhtPut | MessageKind::DhtDelete => envelope.payload["key"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        other => format!("{other:?}"),
    })
}
