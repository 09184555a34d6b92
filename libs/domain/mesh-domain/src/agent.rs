// [libs/domain/mesh-domain/src/agent.rs]
/*!
 * Agent — a long-running interactive process hosted on exactly one peer.
 * The host-node is authoritative for its own agents: no gossiped mutation
 * from another node may ever overwrite a locally-owned `Agent` row. That
 * invariant is enforced by the gossip engine, not by this type; `Agent`
 * itself only carries the data.
 */

use crate::ids::{AgentId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Waiting,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub host_node: Uuid,
    pub name: String,
    pub tool_type: String,
    pub model: String,
    pub capabilities: Vec<String>,
    pub session_handle: Option<String>,
    pub working_directory: String,
    pub max_concurrent_tasks: u32,
    pub status: AgentStatus,
    pub current_task_id: Option<TaskId>,
    pub last_heartbeat: DateTime<Utc>,
    pub lamport_ts: i64,
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        host_node: Uuid,
        name: impl Into<String>,
        tool_type: impl Into<String>,
        model: impl Into<String>,
        working_directory: impl Into<String>,
        max_concurrent_tasks: u32,
        lamport_ts: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            host_node,
            name: name.into(),
            tool_type: tool_type.into(),
            model: model.into(),
            capabilities: Vec::new(),
            session_handle: None,
            working_directory: working_directory.into(),
            max_concurrent_tasks,
            status: AgentStatus::Idle,
            current_task_id: None,
            last_heartbeat: now,
            lamport_ts,
            registered_at: now,
        }
    }

    /// Returns a new record reflecting a heartbeat refresh.
    pub fn heartbeat(&self, status: AgentStatus, current_task_id: Option<TaskId>, lamport_ts: i64) -> Self {
        let mut next = self.clone();
        next.status = status;
        next.current_task_id = current_task_id;
        next.last_heartbeat = Utc::now();
        next.lamport_ts = lamport_ts;
        next
    }

    /// Synthesise a stub record from a heartbeat for an agent this peer has
    /// never seen register (§4.7: "if unknown locally, synthesise a stub
    /// record from the heartbeat fields").
    pub fn stub_from_heartbeat(
        id: AgentId,
        host_node: Uuid,
        status: AgentStatus,
        current_task_id: Option<TaskId>,
        lamport_ts: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            host_node,
            name: String::new(),
            tool_type: String::new(),
            model: String::new(),
            capabilities: Vec::new(),
            session_handle: None,
            working_directory: String::new(),
            max_concurrent_tasks: 1,
            status,
            current_task_id,
            last_heartbeat: now,
            lamport_ts,
            registered_at: now,
        }
    }
}

/// A deregistration tombstone. While `expires_at` is in the future, the
/// dedup layer discards any `AGENT_REGISTER`/`AGENT_HEARTBEAT` for
/// `agent_id`, blocking resurrection of a deregistered agent (§4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentTombstone {
    pub agent_id: AgentId,
    pub lamport_ts: i64,
    pub expires_at: DateTime<Utc>,
}

impl AgentTombstone {
    pub fn new(agent_id: AgentId, lamport_ts: i64, ttl: chrono::Duration) -> Self {
        Self {
            agent_id,
            lamport_ts,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_from_heartbeat_has_sensible_defaults() {
        let id = AgentId::new();
        let node = Uuid::new_v4();
        let stub = Agent::stub_from_heartbeat(id, node, AgentStatus::Busy, None, 4);
        assert_eq!(stub.id, id);
        assert_eq!(stub.host_node, node);
        assert_eq!(stub.status, AgentStatus::Busy);
        assert_eq!(stub.max_concurrent_tasks, 1);
    }

    #[test]
    fn tombstone_expiry_respects_ttl() {
        let tomb = AgentTombstone::new(AgentId::new(), 1, chrono::Duration::seconds(-1));
        assert!(tomb.is_expired());
        let fresh = AgentTombstone::new(AgentId::new(), 1, chrono::Duration::seconds(120));
        assert!(!fresh.is_expired());
    }
}
