// [libs/domain/mesh-domain/src/message.rs]
//! Wire message catalogue.
//!
//! Every frame that crosses a peer-to-peer socket is a [`Envelope`]. The
//! `kind` discriminator is what `fleetmesh-transport` and the dedup layer
//! key off of; the `payload` is kind-specific and decoded lazily by whoever
//! handles that kind. Keeping the envelope flat (rather than a single giant
//! enum with inline payloads) lets the transport layer log and dedup a
//! message without knowing every payload shape that might ever be added.

use crate::agent::AgentStatus;
use crate::ids::{AgentId, NodeId, TaskId};
use crate::task::TaskStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    // Transport / liveness
    Hello,
    Ping,
    Pong,

    // Discovery
    Pex,
    DhtDiscLookup,
    DhtDiscLookupRsp,
    DhtDiscAnnounce,

    // Task gossip
    TaskCreate,
    TaskClaim,
    TaskUpdate,
    TaskComplete,
    TaskFail,
    TaskCancel,
    TaskArchive,
    TaskAssign,

    // Task sync
    TaskSyncReq,
    TaskSyncRsp,

    // Agent gossip
    AgentRegister,
    AgentHeartbeat,
    AgentDeregister,

    // Agent sync
    AgentSyncReq,
    AgentSyncRsp,

    // Election
    EmperorHeartbeat,
    ElectionStart,
    ElectionVictory,
    CensusRequest,

    // DHT
    DhtPut,
    DhtGet,
    DhtGetRsp,
    DhtDelete,
    DhtSyncReq,
    DhtSyncRsp,

    // Upgrade
    UpgradeRequest,
    UpgradeStatus,
}

impl MessageKind {
    /// Messages that mutate gossiped entity state and therefore participate
    /// in the dedup/tombstone machinery. Pure request/response and liveness
    /// traffic (PING, DHT_GET, *_SYNC_REQ, ...) is excluded — it has no
    /// entity identity to dedup against.
    pub fn is_gossiped_mutation(self) -> bool {
        matches!(
            self,
            MessageKind::TaskCreate
                | MessageKind::TaskClaim
                | MessageKind::TaskUpdate
                | MessageKind::TaskComplete
                | MessageKind::TaskFail
                | MessageKind::TaskCancel
                | MessageKind::TaskArchive
                | MessageKind::TaskAssign
                | MessageKind::AgentRegister
                | MessageKind::AgentHeartbeat
                | MessageKind::AgentDeregister
                | MessageKind::DhtPut
                | MessageKind::DhtDelete
        )
    }
}

/// The envelope every frame is wrapped in before being length-prefixed and
/// written to the socket. `from` and `lamport_ts` are duplicated out of the
/// payload so the transport and gossip layers can route and dedup without
/// deserialising `payload` into its concrete type first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: MessageKind,
    pub from: NodeId,
    pub lamport_ts: i64,
    pub payload: Value,
}

impl Envelope {
    pub fn new(kind: MessageKind, from: NodeId, lamport_ts: i64, payload: Value) -> Self {
        Self {
            kind,
            from,
            lamport_ts,
            payload,
        }
    }

    /// The dedup key described for gossiped mutations: entity-kind,
    /// entity-id, event-kind and lamport timestamp. Returns `None` for
    /// message kinds that don't carry a single governing entity id (e.g.
    /// `HELLO`, `PEX`) — those are never deduped.
    pub fn dedup_key(&self, entity_kind: &str, entity_id: impl std::fmt::Display) -> String {
        format!("{entity_kind}:{entity_id}:{:?}:{}", self.kind, self.lamport_ts)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    pub node_id: NodeId,
    pub p2p_port: u16,
    pub http_port: u16,
    pub role: crate::peer::PeerRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskClaimPayload {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub node_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusPayload {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHeartbeatPayload {
    pub agent_id: AgentId,
    pub host_node: Uuid,
    pub status: AgentStatus,
    pub current_task_id: Option<TaskId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmperorHeartbeatPayload {
    pub node_id: NodeId,
    pub http_port: u16,
    pub lamport_ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionStartPayload {
    pub node_id: NodeId,
    pub lamport_ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionVictoryPayload {
    pub node_id: NodeId,
    pub http_port: u16,
    pub lamport_ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhtPutPayload {
    pub key: String,
    pub value: Vec<u8>,
    pub content_hash: String,
    pub replica_count: u32,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_stable_for_identical_inputs() {
        let env = Envelope::new(MessageKind::TaskClaim, NodeId::new(), 6, Value::Null);
        let a = env.dedup_key("task", "t1");
        let b = env.dedup_key("task", "t1");
        assert_eq!(a, b);
    }

    #[test]
    fn dedup_key_differs_across_lamport_ts() {
        let node = NodeId::new();
        let env1 = Envelope::new(MessageKind::TaskClaim, node, 6, Value::Null);
        let env2 = Envelope::new(MessageKind::TaskClaim, node, 7, Value::Null);
        assert_ne!(env1.dedup_key("task", "t1"), env2.dedup_key("task", "t1"));
    }

    #[test]
    fn only_mutation_kinds_are_flagged_gossiped() {
        assert!(MessageKind::TaskClaim.is_gossiped_mutation());
        assert!(MessageKind::AgentRegister.is_gossiped_mutation());
        assert!(!MessageKind::Ping.is_gossiped_mutation());
        assert!(!MessageKind::DhtGet.is_gossiped_mutation());
        assert!(!MessageKind::TaskSyncReq.is_gossiped_mutation());
    }
}
