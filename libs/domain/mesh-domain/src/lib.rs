//! Shared entity definitions and the Lamport clock — the single source of
//! truth for every mutable record gossiped across the mesh.
//!
//! Nothing in this crate talks to a socket or a database; `fleetmesh-transport`
//! and `fleetmesh-store` depend on it, never the reverse.

pub mod agent;
pub mod clock;
pub mod dht;
pub mod ids;
pub mod message;
pub mod peer;
pub mod task;

pub use agent::{Agent, AgentStatus, AgentTombstone};
pub use clock::LamportClock;
pub use dht::{sha256_hex, DhtEntry};
pub use ids::{AgentId, NodeId, TaskId};
pub use message::{
    AgentHeartbeatPayload, DhtPutPayload, ElectionStartPayload, ElectionVictoryPayload, EmperorHeartbeatPayload,
    Envelope, HelloPayload, MessageKind, TaskClaimPayload, TaskStatusPayload,
};
pub use peer::{Peer, PeerRole};
pub use task::{Task, TaskStatus};
