// [apps/peer/src/mesh/claim.rs]
//! Deterministic tie-break for two peers racing to claim the same task.
//! The rule is total, symmetric, and independent of delivery order: it
//! only ever looks at the two claims' `lamport_ts` and `node_id`, never at
//! arrival time.

use fleetmesh_domain::NodeId;

/// `true` if the remote claim should win over the claim currently recorded
/// locally. Ties on `lamport_ts` fall to the lexicographically lower
/// `node_id` — the same bully rule used by leader election, so both
/// layers converge using one mental model.
pub fn remote_claim_wins(remote_lamport_ts: i64, remote_node: NodeId, local_lamport_ts: i64, local_node: NodeId) -> bool {
    remote_lamport_ts < local_lamport_ts || (remote_lamport_ts == local_lamport_ts && remote_node < local_node)
}
