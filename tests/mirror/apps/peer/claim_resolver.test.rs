// [tests/mirror/apps/peer/claim_resolver.test.rs]
use fleetmesh_domain::NodeId;
use fleetmesh_peer::mesh::claim::remote_claim_wins;
use uuid::Uuid;

fn node(byte: u8) -> NodeId {
    let mut bytes = [0u8; 16];
    bytes[15] = byte;
    NodeId(Uuid::from_bytes(bytes))
}

#[test]
fn lower_lamport_ts_always_wins() {
    assert!(remote_claim_wins(5, node(9), 6, node(1)));
    assert!(!remote_claim_wins(6, node(1), 5, node(9)));
}

#[test]
fn tie_breaks_on_lexicographically_lower_node_id() {
    assert!(remote_claim_wins(7, node(1), 7, node(2)));
    assert!(!remote_claim_wins(7, node(2), 7, node(1)));
}

#[test]
fn rule_is_symmetric_exactly_one_side_wins_on_a_tie() {
    let (ts, a, b) = (3, node(1), node(2));
    assert!(remote_claim_wins(ts, a, ts, b) != remote_claim_wins(ts, b, ts, a));
}
