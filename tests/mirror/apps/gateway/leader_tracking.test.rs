// [tests/mirror/apps/gateway/leader_tracking.test.rs]
use fleetmesh_domain::NodeId;
use fleetmesh_gateway::config::Config;
use fleetmesh_gateway::state::GatewayState;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use uuid::Uuid;

fn node(byte: u8) -> NodeId {
    let mut bytes = [0u8; 16];
    bytes[15] = byte;
    NodeId(Uuid::from_bytes(bytes))
}

fn test_state() -> GatewayState {
    let config = Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        mesh_seeds: Vec::new(),
        upstream_timeout_secs: 5,
    };
    GatewayState::new(Arc::new(config))
}

fn addr(octet: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, octet))
}

#[test]
fn unknown_leader_is_always_adopted() {
    let state = test_state();
    assert!(state.current_leader().node_id.is_none());

    state.consider_leader(node(5), addr(5), 9000, 1);

    let leader = state.current_leader();
    assert_eq!(leader.node_id, Some(node(5)));
    assert_eq!(leader.host, Some(addr(5)));
    assert_eq!(leader.http_port, Some(9000));
}

#[test]
fn lower_node_id_replaces_a_higher_incumbent() {
    let state = test_state();
    state.consider_leader(node(9), addr(9), 9000, 1);
    state.consider_leader(node(1), addr(1), 9001, 2);

    let leader = state.current_leader();
    assert_eq!(leader.node_id, Some(node(1)));
    assert_eq!(leader.http_port, Some(9001));
}

#[test]
fn higher_node_id_never_displaces_a_lower_incumbent() {
    let state = test_state();
    state.consider_leader(node(1), addr(1), 9000, 1);
    state.consider_leader(node(9), addr(9), 9001, 2);

    let leader = state.current_leader();
    assert_eq!(leader.node_id, Some(node(1)));
    assert_eq!(leader.http_port, Some(9000));
}

#[test]
fn election_victory_style_reset_closes_every_open_session() {
    let state = test_state();
    let (_id_a, token_a) = state.register_upstream_session();
    let (_id_b, token_b) = state.register_upstream_session();

    state.close_all_upstream_sockets();

    assert!(token_a.is_cancelled());
    assert!(token_b.is_cancelled());
}
