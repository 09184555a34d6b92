// [tests/mirror/libs/infra/mesh_client/leader_client.test.rs]
use fleetmesh_client::LeaderClient;
use std::time::Duration;

#[tokio::test]
async fn health_check_against_a_closed_port_reports_unhealthy() {
    let client = LeaderClient::new();
    let addr = "127.0.0.1:1".parse().unwrap();
    let healthy = client.health_check(addr, Duration::from_millis(200)).await.unwrap();
    assert!(!healthy);
}
