// [tests/mirror/apps/peer/gossip_invariants.test.rs]
use fleetmesh_domain::{LamportClock, NodeId, Task, TaskStatus};
use fleetmesh_peer::config::Config;
use fleetmesh_peer::mesh::gossip::GossipEngine;
use fleetmesh_peer::state::PeerState;
use fleetmesh_store::MeshStoreClient;
use std::net::SocketAddr;
use std::sync::Arc;

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        advertise_addr: None,
        http_port: 0,
        seeds: Vec::new(),
        beacon_port: 0,
        multicast_group: "239.192.42.42".to_string(),
        database_url: ":memory:".to_string(),
        node_id: None,
        agent_heartbeat_interval_secs: 15,
        agent_offline_threshold_secs: 45,
        agent_startup_grace_secs: 10,
        emperor_heartbeat_interval_secs: 10,
        election_timeout_secs: 5,
        emperor_stale_threshold_secs: 30,
        anti_entropy_interval_secs: 60,
        anti_entropy_agent_interval_secs: 30,
        anti_entropy_dht_interval_secs: 45,
        clock_persist_interval_secs: 30,
        ping_timeout_secs: 5,
        degraded_response_ms: 2000,
        tombstone_ttl_secs: 120,
        dht_purge_interval_secs: 120,
        dht_tombstone_grace_secs: 300,
        seen_set_capacity: 10_000,
        pex_interval_secs: 20,
    }
}

async fn peer_state() -> PeerState {
    let store = MeshStoreClient::connect(":memory:").await.expect("in-memory store should open");
    PeerState::new(Arc::new(test_config()), NodeId::new(), LamportClock::new(), store)
}

#[tokio::test]
async fn terminal_task_absorbs_further_merge_updates() {
    let state = peer_state().await;
    let engine = GossipEngine::new(state.clone());

    let task = engine
        .originate_task_create(Task::new("t", "d", 0, "tester", 0))
        .await
        .unwrap();

    let completed = engine.originate_task_complete(task.id, "done").await.unwrap().unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);

    let stale_update = Task::new("t", "stale description", 9, "tester", 1);
    let mut stale_update = stale_update;
    stale_update.id = task.id;
    let from_addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
    let envelope = fleetmesh_domain::Envelope::new(
        fleetmesh_domain::MessageKind::TaskUpdate,
        NodeId::new(),
        99,
        serde_json::to_value(&stale_update).unwrap(),
    );
    engine.receive(envelope, from_addr).await.unwrap();

    let after = state.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::Completed, "a terminal task must never reopen");
}

#[tokio::test]
async fn leader_never_imports_a_foreign_task_wholesale_during_anti_entropy() {
    let state = peer_state().await;
    state.is_leader.store(true, std::sync::atomic::Ordering::SeqCst);
    let engine = GossipEngine::new(state.clone());

    let task = engine
        .originate_task_create(Task::new("build", "original", 1, "tester", 0))
        .await
        .unwrap();
    assert!(task.git_branch.is_none());

    let mut foreign = task.clone();
    foreign.description = "a completely different description from another node".to_string();
    foreign.git_branch = Some("feature/worker-branch".to_string());
    foreign.lamport_ts = task.lamport_ts + 1;

    engine.apply_synced_task(foreign).await.unwrap();

    let after = state.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.description, "original", "leader must keep its own description");
    assert_eq!(after.git_branch.as_deref(), Some("feature/worker-branch"), "but still learns the branch");
}

#[tokio::test]
async fn non_leader_merges_synced_task_like_live_gossip() {
    let state = peer_state().await;
    let engine = GossipEngine::new(state.clone());

    let task = engine
        .originate_task_create(Task::new("build", "original", 1, "tester", 0))
        .await
        .unwrap();

    let mut foreign = task.clone();
    foreign.description = "updated elsewhere".to_string();
    foreign.lamport_ts = task.lamport_ts + 1;

    engine.apply_synced_task(foreign).await.unwrap();

    let after = state.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.description, "updated elsewhere");
}
