// [tests/mirror/libs/infra/mesh_store/task_transitions.test.rs]
use fleetmesh_domain::Task;
use fleetmesh_store::{MeshStoreClient, TaskRepository};

async fn repo() -> TaskRepository {
    let client = MeshStoreClient::connect(":memory:")
        .await
        .expect("in-memory store should open");
    TaskRepository::new(client)
}

#[tokio::test]
async fn put_then_get_round_trips_a_task() {
    let repo = repo().await;
    let task = Task::new("ship it", "write the release notes", 1, "leader", 1);
    assert!(repo.put(&task).await.unwrap());

    let fetched = repo.get(task.id).await.unwrap().expect("task should be present");
    assert_eq!(fetched.title, "ship it");
    assert_eq!(fetched.lamport_ts, 1);
}

#[tokio::test]
async fn stale_write_is_rejected_by_the_compare_and_set_guard() {
    let repo = repo().await;
    let task = Task::new("A", "desc", 0, "leader", 5);
    repo.put(&task).await.unwrap();

    let stale = task.completed("too late", 3);
    let applied = repo.put(&stale).await.unwrap();
    assert!(!applied, "a write at a lower lamport_ts must not overwrite a newer row");

    let fetched = repo.get(task.id).await.unwrap().unwrap();
    assert_eq!(fetched.lamport_ts, 5);
}

#[tokio::test]
async fn newer_write_replaces_the_stored_row() {
    let repo = repo().await;
    let task = Task::new("A", "desc", 0, "leader", 5);
    repo.put(&task).await.unwrap();

    let newer = task.completed("done", 6);
    assert!(repo.put(&newer).await.unwrap());

    let fetched = repo.get(task.id).await.unwrap().unwrap();
    assert_eq!(fetched.lamport_ts, 6);
    assert_eq!(fetched.result.as_deref(), Some("done"));
}
