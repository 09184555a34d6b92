// [tests/mirror/libs/infra/mesh_store/dht_integrity.test.rs]
use fleetmesh_domain::DhtEntry;
use fleetmesh_store::{DhtRepository, MeshStoreClient};
use uuid::Uuid;

async fn repo() -> DhtRepository {
    let client = MeshStoreClient::connect(":memory:")
        .await
        .expect("in-memory store should open");
    DhtRepository::new(client)
}

#[tokio::test]
async fn content_addressed_put_round_trips_through_the_store() {
    let repo = repo().await;
    let entry = DhtEntry::put_content_addressed(b"hello".to_vec(), Uuid::new_v4(), 3, 0, 1);
    repo.put(&entry).await.unwrap();

    let fetched = repo.get(&entry.key).await.unwrap().expect("entry should be present");
    assert!(fetched.verify_integrity());
    assert_eq!(fetched.value, b"hello");
}

#[tokio::test]
async fn tombstone_overwrite_clears_the_value_but_keeps_the_key() {
    let repo = repo().await;
    let entry = DhtEntry::put_named("manifest", b"v1".to_vec(), Uuid::new_v4(), 1, 0, 1);
    repo.put(&entry).await.unwrap();

    let tomb = entry.tombstoned(2);
    repo.put(&tomb).await.unwrap();

    let fetched = repo.get("manifest").await.unwrap().unwrap();
    assert!(fetched.tombstone);
    assert!(fetched.value.is_empty());
}
