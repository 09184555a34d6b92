// [tests/mirror/apps/peer/dedup_seen_set.test.rs]
use fleetmesh_peer::mesh::dedup::SeenSet;

#[test]
fn first_insert_is_new_second_is_duplicate() {
    let mut set = SeenSet::new(10);
    assert!(set.check_and_insert("a:1:create:1"));
    assert!(!set.check_and_insert("a:1:create:1"));
}

#[test]
fn eviction_drops_oldest_half_once_capacity_is_reached() {
    let mut set = SeenSet::new(4);
    for i in 0..4 {
        assert!(set.check_and_insert(&format!("k{i}")));
    }
    assert_eq!(set.len(), 4);

    // Insert one more: evicts the oldest 2, keeping 2 then adding 1.
    assert!(set.check_and_insert("k4"));
    assert_eq!(set.len(), 3);
    assert!(!set.check_and_insert("k2"), "k2 should have survived eviction");
    assert!(set.check_and_insert("k0"), "k0 should have been evicted and is new again");
}

#[test]
fn capacity_of_zero_is_clamped_to_one() {
    let mut set = SeenSet::new(0);
    assert!(set.check_and_insert("only"));
    assert!(set.check_and_insert("next"));
    assert_eq!(set.len(), 1);
}
