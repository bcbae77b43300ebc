//! Randomized property coverage: the insert-then-scan law and last-TID
//! monotonicity (§8) must hold for arbitrary datum sizes and arbitrary
//! split/compression points, not just the hand-picked counts the other
//! integration tests use.

mod common;

use rand::Rng;

use colbtree::Tid;

#[test]
fn random_datum_sizes_round_trip_through_insert_and_scan() {
    let tree = common::fresh_tree();
    let mut rng = rand::thread_rng();

    let mut inserted = Vec::new();
    for _ in 0..rng.gen_range(100, 400) {
        let len = rng.gen_range(0, 48);
        let datum: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let tid = tree.insert_new_row(None, datum.clone()).unwrap();
        inserted.push((tid, datum));
    }

    let mut scan = tree.scan_from(Tid::new(0, 1)).unwrap();
    let mut seen = Vec::new();
    while let Some((tid, datum, visible)) = tree.next_row(&mut scan).unwrap() {
        assert!(visible);
        seen.push((tid, datum));
    }
    assert_eq!(seen, inserted);
    tree.check_integrity();
}

#[test]
fn last_tid_is_monotonic_under_a_randomized_insert_sequence() {
    let tree = common::fresh_tree();
    let mut rng = rand::thread_rng();

    let mut previous = None;
    for _ in 0..rng.gen_range(200, 500) {
        let len = rng.gen_range(1, 40);
        let datum: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        tree.insert_new_row(None, datum).unwrap();
        let current = tree.last_tid().unwrap();
        assert!(current > previous, "last_tid must strictly increase after every insert");
        previous = current;
    }
    tree.check_integrity();
}
