//! End-to-end scenarios for the disk index.
//!
//! Small, literal workloads with exact expected outputs, exercising the
//! full create / insert / delete / search / reopen lifecycle.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use warren::{DiskIndex, IndexError, IndexOptions};

fn unit_vec(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    loop {
        let v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-3 {
            return v.iter().map(|x| x / norm).collect();
        }
    }
}

fn scratch() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let prefix = dir.path().join("idx");
    (dir, prefix)
}

// =============================================================================
// Literal scenarios
// =============================================================================

#[test]
fn empty_index_search_returns_nothing() {
    let (_dir, prefix) = scratch();
    let index = DiskIndex::<f32>::create(&prefix, 4, IndexOptions::default()).unwrap();

    let hits = index.search(&[0.0, 0.0, 0.0, 0.0], 5).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn first_insert_bootstraps_the_graph() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 4, IndexOptions::default()).unwrap();

    let (key, id) = index.insert(&[1.0, 0.0, 0.0, 0.0], None).unwrap();
    assert_eq!(key, "1");
    assert_eq!(id, 1);
    assert_eq!(index.num_points(), 1);
    assert_eq!(index.entrypoint(), Some(0));
    assert!(index.neighbors(1).unwrap().is_empty());
}

#[test]
fn two_point_recall_orders_by_distance() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 4, IndexOptions::default()).unwrap();

    index.insert(&[1.0, 0.0, 0.0, 0.0], None).unwrap();
    index.insert(&[0.0, 1.0, 0.0, 0.0], None).unwrap();

    let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
    let ids: Vec<u64> = hits.iter().map(|&(_, id)| id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn delete_by_id_scrubs_every_live_row() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 10, IndexOptions::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(0xD15C);

    let mut vectors = Vec::new();
    for _ in 0..20 {
        let v = unit_vec(&mut rng, 10);
        index.insert(&v, None).unwrap();
        vectors.push(v);
    }

    index.delete(5).unwrap();

    let hits = index.search(&vectors[4], 20).unwrap();
    assert!(hits.iter().all(|&(_, id)| id != 5), "deleted id in results");

    for ext in (1..=20u64).filter(|&e| e != 5) {
        let row = index.neighbors(ext).unwrap();
        assert!(!row.contains(&5), "live row of {ext} still references 5");
    }
}

#[test]
fn deleted_slot_is_reused_by_next_insert() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 10, IndexOptions::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(0xD15C);

    for _ in 0..20 {
        let v = unit_vec(&mut rng, 10);
        index.insert(&v, None).unwrap();
    }
    index.delete(5).unwrap();
    assert_eq!(index.free_slots(), &[4]);

    let (_, id) = index.insert(&unit_vec(&mut rng, 10), None).unwrap();
    assert_eq!(id, 5);
    assert!(index.free_slots().is_empty());
    assert_eq!(index.num_points(), 20);
}

#[test]
fn entrypoint_repair_picks_smallest_live_slot() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 2, IndexOptions::default()).unwrap();

    for i in 0..4 {
        index.insert(&[i as f32, 0.0], None).unwrap();
    }
    assert_eq!(index.entrypoint(), Some(0));

    index.delete(1).unwrap();
    assert_eq!(index.entrypoint(), Some(1));

    index.delete(2).unwrap();
    assert_eq!(index.entrypoint(), Some(2));

    index.delete(3).unwrap();
    index.delete(4).unwrap();
    assert_eq!(index.entrypoint(), None);
    assert!(index.is_empty());
}

#[test]
fn reopen_restores_state_exactly() {
    let (_dir, prefix) = scratch();
    let mut rng = StdRng::seed_from_u64(0xD15C);
    let mut vectors = Vec::new();

    {
        let mut index =
            DiskIndex::<f32>::create(&prefix, 10, IndexOptions::default()).unwrap();
        for _ in 0..20 {
            let v = unit_vec(&mut rng, 10);
            index.insert(&v, None).unwrap();
            vectors.push(v);
        }
        index.delete(5).unwrap();
        let v = unit_vec(&mut rng, 10);
        let (_, id) = index.insert(&v, None).unwrap();
        assert_eq!(id, 5);
        vectors[4] = v;
        index.close().unwrap();
    }

    let index = DiskIndex::<f32>::open(&prefix).unwrap();
    assert_eq!(index.num_points(), 20);
    assert_eq!(index.entrypoint(), Some(0));
    assert!(index.free_slots().is_empty());

    for (i, v) in vectors.iter().enumerate() {
        let hits = index.search(v, 1).unwrap();
        assert_eq!(hits[0].1, i as u64 + 1, "self-query after reopen");
    }
}

// =============================================================================
// Keys and lookups
// =============================================================================

#[test]
fn keys_flow_through_insert_search_delete() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 2, IndexOptions::default()).unwrap();

    index.insert(&[0.0, 0.0], Some("origin")).unwrap();
    index.insert(&[5.0, 5.0], Some("corner")).unwrap();

    let hits = index.search(&[0.1, 0.1], 1).unwrap();
    assert_eq!(hits[0], (Some("origin".to_string()), 1));

    assert_eq!(index.get_vector_by_key("corner").unwrap(), vec![5.0, 5.0]);
    assert!(matches!(
        index.get_vector_by_key("nope"),
        Err(IndexError::KeyNotFound(_))
    ));

    assert!(index.delete_by_key("origin").unwrap());
    assert!(!index.delete_by_key("origin").unwrap());
    assert!(!index.delete_by_key("never-existed").unwrap());

    let hits = index.search(&[0.1, 0.1], 2).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1, 2);
}

#[test]
fn default_keys_are_stringified_external_ids() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 2, IndexOptions::default()).unwrap();

    for i in 0..3 {
        let (key, id) = index.insert(&[i as f32, 0.0], None).unwrap();
        assert_eq!(key, id.to_string());
    }
    assert_eq!(index.get_vector_by_key("2").unwrap(), vec![1.0, 0.0]);
}

#[test]
fn insert_then_delete_leaves_only_the_free_slot() {
    let (_dir, prefix) = scratch();
    let mut index = DiskIndex::<f32>::create(&prefix, 3, IndexOptions::default()).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..10 {
        index.insert(&unit_vec(&mut rng, 3), None).unwrap();
    }
    let (_, id) = index.insert(&unit_vec(&mut rng, 3), None).unwrap();
    index.delete(id).unwrap();

    assert_eq!(index.free_slots(), &[(id - 1) as u32]);
    assert_eq!(index.len(), 10);
    for ext in 1..=10u64 {
        let row = index.neighbors(ext).unwrap();
        assert!(!row.contains(&id));
        assert!(!row.contains(&ext));
    }
}

#[test]
fn tombstoned_ids_survive_reopen() {
    let (_dir, prefix) = scratch();
    {
        let mut index =
            DiskIndex::<f32>::create(&prefix, 2, IndexOptions::default()).unwrap();
        for i in 0..6 {
            index.insert(&[i as f32, 1.0], None).unwrap();
        }
        index.delete(2).unwrap();
        index.delete(4).unwrap();
        index.close().unwrap();
    }

    let mut index = DiskIndex::<f32>::open(&prefix).unwrap();
    assert_eq!(index.free_slots(), &[1, 3]);
    assert!(matches!(index.delete(2), Err(IndexError::AlreadyDeleted(2))));

    // LIFO reuse: the most recently freed slot goes first.
    let (_, id) = index.insert(&[9.0, 9.0], None).unwrap();
    assert_eq!(id, 4);
    let (_, id) = index.insert(&[8.0, 8.0], None).unwrap();
    assert_eq!(id, 2);
}
