use std::collections::HashSet;

use super::*;
use crate::octree::config::BuildConfig;
use crate::test_util::{brute_force_by_distance, grid_cloud, random_cloud};

fn build(cloud: &Vec<DVec3>) -> Octree<'_, Vec<DVec3>> {
  Octree::from_cloud(cloud, &BuildConfig::default()).unwrap()
}

/// Distances match the brute-force prefix, indices are distinct and each
/// reported distance is the true one.
fn assert_matches_brute_force(cloud: &[DVec3], query: DVec3, found: &[Neighbor], k: usize) {
  let reference = brute_force_by_distance(cloud, query);
  let expected: Vec<f64> = reference.iter().take(k).map(|(_, d)| *d).collect();
  let actual: Vec<f64> = found.iter().map(|n| n.sq_dist).collect();
  assert_eq!(actual, expected, "query {query}, k {k}");

  let unique: HashSet<u32> = found.iter().map(|n| n.index).collect();
  assert_eq!(unique.len(), found.len());
  for n in found {
    assert_eq!(n.point, cloud[n.index as usize]);
    assert_eq!(n.sq_dist, n.point.distance_squared(query));
  }
}

// =========================================================================
// k nearest
// =========================================================================

/// Regular grid, k in {1, 3, N}, queries inside and outside the box.
#[test]
fn test_k_nearest_on_grid() {
  let cloud = grid_cloud(6, 1.0, DVec3::ZERO);
  let octree = build(&cloud);
  let queries = [
    DVec3::new(2.3, 2.6, 1.1),
    DVec3::new(0.0, 0.0, 0.0),
    DVec3::new(4.9, 0.2, 3.5),
    DVec3::new(-3.0, 2.0, 2.0),
    DVec3::new(12.0, -7.0, 30.0),
  ];

  for level in [1u8, 2, 3, 5] {
    for query in queries {
      for k in [1, 3, cloud.len()] {
        let found = octree.find_k_nearest(query, level, k, None).unwrap();
        assert_eq!(found.len(), k);
        assert_matches_brute_force(&cloud, query, &found, k);
      }
    }
  }
}

/// Random cloud, many queries.
#[test]
fn test_k_nearest_random_cloud() {
  let cloud = random_cloud(42, 3_000, 10.0);
  let octree = build(&cloud);
  let queries = random_cloud(43, 50, 14.0);

  for query in queries {
    let found = octree.find_k_nearest(query, 5, 10, None).unwrap();
    assert_matches_brute_force(&cloud, query, &found, 10);
  }
}

/// Asking for more points than exist returns every point.
#[test]
fn test_k_larger_than_cloud() {
  let cloud = random_cloud(1, 20, 1.0);
  let octree = build(&cloud);
  let found = octree.find_k_nearest(DVec3::ZERO, 4, 50, None).unwrap();
  assert_eq!(found.len(), 20);
  assert_matches_brute_force(&cloud, DVec3::ZERO, &found, 20);
}

/// k = 0 and empty octrees yield nothing.
#[test]
fn test_k_nearest_degenerate() {
  let cloud = random_cloud(2, 10, 1.0);
  let octree = build(&cloud);
  assert!(octree.find_k_nearest(DVec3::ZERO, 3, 0, None).unwrap().is_empty());

  let empty = Octree::new(&cloud);
  assert!(empty.find_k_nearest(DVec3::ZERO, 3, 5, None).unwrap().is_empty());
  assert!(empty.find_nearest(DVec3::ZERO, 3, None).unwrap().is_none());
}

/// Max distance keeps only points within reach.
#[test]
fn test_k_nearest_with_max_distance() {
  let cloud = random_cloud(3, 2_000, 5.0);
  let octree = build(&cloud);
  let query = DVec3::new(0.5, -1.0, 2.0);
  let max_distance = 0.8;

  let found = octree.find_k_nearest(query, 4, 1_000, Some(max_distance)).unwrap();
  let expected = brute_force_by_distance(&cloud, query)
    .into_iter()
    .filter(|(_, d)| *d <= max_distance * max_distance)
    .count();
  assert_eq!(found.len(), expected);
  assert_matches_brute_force(&cloud, query, &found, expected);

  let capped = octree.find_k_nearest(query, 4, 3, Some(max_distance)).unwrap();
  assert_matches_brute_force(&cloud, query, &capped, 3.min(expected));
}

// =========================================================================
// Nearest
// =========================================================================

/// Single nearest neighbour equals the brute-force minimum.
#[test]
fn test_find_nearest() {
  let cloud = random_cloud(17, 1_000, 3.0);
  let octree = build(&cloud);
  for query in random_cloud(18, 40, 5.0) {
    for level in [2u8, 4, 7] {
      let nearest = octree.find_nearest(query, level, None).unwrap().unwrap();
      let reference = brute_force_by_distance(&cloud, query)[0].1;
      assert_eq!(nearest.sq_dist, reference);
    }
  }
}

/// Nothing within the max distance gives `None`, early or after expansion.
#[test]
fn test_find_nearest_max_distance() {
  let cloud = vec![DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)];
  let octree = build(&cloud);

  let query = DVec3::new(0.5, 3.0, 0.0);
  assert!(octree.find_nearest(query, 5, Some(2.5)).unwrap().is_none());
  let hit = octree.find_nearest(query, 5, Some(3.1)).unwrap().unwrap();
  assert!((hit.sq_dist - 9.25).abs() < 1e-12);

  let far = DVec3::splat(100.0);
  let mut search = octree.neighbor_search(far, 5).with_max_distance(1.0);
  assert!(octree.nearest_from_cell(&mut search).unwrap().is_none());
  assert_eq!(search.state(), SearchState::Exhausted);
  assert_eq!(search.visited_shells(), 0);
}

// =========================================================================
// Reusable state
// =========================================================================

/// Searches converge or exhaust, and later calls reuse gathered shells.
#[test]
fn test_search_state_progression() {
  let cloud = grid_cloud(8, 1.0, DVec3::ZERO);
  let octree = build(&cloud);
  let query = DVec3::new(3.2, 3.7, 4.1);

  let mut search = octree.neighbor_search(query, 4);
  assert_eq!(search.state(), SearchState::NotStarted);

  let first = octree.k_nearest_from_cell(&mut search, 1).unwrap().to_vec();
  assert_eq!(search.state(), SearchState::Converged);
  assert_matches_brute_force(&cloud, query, &first, 1);
  let shells_after_one = search.visited_shells();

  let more = octree.k_nearest_from_cell(&mut search, 20).unwrap().to_vec();
  assert!(search.visited_shells() >= shells_after_one);
  assert_matches_brute_force(&cloud, query, &more, 20);

  let all = octree.k_nearest_from_cell(&mut search, cloud.len()).unwrap().to_vec();
  assert_eq!(search.state(), SearchState::Exhausted);
  assert_matches_brute_force(&cloud, query, &all, cloud.len());
}

/// Relocating inside the same cell keeps the neighbourhood and stays exact.
#[test]
fn test_relocate() {
  let cloud = random_cloud(5, 2_000, 4.0);
  let octree = build(&cloud);
  let level = 4;
  let cell_size = octree.cell_size(level);

  let (cell, _) = octree.cell_pos(DVec3::ZERO, level);
  let origin = octree.cell_center(cell, level);
  let a = origin + DVec3::splat(-0.3 * cell_size);
  let b = origin + DVec3::new(0.4, 0.1, -0.2) * cell_size;

  let mut search = octree.neighbor_search(a, level);
  let first = octree.k_nearest_from_cell(&mut search, 8).unwrap().to_vec();
  assert_matches_brute_force(&cloud, a, &first, 8);
  let gathered = search.candidates().len();

  assert!(search.relocate(&octree, b));
  assert_eq!(search.candidates().len(), gathered);
  let second = octree.k_nearest_from_cell(&mut search, 8).unwrap().to_vec();
  assert_matches_brute_force(&cloud, b, &second, 8);

  let elsewhere = origin + DVec3::splat(3.0 * cell_size);
  assert!(!search.relocate(&octree, elsewhere));
  assert_eq!(search.state(), SearchState::NotStarted);
  assert!(search.candidates().is_empty());
  let third = octree.k_nearest_from_cell(&mut search, 8).unwrap().to_vec();
  assert_matches_brute_force(&cloud, elsewhere, &third, 8);
}

/// Sphere extraction from a search returns every point within the radius.
#[test]
fn test_sphere_from_cell() {
  let cloud = random_cloud(9, 2_000, 2.0);
  let octree = build(&cloud);
  let query = DVec3::new(0.3, -0.2, 0.9);

  let mut search = octree.neighbor_search(query, 5);
  for radius in [0.1, 0.4, 0.9] {
    let found = octree.sphere_from_cell(&mut search, radius).unwrap().to_vec();
    let expected = brute_force_by_distance(&cloud, query)
      .into_iter()
      .filter(|(_, d)| *d <= radius * radius)
      .count();
    assert_eq!(found.len(), expected, "radius {radius}");
    assert_matches_brute_force(&cloud, query, &found, expected);
  }

  let mut far = octree.neighbor_search(DVec3::splat(50.0), 5);
  assert!(octree.sphere_from_cell(&mut far, 1.0).unwrap().is_empty());
  assert_eq!(far.state(), SearchState::Exhausted);
}
