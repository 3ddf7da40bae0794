use glam::DVec3;

use super::*;
use crate::constants::truncate_code;
use crate::octree::config::BuildConfig;
use crate::test_util::random_cloud;

fn linear_first(entries: &[IndexedCode], code: CellCode, level: u8) -> Option<usize> {
  entries.iter().position(|e| truncate_code(e.code, level) == code)
}

// =========================================================================
// Lower bound
// =========================================================================

/// Power-of-two stepping agrees with a textbook lower bound for every length.
#[test]
fn test_lower_bound_matches_partition_point() {
  for len in 0..40u64 {
    let entries: Vec<IndexedCode> = (0..len)
      .map(|i| IndexedCode {
        index: i as u32,
        code: i / 3 * 2,
      })
      .collect();
    for probe in 0..(len + 2) {
      let expected = entries.partition_point(|e| e.code < probe);
      assert_eq!(lower_bound(&entries, probe, 0), expected, "len {len}, probe {probe}");
    }
  }
}

// =========================================================================
// Cell lookup
// =========================================================================

/// The first entry of every occupied cell is found, at every level.
#[test]
fn test_find_cell_start_finds_first_entry() {
  let cloud = random_cloud(21, 3_000, 4.0);
  let octree = Octree::from_cloud(&cloud, &BuildConfig::default()).unwrap();

  for level in [0u8, 1, 3, 6, 10, MAX_OCTREE_LEVEL] {
    for entry in octree.entries().iter().step_by(37) {
      let code = truncate_code(entry.code, level);
      let expected = linear_first(octree.entries(), code, level);
      assert_eq!(octree.find_cell_start(code, level), expected, "level {level}");
      assert!(expected.is_some());
    }
  }
}

/// Unoccupied codes are not found.
#[test]
fn test_find_cell_start_absent() {
  let cloud = vec![DVec3::ZERO, DVec3::splat(1.0)];
  let octree = Octree::from_cloud(&cloud, &BuildConfig::default()).unwrap();

  // Opposite corners: at level 1 only octants 0 and 7 are occupied.
  assert_eq!(octree.find_cell_start(0, 1), Some(0));
  assert_eq!(octree.find_cell_start(7, 1), Some(1));
  for code in 1..7 {
    assert_eq!(octree.find_cell_start(code, 1), None);
  }
  assert_eq!(octree.find_cell_start(8, 1), None);
}

/// Restricting the search range hides cells outside it.
#[test]
fn test_find_cell_start_in_range() {
  let cloud = vec![DVec3::ZERO, DVec3::ZERO, DVec3::splat(1.0)];
  let octree = Octree::from_cloud(&cloud, &BuildConfig::default()).unwrap();

  assert_eq!(octree.find_cell_start_in(0, 1, 0..3), Some(0));
  assert_eq!(octree.find_cell_start_in(0, 1, 1..3), Some(1));
  assert_eq!(octree.find_cell_start_in(0, 1, 2..3), None);
  assert_eq!(octree.find_cell_start_in(7, 1, 0..2), None);
  assert_eq!(octree.find_cell_start_in(7, 1, 2..10), Some(2));
  assert_eq!(octree.find_cell_start_in(7, 1, 3..3), None);
}

/// Lookups on an empty octree find nothing.
#[test]
fn test_lookup_on_empty_octree() {
  let cloud = vec![DVec3::ZERO];
  let octree = Octree::new(&cloud);
  assert_eq!(octree.find_cell_start(0, 0), None);
  assert!(octree.points_in_cell(0, 0, true).is_empty());
  assert_eq!(octree.cell_runs(3).count(), 0);
}

// =========================================================================
// Enumeration
// =========================================================================

/// Cell runs partition the array and match the level statistics.
#[test]
fn test_cell_runs_partition_entries() {
  let cloud = random_cloud(8, 2_000, 1.0);
  let octree = Octree::from_cloud(&cloud, &BuildConfig::default()).unwrap();

  for level in [0u8, 2, 5, 8] {
    let runs: Vec<_> = octree.cell_runs(level).collect();
    assert_eq!(runs.len(), octree.cell_count(level));
    assert_eq!(runs.first().unwrap().start, 0);
    assert_eq!(runs.last().unwrap().end, octree.len());
    for pair in runs.windows(2) {
      assert_eq!(pair[0].end, pair[1].start);
      assert!(pair[0].code < pair[1].code);
    }
    let max = runs.iter().map(|r| r.population()).max().unwrap();
    assert_eq!(max, octree.level_stats(level).max_population);

    for run in &runs {
      let cell = octree.points_in_cell(run.code, level, true);
      assert_eq!(cell.len(), run.population());
      assert!(cell.iter().all(|e| truncate_code(e.code, level) == run.code));
    }
  }
}

/// Truncated and full cell codes describe the same cells.
#[test]
fn test_cell_codes_and_indexes() {
  let cloud = random_cloud(12, 500, 1.0);
  let octree = Octree::from_cloud(&cloud, &BuildConfig::default()).unwrap();
  let level = 4;

  let truncated = octree.cell_codes(level, true).unwrap();
  let full = octree.cell_codes(level, false).unwrap();
  let indexes = octree.cell_indexes(level).unwrap();
  assert_eq!(truncated.len(), octree.cell_count(level));
  assert_eq!(full.len(), truncated.len());
  assert_eq!(indexes.len(), truncated.len());

  for ((t, f), i) in truncated.iter().zip(&full).zip(&indexes) {
    assert_eq!(truncate_code(*f, level), *t);
    assert_eq!(octree.find_cell_start(*t, level), Some(*i));
    assert_eq!(octree.cell_range(*f, level, false).unwrap().start, *i);
  }
}

/// Distances to the occupied region's sides.
#[test]
fn test_cell_distance_from_borders() {
  let cloud = vec![DVec3::ZERO, DVec3::splat(1.0)];
  let octree = Octree::from_cloud(&cloud, &BuildConfig::default()).unwrap();
  let level = 2;
  let fill = octree.fill_indexes(level);
  assert_eq!(fill.min, IVec3::ZERO);
  assert_eq!(fill.max, IVec3::splat(3));

  let (low, high) = octree.cell_distance_from_borders(IVec3::new(1, 0, 3), level);
  assert_eq!(low, IVec3::new(1, 0, 3));
  assert_eq!(high, IVec3::new(2, 3, 0));

  let (low, high) = octree.cell_distance_from_borders(IVec3::new(-2, 5, 1), level);
  assert_eq!(low, IVec3::new(0, 5, 1));
  assert_eq!(high, IVec3::new(5, 0, 2));
}
