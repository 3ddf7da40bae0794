use std::collections::HashSet;

use super::*;
use crate::octree::bounds::BoundingCube;
use crate::octree::config::BuildConfig;
use crate::test_util::grid_cloud;

const LEVEL: u8 = 3;

/// One point at the center of every level-3 cell of an 8^3 cube.
fn full_grid() -> Vec<DVec3> {
  grid_cloud(8, 1.0, DVec3::splat(0.5))
}

fn octree(cloud: &Vec<DVec3>) -> Octree<'_, Vec<DVec3>> {
  let config = BuildConfig::default().with_bounding_cube(BoundingCube::new(DVec3::ZERO, 8.0));
  Octree::from_cloud(cloud, &config).unwrap()
}

fn shell_positions(octree: &Octree<'_, Vec<DVec3>>, center: IVec3, distance: i32) -> Vec<IVec3> {
  let mut cells = Vec::new();
  octree.shell_cells(center, distance, LEVEL, &mut cells).unwrap();
  cells
    .iter()
    .map(|&start| octree.cell_pos(octree.point(octree.entries()[start].index), LEVEL).0)
    .collect()
}

fn chebyshev(a: IVec3, b: IVec3) -> i32 {
  (a - b).abs().max_element()
}

// =========================================================================
// Shell enumeration
// =========================================================================

/// Shell 0 is the center cell alone.
#[test]
fn test_shell_zero() {
  let cloud = full_grid();
  let octree = octree(&cloud);
  assert_eq!(shell_positions(&octree, IVec3::splat(3), 0), vec![IVec3::splat(3)]);
  assert!(shell_positions(&octree, IVec3::splat(-1), 0).is_empty());
}

/// Shells hold exactly the cells at their Chebyshev distance, each once.
#[test]
fn test_shells_are_disjoint_and_complete() {
  let cloud = full_grid();
  let octree = octree(&cloud);

  for center in [IVec3::splat(3), IVec3::ZERO, IVec3::new(7, 0, 4), IVec3::new(-2, 3, 10)] {
    let mut seen = HashSet::new();
    for distance in 0..12 {
      let shell = shell_positions(&octree, center, distance);
      for pos in &shell {
        assert_eq!(chebyshev(*pos, center), distance, "center {center}, distance {distance}");
        assert!(seen.insert(*pos), "{pos} visited twice");
      }
      let expected = (0..512)
        .map(|i| IVec3::new(i % 8, (i / 8) % 8, i / 64))
        .filter(|p| chebyshev(*p, center) == distance)
        .count();
      assert_eq!(shell.len(), expected, "center {center}, distance {distance}");
    }
    assert_eq!(seen.len(), 512);
  }
}

/// Empty cells are skipped; points carry distances to the query.
#[test]
fn test_shell_points_sparse() {
  let cloud = vec![DVec3::new(0.5, 0.5, 0.5), DVec3::new(2.5, 0.5, 0.5), DVec3::new(7.5, 7.5, 7.5)];
  let octree = octree(&cloud);

  let query = DVec3::new(1.5, 0.5, 0.5);
  let mut points = Vec::new();
  octree.shell_points(IVec3::new(1, 0, 0), 0, LEVEL, Some(query), &mut points).unwrap();
  assert!(points.is_empty());

  octree.shell_points(IVec3::new(1, 0, 0), 1, LEVEL, Some(query), &mut points).unwrap();
  let mut indices: Vec<u32> = points.iter().map(|n| n.index).collect();
  indices.sort_unstable();
  assert_eq!(indices, vec![0, 1]);
  assert!(points.iter().all(|n| (n.sq_dist - 1.0).abs() < 1e-12));

  points.clear();
  octree.shell_points(IVec3::new(1, 0, 0), 7, LEVEL, None, &mut points).unwrap();
  assert_eq!(points.len(), 1);
  assert_eq!(points[0].index, 2);
  assert_eq!(points[0].sq_dist, 0.0);
}

/// Shells that miss the occupied region are empty.
#[test]
fn test_shell_outside_fill_region() {
  let cloud = vec![DVec3::new(0.5, 0.5, 0.5), DVec3::new(1.5, 1.5, 1.5)];
  let octree = octree(&cloud);
  assert!(shell_positions(&octree, IVec3::splat(6), 1).is_empty());
  assert!(shell_positions(&octree, IVec3::splat(6), 4).is_empty());
  assert_eq!(shell_positions(&octree, IVec3::splat(6), 5), vec![IVec3::ONE]);
  assert_eq!(shell_positions(&octree, IVec3::splat(6), 6), vec![IVec3::ZERO]);
}
