//! Level selection heuristics and octree comparison.

use super::tree::Octree;
use crate::cloud::PointCloud;
use crate::constants::{MAX_OCTREE_LEVEL, NEIGHBOURHOOD_EXTRACTION_FACTOR};

/// Cells and points at one level that only one of two octrees occupies.
///
/// Only meaningful for octrees built over the same bounding cube.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OctreeDiff {
  /// Occupied cells of the first octree.
  pub cells_a: usize,
  /// Occupied cells of the second octree.
  pub cells_b: usize,
  /// Cells occupied in the first octree only.
  pub cells_only_in_a: usize,
  /// Cells occupied in the second octree only.
  pub cells_only_in_b: usize,
  /// Points of the first octree in cells the second leaves empty.
  pub points_only_in_a: usize,
  /// Points of the second octree in cells the first leaves empty.
  pub points_only_in_b: usize,
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  /// Mean number of points per occupied cell at `level` (0 when empty).
  pub fn mean_density(&self, level: u8) -> f64 {
    let cells = self.cell_count(level);
    if cells == 0 {
      return 0.0;
    }
    self.len() as f64 / cells as f64
  }

  /// Level whose mean cell population is closest to `population`.
  pub fn find_best_level_for_population(&self, population: f64) -> u8 {
    let mut density = 0.0;
    let mut finer_density = 0.0;
    let mut level = MAX_OCTREE_LEVEL;
    while level > 0 {
      finer_density = density;
      density = self.mean_density(level);
      if density >= population {
        break;
      }
      level -= 1;
    }

    if level < MAX_OCTREE_LEVEL {
      if level == 0 {
        finer_density = density;
        density = self.len() as f64;
      }
      if density - population > population - finer_density {
        level += 1;
      }
    }
    level
  }

  /// Level (at least 1) whose occupied cell count is closest to `cells`.
  pub fn find_best_level_for_cell_count(&self, cells: usize) -> u8 {
    let distance = |level: u8| self.cell_count(level).abs_diff(cells);
    let mut best = 1;
    let mut best_distance = distance(1);
    while best < MAX_OCTREE_LEVEL {
      let next = distance(best + 1);
      if next >= best_distance {
        break;
      }
      best += 1;
      best_distance = next;
    }
    best
  }

  /// Level suited to extracting neighbourhoods of `radius`: cell size
  /// closest to `radius / 2.5`.
  pub fn find_best_level_for_radius(&self, radius: f64) -> u8 {
    let aim = radius / NEIGHBOURHOOD_EXTRACTION_FACTOR;
    let mut best = 1;
    let mut best_delta = (self.cell_size(1) - aim).powi(2);
    for level in 2..MAX_OCTREE_LEVEL {
      let delta = (self.cell_size(level) - aim).powi(2);
      if delta < best_delta {
        best = level;
        best_delta = delta;
      }
    }
    best
  }

  /// Level minimizing the estimated cost of comparing this octree's points
  /// against `other` (e.g. cloud-to-cloud distances).
  ///
  /// Linear time model: `points_a * points_b / cells_b * 0.001 + cells_only_in_a`.
  /// Both octrees must share the same bounding cube.
  pub fn find_best_level_for_comparison<D: PointCloud + ?Sized>(&self, other: &Octree<'_, D>) -> u8 {
    let points_a = self.len();
    let points_b = other.len();
    let max_level = if points_a.min(points_b) < 16 {
      5
    } else if points_a.max(points_b) <= 2_000_000 {
      10
    } else {
      MAX_OCTREE_LEVEL
    };

    let mut best = 1;
    let mut best_time = f64::INFINITY;
    for level in 1..max_level {
      let diff = self.diff(level, other);
      let time = if diff.cells_b == 0 {
        f64::INFINITY
      } else {
        (points_a as f64 * points_b as f64) / diff.cells_b as f64 * 0.001
          + diff.cells_only_in_a as f64
      };
      if time < best_time {
        best = level;
        best_time = time;
      }
    }
    best
  }

  /// Cells and points at `level` present in one octree but not the other.
  pub fn diff<D: PointCloud + ?Sized>(&self, level: u8, other: &Octree<'_, D>) -> OctreeDiff {
    debug_assert!(level <= MAX_OCTREE_LEVEL);
    let mut runs_a = self.cell_runs(level).peekable();
    let mut runs_b = other.cell_runs(level).peekable();
    let mut diff = OctreeDiff::default();

    loop {
      match (runs_a.peek().copied(), runs_b.peek().copied()) {
        (Some(a), Some(b)) if a.code == b.code => {
          diff.cells_a += 1;
          diff.cells_b += 1;
          runs_a.next();
          runs_b.next();
        }
        (Some(a), b) if b.map_or(true, |b| a.code < b.code) => {
          diff.cells_a += 1;
          diff.cells_only_in_a += 1;
          diff.points_only_in_a += a.population();
          runs_a.next();
        }
        (_, Some(b)) => {
          diff.cells_b += 1;
          diff.cells_only_in_b += 1;
          diff.points_only_in_b += b.population();
          runs_b.next();
        }
        _ => break,
      }
    }
    diff
  }
}

#[cfg(test)]
#[path = "levels_test.rs"]
mod levels_test;
