//! Neighbourhood shells - cells at a fixed Chebyshev distance from a center
//! cell.
//!
//! Shell `d` is the surface of the `(2d+1)^3` cube of cells centered on the
//! start cell. Enumerating shells `0, 1, 2, ...` visits every cell exactly
//! once:
//!
//! ```text
//!   x faces   full y/z extent
//!   y faces   x strictly inside
//!   z faces   x and y strictly inside
//! ```
//!
//! Every range is clipped to the level's fill indexes, so cells that cannot
//! be occupied are never looked up.

use glam::{DVec3, IVec3};

use super::lookup::CellRange;
use super::tree::Octree;
use crate::cloud::PointCloud;
use crate::error::{try_reserve, OctreeResult};

/// A point gathered by a neighbourhood query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
  /// Index of the point in the cloud.
  pub index: u32,
  /// Point coordinates.
  pub point: DVec3,
  /// Squared distance to the query point.
  pub sq_dist: f64,
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  /// Visit the occupied cells of shell `distance` around `center` at `level`.
  ///
  /// `center` may lie outside the grid.
  pub(crate) fn for_each_shell_cell<F>(
    &self,
    center: IVec3,
    distance: i32,
    level: u8,
    mut visit: F,
  ) -> OctreeResult<()>
  where
    F: FnMut(CellRange) -> OctreeResult<()>,
  {
    let fill = self.fill_indexes(level);
    if fill.is_empty() || self.is_empty() {
      return Ok(());
    }

    if distance == 0 {
      if fill.contains(center) {
        if let Some(cell) = self.cell_range_at(center, level) {
          visit(cell)?;
        }
      }
      return Ok(());
    }

    let lo = center.saturating_sub(IVec3::splat(distance));
    let hi = center.saturating_add(IVec3::splat(distance));
    let clip_lo = lo.max(fill.min);
    let clip_hi = hi.min(fill.max);
    if clip_lo.cmpgt(clip_hi).any() {
      return Ok(());
    }

    let mut probe = |pos: IVec3| -> OctreeResult<()> {
      match self.cell_range_at(pos, level) {
        Some(cell) => visit(cell),
        None => Ok(()),
      }
    };

    // x faces
    for x in [lo.x, hi.x] {
      if x < fill.min.x || x > fill.max.x {
        continue;
      }
      for y in clip_lo.y..=clip_hi.y {
        for z in clip_lo.z..=clip_hi.z {
          probe(IVec3::new(x, y, z))?;
        }
      }
    }

    let inner_x = (lo.x + 1).max(fill.min.x)..=(hi.x - 1).min(fill.max.x);

    // y faces
    for y in [lo.y, hi.y] {
      if y < fill.min.y || y > fill.max.y {
        continue;
      }
      for x in inner_x.clone() {
        for z in clip_lo.z..=clip_hi.z {
          probe(IVec3::new(x, y, z))?;
        }
      }
    }

    // z faces
    let inner_y = (lo.y + 1).max(fill.min.y)..=(hi.y - 1).min(fill.max.y);
    for z in [lo.z, hi.z] {
      if z < fill.min.z || z > fill.max.z {
        continue;
      }
      for x in inner_x.clone() {
        for y in inner_y.clone() {
          probe(IVec3::new(x, y, z))?;
        }
      }
    }

    Ok(())
  }

  /// Append the first-entry index of every occupied cell of shell `distance`.
  pub fn shell_cells(
    &self,
    center: IVec3,
    distance: i32,
    level: u8,
    out: &mut Vec<usize>,
  ) -> OctreeResult<()> {
    self.for_each_shell_cell(center, distance, level, |cell| {
      try_reserve(out, 1)?;
      out.push(cell.start);
      Ok(())
    })
  }

  /// Append every point of shell `distance`.
  ///
  /// Squared distances are measured to `query`, or left at 0 without one.
  pub fn shell_points(
    &self,
    center: IVec3,
    distance: i32,
    level: u8,
    query: Option<DVec3>,
    out: &mut Vec<Neighbor>,
  ) -> OctreeResult<()> {
    self.for_each_shell_cell(center, distance, level, |cell| {
      try_reserve(out, cell.population())?;
      out.extend(self.entries[cell.range()].iter().map(|entry| {
        let point = self.point(entry.index);
        Neighbor {
          index: entry.index,
          point,
          sq_dist: query.map_or(0.0, |q| point.distance_squared(q)),
        }
      }));
      Ok(())
    })
  }
}

#[cfg(test)]
#[path = "neighbors_test.rs"]
mod neighbors_test;
