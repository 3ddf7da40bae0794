//! Fixed-shape neighbourhoods: sphere, cylinder and box.
//!
//! The shape is known up front, so no expansion logic is needed: the cells
//! overlapping the shape's bounding box (clipped to the fill indexes) are
//! scanned directly. Cells whose center is too far from the shape to hold
//! any matching point are rejected before the lookup.

use std::ops::RangeInclusive;

use glam::{DVec3, IVec3};

use super::bounds::DAabb3;
use super::lookup::CellRange;
use super::neighbors::Neighbor;
use super::tree::Octree;
use crate::cloud::PointCloud;
use crate::error::{try_reserve, OctreeError, OctreeResult};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Inclusive range of cell positions at one level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CellBox {
  min: IVec3,
  max: IVec3,
}

impl CellBox {
  #[inline]
  fn contains(&self, pos: IVec3) -> bool {
    pos.cmpge(self.min).all() && pos.cmple(self.max).all()
  }

  #[inline]
  fn axis(&self, axis: usize) -> RangeInclusive<i32> {
    self.min[axis]..=self.max[axis]
  }
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  /// Cells overlapping `[min, max]` at `level`, clipped to the occupied region.
  ///
  /// Padded by one cell: a point on a cell border may have been projected
  /// into either neighbour.
  fn clipped_cell_box(&self, min: DVec3, max: DVec3, level: u8) -> Option<CellBox> {
    let fill = self.fill_indexes(level);
    if fill.is_empty() || self.is_empty() {
      return None;
    }
    let lo = self.cell_pos_unclamped(min, level).saturating_sub(IVec3::ONE).max(fill.min);
    let hi = self.cell_pos_unclamped(max, level).saturating_add(IVec3::ONE).min(fill.max);
    (!lo.cmpgt(hi).any()).then_some(CellBox { min: lo, max: hi })
  }

  /// Visit the occupied cells of `cells`, in z, y, x order.
  fn for_each_cell_in_box<F>(&self, cells: CellBox, level: u8, mut visit: F) -> OctreeResult<()>
  where
    F: FnMut(IVec3, CellRange) -> OctreeResult<()>,
  {
    for z in cells.axis(2) {
      for y in cells.axis(1) {
        for x in cells.axis(0) {
          let pos = IVec3::new(x, y, z);
          if let Some(cell) = self.cell_range_at(pos, level) {
            visit(pos, cell)?;
          }
        }
      }
    }
    Ok(())
  }

  // =========================================================================
  // Sphere
  // =========================================================================

  /// Every point within `radius` of `center` (boundary included), unordered.
  pub fn find_in_sphere(&self, center: DVec3, radius: f64, level: u8) -> OctreeResult<Vec<Neighbor>> {
    let mut found = Vec::new();
    if radius < 0.0 {
      return Ok(found);
    }
    let half = DVec3::splat(radius);
    let Some(cells) = self.clipped_cell_box(center - half, center + half, level) else {
      return Ok(found);
    };

    let cell_size = self.cell_size(level);
    let sq_radius = radius * radius;
    // (radius + half cell diagonal)^2
    let sq_reach = sq_radius + (0.75 * cell_size + SQRT_3 * radius) * cell_size;

    self.for_each_cell_in_box(cells, level, |pos, cell| {
      if self.cell_center(pos, level).distance_squared(center) > sq_reach {
        return Ok(());
      }
      for entry in &self.entries[cell.range()] {
        let point = self.point(entry.index);
        let sq_dist = point.distance_squared(center);
        if sq_dist <= sq_radius {
          try_reserve(&mut found, 1)?;
          found.push(Neighbor {
            index: entry.index,
            point,
            sq_dist,
          });
        }
      }
      Ok(())
    })?;
    Ok(found)
  }

  // =========================================================================
  // Box
  // =========================================================================

  /// Every point inside the box `center ± half_extents`, unordered.
  /// Distances are measured to `center`.
  pub fn find_in_box(
    &self,
    center: DVec3,
    half_extents: DVec3,
    level: u8,
  ) -> OctreeResult<Vec<Neighbor>> {
    let mut found = Vec::new();
    if half_extents.cmplt(DVec3::ZERO).any() {
      return Ok(found);
    }
    let bounds = DAabb3::from_center_half_extents(center, half_extents);
    let Some(cells) = self.clipped_cell_box(bounds.min, bounds.max, level) else {
      return Ok(found);
    };

    let cell_size = self.cell_size(level);
    self.for_each_cell_in_box(cells, level, |pos, cell| {
      let corner = self.cell_center(pos, level) - DVec3::splat(cell_size * 0.5);
      let inside = bounds.contains_point(corner)
        && bounds.contains_point(corner + DVec3::splat(cell_size));
      try_reserve(&mut found, cell.population())?;
      for entry in &self.entries[cell.range()] {
        let point = self.point(entry.index);
        if inside || bounds.contains_point(point) {
          found.push(Neighbor {
            index: entry.index,
            point,
            sq_dist: point.distance_squared(center),
          });
        }
      }
      Ok(())
    })?;
    Ok(found)
  }

  // =========================================================================
  // Cylinder
  // =========================================================================

  /// Every point inside `cylinder`, unordered.
  pub fn find_in_cylinder(
    &self,
    cylinder: &Cylinder,
    level: u8,
  ) -> OctreeResult<Vec<CylinderNeighbor>> {
    let mut found = Vec::new();
    let (min, max) = cylinder.bounds();
    let Some(cells) = self.clipped_cell_box(min, max, level) else {
      return Ok(found);
    };

    let half_diagonal = self.cell_size(level) * SQRT_3 * 0.5;
    let max_radial = cylinder.radius + half_diagonal;
    let axial_range = (cylinder.min_axial() - half_diagonal)..=(cylinder.half_length + half_diagonal);

    self.for_each_cell_in_box(cells, level, |pos, cell| {
      let (sq_radial, axial) = cylinder.project(self.cell_center(pos, level));
      if sq_radial > max_radial * max_radial || !axial_range.contains(&axial) {
        return Ok(());
      }
      for entry in &self.entries[cell.range()] {
        let candidate = cylinder.candidate(entry.index, self.point(entry.index));
        if candidate.sq_dist_to_axis <= cylinder.sq_radius() && cylinder.axially_contains(candidate.axial) {
          try_reserve(&mut found, 1)?;
          found.push(candidate);
        }
      }
      Ok(())
    })?;
    Ok(found)
  }

  /// Start a cylinder search whose half-length grows across calls.
  pub fn progressive_cylinder(&self, cylinder: Cylinder, level: u8) -> ProgressiveCylinder {
    ProgressiveCylinder {
      cylinder,
      level,
      visited: None,
      potential: Vec::new(),
    }
  }
}

/// A finite cylinder around an axis through `center`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cylinder {
  center: DVec3,
  /// Unit length.
  axis: DVec3,
  radius: f64,
  half_length: f64,
  only_positive_side: bool,
}

impl Cylinder {
  /// Cylinder of `radius` spanning `center ± axis * half_length`.
  ///
  /// `axis` is normalized; a zero or non-finite axis is rejected.
  pub fn new(center: DVec3, axis: DVec3, radius: f64, half_length: f64) -> OctreeResult<Self> {
    let axis = axis
      .try_normalize()
      .ok_or(OctreeError::InvalidParameter("cylinder axis must be non-zero"))?;
    if !(radius >= 0.0) || !(half_length >= 0.0) {
      return Err(OctreeError::InvalidParameter(
        "cylinder radius and half-length must be non-negative",
      ));
    }
    Ok(Self {
      center,
      axis,
      radius,
      half_length,
      only_positive_side: false,
    })
  }

  /// Keep only the half from `center` towards `+axis`.
  pub fn only_positive_side(mut self) -> Self {
    self.only_positive_side = true;
    self
  }

  /// Center point.
  #[inline]
  pub fn center(&self) -> DVec3 {
    self.center
  }

  /// Unit axis direction.
  #[inline]
  pub fn axis(&self) -> DVec3 {
    self.axis
  }

  /// Radius.
  #[inline]
  pub fn radius(&self) -> f64 {
    self.radius
  }

  /// Half-length along the axis.
  #[inline]
  pub fn half_length(&self) -> f64 {
    self.half_length
  }

  #[inline]
  fn sq_radius(&self) -> f64 {
    self.radius * self.radius
  }

  #[inline]
  fn min_axial(&self) -> f64 {
    if self.only_positive_side {
      0.0
    } else {
      -self.half_length
    }
  }

  #[inline]
  fn axially_contains(&self, axial: f64) -> bool {
    axial >= self.min_axial() && axial <= self.half_length
  }

  /// Squared distance to the axis and signed position along it.
  #[inline]
  fn project(&self, point: DVec3) -> (f64, f64) {
    let offset = point - self.center;
    let axial = offset.dot(self.axis);
    ((offset.length_squared() - axial * axial).max(0.0), axial)
  }

  #[inline]
  fn candidate(&self, index: u32, point: DVec3) -> CylinderNeighbor {
    let (sq_dist_to_axis, axial) = self.project(point);
    CylinderNeighbor {
      index,
      point,
      sq_dist_to_axis,
      axial,
    }
  }

  /// Bounding box of the cylinder.
  fn bounds(&self) -> (DVec3, DVec3) {
    let start = self.center + self.axis * self.min_axial();
    let end = self.center + self.axis * self.half_length;
    // Disk extent per axis: radius * sin(angle between axis and that world axis).
    let disk = (DVec3::ONE - self.axis * self.axis).max(DVec3::ZERO).map(f64::sqrt) * self.radius;
    (start.min(end) - disk, start.max(end) + disk)
  }
}

/// A point found by a cylinder query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CylinderNeighbor {
  /// Index of the point in the cloud.
  pub index: u32,
  /// Point coordinates.
  pub point: DVec3,
  /// Squared distance to the axis.
  pub sq_dist_to_axis: f64,
  /// Signed position along the axis, from the center.
  pub axial: f64,
}

/// Cylinder search reusing the cells visited by previous, shorter searches.
///
/// Points within the radius but beyond the half-length are kept aside and
/// promoted once the half-length reaches them.
#[derive(Clone, Debug)]
pub struct ProgressiveCylinder {
  cylinder: Cylinder,
  level: u8,
  visited: Option<CellBox>,
  potential: Vec<CylinderNeighbor>,
}

impl ProgressiveCylinder {
  /// Current cylinder.
  #[inline]
  pub fn cylinder(&self) -> &Cylinder {
    &self.cylinder
  }

  /// Points within the radius, not yet within the half-length.
  #[inline]
  pub fn pending(&self) -> &[CylinderNeighbor] {
    &self.potential
  }

  /// Grow the half-length and append the points it newly covers to `out`.
  ///
  /// Returns the number of points appended. A shorter half-length than the
  /// previous call restarts the search.
  pub fn grow<C: PointCloud + ?Sized>(
    &mut self,
    octree: &Octree<'_, C>,
    half_length: f64,
    out: &mut Vec<CylinderNeighbor>,
  ) -> OctreeResult<usize> {
    if !(half_length >= 0.0) {
      return Err(OctreeError::InvalidParameter("cylinder half-length must be non-negative"));
    }
    if half_length < self.cylinder.half_length {
      self.visited = None;
      self.potential.clear();
    }
    self.cylinder.half_length = half_length;
    let before = out.len();

    // Promote kept points now within the half-length.
    let cylinder = self.cylinder;
    let mut kept = Vec::new();
    try_reserve(&mut kept, self.potential.len())?;
    for candidate in self.potential.drain(..) {
      if cylinder.axially_contains(candidate.axial) {
        try_reserve(out, 1)?;
        out.push(candidate);
      } else {
        kept.push(candidate);
      }
    }
    self.potential = kept;

    let level = self.level;
    let (min, max) = cylinder.bounds();
    let Some(cells) = octree.clipped_cell_box(min, max, level) else {
      return Ok(out.len() - before);
    };
    let visited = self.visited;
    let max_radial = cylinder.radius + octree.cell_size(level) * SQRT_3 * 0.5;
    let potential = &mut self.potential;

    octree.for_each_cell_in_box(cells, level, |pos, cell| {
      if visited.is_some_and(|visited| visited.contains(pos)) {
        return Ok(());
      }
      let (sq_radial, _) = cylinder.project(octree.cell_center(pos, level));
      if sq_radial > max_radial * max_radial {
        return Ok(());
      }
      for entry in &octree.entries()[cell.range()] {
        let candidate = cylinder.candidate(entry.index, octree.point(entry.index));
        if candidate.sq_dist_to_axis > cylinder.sq_radius() {
          continue;
        }
        if cylinder.axially_contains(candidate.axial) {
          try_reserve(out, 1)?;
          out.push(candidate);
        } else if candidate.axial > 0.0 || !cylinder.only_positive_side {
          try_reserve(potential, 1)?;
          potential.push(candidate);
        }
      }
      Ok(())
    })?;

    // Cells are only ever added: the box grows with the half-length.
    self.visited = Some(match visited {
      Some(previous) => CellBox {
        min: previous.min.min(cells.min),
        max: previous.max.max(cells.max),
      },
      None => cells,
    });
    Ok(out.len() - before)
  }
}

#[cfg(test)]
#[path = "spatial_test.rs"]
mod spatial_test;
