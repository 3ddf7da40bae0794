//! Octree - the sorted (point index, cell code) array and its per-level
//! metadata.
//!
//! No tree nodes are materialized. Every cell, at every level, is the
//! contiguous run of entries sharing a truncated code; all queries address
//! cells by binary search over this array.
//!
//! # Lifecycle
//!
//! ```text
//! Octree::new(&cloud)      empty, queryable (every query returns nothing)
//!   └─ build(config)       scan → sort → statistics
//!        ├─ Ok(report)     read-only index until the next build/clear
//!        └─ Err(..)        back to empty, never partially built
//! ```

use glam::{DVec3, IVec3};
use rayon::slice::ParallelSliceMut;
use web_time::Instant;

use super::bounds::{BoundingCube, DAabb3, FillIndexes};
use super::code::{decode_cell_pos, encode_cell_code};
use super::config::BuildConfig;
use super::stats::{compute_level_stats, LevelStats, LEVEL_COUNT};
use crate::cloud::PointCloud;
use crate::constants::{octree_length, CellCode, MAX_OCTREE_LENGTH, MAX_OCTREE_LEVEL};
use crate::error::{try_reserve, OctreeError, OctreeResult};
use crate::progress::{NormalizedProgress, ProgressSink};

/// One entry of the octree: a point index and its full-depth cell code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexedCode {
  /// Index of the point in the cloud.
  pub index: u32,
  /// Full-depth cell code of the point.
  pub code: CellCode,
}

/// Summary of a successful build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
  /// Number of points in the cloud.
  pub point_count: usize,
  /// Number of points indexed (inside the accepted-points box).
  pub accepted_count: usize,
  /// Total build time in microseconds.
  pub elapsed_us: u64,
}

/// Octree over a borrowed point cloud.
///
/// The cloud must not change while the octree exists; call
/// [`Octree::build`] again after editing points.
pub struct Octree<'c, C: PointCloud + ?Sized> {
  pub(super) cloud: &'c C,
  /// Sorted ascending by code.
  pub(super) entries: Vec<IndexedCode>,
  pub(super) cube: BoundingCube,
  pub(super) built: bool,
  /// Extent of the indexed points.
  pub(super) points_bounds: Option<DAabb3>,
  pub(super) cell_sizes: [f64; LEVEL_COUNT],
  pub(super) fill: [FillIndexes; LEVEL_COUNT],
  pub(super) stats: [LevelStats; LEVEL_COUNT],
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  /// Create an empty octree over `cloud`. Call [`Octree::build`] to index it.
  pub fn new(cloud: &'c C) -> Self {
    let cube = BoundingCube::new(DVec3::ZERO, 1.0);
    Self {
      cloud,
      entries: Vec::new(),
      cube,
      built: false,
      points_bounds: None,
      cell_sizes: cell_size_table(cube.edge),
      fill: [FillIndexes::EMPTY; LEVEL_COUNT],
      stats: [LevelStats::default(); LEVEL_COUNT],
    }
  }

  /// Create and build in one call.
  pub fn from_cloud(cloud: &'c C, config: &BuildConfig) -> OctreeResult<Self> {
    let mut octree = Self::new(cloud);
    octree.build(config, None)?;
    Ok(octree)
  }

  /// Drop the index and return to the empty state.
  pub fn clear(&mut self) {
    self.entries = Vec::new();
    self.cube = BoundingCube::new(DVec3::ZERO, 1.0);
    self.built = false;
    self.points_bounds = None;
    self.cell_sizes = cell_size_table(self.cube.edge);
    self.fill = [FillIndexes::EMPTY; LEVEL_COUNT];
    self.stats = [LevelStats::default(); LEVEL_COUNT];
  }

  /// Index the cloud.
  ///
  /// Progress: 90% of the window for the point scan, 10% for the sort.
  /// Cancellation or allocation failure leaves the octree empty.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree::build"))]
  pub fn build(
    &mut self,
    config: &BuildConfig,
    progress: Option<&mut dyn ProgressSink>,
  ) -> OctreeResult<BuildReport> {
    let start = Instant::now();
    self.clear();

    match self.build_index(config, progress) {
      Ok(accepted_count) => {
        let report = BuildReport {
          point_count: self.cloud.len(),
          accepted_count,
          elapsed_us: start.elapsed().as_micros() as u64,
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
          points = report.point_count,
          accepted = report.accepted_count,
          elapsed_us = report.elapsed_us,
          "octree built"
        );
        Ok(report)
      }
      Err(error) => {
        #[cfg(feature = "tracing")]
        tracing::warn!(%error, "octree build failed");
        self.clear();
        Err(error)
      }
    }
  }

  fn build_index(
    &mut self,
    config: &BuildConfig,
    mut progress: Option<&mut dyn ProgressSink>,
  ) -> OctreeResult<usize> {
    let count = self.cloud.len();
    if count == 0 {
      return Err(OctreeError::EmptyCloud);
    }
    if count > u32::MAX as usize {
      return Err(OctreeError::TooManyPoints { count });
    }

    let cube = match config.bounding_cube {
      Some(cube) => cube,
      None => DAabb3::from_cloud(self.cloud)
        .ok_or(OctreeError::EmptyCloud)?
        .cubified(config.cube_slack),
    };
    if !(cube.edge > 0.0 && cube.edge.is_finite() && cube.min.is_finite()) {
      return Err(OctreeError::InvalidParameter(
        "bounding cube edge must be positive and finite",
      ));
    }
    self.set_cube(cube);

    let mut entries = Vec::new();
    try_reserve(&mut entries, count)?;
    let mut fill = FillIndexes::EMPTY;
    let mut points_min = DVec3::splat(f64::INFINITY);
    let mut points_max = DVec3::splat(f64::NEG_INFINITY);

    if let Some(sink) = progress.as_deref_mut() {
      sink.reset();
      sink.set_info("Projecting points");
    }

    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("project_points").entered();

      let mut scan = progress
        .as_deref_mut()
        .map(|sink| NormalizedProgress::new(sink, count, 0.0, 90.0));

      for index in 0..count {
        let point = self.cloud.point(index);
        let accepted = config
          .accepted_points
          .map_or(true, |accepted| accepted.contains_point(point));

        if accepted {
          let pos = self.max_level_cell_pos(point);
          fill.include(pos);
          points_min = points_min.min(point);
          points_max = points_max.max(point);
          entries.push(IndexedCode {
            index: index as u32,
            code: encode_cell_code(pos, MAX_OCTREE_LEVEL),
          });
        }

        if let Some(scan) = scan.as_mut() {
          if !scan.one_step() {
            return Err(OctreeError::Cancelled);
          }
        }
      }
    }

    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("sort_codes", entries = entries.len()).entered();

      if let Some(sink) = progress.as_deref_mut() {
        sink.set_info("Sorting cell codes");
      }
      if config.parallel_sort {
        entries.par_sort_unstable_by_key(|entry| entry.code);
      } else {
        entries.sort_unstable_by_key(|entry| entry.code);
      }
      if let Some(sink) = progress.as_deref_mut() {
        sink.update(100.0);
        if sink.is_cancel_requested() {
          return Err(OctreeError::Cancelled);
        }
      }
    }

    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("level_statistics").entered();

      self.stats = compute_level_stats(&entries);
      for level in 0..=MAX_OCTREE_LEVEL {
        self.fill[level as usize] = fill.coarsened(MAX_OCTREE_LEVEL - level);
      }
    }

    let accepted = entries.len();
    if accepted > 0 {
      self.points_bounds = Some(DAabb3::new(points_min, points_max));
    }
    self.entries = entries;
    self.built = true;
    Ok(accepted)
  }

  fn set_cube(&mut self, cube: BoundingCube) {
    self.cube = cube;
    self.cell_sizes = cell_size_table(cube.edge);
  }

  // =========================================================================
  // Accessors
  // =========================================================================

  /// The indexed cloud.
  #[inline]
  pub fn cloud(&self) -> &'c C {
    self.cloud
  }

  /// Number of indexed points.
  #[inline]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// True when nothing is indexed (never built, failed, or no point accepted).
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// The sorted (point index, code) array.
  #[inline]
  pub fn entries(&self) -> &[IndexedCode] {
    &self.entries
  }

  /// Coordinates of a cloud point.
  #[inline]
  pub fn point(&self, index: u32) -> DVec3 {
    self.cloud.point(index as usize)
  }

  /// The subdivided cube, once built.
  #[inline]
  pub fn bounding_cube(&self) -> Option<BoundingCube> {
    self.built.then_some(self.cube)
  }

  /// Extent of the indexed points.
  #[inline]
  pub fn points_bounds(&self) -> Option<DAabb3> {
    self.points_bounds
  }

  /// Edge length of a cell at `level`.
  #[inline]
  pub fn cell_size(&self, level: u8) -> f64 {
    self.cell_sizes[level as usize]
  }

  /// Occupied cell bounds at `level`.
  #[inline]
  pub fn fill_indexes(&self, level: u8) -> FillIndexes {
    self.fill[level as usize]
  }

  /// Population statistics at `level`.
  #[inline]
  pub fn level_stats(&self, level: u8) -> LevelStats {
    self.stats[level as usize]
  }

  /// Number of occupied cells at `level`.
  #[inline]
  pub fn cell_count(&self, level: u8) -> usize {
    self.stats[level as usize].cell_count
  }

  // =========================================================================
  // Cell geometry
  // =========================================================================

  /// Cell position containing `point` at the deepest level, clamped to the grid.
  #[inline]
  pub(crate) fn max_level_cell_pos(&self, point: DVec3) -> IVec3 {
    let rel = (point - self.cube.min) / self.cell_sizes[MAX_OCTREE_LEVEL as usize];
    rel
      .floor()
      .as_ivec3()
      .clamp(IVec3::ZERO, IVec3::splat(MAX_OCTREE_LENGTH - 1))
  }

  /// Cell position containing `point` at `level`, not clamped: it may lie
  /// outside the grid for points outside the cube.
  #[inline]
  pub(crate) fn cell_pos_unclamped(&self, point: DVec3, level: u8) -> IVec3 {
    ((point - self.cube.min) / self.cell_sizes[level as usize])
      .floor()
      .as_ivec3()
  }

  /// Cell position containing `point` at `level`, clamped to the grid,
  /// and whether the point actually lies inside the cube.
  pub fn cell_pos(&self, point: DVec3, level: u8) -> (IVec3, bool) {
    let pos = self.cell_pos_unclamped(point, level);
    let max = IVec3::splat(octree_length(level) - 1);
    let clamped = pos.clamp(IVec3::ZERO, max);
    (clamped, clamped == pos)
  }

  /// Center of the cell at `pos` (any position, in or out of the grid).
  #[inline]
  pub fn cell_center(&self, pos: IVec3, level: u8) -> DVec3 {
    self.cube.min + (pos.as_dvec3() + DVec3::splat(0.5)) * self.cell_sizes[level as usize]
  }

  /// Box covered by a cell given by its code.
  pub fn cell_limits(&self, code: CellCode, level: u8, truncated: bool) -> DAabb3 {
    let pos = decode_cell_pos(code, level, truncated);
    let size = self.cell_sizes[level as usize];
    let min = self.cube.min + pos.as_dvec3() * size;
    DAabb3::new(min, min + DVec3::splat(size))
  }

  /// World-space box spanned by the occupied cells at `level`.
  pub(crate) fn fill_box(&self, level: u8) -> Option<DAabb3> {
    let fill = self.fill[level as usize];
    if fill.is_empty() {
      return None;
    }
    let size = self.cell_sizes[level as usize];
    Some(DAabb3::new(
      self.cube.min + fill.min.as_dvec3() * size,
      self.cube.min + (fill.max + IVec3::ONE).as_dvec3() * size,
    ))
  }
}

/// Cell edge length for every level of a cube.
fn cell_size_table(edge: f64) -> [f64; LEVEL_COUNT] {
  let mut sizes = [0.0; LEVEL_COUNT];
  for (level, size) in sizes.iter_mut().enumerate() {
    *size = edge / (1u64 << level) as f64;
  }
  sizes
}

/// Radius of the largest sphere centered on `point` that fits inside the cell
/// of edge `cell_size` centered on `cell_center`.
#[inline]
pub(crate) fn min_distance_to_cell_border(point: DVec3, cell_size: f64, cell_center: DVec3) -> f64 {
  let offset = (point - cell_center).abs().max_element();
  (cell_size * 0.5 - offset).max(0.0)
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
