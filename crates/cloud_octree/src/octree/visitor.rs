//! Cell dispatch - run a callback on every occupied cell.
//!
//! Cells are either fixed at one level or adaptive: split while too
//! populated, merged into their parent while too sparse. Serial dispatch
//! visits cells in ascending code order (Morton order across space).
//! Parallel dispatch partitions the same cells up front and runs them on
//! rayon's pool; only the number of processed cells is deterministic.
//!
//! A callback returning `false` aborts the whole dispatch with
//! [`OctreeError::CallbackAborted`].

use glam::DVec3;
use rayon::prelude::*;

use super::lookup::CellRange;
use super::node::CellKey;
use super::tree::Octree;
use crate::cloud::PointCloud;
use crate::constants::{bit_shift, CellCode, MAX_OCTREE_LEVEL};
use crate::error::{try_push, try_reserve, OctreeError, OctreeResult};
use crate::progress::{NormalizedProgress, ProgressSink};
use crate::threading::DispatchContext;

/// One occupied cell handed to a dispatch callback.
pub struct OctreeCell<'a, 'c, C: PointCloud + ?Sized> {
  octree: &'a Octree<'c, C>,
  range: CellRange,
  indices: &'a [u32],
}

impl<'a, 'c, C: PointCloud + ?Sized> OctreeCell<'a, 'c, C> {
  /// The octree the cell belongs to.
  #[inline]
  pub fn octree(&self) -> &'a Octree<'c, C> {
    self.octree
  }

  /// Level of the cell.
  #[inline]
  pub fn level(&self) -> u8 {
    self.range.level
  }

  /// Truncated code of the cell.
  #[inline]
  pub fn code(&self) -> CellCode {
    self.range.code
  }

  /// Index of the cell's first entry in the sorted array.
  #[inline]
  pub fn start(&self) -> usize {
    self.range.start
  }

  /// The cell's entry range.
  #[inline]
  pub fn range(&self) -> CellRange {
    self.range
  }

  /// Grid address of the cell.
  #[inline]
  pub fn key(&self) -> CellKey {
    CellKey::from_code(self.range.code, self.range.level)
  }

  /// Number of points in the cell.
  #[inline]
  pub fn population(&self) -> usize {
    self.indices.len()
  }

  /// Cloud indices of the cell's points.
  #[inline]
  pub fn indices(&self) -> &'a [u32] {
    self.indices
  }

  /// Coordinates of the cell's points.
  pub fn points(&self) -> impl Iterator<Item = DVec3> + '_ {
    self.indices.iter().map(|&index| self.octree.point(index))
  }

  /// Center of the cell.
  #[inline]
  pub fn center(&self) -> DVec3 {
    self.octree.cell_center(self.key().pos, self.range.level)
  }
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  // =========================================================================
  // Partitions
  // =========================================================================

  /// Every occupied cell at `level`, ascending.
  pub fn cell_ranges(&self, level: u8) -> OctreeResult<Vec<CellRange>> {
    let mut ranges = Vec::new();
    try_reserve(&mut ranges, self.cell_count(level))?;
    ranges.extend(self.cell_runs(level));
    Ok(ranges)
  }

  /// Adaptive partition starting at `start_level`.
  ///
  /// A cell above `max_population` is split (down to the deepest level). A
  /// cell below `min_population` is replaced by its parent, never above
  /// `start_level`, when it is the parent's first occupied child and the
  /// parent holds at most `max_population` points. The ranges cover the
  /// sorted array exactly once, in ascending order.
  pub fn adaptive_cell_ranges(
    &self,
    start_level: u8,
    min_population: usize,
    max_population: usize,
  ) -> OctreeResult<Vec<CellRange>> {
    debug_assert!(start_level <= MAX_OCTREE_LEVEL);
    if max_population == 0 || min_population > max_population {
      return Err(OctreeError::InvalidParameter(
        "adaptive populations must satisfy 0 < max and min <= max",
      ));
    }

    let mut ranges = Vec::new();
    let mut level = start_level;
    let mut start = 0;
    while start < self.entries.len() {
      let end = self.cell_end(start, level);
      let population = end - start;

      if population > max_population && level < MAX_OCTREE_LEVEL {
        level += 1;
        continue;
      }

      if population < min_population && level > start_level {
        let parent_shift = bit_shift(level - 1);
        let parent_code = self.entries[start].code >> parent_shift;
        let first_child =
          start == 0 || (self.entries[start - 1].code >> parent_shift) != parent_code;
        if first_child && self.cell_end(start, level - 1) - start <= max_population {
          level -= 1;
          continue;
        }
      }

      try_push(
        &mut ranges,
        CellRange {
          code: self.entries[start].code >> bit_shift(level),
          level,
          start,
          end,
        },
      )?;
      start = end;
    }
    Ok(ranges)
  }

  fn collect_indices(&self, range: &CellRange, buffer: &mut Vec<u32>) -> OctreeResult<()> {
    buffer.clear();
    try_reserve(buffer, range.population())?;
    buffer.extend(self.entries[range.range()].iter().map(|entry| entry.index));
    Ok(())
  }

  // =========================================================================
  // Serial dispatch
  // =========================================================================

  fn dispatch_serial<I, F>(
    &self,
    cells: I,
    total: usize,
    progress: Option<&mut dyn ProgressSink>,
    mut callback: F,
  ) -> OctreeResult<usize>
  where
    I: IntoIterator<Item = CellRange>,
    F: FnMut(&OctreeCell<'_, 'c, C>) -> bool,
  {
    let mut progress = progress.map(|sink| {
      sink.reset();
      sink.set_info("Processing octree cells");
      NormalizedProgress::new(sink, total, 0.0, 100.0)
    });

    let mut indices = Vec::new();
    let mut processed = 0;
    for range in cells {
      self.collect_indices(&range, &mut indices)?;
      let cell = OctreeCell {
        octree: self,
        range,
        indices: &indices,
      };
      if !callback(&cell) {
        return Err(OctreeError::CallbackAborted);
      }
      processed += 1;
      if let Some(progress) = progress.as_mut() {
        if !progress.one_step() {
          return Err(OctreeError::Cancelled);
        }
      }
    }

    if let Some(progress) = progress.as_mut() {
      progress.finish();
    }
    Ok(processed)
  }

  /// Run `callback` on every occupied cell at `level`, in ascending code order.
  ///
  /// Returns the number of cells processed.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree::for_each_cell_at_level"))]
  pub fn for_each_cell_at_level<F>(
    &self,
    level: u8,
    progress: Option<&mut dyn ProgressSink>,
    callback: F,
  ) -> OctreeResult<usize>
  where
    F: FnMut(&OctreeCell<'_, 'c, C>) -> bool,
  {
    debug_assert!(level <= MAX_OCTREE_LEVEL);
    self.dispatch_serial(self.cell_runs(level), self.cell_count(level), progress, callback)
  }

  /// Run `callback` on every cell of the adaptive partition
  /// (see [`Octree::adaptive_cell_ranges`]), in ascending code order.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree::for_each_cell_adaptive"))]
  pub fn for_each_cell_adaptive<F>(
    &self,
    start_level: u8,
    min_population: usize,
    max_population: usize,
    progress: Option<&mut dyn ProgressSink>,
    callback: F,
  ) -> OctreeResult<usize>
  where
    F: FnMut(&OctreeCell<'_, 'c, C>) -> bool,
  {
    let ranges = self.adaptive_cell_ranges(start_level, min_population, max_population)?;
    let total = ranges.len();
    self.dispatch_serial(ranges, total, progress, callback)
  }
}

// =========================================================================
// Parallel dispatch
// =========================================================================

impl<'c, C: PointCloud + Sync + ?Sized> Octree<'c, C> {
  fn dispatch_parallel<F>(
    &self,
    cells: &[CellRange],
    progress: Option<&mut dyn ProgressSink>,
    callback: F,
  ) -> OctreeResult<usize>
  where
    F: Fn(&OctreeCell<'_, 'c, C>) -> bool + Sync + Send,
  {
    let context = DispatchContext::new(progress, cells.len(), "Processing octree cells");

    let _ = cells.par_iter().try_for_each_init(Vec::new, |indices, range| {
      if context.should_stop() {
        return Err(());
      }
      if let Err(error) = self.collect_indices(range, indices) {
        context.fail(error);
        return Err(());
      }
      let cell = OctreeCell {
        octree: self,
        range: *range,
        indices: indices.as_slice(),
      };
      if !callback(&cell) {
        context.fail(OctreeError::CallbackAborted);
        return Err(());
      }
      context.cell_done()
    });

    context.finish()
  }

  /// Parallel [`Octree::for_each_cell_at_level`]. Completion order is
  /// unspecified.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree::par_for_each_cell_at_level"))]
  pub fn par_for_each_cell_at_level<F>(
    &self,
    level: u8,
    progress: Option<&mut dyn ProgressSink>,
    callback: F,
  ) -> OctreeResult<usize>
  where
    F: Fn(&OctreeCell<'_, 'c, C>) -> bool + Sync + Send,
  {
    debug_assert!(level <= MAX_OCTREE_LEVEL);
    let ranges = self.cell_ranges(level)?;
    self.dispatch_parallel(&ranges, progress, callback)
  }

  /// Parallel [`Octree::for_each_cell_adaptive`]. Completion order is
  /// unspecified.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree::par_for_each_cell_adaptive"))]
  pub fn par_for_each_cell_adaptive<F>(
    &self,
    start_level: u8,
    min_population: usize,
    max_population: usize,
    progress: Option<&mut dyn ProgressSink>,
    callback: F,
  ) -> OctreeResult<usize>
  where
    F: Fn(&OctreeCell<'_, 'c, C>) -> bool + Sync + Send,
  {
    let ranges = self.adaptive_cell_ranges(start_level, min_population, max_population)?;
    self.dispatch_parallel(&ranges, progress, callback)
  }
}

#[cfg(test)]
#[path = "visitor_test.rs"]
mod visitor_test;
