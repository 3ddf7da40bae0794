//! Cell lookup - turning a (truncated) cell code into its run of entries.
//!
//! A cell at any level is the contiguous run of sorted entries sharing its
//! truncated code. [`Octree::find_cell_start`] is a lower-bound search for
//! the first entry of that run; the run ends at the first entry whose
//! truncated code differs.

use std::ops::Range;

use glam::IVec3;

use super::tree::{IndexedCode, Octree};
use crate::cloud::PointCloud;
use crate::constants::{bit_shift, CellCode, MAX_OCTREE_LEVEL};
use crate::error::{try_reserve, OctreeResult};

/// One occupied cell as a run of the sorted entry array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
  /// Truncated code of the cell at `level`.
  pub code: CellCode,
  /// Level of the cell.
  pub level: u8,
  /// Index of the cell's first entry.
  pub start: usize,
  /// One past the cell's last entry.
  pub end: usize,
}

impl CellRange {
  /// Number of points in the cell.
  #[inline]
  pub fn population(&self) -> usize {
    self.end - self.start
  }

  /// The entry index range.
  #[inline]
  pub fn range(&self) -> Range<usize> {
    self.start..self.end
  }
}

/// Lower bound of `code` among the entries' codes shifted right by `shift`.
///
/// Power-of-two stepping: starting from the largest power of two not above
/// the length, each step either jumps forward or halves. Same result as a
/// textbook lower bound.
#[inline]
fn lower_bound(entries: &[IndexedCode], code: CellCode, shift: u32) -> usize {
  let len = entries.len();
  if len == 0 {
    return 0;
  }
  let mut step = 1usize << (usize::BITS - 1 - len.leading_zeros());
  let mut pos = 0usize;
  while step > 0 {
    let probe = pos + step;
    if probe <= len && (entries[probe - 1].code >> shift) < code {
      pos = probe;
    }
    step >>= 1;
  }
  pos
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  /// Index of the first entry of the cell `truncated_code` at `level`.
  #[inline]
  pub fn find_cell_start(&self, truncated_code: CellCode, level: u8) -> Option<usize> {
    self.find_cell_start_in(truncated_code, level, 0..self.entries.len())
  }

  /// Same as [`Octree::find_cell_start`], restricted to entries in `search`.
  pub fn find_cell_start_in(
    &self,
    truncated_code: CellCode,
    level: u8,
    search: Range<usize>,
  ) -> Option<usize> {
    debug_assert!(level <= MAX_OCTREE_LEVEL);
    let end = search.end.min(self.entries.len());
    if search.start >= end {
      return None;
    }
    let shift = bit_shift(level);
    let index = search.start + lower_bound(&self.entries[search.start..end], truncated_code, shift);
    (index < end && (self.entries[index].code >> shift) == truncated_code).then_some(index)
  }

  /// One past the last entry of the cell starting at `start`.
  #[inline]
  pub(crate) fn cell_end(&self, start: usize, level: u8) -> usize {
    let shift = bit_shift(level);
    let code = self.entries[start].code >> shift;
    start + self.entries[start..].partition_point(|e| (e.code >> shift) == code)
  }

  /// Run of the cell at `level`. `code` is a full-depth code unless `truncated`.
  pub fn cell_range(&self, code: CellCode, level: u8, truncated: bool) -> Option<CellRange> {
    let code = if truncated { code } else { code >> bit_shift(level) };
    let start = self.find_cell_start(code, level)?;
    Some(CellRange {
      code,
      level,
      start,
      end: self.cell_end(start, level),
    })
  }

  /// Run of the cell at grid position `pos`, if occupied.
  #[inline]
  pub(crate) fn cell_range_at(&self, pos: IVec3, level: u8) -> Option<CellRange> {
    self.cell_range(super::code::encode_cell_code(pos, level), level, true)
  }

  /// Entries of one cell (empty if the cell is not occupied).
  pub fn points_in_cell(&self, code: CellCode, level: u8, truncated: bool) -> &[IndexedCode] {
    match self.cell_range(code, level, truncated) {
      Some(cell) => &self.entries[cell.range()],
      None => &[],
    }
  }

  /// Iterate the occupied cells at `level` in ascending code order.
  pub fn cell_runs(&self, level: u8) -> CellRuns<'_> {
    debug_assert!(level <= MAX_OCTREE_LEVEL);
    CellRuns {
      entries: &self.entries,
      shift: bit_shift(level),
      level,
      next: 0,
    }
  }

  /// Codes of the occupied cells at `level`, ascending. Truncated to the
  /// level when `truncated`, otherwise the code of the cell's first entry.
  pub fn cell_codes(&self, level: u8, truncated: bool) -> OctreeResult<Vec<CellCode>> {
    let mut codes = Vec::new();
    try_reserve(&mut codes, self.cell_count(level))?;
    codes.extend(self.cell_runs(level).map(|cell| {
      if truncated {
        cell.code
      } else {
        self.entries[cell.start].code
      }
    }));
    Ok(codes)
  }

  /// Index of the first entry of every occupied cell at `level`.
  pub fn cell_indexes(&self, level: u8) -> OctreeResult<Vec<usize>> {
    let mut indexes = Vec::new();
    try_reserve(&mut indexes, self.cell_count(level))?;
    indexes.extend(self.cell_runs(level).map(|cell| cell.start));
    Ok(indexes)
  }

  /// Number of cells between `pos` and the occupied region's far side on
  /// each axis: `(towards min, towards max)`, zero when past that side.
  pub fn cell_distance_from_borders(&self, pos: IVec3, level: u8) -> (IVec3, IVec3) {
    let fill = self.fill_indexes(level);
    if fill.is_empty() {
      return (IVec3::ZERO, IVec3::ZERO);
    }
    (
      (pos - fill.min).max(IVec3::ZERO),
      (fill.max - pos).max(IVec3::ZERO),
    )
  }
}

/// Iterator over the occupied cells of one level. See [`Octree::cell_runs`].
pub struct CellRuns<'a> {
  entries: &'a [IndexedCode],
  shift: u32,
  level: u8,
  next: usize,
}

impl Iterator for CellRuns<'_> {
  type Item = CellRange;

  fn next(&mut self) -> Option<CellRange> {
    let start = self.next;
    let first = self.entries.get(start)?;
    let code = first.code >> self.shift;
    let shift = self.shift;
    let end = start
      + self.entries[start..].partition_point(|e| (e.code >> shift) == code);
    self.next = end;
    Some(CellRange {
      code,
      level: self.level,
      start,
      end,
    })
  }
}

#[cfg(test)]
#[path = "lookup_test.rs"]
mod lookup_test;
