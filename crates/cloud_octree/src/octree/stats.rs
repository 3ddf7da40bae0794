//! Per-level cell population statistics.
//!
//! Derived once after the code array is sorted, in a single pass: two
//! consecutive entries start a new cell at every level whose truncation keeps
//! the highest bit in which their codes differ.

use super::tree::IndexedCode;
use crate::constants::MAX_OCTREE_LEVEL;

/// Number of levels, root included.
pub const LEVEL_COUNT: usize = MAX_OCTREE_LEVEL as usize + 1;

/// Cell population statistics at one level.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LevelStats {
  /// Number of occupied cells.
  pub cell_count: usize,
  /// Smallest cell population (0 for an empty octree).
  pub min_population: usize,
  /// Largest cell population.
  pub max_population: usize,
  /// Mean cell population.
  pub average_population: f64,
  /// Standard deviation of cell population.
  pub std_dev_population: f64,
}

#[derive(Clone, Copy)]
struct Accumulator {
  cells: usize,
  min: usize,
  max: usize,
  sum_sq: f64,
}

impl Accumulator {
  const EMPTY: Self = Self {
    cells: 0,
    min: usize::MAX,
    max: 0,
    sum_sq: 0.0,
  };

  #[inline]
  fn close_cell(&mut self, population: usize) {
    self.cells += 1;
    self.min = self.min.min(population);
    self.max = self.max.max(population);
    self.sum_sq += (population as f64) * (population as f64);
  }

  fn finish(&self, point_count: usize) -> LevelStats {
    if self.cells == 0 {
      return LevelStats::default();
    }
    let cells = self.cells as f64;
    let average = point_count as f64 / cells;
    let variance = (self.sum_sq / cells - average * average).max(0.0);
    LevelStats {
      cell_count: self.cells,
      min_population: self.min,
      max_population: self.max,
      average_population: average,
      std_dev_population: variance.sqrt(),
    }
  }
}

/// Statistics for every level of a sorted code array.
pub(crate) fn compute_level_stats(entries: &[IndexedCode]) -> [LevelStats; LEVEL_COUNT] {
  let mut stats = [LevelStats::default(); LEVEL_COUNT];
  if entries.is_empty() {
    return stats;
  }

  let mut accumulators = [Accumulator::EMPTY; LEVEL_COUNT];
  let mut run_start = [0usize; LEVEL_COUNT];

  for (i, pair) in entries.windows(2).enumerate() {
    let diff = pair[0].code ^ pair[1].code;
    if diff == 0 {
      continue;
    }
    debug_assert!(pair[0].code < pair[1].code, "codes must be sorted");
    let top_bit = 63 - diff.leading_zeros();
    let first_level = MAX_OCTREE_LEVEL as usize - (top_bit / 3) as usize;
    let next = i + 1;
    for level in first_level..LEVEL_COUNT {
      accumulators[level].close_cell(next - run_start[level]);
      run_start[level] = next;
    }
  }

  let count = entries.len();
  for level in 0..LEVEL_COUNT {
    accumulators[level].close_cell(count - run_start[level]);
    stats[level] = accumulators[level].finish(count);
  }
  stats
}
