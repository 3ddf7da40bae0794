//! Nearest-neighbour search by shell expansion.
//!
//! A search is anchored at the cell containing the query point (which may be
//! outside the grid) and visits shells `0, 1, 2, ...` around it. After `e`
//! shells, every point closer than the eligible radius
//!
//! ```text
//!   (e - 1) * cell_size + distance from the query to its cell border
//! ```
//!
//! has been gathered. A candidate no farther than that radius is final.
//!
//! # State machine
//!
//! ```text
//! NotStarted ──► Expanding ──► Converged   (eligible radius certifies k hits)
//!                    │
//!                    └───────► Exhausted   (all occupied cells visited, or
//!                                           the max distance is covered)
//! ```
//!
//! [`NeighborSearch`] keeps the gathered candidates between calls, so
//! repeated queries in the same cell (see [`NeighborSearch::relocate`]) or at
//! a larger `k` only visit the shells they still need.

use glam::{DVec3, IVec3};

use super::neighbors::Neighbor;
use super::tree::{min_distance_to_cell_border, Octree};
use crate::cloud::PointCloud;
use crate::constants::MAX_OCTREE_LEVEL;
use crate::error::OctreeResult;

/// Progress of a [`NeighborSearch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchState {
  /// No shell visited yet.
  #[default]
  NotStarted,
  /// Some shells visited, result not certified.
  Expanding,
  /// The eligible radius certifies the result.
  Converged,
  /// Nothing left to visit within reach.
  Exhausted,
}

/// Reusable search state anchored at one cell.
#[derive(Clone, Debug)]
pub struct NeighborSearch {
  query: DVec3,
  level: u8,
  /// Query cell, not clamped to the grid.
  cell_pos: IVec3,
  cell_size: f64,
  min_dist_to_border: f64,
  max_sq_distance: Option<f64>,
  /// Shells `0..visited_shells` have been gathered.
  visited_shells: i32,
  /// First shell that can hold an occupied cell.
  first_shell: i32,
  /// Shell after which every occupied cell has been visited.
  last_shell: i32,
  candidates: Vec<Neighbor>,
  state: SearchState,
}

impl NeighborSearch {
  /// New search for `query` at `level` of `octree`.
  pub fn new<C: PointCloud + ?Sized>(octree: &Octree<'_, C>, query: DVec3, level: u8) -> Self {
    debug_assert!(level <= MAX_OCTREE_LEVEL);
    let mut search = Self {
      query,
      level,
      cell_pos: IVec3::ZERO,
      cell_size: octree.cell_size(level),
      min_dist_to_border: 0.0,
      max_sq_distance: None,
      visited_shells: 0,
      first_shell: 0,
      last_shell: -1,
      candidates: Vec::new(),
      state: SearchState::NotStarted,
    };
    search.anchor(octree);
    search
  }

  /// Only accept neighbours within `max_distance`.
  pub fn with_max_distance(mut self, max_distance: f64) -> Self {
    self.max_sq_distance = Some(max_distance * max_distance);
    self
  }

  /// Move the search to another query point.
  ///
  /// When `query` lies in the same cell, the gathered neighbourhood is kept
  /// and only its distances are recomputed; returns `true`. Otherwise the
  /// search restarts from scratch and `false` is returned.
  pub fn relocate<C: PointCloud + ?Sized>(&mut self, octree: &Octree<'_, C>, query: DVec3) -> bool {
    let cell_pos = octree.cell_pos_unclamped(query, self.level);
    self.query = query;
    if cell_pos != self.cell_pos || self.visited_shells == 0 {
      self.candidates.clear();
      self.visited_shells = 0;
      self.state = SearchState::NotStarted;
      self.anchor(octree);
      return false;
    }

    let center = octree.cell_center(cell_pos, self.level);
    self.min_dist_to_border = min_distance_to_cell_border(query, self.cell_size, center);
    for candidate in &mut self.candidates {
      candidate.sq_dist = candidate.point.distance_squared(query);
    }
    self.state = SearchState::Expanding;
    true
  }

  fn anchor<C: PointCloud + ?Sized>(&mut self, octree: &Octree<'_, C>) {
    self.cell_pos = octree.cell_pos_unclamped(self.query, self.level);
    let center = octree.cell_center(self.cell_pos, self.level);
    self.min_dist_to_border = min_distance_to_cell_border(self.query, self.cell_size, center);
    let fill = octree.fill_indexes(self.level);
    if fill.is_empty() {
      self.first_shell = 0;
      self.last_shell = -1;
    } else {
      self.first_shell = fill.gap_to(self.cell_pos).max_element();
      self.last_shell = fill.covering_distance(self.cell_pos);
    }
  }

  /// Query point.
  #[inline]
  pub fn query(&self) -> DVec3 {
    self.query
  }

  /// Level the search runs at.
  #[inline]
  pub fn level(&self) -> u8 {
    self.level
  }

  /// Cell containing the query (may be outside the grid).
  #[inline]
  pub fn cell_pos(&self) -> IVec3 {
    self.cell_pos
  }

  /// Current state.
  #[inline]
  pub fn state(&self) -> SearchState {
    self.state
  }

  /// Number of shells gathered so far.
  #[inline]
  pub fn visited_shells(&self) -> i32 {
    self.visited_shells
  }

  /// Every point gathered so far, in no particular order past the last
  /// returned result.
  #[inline]
  pub fn candidates(&self) -> &[Neighbor] {
    &self.candidates
  }

  /// Radius of the sphere around the query fully covered by gathered shells.
  #[inline]
  pub fn eligible_radius(&self) -> f64 {
    if self.visited_shells == 0 {
      return 0.0;
    }
    (self.visited_shells - 1) as f64 * self.cell_size + self.min_dist_to_border
  }

  #[inline]
  fn covers_everything(&self) -> bool {
    self.visited_shells > self.last_shell
  }

  /// Shells needed for the eligible radius to reach `distance`.
  #[inline]
  fn shells_for_distance(&self, distance: f64) -> i32 {
    let cells = ((distance - self.min_dist_to_border) / self.cell_size).ceil();
    if cells.is_finite() {
      (cells.max(0.0) as i32).saturating_add(1)
    } else {
      i32::MAX
    }
  }

  /// Move the eligible prefix to the front; returns its length.
  fn partition_eligible(&mut self, sq_radius: f64) -> usize {
    let mut front = 0;
    for i in 0..self.candidates.len() {
      if self.candidates[i].sq_dist <= sq_radius {
        self.candidates.swap(front, i);
        front += 1;
      }
    }
    front
  }

  /// Keep the `k` nearest of `candidates[..pool]` at the front, sorted.
  fn select_nearest(&mut self, pool: usize, k: usize) -> usize {
    let count = k.min(pool);
    if count == 0 {
      return 0;
    }
    let by_distance = |a: &Neighbor, b: &Neighbor| a.sq_dist.total_cmp(&b.sq_dist);
    let pool = &mut self.candidates[..pool];
    if count < pool.len() {
      pool.select_nth_unstable_by(count - 1, by_distance);
    }
    pool[..count].sort_unstable_by(by_distance);
    count
  }
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  /// Start a reusable search for `query` at `level`.
  pub fn neighbor_search(&self, query: DVec3, level: u8) -> NeighborSearch {
    NeighborSearch::new(self, query, level)
  }

  /// Gather shells up to (excluding) `target`.
  fn expand_search(&self, search: &mut NeighborSearch, target: i32) -> OctreeResult<()> {
    let target = target.min(search.last_shell.saturating_add(1));
    let from = search.visited_shells.max(search.first_shell);
    for distance in from..target {
      self.shell_points(
        search.cell_pos,
        distance,
        search.level,
        Some(search.query),
        &mut search.candidates,
      )?;
    }
    search.visited_shells = search.visited_shells.max(target);
    Ok(())
  }

  /// Expand until the `k` nearest candidates are certified or nothing is left.
  fn run_search(&self, search: &mut NeighborSearch, k: usize) -> OctreeResult<usize> {
    if search.state == SearchState::NotStarted {
      search.state = SearchState::Expanding;
      let unreachable = match (search.max_sq_distance, self.fill_box(search.level)) {
        (_, None) => true,
        (Some(max_sq), Some(fill_box)) => fill_box.distance_squared_to(search.query) > max_sq,
        (None, Some(_)) => false,
      };
      if unreachable {
        search.state = SearchState::Exhausted;
        return Ok(0);
      }
      self.expand_search(search, search.first_shell.saturating_add(1))?;
    }

    loop {
      let eligible_sq = search.eligible_radius().powi(2);
      let limit = search
        .max_sq_distance
        .map_or(eligible_sq, |max_sq| eligible_sq.min(max_sq));
      let eligible_count = search.partition_eligible(limit);

      if eligible_count >= k {
        search.state = SearchState::Converged;
        return Ok(search.select_nearest(eligible_count, k));
      }

      let max_reached = search
        .max_sq_distance
        .is_some_and(|max_sq| eligible_sq >= max_sq);
      if search.covers_everything() || max_reached {
        search.state = SearchState::Exhausted;
        let pool = match search.max_sq_distance {
          Some(max_sq) => search.partition_eligible(max_sq),
          None => search.candidates.len(),
        };
        return Ok(search.select_nearest(pool, k));
      }

      let mut target = search.visited_shells.saturating_add(1);
      if search.candidates.len() >= k {
        // The k-th nearest candidate bounds the k-th neighbour's distance.
        search.select_nearest(search.candidates.len(), k);
        let kth = search.candidates[k - 1].sq_dist.sqrt();
        target = target.max(search.shells_for_distance(kth));
      }
      self.expand_search(search, target)?;
    }
  }

  /// Nearest point to the search's query.
  pub fn nearest_from_cell(&self, search: &mut NeighborSearch) -> OctreeResult<Option<Neighbor>> {
    let found = self.run_search(search, 1)?;
    Ok((found > 0).then(|| search.candidates[0]))
  }

  /// Up to `k` nearest points, sorted by increasing distance.
  pub fn k_nearest_from_cell<'s>(
    &self,
    search: &'s mut NeighborSearch,
    k: usize,
  ) -> OctreeResult<&'s [Neighbor]> {
    if k == 0 {
      return Ok(&[]);
    }
    let found = self.run_search(search, k)?;
    Ok(&search.candidates[..found])
  }

  /// Every point within `radius` of the search's query, sorted by distance.
  pub fn sphere_from_cell<'s>(
    &self,
    search: &'s mut NeighborSearch,
    radius: f64,
  ) -> OctreeResult<&'s [Neighbor]> {
    if search.state == SearchState::NotStarted {
      search.state = SearchState::Expanding;
      let reachable = self
        .fill_box(search.level)
        .is_some_and(|fill_box| fill_box.distance_squared_to(search.query) <= radius * radius);
      if !reachable {
        search.state = SearchState::Exhausted;
        return Ok(&[]);
      }
    }

    let target = search
      .shells_for_distance(radius)
      .max(search.first_shell.saturating_add(1));
    self.expand_search(search, target)?;

    let count = search.partition_eligible(radius * radius);
    search.candidates[..count].sort_unstable_by(|a, b| a.sq_dist.total_cmp(&b.sq_dist));
    search.state = if search.covers_everything() {
      SearchState::Exhausted
    } else {
      SearchState::Converged
    };
    Ok(&search.candidates[..count])
  }

  /// Nearest point to `query`, searched at `level`.
  ///
  /// `Ok(None)` when the octree is empty or nothing lies within
  /// `max_distance`.
  pub fn find_nearest(
    &self,
    query: DVec3,
    level: u8,
    max_distance: Option<f64>,
  ) -> OctreeResult<Option<Neighbor>> {
    let mut search = self.neighbor_search(query, level);
    if let Some(max_distance) = max_distance {
      search = search.with_max_distance(max_distance);
    }
    self.nearest_from_cell(&mut search)
  }

  /// Up to `k` nearest points to `query`, sorted by increasing distance.
  pub fn find_k_nearest(
    &self,
    query: DVec3,
    level: u8,
    k: usize,
    max_distance: Option<f64>,
  ) -> OctreeResult<Vec<Neighbor>> {
    let mut search = self.neighbor_search(query, level);
    if let Some(max_distance) = max_distance {
      search = search.with_max_distance(max_distance);
    }
    let found = self.k_nearest_from_cell(&mut search, k)?.len();
    search.candidates.truncate(found);
    Ok(search.candidates)
  }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod search_test;
