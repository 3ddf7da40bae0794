//! BuildConfig - geometry and acceptance settings for octree construction.

use glam::DVec3;

use super::bounds::{BoundingCube, DAabb3};
use crate::constants::DEFAULT_CUBE_SLACK;

/// Configuration for [`Octree::build`](super::Octree::build).
///
/// The default derives the cube from the cloud's own bounding box and accepts
/// every point.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildConfig {
  /// Explicit cube to subdivide. `None` = cubified cloud bounding box.
  ///
  /// Two octrees built over the same cube have comparable cell codes.
  pub bounding_cube: Option<BoundingCube>,

  /// Only points inside this box are indexed. `None` = accept all.
  pub accepted_points: Option<DAabb3>,

  /// Relative enlargement of the cubified bounding box.
  pub cube_slack: f64,

  /// Sort codes with rayon instead of on the calling thread.
  pub parallel_sort: bool,
}

impl BuildConfig {
  /// Subdivide an explicit cube.
  pub fn with_bounding_cube(mut self, cube: BoundingCube) -> Self {
    self.bounding_cube = Some(cube);
    self
  }

  /// Subdivide the cube enclosing the box `[min, max]` (cubified, no slack).
  pub fn with_bounds(self, min: DVec3, max: DVec3) -> Self {
    self.with_bounding_cube(DAabb3::new(min, max).cubified(0.0))
  }

  /// Drop points outside `accepted`.
  pub fn with_accepted_points(mut self, accepted: DAabb3) -> Self {
    self.accepted_points = Some(accepted);
    self
  }

  /// Override the cubification slack.
  pub fn with_cube_slack(mut self, slack: f64) -> Self {
    self.cube_slack = slack;
    self
  }

  /// Toggle the parallel sort.
  pub fn with_parallel_sort(mut self, parallel: bool) -> Self {
    self.parallel_sort = parallel;
    self
  }
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      bounding_cube: None,
      accepted_points: None,
      cube_slack: DEFAULT_CUBE_SLACK,
      parallel_sort: false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_accepts_everything() {
    let config = BuildConfig::default();
    assert!(config.bounding_cube.is_none());
    assert!(config.accepted_points.is_none());
    assert_eq!(config.cube_slack, DEFAULT_CUBE_SLACK);
    assert!(!config.parallel_sort);
  }

  #[test]
  fn test_with_bounds_is_cubical() {
    let config = BuildConfig::default().with_bounds(DVec3::ZERO, DVec3::new(2.0, 1.0, 1.0));
    let cube = config.bounding_cube.unwrap();
    assert_eq!(cube.edge, 2.0);
    assert_eq!(cube.min, DVec3::new(0.0, -0.5, -0.5));
  }
}
