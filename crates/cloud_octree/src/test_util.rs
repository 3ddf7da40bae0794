//! Shared fixtures for unit tests.

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::progress::ProgressSink;

/// `count` points uniformly distributed in `[-extent, extent]^3`.
pub(crate) fn random_cloud(seed: u64, count: usize, extent: f64) -> Vec<DVec3> {
  let mut rng = StdRng::seed_from_u64(seed);
  (0..count)
    .map(|_| {
      DVec3::new(
        rng.random_range(-extent..extent),
        rng.random_range(-extent..extent),
        rng.random_range(-extent..extent),
      )
    })
    .collect()
}

/// Regular `n x n x n` grid with the given spacing, starting at `origin`.
pub(crate) fn grid_cloud(n: i32, spacing: f64, origin: DVec3) -> Vec<DVec3> {
  let mut points = Vec::with_capacity((n * n * n) as usize);
  for z in 0..n {
    for y in 0..n {
      for x in 0..n {
        points.push(origin + DVec3::new(x as f64, y as f64, z as f64) * spacing);
      }
    }
  }
  points
}

/// Every point with its squared distance to `query`, nearest first.
/// Ties are broken by index.
pub(crate) fn brute_force_by_distance(cloud: &[DVec3], query: DVec3) -> Vec<(u32, f64)> {
  let mut all: Vec<(u32, f64)> = cloud
    .iter()
    .enumerate()
    .map(|(i, p)| (i as u32, p.distance_squared(query)))
    .collect();
  all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
  all
}

/// Sink that records updates and requests cancellation after `cancel_after`
/// of them.
#[derive(Default)]
pub(crate) struct CancelAfter {
  pub updates: Vec<f32>,
  pub cancel_after: Option<usize>,
}

impl CancelAfter {
  pub fn new(cancel_after: usize) -> Self {
    Self {
      updates: Vec::new(),
      cancel_after: Some(cancel_after),
    }
  }
}

impl ProgressSink for CancelAfter {
  fn update(&mut self, percent: f32) {
    self.updates.push(percent);
  }

  fn is_cancel_requested(&self) -> bool {
    self.cancel_after.is_some_and(|n| self.updates.len() >= n)
  }
}
