//! Progress reporting and cooperative cancellation.
//!
//! Long operations (build scan, cell dispatch, component labelling) accept an
//! optional `&mut dyn ProgressSink`. They report percentages and poll
//! [`ProgressSink::is_cancel_requested`] between discrete units of work, never
//! in the middle of one.
//!
//! # Usage
//!
//! ```ignore
//! let cancel = CancelFlag::new();
//! let mut sink = cancel.clone();
//!
//! // From another thread: cancel.cancel();
//! let result = octree.build(&BuildConfig::default(), Some(&mut sink));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receiver of progress notifications.
///
/// `Send` so that parallel dispatch can share one sink between workers behind
/// a lock.
pub trait ProgressSink: Send {
  /// Restart the progress display.
  fn reset(&mut self) {}

  /// Describe the current phase.
  fn set_info(&mut self, _info: &str) {}

  /// Report completion in percent (0..=100).
  fn update(&mut self, percent: f32);

  /// Whether the caller asked to abort.
  fn is_cancel_requested(&self) -> bool {
    false
  }
}

/// Shared cancellation switch usable as a [`ProgressSink`].
///
/// Ignores percentages; clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
  cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
  /// Create a flag in the "not cancelled" state.
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation.
  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::Relaxed);
  }

  /// Whether cancellation was requested.
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Relaxed)
  }
}

impl ProgressSink for CancelFlag {
  fn update(&mut self, _percent: f32) {}

  fn is_cancel_requested(&self) -> bool {
    self.is_cancelled()
  }
}

/// Maps a known number of steps onto a window of the percentage range.
///
/// The sink is only notified when the integer percentage moves, but
/// cancellation is polled on every step.
pub struct NormalizedProgress<'a> {
  sink: &'a mut dyn ProgressSink,
  total_steps: usize,
  counter: usize,
  /// Steps between two percentage updates.
  interval: usize,
  start_percent: f32,
  span_percent: f32,
}

impl<'a> NormalizedProgress<'a> {
  /// Report `total_steps` steps over `[start_percent, start_percent + span_percent]`.
  pub fn new(
    sink: &'a mut dyn ProgressSink,
    total_steps: usize,
    start_percent: f32,
    span_percent: f32,
  ) -> Self {
    let interval = (total_steps / span_percent.max(1.0) as usize).max(1);
    Self {
      sink,
      total_steps: total_steps.max(1),
      counter: 0,
      interval,
      start_percent,
      span_percent,
    }
  }

  /// Advance by one step. Returns `false` if cancellation was requested.
  #[inline]
  pub fn one_step(&mut self) -> bool {
    self.steps(1)
  }

  /// Advance by `count` steps. Returns `false` if cancellation was requested.
  pub fn steps(&mut self, count: usize) -> bool {
    let before = self.counter;
    self.counter += count;
    let reached_end = before < self.total_steps && self.counter >= self.total_steps;
    if reached_end || self.counter / self.interval != before / self.interval {
      let ratio = (self.counter.min(self.total_steps) as f32) / self.total_steps as f32;
      self.sink.update(self.start_percent + ratio * self.span_percent);
    }
    !self.sink.is_cancel_requested()
  }

  /// Whether the sink asked to abort, without advancing.
  #[inline]
  pub fn is_cancel_requested(&self) -> bool {
    self.sink.is_cancel_requested()
  }

  /// Jump to the end of the window.
  pub fn finish(&mut self) {
    self.counter = self.total_steps;
    self.sink.update(self.start_percent + self.span_percent);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Default)]
  struct Recorder {
    updates: Vec<f32>,
    cancel_after: Option<usize>,
  }

  impl ProgressSink for Recorder {
    fn update(&mut self, percent: f32) {
      self.updates.push(percent);
    }

    fn is_cancel_requested(&self) -> bool {
      self.cancel_after.is_some_and(|n| self.updates.len() >= n)
    }
  }

  #[test]
  fn test_updates_are_throttled_and_monotonic() {
    let mut recorder = Recorder::default();
    {
      let mut progress = NormalizedProgress::new(&mut recorder, 1000, 0.0, 90.0);
      for _ in 0..1000 {
        assert!(progress.one_step());
      }
    }
    assert!(!recorder.updates.is_empty());
    assert!(recorder.updates.len() <= 100);
    assert!(recorder.updates.windows(2).all(|w| w[0] <= w[1]));
    let last = *recorder.updates.last().unwrap();
    assert!((last - 90.0).abs() < 1e-3, "last update was {last}");
  }

  #[test]
  fn test_window_offset() {
    let mut recorder = Recorder::default();
    {
      let mut progress = NormalizedProgress::new(&mut recorder, 4, 90.0, 10.0);
      progress.steps(4);
      progress.finish();
    }
    assert!(recorder.updates.iter().all(|&p| (90.0..=100.0).contains(&p)));
    assert_eq!(*recorder.updates.last().unwrap(), 100.0);
  }

  #[test]
  fn test_cancellation_is_polled_every_step() {
    let mut recorder = Recorder {
      cancel_after: Some(1),
      ..Default::default()
    };
    let mut progress = NormalizedProgress::new(&mut recorder, 10, 0.0, 100.0);
    // The first step triggers an update (interval 1), after which the sink cancels.
    assert!(!progress.one_step());
  }

  #[test]
  fn test_cancel_request_without_step() {
    let flag = CancelFlag::new();
    let mut sink = flag.clone();
    let progress = NormalizedProgress::new(&mut sink, 10, 0.0, 100.0);
    assert!(!progress.is_cancel_requested());
    flag.cancel();
    assert!(progress.is_cancel_requested());
  }

  #[test]
  fn test_cancel_flag_is_shared() {
    let flag = CancelFlag::new();
    let sink = flag.clone();
    assert!(!sink.is_cancel_requested());
    flag.cancel();
    assert!(sink.is_cancel_requested());
  }
}
