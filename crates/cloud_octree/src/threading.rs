//! Shared state for parallel cell dispatch on rayon's pool.
//!
//! Workers share nothing mutable but this context:
//! - an atomic abort flag, checked before every cell
//! - an atomic count of processed cells
//! - the progress sink behind a lock, advanced once per batch of cells and
//!   polled for cancellation after every cell
//! - the first error raised by any worker
//!
//! # Usage
//!
//! ```ignore
//! let context = DispatchContext::new(progress, cells.len(), "Processing cells");
//! let _ = cells.par_iter().try_for_each(|cell| {
//!   if context.should_stop() {
//!     return Err(());
//!   }
//!   process(cell).map_err(|error| context.fail(error))?;
//!   context.cell_done()
//! });
//! let processed = context.finish()?;
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, TryLockError};

use crate::error::{OctreeError, OctreeResult};
use crate::progress::{NormalizedProgress, ProgressSink};

/// Progress batches per dispatch.
const PROGRESS_BATCHES: usize = 100;

/// Context shared by the workers of one parallel dispatch.
pub(crate) struct DispatchContext<'p> {
  abort: AtomicBool,
  processed: AtomicUsize,
  batch: usize,
  progress: Option<Mutex<NormalizedProgress<'p>>>,
  error: Mutex<Option<OctreeError>>,
}

impl<'p> DispatchContext<'p> {
  /// Context for `total` cells, reporting to `progress` if given.
  pub fn new(progress: Option<&'p mut dyn ProgressSink>, total: usize, info: &str) -> Self {
    let progress = progress.map(|sink| {
      sink.reset();
      sink.set_info(info);
      Mutex::new(NormalizedProgress::new(sink, total, 0.0, 100.0))
    });
    Self {
      abort: AtomicBool::new(false),
      processed: AtomicUsize::new(0),
      batch: (total / PROGRESS_BATCHES).max(1),
      progress,
      error: Mutex::new(None),
    }
  }

  /// Whether workers should stop picking up cells.
  #[inline]
  pub fn should_stop(&self) -> bool {
    self.abort.load(Ordering::Relaxed)
  }

  /// Record `error` (the first one wins) and abort the other workers.
  pub fn fail(&self, error: OctreeError) {
    let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
      *slot = Some(error);
    }
    self.abort.store(true, Ordering::Relaxed);
  }

  /// Count one processed cell. `Err(())` once the dispatch must stop.
  ///
  /// Percentages move once per batch; cancellation is polled every cell.
  /// A worker that finds the sink locked skips the poll; the holder is
  /// already checking.
  pub fn cell_done(&self) -> Result<(), ()> {
    let done = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
    if let Some(progress) = &self.progress {
      let cancelled = if done % self.batch == 0 {
        !progress
          .lock()
          .unwrap_or_else(PoisonError::into_inner)
          .steps(self.batch)
      } else {
        match progress.try_lock() {
          Ok(guard) => guard.is_cancel_requested(),
          Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_cancel_requested(),
          Err(TryLockError::WouldBlock) => false,
        }
      };
      if cancelled {
        self.fail(OctreeError::Cancelled);
      }
    }
    if self.should_stop() {
      Err(())
    } else {
      Ok(())
    }
  }

  /// Number of cells processed, or the first error raised.
  pub fn finish(self) -> OctreeResult<usize> {
    let error = self.error.into_inner().unwrap_or_else(PoisonError::into_inner);
    if let Some(error) = error {
      #[cfg(feature = "tracing")]
      tracing::debug!(%error, "cell dispatch aborted");
      return Err(error);
    }
    if let Some(progress) = self.progress {
      progress
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .finish();
    }
    Ok(self.processed.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use rayon::prelude::*;

  use super::*;
  use crate::progress::CancelFlag;
  use crate::test_util::CancelAfter;

  #[test]
  fn test_counts_every_cell() {
    let context = DispatchContext::new(None, 1_000, "");
    let _ = (0..1_000).into_par_iter().try_for_each(|_| context.cell_done());
    assert_eq!(context.finish(), Ok(1_000));
  }

  #[test]
  fn test_first_error_wins() {
    let context = DispatchContext::new(None, 10, "");
    context.fail(OctreeError::OutOfMemory);
    context.fail(OctreeError::CallbackAborted);
    assert!(context.should_stop());
    assert_eq!(context.cell_done(), Err(()));
    assert_eq!(context.finish(), Err(OctreeError::OutOfMemory));
  }

  #[test]
  fn test_progress_and_cancellation() {
    let mut sink = CancelAfter::default();
    {
      let context = DispatchContext::new(Some(&mut sink), 500, "cells");
      for _ in 0..500 {
        context.cell_done().unwrap();
      }
      assert_eq!(context.finish(), Ok(500));
    }
    assert_eq!(*sink.updates.last().unwrap(), 100.0);

    let mut sink = CancelAfter::new(3);
    let context = DispatchContext::new(Some(&mut sink), 500, "cells");
    let result = (0..500).try_for_each(|_| context.cell_done());
    assert_eq!(result, Err(()));
    assert_eq!(context.finish(), Err(OctreeError::Cancelled));
  }

  #[test]
  fn test_cancellation_between_batches() {
    let flag = CancelFlag::new();
    let mut sink = flag.clone();
    let context = DispatchContext::new(Some(&mut sink), 1_000, "cells");
    assert_eq!(context.cell_done(), Ok(()));
    assert_eq!(context.cell_done(), Ok(()));
    flag.cancel();
    // Batch size is 10; the third cell is mid-batch.
    assert_eq!(context.cell_done(), Err(()));
    assert!(context.should_stop());
    assert_eq!(context.finish(), Err(OctreeError::Cancelled));
  }
}
