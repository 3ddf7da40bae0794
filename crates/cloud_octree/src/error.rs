//! Error types for octree construction, queries and cell dispatch.

use thiserror::Error;

/// Errors that can occur while building or querying an octree.
///
/// Every variant is a local condition the caller can recover from; none of
/// them leaves the octree in a partially built state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OctreeError {
  /// The point cloud has no points.
  #[error("point cloud is empty")]
  EmptyCloud,

  /// Point indices are stored as `u32`.
  #[error("point cloud has {count} points, more than an octree can index")]
  TooManyPoints {
    /// Number of points in the cloud.
    count: usize,
  },

  /// A buffer could not grow.
  #[error("not enough memory")]
  OutOfMemory,

  /// The progress sink requested cancellation.
  #[error("operation cancelled")]
  Cancelled,

  /// A cell callback returned `false`.
  #[error("cell callback aborted the traversal")]
  CallbackAborted,

  /// No occupied cell at the requested level.
  #[error("no occupied cells at level {level}")]
  NoCells {
    /// Requested level.
    level: u8,
  },

  /// Labelling produced no component.
  #[error("no connected component found")]
  NoComponents,

  /// Invalid parameter value.
  #[error("invalid parameter: {0}")]
  InvalidParameter(&'static str),
}

/// Result type for octree operations.
pub type OctreeResult<T> = Result<T, OctreeError>;

/// Reserve `additional` slots, mapping allocation failure to
/// [`OctreeError::OutOfMemory`].
#[inline]
pub(crate) fn try_reserve<T>(buffer: &mut Vec<T>, additional: usize) -> OctreeResult<()> {
  buffer.try_reserve(additional).map_err(|_| {
    #[cfg(feature = "tracing")]
    tracing::warn!(additional, "octree buffer allocation failed");
    OctreeError::OutOfMemory
  })
}

/// Push one element, mapping allocation failure to
/// [`OctreeError::OutOfMemory`].
#[inline]
pub(crate) fn try_push<T>(buffer: &mut Vec<T>, value: T) -> OctreeResult<()> {
  if buffer.len() == buffer.capacity() {
    try_reserve(buffer, buffer.len().max(16))?;
  }
  buffer.push(value);
  Ok(())
}
