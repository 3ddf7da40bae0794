//! Point cloud access traits.
//!
//! The octree never owns points. It borrows a [`PointCloud`] for its whole
//! lifetime and reads coordinates by index; results that must be stamped
//! back onto points (component labels) go through [`PointScalars`].

use glam::{DVec3, Vec3};

/// Random-access, read-only point container.
///
/// Indices and coordinates must stay stable while an octree borrows the cloud.
pub trait PointCloud {
  /// Number of points.
  fn len(&self) -> usize;

  /// Coordinates of point `index`, widened to double precision.
  fn point(&self, index: usize) -> DVec3;

  /// True when the cloud has no points.
  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl PointCloud for [Vec3] {
  #[inline]
  fn len(&self) -> usize {
    <[Vec3]>::len(self)
  }

  #[inline]
  fn point(&self, index: usize) -> DVec3 {
    self[index].as_dvec3()
  }
}

impl PointCloud for [DVec3] {
  #[inline]
  fn len(&self) -> usize {
    <[DVec3]>::len(self)
  }

  #[inline]
  fn point(&self, index: usize) -> DVec3 {
    self[index]
  }
}

impl PointCloud for Vec<Vec3> {
  #[inline]
  fn len(&self) -> usize {
    self.as_slice().len()
  }

  #[inline]
  fn point(&self, index: usize) -> DVec3 {
    self[index].as_dvec3()
  }
}

impl PointCloud for Vec<DVec3> {
  #[inline]
  fn len(&self) -> usize {
    self.as_slice().len()
  }

  #[inline]
  fn point(&self, index: usize) -> DVec3 {
    self[index]
  }
}

/// Writable per-point scalar slot.
pub trait PointScalars {
  /// Store `value` for point `index`.
  fn set_scalar(&mut self, index: usize, value: f64);
}

macro_rules! impl_point_scalars {
  ($($ty:ty),*) => {
    $(
      impl PointScalars for [$ty] {
        #[inline]
        fn set_scalar(&mut self, index: usize, value: f64) {
          self[index] = value as $ty;
        }
      }

      impl PointScalars for Vec<$ty> {
        #[inline]
        fn set_scalar(&mut self, index: usize, value: f64) {
          self[index] = value as $ty;
        }
      }
    )*
  };
}

impl_point_scalars!(f64, f32, u32);
