//! Bounding volumes: point boxes, the octree's cube and occupied-cell bounds.

use glam::{DVec3, IVec3};

use crate::cloud::PointCloud;

/// Double-precision axis-aligned bounding box.
///
/// Used for the cloud's true extent and for the optional "accepted points"
/// filter applied while building.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl DAabb3 {
	/// Box spanning `[min, max]`. The corners must be ordered per axis.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(min.cmple(max).all(), "box corners out of order: {min} > {max}");
		Self { min, max }
	}

	/// Box query region `center ± half_extents`.
	pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
		let half_extents = half_extents.abs();
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Tight box around every point of a cloud. `None` for an empty cloud.
	pub fn from_cloud<C: PointCloud + ?Sized>(cloud: &C) -> Option<Self> {
		if cloud.is_empty() {
			return None;
		}
		let first = cloud.point(0);
		let (min, max) = (1..cloud.len())
			.map(|i| cloud.point(i))
			.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
		Some(Self { min, max })
	}

	/// Whether `point` lies in the box, faces included. A NaN coordinate is
	/// never inside.
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}

	/// Squared distance from a point to the box (0 inside).
	#[inline]
	pub fn distance_squared_to(&self, point: DVec3) -> f64 {
		let outside = (self.min - point).max(point - self.max).max(DVec3::ZERO);
		outside.length_squared()
	}

	/// Per-axis extent.
	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Smallest cube centered on this box and enclosing it, enlarged by
	/// `slack` (relative) to keep boundary points off the cube faces.
	///
	/// A degenerate box (single point) yields a unit cube.
	pub fn cubified(&self, slack: f64) -> BoundingCube {
		let mut edge = self.size().max_element() * (1.0 + slack.max(0.0));
		if !(edge > 0.0) {
			edge = 1.0;
		}
		BoundingCube {
			min: self.center() - DVec3::splat(edge * 0.5),
			edge,
		}
	}
}

/// The cube the octree subdivides. Equal extent on all three axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingCube {
	/// Minimum corner.
	pub min: DVec3,
	/// Edge length.
	pub edge: f64,
}

impl BoundingCube {
	/// Create a cube from its minimum corner and edge length.
	pub fn new(min: DVec3, edge: f64) -> Self {
		debug_assert!(edge > 0.0, "cube edge must be positive");
		Self { min, edge }
	}

	/// Maximum corner.
	#[inline]
	pub fn max(&self) -> DVec3 {
		self.min + DVec3::splat(self.edge)
	}

	/// Center of the cube.
	#[inline]
	pub fn center(&self) -> DVec3 {
		self.min + DVec3::splat(self.edge * 0.5)
	}

	/// The cube as a box.
	#[inline]
	pub fn as_aabb(&self) -> DAabb3 {
		DAabb3::new(self.min, self.max())
	}
}

/// Min/max occupied cell coordinates per axis at one level ("fill indexes").
///
/// No occupied cell exists outside `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillIndexes {
	/// Minimum occupied cell position (inclusive).
	pub min: IVec3,
	/// Maximum occupied cell position (inclusive).
	pub max: IVec3,
}

impl FillIndexes {
	/// Fill indexes of an empty octree: an inverted range that contains nothing.
	pub const EMPTY: Self = Self {
		min: IVec3::splat(i32::MAX),
		max: IVec3::splat(i32::MIN),
	};

	/// Whether no cell is occupied.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.min.cmpgt(self.max).any()
	}

	/// Whether `pos` lies within the occupied range.
	#[inline]
	pub fn contains(&self, pos: IVec3) -> bool {
		pos.cmpge(self.min).all() && pos.cmple(self.max).all()
	}

	/// Grow the range to include `pos`.
	#[inline]
	pub fn include(&mut self, pos: IVec3) {
		self.min = self.min.min(pos);
		self.max = self.max.max(pos);
	}

	/// Per-axis number of cells between `pos` and the range (0 inside).
	#[inline]
	pub fn gap_to(&self, pos: IVec3) -> IVec3 {
		self.min
			.saturating_sub(pos)
			.max(pos.saturating_sub(self.max))
			.max(IVec3::ZERO)
	}

	/// Fill indexes `levels` levels coarser.
	#[inline]
	pub fn coarsened(&self, levels: u8) -> Self {
		if self.is_empty() {
			return *self;
		}
		let shift = levels as i32;
		Self {
			min: self.min >> shift,
			max: self.max >> shift,
		}
	}

	/// Smallest Chebyshev distance `d` such that the cube of half-size `d`
	/// around `pos` covers the whole range.
	#[inline]
	pub fn covering_distance(&self, pos: IVec3) -> i32 {
		pos.saturating_sub(self.min)
			.max(self.max.saturating_sub(pos))
			.max_element()
			.max(0)
	}
}
