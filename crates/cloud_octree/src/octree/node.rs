//! CellKey - immutable value type addressing one octree cell.
//!
//! Keys are identified by their grid coordinates at their own level.
//! Level 0 = the root cube, higher level = finer cells. No node objects back
//! a key: whether the cell is occupied is answered by a lookup in the sorted
//! code array.

use glam::IVec3;

use super::code::{decode_cell_pos, encode_cell_code};
use crate::constants::{octree_length, CellCode, MAX_OCTREE_LEVEL};

/// Octree cell address - immutable value type.
///
/// Grid coordinates are at the key's own level, not the finest level.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CellKey {
  /// Grid position at this key's level, each axis in `[0, 2^level)`.
  pub pos: IVec3,
  /// Subdivision level (0 = root, [`MAX_OCTREE_LEVEL`] = finest).
  pub level: u8,
}

impl CellKey {
  /// Create a new key at the given position and level.
  pub fn new(x: i32, y: i32, z: i32, level: u8) -> Self {
    Self {
      pos: IVec3::new(x, y, z),
      level,
    }
  }

  /// Key of the cell whose truncated code at `level` is `truncated_code`.
  pub fn from_code(truncated_code: CellCode, level: u8) -> Self {
    Self {
      pos: decode_cell_pos(truncated_code, level, true),
      level,
    }
  }

  /// Truncated cell code at this key's level.
  #[inline]
  pub fn code(&self) -> CellCode {
    encode_cell_code(self.pos, self.level)
  }

  /// Whether the position lies inside the grid of this level.
  #[inline]
  pub fn is_valid(&self) -> bool {
    self.level <= MAX_OCTREE_LEVEL
      && self.pos.cmpge(IVec3::ZERO).all()
      && self.pos.cmplt(IVec3::splat(octree_length(self.level))).all()
  }

  /// Get child key (finer: level + 1).
  ///
  /// Octant: 0-7 where bits represent +X, +Y, +Z offsets:
  /// - bit 0: X offset (0 or 1)
  /// - bit 1: Y offset (0 or 1)
  /// - bit 2: Z offset (0 or 1)
  ///
  /// Returns None if already at [`MAX_OCTREE_LEVEL`].
  pub fn child(&self, octant: u8) -> Option<Self> {
    if self.level >= MAX_OCTREE_LEVEL {
      return None;
    }
    let offset = IVec3::new(
      (octant & 1) as i32,
      ((octant >> 1) & 1) as i32,
      ((octant >> 2) & 1) as i32,
    );
    Some(Self {
      pos: self.pos * 2 + offset,
      level: self.level + 1,
    })
  }

  /// Get parent key (coarser: level - 1).
  ///
  /// Returns None for the root.
  pub fn parent(&self) -> Option<Self> {
    if self.level == 0 {
      return None;
    }
    Some(Self {
      pos: self.pos >> 1,
      level: self.level - 1,
    })
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
