//! Octree depth and cell code layout constants.
//!
//! These values are part of the public contract: changing
//! [`MAX_OCTREE_LEVEL`] changes the bit width of every [`CellCode`] and
//! invalidates codes stored anywhere else.
//!
//! # Cell Code Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      64-BIT CELL CODE (MAX LEVEL 21)                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  bit:   63   62 61 60   59 58 57   ...    5  4  3    2  1  0            │
//! │         │    └─ z y x ┘ └─ z y x ┘        └─ z y x ┘ └─ z y x ┘         │
//! │       unused   level 1    level 2          level 20   level 21          │
//! │                                                                         │
//! │  One triple per subdivision level, coarsest level in the high bits.     │
//! │  Within a triple: bit 0 = X, bit 1 = Y, bit 2 = Z.                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Truncation
//!
//! ```text
//! truncated(code, level) = code >> (3 * (MAX_OCTREE_LEVEL - level))
//! ```
//!
//! The truncated code identifies the ancestor cell at `level`. Sorting full
//! codes ascending makes the points of every cell, at every level, one
//! contiguous run.

/// Interleaved (Morton / Z-order) cell code.
pub type CellCode = u64;

/// Deepest subdivision level. 3 bits per level must fit in a [`CellCode`]
/// with one spare bit.
pub const MAX_OCTREE_LEVEL: u8 = 21;

/// Number of cells along one axis at [`MAX_OCTREE_LEVEL`].
pub const MAX_OCTREE_LENGTH: i32 = 1 << MAX_OCTREE_LEVEL;

/// Number of meaningful bits in a full-depth cell code.
pub const CELL_CODE_BITS: u32 = 3 * MAX_OCTREE_LEVEL as u32;

/// Default relative enlargement applied when cubifying a cloud's bounding box.
pub const DEFAULT_CUBE_SLACK: f64 = 0.01;

/// Neighbourhood radius to cell size ratio used by level auto-selection.
pub const NEIGHBOURHOOD_EXTRACTION_FACTOR: f64 = 2.5;

/// Right shift turning a full-depth code into the truncated code at `level`.
#[inline(always)]
pub const fn bit_shift(level: u8) -> u32 {
  debug_assert!(level <= MAX_OCTREE_LEVEL);
  3 * (MAX_OCTREE_LEVEL - level) as u32
}

/// Number of cells along one axis at `level`.
#[inline(always)]
pub const fn octree_length(level: u8) -> i32 {
  debug_assert!(level <= MAX_OCTREE_LEVEL);
  1 << level
}

/// Truncate a full-depth code to `level`.
#[inline(always)]
pub const fn truncate_code(code: CellCode, level: u8) -> CellCode {
  code >> bit_shift(level)
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
