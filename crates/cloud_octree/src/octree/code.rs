//! Cell code encoding: interleave and de-interleave 3D cell positions.
//!
//! Encoding uses a compile-time table mapping an 11-bit axis value to its
//! bits spread 3 apart. A full 21-bit axis needs two lookups (low 11 bits,
//! high 10 bits), then the three spread axes are OR-ed together.

use glam::IVec3;

use crate::constants::{bit_shift, octree_length, CellCode, MAX_OCTREE_LEVEL};

/// Axis bits resolved by one table lookup.
const SPREAD_BITS: u32 = 11;
const SPREAD_MASK: u32 = (1 << SPREAD_BITS) - 1;
const SPREAD_TABLE_LEN: usize = 1 << SPREAD_BITS;

/// `SPREAD_TABLE[v]` has bit `i` of `v` at bit `3 * i`.
static SPREAD_TABLE: [CellCode; SPREAD_TABLE_LEN] = build_spread_table();

const fn build_spread_table() -> [CellCode; SPREAD_TABLE_LEN] {
  let mut table = [0; SPREAD_TABLE_LEN];
  let mut value = 0;
  while value < SPREAD_TABLE_LEN {
    let mut spread: CellCode = 0;
    let mut bit = 0;
    while bit < SPREAD_BITS {
      if (value >> bit) & 1 == 1 {
        spread |= 1 << (3 * bit);
      }
      bit += 1;
    }
    table[value] = spread;
    value += 1;
  }
  table
}

/// Spread the bits of one axis coordinate 3 apart.
#[inline(always)]
fn spread_axis(value: i32) -> CellCode {
  let value = value as u32;
  SPREAD_TABLE[(value & SPREAD_MASK) as usize]
    | SPREAD_TABLE[((value >> SPREAD_BITS) & SPREAD_MASK) as usize] << (3 * SPREAD_BITS)
}

/// Encode a cell position at `level` into its (truncated) cell code.
///
/// Every coordinate must lie in `[0, 2^level)`; callers clamp first.
/// Encoding at [`MAX_OCTREE_LEVEL`] yields the full-depth code.
#[inline]
pub fn encode_cell_code(pos: IVec3, level: u8) -> CellCode {
  debug_assert!(level <= MAX_OCTREE_LEVEL);
  debug_assert!(
    pos.cmpge(IVec3::ZERO).all() && pos.cmplt(IVec3::splat(octree_length(level))).all(),
    "cell position {pos} out of range at level {level}"
  );
  spread_axis(pos.x) | spread_axis(pos.y) << 1 | spread_axis(pos.z) << 2
}

/// Decode a cell code into a cell position at `level`.
///
/// With `truncated == false` the code is a full-depth code and is first
/// truncated to `level`.
pub fn decode_cell_pos(code: CellCode, level: u8, truncated: bool) -> IVec3 {
  debug_assert!(level <= MAX_OCTREE_LEVEL);
  let mut code = if truncated { code } else { code >> bit_shift(level) };
  let mut pos = IVec3::ZERO;
  for bit in 0..level as i32 {
    pos.x |= ((code & 1) as i32) << bit;
    pos.y |= (((code >> 1) & 1) as i32) << bit;
    pos.z |= (((code >> 2) & 1) as i32) << bit;
    code >>= 3;
  }
  pos
}

/// Octant (0-7) of a truncated code within its parent.
///
/// Bit 0: X, bit 1: Y, bit 2: Z.
#[inline(always)]
pub fn octant(truncated_code: CellCode) -> u8 {
  (truncated_code & 7) as u8
}

#[cfg(test)]
#[path = "code_test.rs"]
mod code_test;
