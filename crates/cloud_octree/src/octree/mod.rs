//! Morton-coded octree over a point cloud.
//!
//! The octree is implicit: every point is projected onto the deepest grid
//! of a bounding cube and stored as `(index, code)` in one array sorted by
//! code. A cell at any level is the contiguous run of entries sharing the
//! same code prefix, so no node is ever allocated.
//!
//! # Level Convention
//!
//! Level 0 = the whole cube, level 21 = finest cells.
//!
//! ```text
//! Cell Size  = cube_edge / 2^level
//! Cell Code  = full_code >> 3 * (21 - level)
//! ```
//!
//! # Module Structure
//!
//! - [`code`]: Morton interleaving of grid positions
//! - [`node`]: `CellKey` - position + level address of one cell
//! - [`bounds`]: boxes, the bounding cube and per-level fill indexes
//! - [`tree`]: `Octree` - construction and cell geometry
//! - [`lookup`]: binary search of cells in the sorted array
//! - [`neighbors`]: cubic shells of cells around a position
//! - [`search`]: incremental nearest neighbour search
//! - [`spatial`]: sphere, box and cylinder range queries
//! - [`visitor`]: serial and parallel per-cell dispatch
//! - [`components`]: connected components of occupied cells
//! - [`levels`]: level heuristics and octree comparison

pub mod bounds;
pub mod code;
pub mod components;
pub mod config;
pub mod levels;
pub mod lookup;
pub mod neighbors;
pub mod node;
pub mod search;
pub mod spatial;
pub mod stats;
pub mod tree;
pub mod visitor;

// Re-exports
pub use bounds::{BoundingCube, DAabb3, FillIndexes};
pub use code::{decode_cell_pos, encode_cell_code, octant};
pub use components::{ComponentSummary, Connexity};
pub use config::BuildConfig;
pub use levels::OctreeDiff;
pub use lookup::{CellRange, CellRuns};
pub use neighbors::Neighbor;
pub use node::CellKey;
pub use search::{NeighborSearch, SearchState};
pub use spatial::{Cylinder, CylinderNeighbor, ProgressiveCylinder};
pub use stats::LevelStats;
pub use tree::{BuildReport, IndexedCode, Octree};
pub use visitor::OctreeCell;
