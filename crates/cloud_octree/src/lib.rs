//! cloud_octree - Morton-coded octree spatial index for point clouds
//!
//! This crate indexes an unordered, borrowed point cloud with an implicit
//! octree: one array of `(point index, cell code)` pairs sorted by Morton
//! code. Every cell at every level is a contiguous run of that array, found
//! by binary search.
//!
//! # Features
//!
//! - **Construction**: explicit or derived bounding cube, point acceptance
//!   box, parallel sort, per-level population statistics
//! - **Neighbour Search**: incremental nearest / k-nearest search that grows
//!   cubic shells of cells and can be resumed after a move
//! - **Range Queries**: sphere, box and cylinder neighbourhoods, plus a
//!   progressive cylinder that extends along its axis
//! - **Cell Dispatch**: run callbacks per cell, at a fixed level or with
//!   adaptive population bounds, serially or on rayon's pool
//! - **Connected Components**: 6- or 26-connected labelling of occupied cells
//!
//! # Example
//!
//! ```ignore
//! use cloud_octree::{BuildConfig, Octree};
//!
//! let points: Vec<glam::DVec3> = load_points();
//! let octree = Octree::from_cloud(&points, &BuildConfig::default())?;
//!
//! let level = octree.find_best_level_for_radius(0.5);
//! let neighbours = octree.find_in_sphere(points[0], 0.5, level)?;
//! let nearest = octree.find_k_nearest(points[0], level, 8, None)?;
//! ```

pub mod cloud;
pub mod constants;
pub mod error;
pub mod progress;

// Re-export commonly used items
pub use cloud::{PointCloud, PointScalars};
pub use constants::{bit_shift, octree_length, truncate_code, CellCode, MAX_OCTREE_LEVEL};
pub use error::{OctreeError, OctreeResult};
pub use progress::{CancelFlag, ProgressSink};

// Octree construction, queries and dispatch
pub mod octree;
pub use octree::{
  BoundingCube, BuildConfig, BuildReport, CellKey, CellRange, ComponentSummary, Connexity,
  Cylinder, CylinderNeighbor, DAabb3, LevelStats, Neighbor, NeighborSearch, Octree, OctreeCell,
  OctreeDiff, ProgressiveCylinder, SearchState,
};

// Rayon dispatch plumbing
mod threading;

#[cfg(test)]
mod test_util;
