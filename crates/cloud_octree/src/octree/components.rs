//! Connected components of the occupied cells at one level.
//!
//! Occupied cells are voxels of a dense grid spanning the level's fill
//! indexes. The grid is swept one slice at a time along its longest axis,
//! keeping only the previous slice's labels. Each voxel takes the smallest
//! label among its already-visited neighbours and unions the others; a
//! voxel with no labelled neighbour opens a new label.
//!
//! ```text
//!   6-connexity    (u-1, v) and (u, v-1) in this slice, (u, v) in the previous
//!   26-connexity   the 4 visited neighbours in this slice, all 9 in the previous
//! ```
//!
//! Slice grids are padded by one voxel on each side so neighbour reads
//! never leave the grid.

use glam::IVec3;
use smallvec::SmallVec;

use super::code::decode_cell_pos;
use super::tree::Octree;
use crate::cloud::{PointCloud, PointScalars};
use crate::constants::MAX_OCTREE_LEVEL;
use crate::error::{try_reserve, OctreeError, OctreeResult};
use crate::progress::{NormalizedProgress, ProgressSink};

/// Which neighbouring voxels are connected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Connexity {
  /// Face neighbours only.
  #[default]
  Six,
  /// Face, edge and corner neighbours.
  TwentySix,
}

/// Result of [`Octree::extract_connected_components`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSummary {
  /// Level the cells were taken from.
  pub level: u8,
  /// Number of components. Labels run from 1 to this count.
  pub component_count: usize,
  /// Label of every occupied cell at `level`, in ascending code order.
  pub cell_labels: Vec<u32>,
  /// Number of points per component; entry `i` is label `i + 1`.
  pub component_sizes: Vec<usize>,
}

/// Union-find over provisional labels. Label 0 means "no voxel".
struct LabelForest {
  parents: Vec<u32>,
}

impl LabelForest {
  fn new() -> Self {
    Self { parents: vec![0] }
  }

  fn create(&mut self) -> OctreeResult<u32> {
    let label = self.parents.len() as u32;
    try_reserve(&mut self.parents, 1)?;
    self.parents.push(label);
    Ok(label)
  }

  /// Root of `label`, halving the path on the way.
  fn find(&mut self, mut label: u32) -> u32 {
    while self.parents[label as usize] != label {
      let grandparent = self.parents[self.parents[label as usize] as usize];
      self.parents[label as usize] = grandparent;
      label = grandparent;
    }
    label
  }

  /// Merge every label of `labels` into the smallest root; returns it.
  fn merge(&mut self, labels: &[u32]) -> u32 {
    let mut root = u32::MAX;
    for &label in labels {
      root = root.min(self.find(label));
    }
    for &label in labels {
      let other = self.find(label);
      self.parents[other as usize] = root;
    }
    root
  }
}

/// One padded slice of labels.
struct SliceGrid {
  labels: Vec<u32>,
  width: usize,
}

impl SliceGrid {
  fn new(width: usize, height: usize) -> OctreeResult<Self> {
    let area = width.checked_mul(height).ok_or(OctreeError::OutOfMemory)?;
    let mut labels = Vec::new();
    try_reserve(&mut labels, area)?;
    labels.resize(area, 0);
    Ok(Self { labels, width })
  }

  /// Label at padded coordinates.
  #[inline]
  fn get(&self, u: usize, v: usize) -> u32 {
    self.labels[v * self.width + u]
  }

  #[inline]
  fn set(&mut self, u: usize, v: usize, label: u32) {
    self.labels[v * self.width + u] = label;
  }

  fn clear(&mut self) {
    self.labels.fill(0);
  }
}

impl<'c, C: PointCloud + ?Sized> Octree<'c, C> {
  /// Label the connected groups of occupied cells at `level`.
  ///
  /// When `scalars` is given, every point receives its component's label.
  /// Fails with [`OctreeError::NoCells`] on an empty level and
  /// [`OctreeError::NoComponents`] if labelling yields nothing.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree::extract_connected_components"))]
  pub fn extract_connected_components(
    &self,
    level: u8,
    connexity: Connexity,
    scalars: Option<&mut dyn PointScalars>,
    progress: Option<&mut dyn ProgressSink>,
  ) -> OctreeResult<ComponentSummary> {
    debug_assert!(level <= MAX_OCTREE_LEVEL);
    let cells = self.cell_ranges(level)?;
    if cells.is_empty() {
      return Err(OctreeError::NoCells { level });
    }

    // Sweep along the longest axis (w), raster order (v, u) inside a slice.
    let fill = self.fill_indexes(level);
    let extent = fill.max - fill.min + IVec3::ONE;
    let w_axis = if extent.x >= extent.y && extent.x >= extent.z {
      0
    } else if extent.y >= extent.z {
      1
    } else {
      2
    };
    let (u_axis, v_axis) = match w_axis {
      0 => (1, 2),
      1 => (0, 2),
      _ => (0, 1),
    };

    let mut order: Vec<(IVec3, usize)> = Vec::new();
    try_reserve(&mut order, cells.len())?;
    for (i, cell) in cells.iter().enumerate() {
      let local = decode_cell_pos(cell.code, level, true) - fill.min;
      order.push((IVec3::new(local[u_axis], local[v_axis], local[w_axis]), i));
    }
    order.sort_unstable_by_key(|(pos, _)| (pos.z, pos.y, pos.x));

    let width = extent[u_axis] as usize + 2;
    let height = extent[v_axis] as usize + 2;
    let mut previous = SliceGrid::new(width, height)?;
    let mut current = SliceGrid::new(width, height)?;
    let mut forest = LabelForest::new();
    let mut provisional = Vec::new();
    try_reserve(&mut provisional, cells.len())?;
    provisional.resize(cells.len(), 0u32);

    let mut progress = progress.map(|sink| {
      sink.reset();
      sink.set_info("Labelling connected components");
      NormalizedProgress::new(sink, cells.len(), 0.0, 100.0)
    });

    {
      #[cfg(feature = "tracing")]
      let _span = tracing::info_span!("sweep", cells = cells.len()).entered();

      let mut slice = None;
      for &(pos, cell) in &order {
        if slice != Some(pos.z) {
          // Previous slice is only adjacent when it is the one right before.
          std::mem::swap(&mut previous, &mut current);
          if slice != Some(pos.z - 1) {
            previous.clear();
          }
          current.clear();
          slice = Some(pos.z);
        }

        let (u, v) = (pos.x as usize + 1, pos.y as usize + 1);
        let mut neighbours: SmallVec<[u32; 13]> = SmallVec::new();
        let mut gather = |label: u32| {
          if label != 0 {
            neighbours.push(label);
          }
        };
        match connexity {
          Connexity::Six => {
            gather(current.get(u - 1, v));
            gather(current.get(u, v - 1));
            gather(previous.get(u, v));
          }
          Connexity::TwentySix => {
            gather(current.get(u - 1, v));
            gather(current.get(u - 1, v - 1));
            gather(current.get(u, v - 1));
            gather(current.get(u + 1, v - 1));
            for dv in 0..3 {
              for du in 0..3 {
                gather(previous.get(u + du - 1, v + dv - 1));
              }
            }
          }
        }

        let label = if neighbours.is_empty() {
          forest.create()?
        } else {
          forest.merge(&neighbours)
        };
        current.set(u, v, label);
        provisional[cell] = label;

        if let Some(progress) = progress.as_mut() {
          if !progress.one_step() {
            return Err(OctreeError::Cancelled);
          }
        }
      }
    }

    // Dense renumbering in ascending cell order.
    let mut dense = Vec::new();
    try_reserve(&mut dense, forest.parents.len())?;
    dense.resize(forest.parents.len(), 0u32);
    let mut cell_labels = Vec::new();
    try_reserve(&mut cell_labels, cells.len())?;
    let mut component_sizes: Vec<usize> = Vec::new();
    for (cell, &label) in cells.iter().zip(&provisional) {
      let root = forest.find(label) as usize;
      if dense[root] == 0 {
        try_reserve(&mut component_sizes, 1)?;
        component_sizes.push(0);
        dense[root] = component_sizes.len() as u32;
      }
      let final_label = dense[root];
      component_sizes[final_label as usize - 1] += cell.population();
      cell_labels.push(final_label);
    }

    let component_count = component_sizes.len();
    if component_count == 0 {
      return Err(OctreeError::NoComponents);
    }

    if let Some(scalars) = scalars {
      for (cell, &label) in cells.iter().zip(&cell_labels) {
        let Some(start) = self.find_cell_start(cell.code, level) else {
          continue;
        };
        let end = self.cell_end(start, level);
        for entry in &self.entries[start..end] {
          scalars.set_scalar(entry.index as usize, label as f64);
        }
      }
    }

    if let Some(progress) = progress.as_mut() {
      progress.finish();
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(level, components = component_count, "connected components extracted");

    Ok(ComponentSummary {
      level,
      component_count,
      cell_labels,
      component_sizes,
    })
  }
}

#[cfg(test)]
#[path = "components_test.rs"]
mod components_test;
