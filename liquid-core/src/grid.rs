//! Sparse spatial grid mapping cell coordinates to the particles inside them.
//!
//! Cells are stored in a single flat map keyed by the cell's integer
//! coordinates. A cell entry exists only while at least one particle occupies
//! it; [`SpatialGrid::remove`] drops the entry as soon as it empties, so the
//! map never accumulates dead cells as particles churn.

use std::collections::HashMap;

use glam::{IVec2, Vec2};

use crate::aabb::Aabb;
use crate::types::{Cell, ParticleId};

/// Offsets of the 3×3 block scanned by neighbor queries, column-major.
const NEIGHBOR_OFFSETS: [IVec2; 9] = [
    IVec2::new(-1, -1),
    IVec2::new(-1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, -1),
    IVec2::new(0, 0),
    IVec2::new(0, 1),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(1, 1),
];

#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<Cell, Vec<ParticleId>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Cell containing `pos`: `floor(pos / cell_size)` per axis.
    #[inline]
    pub fn cell_of(&self, pos: Vec2) -> Cell {
        (pos / self.cell_size).floor().as_ivec2()
    }

    /// Adds `id` to `cell`, creating the cell entry if needed.
    pub fn insert(&mut self, cell: Cell, id: ParticleId) {
        self.cells.entry(cell).or_default().push(id);
    }

    /// Removes `id` from `cell`, dropping the cell entry if it becomes empty.
    ///
    /// Returns `false` if `id` was not stored in that cell.
    pub fn remove(&mut self, cell: Cell, id: ParticleId) -> bool {
        let Some(ids) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(slot) = ids.iter().position(|&other| other == id) else {
            return false;
        };
        ids.remove(slot);
        if ids.is_empty() {
            self.cells.remove(&cell);
        }
        true
    }

    /// Moves `id` between cells. No-op when `from == to`.
    pub fn relocate(&mut self, from: Cell, to: Cell, id: ParticleId) {
        if from == to {
            return;
        }
        self.remove(from, id);
        self.insert(to, id);
    }

    /// Particles stored in exactly this cell.
    #[inline]
    pub fn cell(&self, cell: Cell) -> &[ParticleId] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All particles in the 3×3 block of cells centered on `cell`.
    pub fn neighbors_of(&self, cell: Cell) -> impl Iterator<Item = ParticleId> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(move |&offset| self.cells.get(&(cell + offset)))
            .flat_map(|ids| ids.iter().copied())
    }

    /// Half-open range of cells covered by `aabb`.
    ///
    /// The upper corner's cell is included by extending the range one cell
    /// past it, so fixtures ending exactly on a cell boundary still reach it.
    pub fn cell_range(&self, aabb: &Aabb) -> (Cell, Cell) {
        let lo = self.cell_of(aabb.lower);
        let hi = self.cell_of(aabb.upper) + IVec2::ONE;
        (lo, hi)
    }

    /// Occupied cells overlapping `aabb` together with their particles.
    pub fn cells_in(&self, aabb: &Aabb) -> impl Iterator<Item = (Cell, &[ParticleId])> + '_ {
        let (lo, hi) = self.cell_range(aabb);
        (lo.x..hi.x)
            .flat_map(move |i| (lo.y..hi.y).map(move |j| IVec2::new(i, j)))
            .filter_map(|cell| self.cells.get(&cell).map(|ids| (cell, ids.as_slice())))
    }

    /// Number of occupied cells.
    #[inline]
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Total number of particle entries across all cells.
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cell, &[ParticleId])> + '_ {
        self.cells.iter().map(|(&cell, ids)| (cell, ids.as_slice()))
    }
}
