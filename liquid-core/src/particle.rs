//! Fixed-capacity particle storage.
//!
//! Every slot is allocated up front, together with its per-particle scratch
//! buffers, and lives as long as the pool. Spawning and despawning only flip
//! the `alive` flag and keep the grid and the active list in sync.

use glam::Vec2;
use rand::Rng;

use crate::grid::SpatialGrid;
use crate::types::{Cell, FixtureId, ParticleId};

/// Largest convex polygon the collision scratch can hold.
pub const MAX_POLYGON_VERTICES: usize = 8;

#[derive(Debug, Clone)]
pub struct Particle {
    pub id: ParticleId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub alive: bool,
    /// Grid cell the particle is registered in.
    pub cell: Cell,

    /// Quadratic density accumulated this frame.
    pub p: f32,
    /// Cubic (near) density accumulated this frame.
    pub pnear: f32,

    /// Neighbor ids, parallel to `distances`.
    pub neighbors: Vec<ParticleId>,
    /// Rescaled distance to each neighbor, `f32::MAX` when out of range.
    pub distances: Vec<f32>,

    /// Fixtures to collision-test this frame.
    pub fixtures: Vec<FixtureId>,

    /// Pairwise corrections produced by the force phase, keyed by receiving particle.
    pub contributions: Vec<(ParticleId, Vec2)>,

    pub collision_vertices: [Vec2; MAX_POLYGON_VERTICES],
    pub collision_normals: [Vec2; MAX_POLYGON_VERTICES],
}

impl Particle {
    fn new(id: ParticleId, max_neighbors: usize, max_fixtures: usize) -> Self {
        Self {
            id,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            alive: false,
            cell: Cell::ZERO,
            p: 0.0,
            pnear: 0.0,
            neighbors: Vec::with_capacity(max_neighbors),
            distances: Vec::with_capacity(max_neighbors),
            fixtures: Vec::with_capacity(max_fixtures),
            contributions: Vec::with_capacity(max_neighbors + 1),
            collision_vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            collision_normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        }
    }

    #[inline]
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Rebuilds the neighbor list from the 3×3 cell block around the
    /// particle's cell, skipping itself and stopping at `max_neighbors`.
    ///
    /// Distances are reset to zero; the pressure phase fills them in.
    pub fn find_neighbors(&mut self, grid: &SpatialGrid, max_neighbors: usize) {
        self.neighbors.clear();
        self.distances.clear();

        let me = self.id;
        for other in grid
            .neighbors_of(self.cell)
            .filter(|&other| other != me)
            .take(max_neighbors)
        {
            self.neighbors.push(other);
            self.distances.push(0.0);
        }
    }

    /// Queues `fixture` for collision testing. Returns `false` once the
    /// candidate list is full.
    #[inline]
    pub fn push_fixture(&mut self, fixture: FixtureId, max_fixtures: usize) -> bool {
        if self.fixtures.len() >= max_fixtures {
            return false;
        }
        self.fixtures.push(fixture);
        true
    }

    /// Clears per-frame accumulators and candidate lists.
    pub fn reset_frame_state(&mut self) {
        self.p = 0.0;
        self.pnear = 0.0;
        self.fixtures.clear();
        self.contributions.clear();
    }
}

#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Vec<Particle>,
    active: Vec<ParticleId>,
}

impl ParticlePool {
    pub fn new(capacity: usize, max_neighbors: usize, max_fixtures: usize) -> Self {
        let slots = (0..capacity)
            .map(|id| Particle::new(id, max_neighbors, max_fixtures))
            .collect();
        Self {
            slots,
            active: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Ids of alive particles in spawn order.
    #[inline]
    pub fn active(&self) -> &[ParticleId] {
        &self.active
    }

    #[inline]
    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.slots.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.slots.get_mut(id)
    }

    /// All slots, alive or not.
    #[inline]
    pub fn slots(&self) -> &[Particle] {
        &self.slots
    }

    #[inline]
    pub fn slots_mut(&mut self) -> &mut [Particle] {
        &mut self.slots
    }

    /// Positions of alive particles in active order.
    pub fn positions(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.active.iter().map(|&id| self.slots[id].position)
    }

    /// Activates up to `count` inactive slots around `origin`.
    ///
    /// Each particle is placed at `origin` plus a uniform jitter in
    /// `[-jitter.x, jitter.x) × [-jitter.y, jitter.y)`, starts at rest and is
    /// registered in the grid cell of its position. When fewer than `count`
    /// slots are free, as many as possible are spawned.
    ///
    /// ### Returns
    /// The ids of the spawned particles, lowest slot first.
    pub fn spawn(
        &mut self,
        count: usize,
        origin: Vec2,
        jitter: Vec2,
        grid: &mut SpatialGrid,
        rng: &mut impl Rng,
    ) -> Vec<ParticleId> {
        let free: Vec<ParticleId> = self
            .slots
            .iter()
            .filter(|p| !p.alive)
            .map(|p| p.id)
            .take(count)
            .collect();

        for &id in &free {
            let offset = Vec2::new(jitter_axis(rng, jitter.x), jitter_axis(rng, jitter.y));
            let particle = &mut self.slots[id];
            particle.position = origin + offset;
            particle.velocity = Vec2::ZERO;
            particle.alive = true;
            particle.cell = grid.cell_of(particle.position);
            particle.neighbors.clear();
            particle.distances.clear();
            particle.reset_frame_state();

            grid.insert(particle.cell, id);
            self.active.push(id);
        }
        free
    }

    /// Deactivates a particle and frees its slot for reuse.
    ///
    /// Returns `false` if the slot does not exist or is already inactive.
    pub fn despawn(&mut self, id: ParticleId, grid: &mut SpatialGrid) -> bool {
        let Some(particle) = self.slots.get_mut(id) else {
            return false;
        };
        if !particle.alive {
            return false;
        }
        particle.alive = false;
        grid.remove(particle.cell, id);
        if let Some(pos) = self.active.iter().position(|&a| a == id) {
            self.active.remove(pos);
        }
        true
    }

    /// Deactivates every particle.
    pub fn clear(&mut self, grid: &mut SpatialGrid) {
        for &id in &self.active {
            self.slots[id].alive = false;
        }
        self.active.clear();
        grid.clear();
    }
}

fn jitter_axis(rng: &mut impl Rng, half_range: f32) -> f32 {
    if half_range > 0.0 {
        rng.random_range(-half_range..half_range)
    } else {
        0.0
    }
}
