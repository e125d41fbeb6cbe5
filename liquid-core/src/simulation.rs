//! The liquid: particle storage, grid, magnets and the worker pool that steps
//! them, frame after frame.

use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, trace_span};

use crate::config::Config;
use crate::error::Result;
use crate::grid::SpatialGrid;
use crate::magnet::MagnetSet;
use crate::particle::ParticlePool;
use crate::phases::{self, FrameScratch};
use crate::types::ParticleId;
use crate::world::{Fixture, LayeredWorld, RigidWorld};

/// What happened during one call to [`Liquid::advance`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Index of the frame, starting at 1.
    pub frame: u64,
    pub active: usize,
    /// Fixtures reported by the world query.
    pub fixtures_gathered: usize,
    /// Fixture candidates handed to particles.
    pub candidates_assigned: usize,
    pub collisions: usize,
    /// Particles whose pairwise corrections were dropped.
    pub dropped_force_tasks: usize,
    /// Particle/fixture contacts that could not be resolved.
    pub skipped_collisions: usize,
}

pub struct Liquid {
    cfg: Config,
    pool: ParticlePool,
    grid: SpatialGrid,
    scratch: FrameScratch,
    magnets: MagnetSet,
    /// Solid boxes of `magnets`, same order.
    magnet_fixtures: Vec<Fixture>,
    workers: ThreadPool,
    rng: StdRng,
    frame: u64,
}

impl Liquid {
    /// Builds an empty liquid with an entropy-seeded spawn RNG.
    ///
    /// ### Errors
    /// Fails if `cfg` does not validate or the worker pool cannot start.
    pub fn new(cfg: Config) -> Result<Self> {
        Self::with_rng(cfg, StdRng::from_os_rng())
    }

    /// Like [`Liquid::new`], with a fixed seed for reproducible spawning.
    pub fn with_seed(cfg: Config, seed: u64) -> Result<Self> {
        Self::with_rng(cfg, StdRng::seed_from_u64(seed))
    }

    fn with_rng(cfg: Config, rng: StdRng) -> Result<Self> {
        cfg.validate()?;

        let workers = ThreadPoolBuilder::new()
            .num_threads(cfg.worker_threads)
            .thread_name(|i| format!("liquid-worker-{i}"))
            .build()?;

        info!(
            capacity = cfg.max_particles,
            workers = workers.current_num_threads(),
            "liquid created"
        );

        Ok(Self {
            pool: ParticlePool::new(cfg.max_particles, cfg.max_neighbors, cfg.max_fixtures_to_test),
            grid: SpatialGrid::new(cfg.cell_size),
            scratch: FrameScratch::with_len(cfg.max_particles),
            magnets: MagnetSet::new(Vec2::ZERO, cfg.magnet_charge, cfg.magnet_half_extent),
            magnet_fixtures: Vec::new(),
            workers,
            rng,
            frame: 0,
            cfg,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn particles(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn magnets(&self) -> &MagnetSet {
        &self.magnets
    }

    /// Frames advanced since construction or the last reset.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn worker_count(&self) -> usize {
        self.workers.current_num_threads()
    }

    /// Spawns up to `count` particles around `origin` with the configured
    /// jitter. Returns the ids actually spawned.
    pub fn spawn_particles(&mut self, count: usize, origin: Vec2) -> Vec<ParticleId> {
        self.pool
            .spawn(count, origin, self.cfg.spawn_jitter, &mut self.grid, &mut self.rng)
    }

    pub fn despawn(&mut self, id: ParticleId) -> bool {
        self.pool.despawn(id, &mut self.grid)
    }

    /// Drops a magnet at the cursor if the placement rules allow it.
    pub fn try_spawn_magnet(&mut self) -> bool {
        let placed = self.magnets.try_spawn(&self.cfg.simulation_bounds());
        if placed {
            debug!(pos = ?self.magnets.cursor().pos, total = self.magnets.len(), "magnet placed");
        }
        placed
    }

    /// Removes all particles and placed magnets and restarts the frame count.
    pub fn reset(&mut self) {
        self.pool.clear(&mut self.grid);
        let cursor = self.magnets.cursor().pos;
        self.magnets = MagnetSet::new(cursor, self.cfg.magnet_charge, self.cfg.magnet_half_extent);
        self.frame = 0;
        info!("liquid reset");
    }

    /// One interactive frame.
    ///
    /// Moves the cursor magnet to `pointer`, places a magnet there if
    /// `place_magnet` is set, emits `source_rate` particles at the source and
    /// then advances the simulation.
    pub fn update<W: RigidWorld>(
        &mut self,
        dt: f32,
        pointer: Vec2,
        place_magnet: bool,
        world: &W,
    ) -> FrameStats {
        self.magnets.track(pointer);
        if place_magnet {
            self.try_spawn_magnet();
        }
        if self.cfg.source_rate > 0 {
            self.spawn_particles(self.cfg.source_rate, self.cfg.source_position);
        }
        self.advance(dt, pointer, world)
    }

    /// Keeps one box fixture per magnet, positioned on it.
    fn sync_magnet_fixtures(&mut self) {
        let magnets = &self.magnets.magnets;
        self.magnet_fixtures.truncate(magnets.len());
        for (magnet, fixture) in magnets.iter().zip(self.magnet_fixtures.iter_mut()) {
            magnet.place_fixture(fixture);
        }
        for magnet in &magnets[self.magnet_fixtures.len()..] {
            self.magnet_fixtures.push(magnet.fixture());
        }
    }

    /// Runs the six phases once.
    ///
    /// Magnets take part as solid boxes next to the fixtures of `world`.
    /// `dt` only scales the viscosity term; positions advance by one velocity
    /// step per frame regardless.
    pub fn advance<W: RigidWorld>(&mut self, dt: f32, pointer: Vec2, world: &W) -> FrameStats {
        self.magnets.track(pointer);
        self.sync_magnet_fixtures();

        let Self {
            cfg,
            pool,
            grid,
            scratch,
            magnets,
            magnet_fixtures,
            workers,
            frame,
            ..
        } = self;

        *frame += 1;
        let world = LayeredWorld::new(world, magnet_fixtures);

        let mut stats = FrameStats {
            frame: *frame,
            ..FrameStats::default()
        };

        {
            let _span = trace_span!("prepare").entered();
            workers.install(|| phases::prepare_phase(pool, grid, scratch, cfg));
        }
        {
            let _span = trace_span!("gather").entered();
            let gathered = phases::gather_phase(pool, grid, &world, cfg);
            stats.fixtures_gathered = gathered.fixtures;
            stats.candidates_assigned = gathered.candidates;
        }
        {
            let _span = trace_span!("pressure").entered();
            workers.install(|| phases::pressure_phase(pool, scratch, cfg));
        }
        {
            let _span = trace_span!("forces").entered();
            let magnets = magnets.magnets.as_slice();
            stats.dropped_force_tasks =
                workers.install(|| phases::forces_phase(pool, scratch, magnets, dt, cfg));
        }
        {
            let _span = trace_span!("collision").entered();
            let deltas = &mut scratch.deltas;
            let world = &world;
            let collided = workers.install(|| phases::collision_phase(pool, deltas, world, cfg));
            stats.collisions = collided.collisions;
            stats.skipped_collisions = collided.failures;
        }
        {
            let _span = trace_span!("integrate").entered();
            phases::integrate_phase(pool, grid, &scratch.deltas);
        }

        stats.active = pool.active_count();
        debug!(
            frame = stats.frame,
            active = stats.active,
            fixtures = stats.fixtures_gathered,
            candidates = stats.candidates_assigned,
            collisions = stats.collisions,
            dropped_forces = stats.dropped_force_tasks,
            skipped_collisions = stats.skipped_collisions,
            "frame advanced"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::demo_world;
    use crate::world::{Fixture, StaticWorld};

    fn config(workers: usize) -> Config {
        Config {
            worker_threads: workers,
            ..Config::default()
        }
    }

    fn floor_world() -> StaticWorld {
        let mut world = StaticWorld::new();
        world.add(Fixture::rect(Vec2::new(0.0, -10.0), 37.5, 2.0, 0.0));
        world
    }

    fn run(workers: usize, frames: usize) -> Vec<(Vec2, Vec2)> {
        let world = demo_world();
        let mut liquid = Liquid::with_seed(config(workers), 17).unwrap();
        for i in 0..frames {
            liquid.update(1.0 / 60.0, Vec2::new(30.0, 30.0), i == 10, &world);
        }
        liquid
            .particles()
            .active()
            .iter()
            .map(|&id| {
                let p = liquid.particles().get(id).unwrap();
                (p.position, p.velocity)
            })
            .collect()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = Config {
            cell_size: -1.0,
            ..Config::default()
        };
        assert!(Liquid::new(cfg).is_err());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        assert_eq!(run(1, 120), run(1, 120));
    }

    #[test]
    fn worker_count_does_not_change_results() {
        assert_eq!(run(1, 120), run(4, 120));
    }

    #[test]
    fn grid_stays_consistent_with_positions() {
        let world = demo_world();
        let mut liquid = Liquid::with_seed(config(2), 3).unwrap();
        liquid.spawn_particles(200, Vec2::new(0.0, -4.0));

        for _ in 0..60 {
            liquid.advance(1.0 / 60.0, Vec2::ZERO, &world);
        }

        let grid = liquid.grid();
        assert_eq!(grid.len(), liquid.particles().active_count());
        for &id in liquid.particles().active() {
            let p = liquid.particles().get(id).unwrap();
            assert!(p.position.is_finite());
            assert_eq!(p.cell, grid.cell_of(p.position));
            assert!(grid.cell(p.cell).contains(&id));
        }
    }

    #[test]
    fn particles_come_to_rest_on_the_floor() {
        let world = floor_world();
        let mut cfg = config(2);
        cfg.max_particles = 50;
        let mut liquid = Liquid::with_seed(cfg, 9).unwrap();
        liquid.spawn_particles(20, Vec2::new(0.0, -5.0));

        let mut collisions = 0;
        for _ in 0..240 {
            collisions += liquid.advance(1.0 / 60.0, Vec2::new(30.0, 30.0), &world).collisions;
        }

        assert!(collisions > 0);
        for pos in liquid.particles().positions() {
            assert!(pos.y > -10.0, "particle sank into the floor: {pos}");
        }
    }

    #[test]
    fn update_emits_from_the_source() {
        let world = StaticWorld::new();
        let mut liquid = Liquid::with_seed(config(1), 1).unwrap();

        let stats = liquid.update(1.0 / 60.0, Vec2::ZERO, false, &world);
        assert_eq!(stats.frame, 1);
        assert_eq!(stats.active, 1);

        liquid.update(1.0 / 60.0, Vec2::ZERO, false, &world);
        assert_eq!(liquid.particles().active_count(), 2);
    }

    #[test]
    fn cursor_magnet_follows_pointer_and_can_be_placed() {
        let world = StaticWorld::new();
        let mut liquid = Liquid::with_seed(config(1), 1).unwrap();

        liquid.update(1.0 / 60.0, Vec2::new(2.0, 3.0), true, &world);
        assert_eq!(liquid.magnets().cursor().pos, Vec2::new(2.0, 3.0));
        assert_eq!(liquid.magnets().placed().len(), 1);

        // Same spot again: overlaps the magnet just placed.
        liquid.update(1.0 / 60.0, Vec2::new(2.0, 3.0), true, &world);
        assert_eq!(liquid.magnets().placed().len(), 1);
    }

    #[test]
    fn reset_clears_particles_and_magnets() {
        let world = StaticWorld::new();
        let mut liquid = Liquid::with_seed(config(1), 1).unwrap();
        liquid.spawn_particles(10, Vec2::ZERO);
        liquid.update(1.0 / 60.0, Vec2::ONE, true, &world);

        liquid.reset();
        assert_eq!(liquid.particles().active_count(), 0);
        assert!(liquid.grid().is_empty());
        assert!(liquid.magnets().placed().is_empty());
        assert_eq!(liquid.frame(), 0);
    }

    #[test]
    fn stacked_particles_fall_under_gravity() {
        let world = StaticWorld::new();
        let cfg = Config {
            spawn_jitter: Vec2::ZERO,
            ..config(1)
        };
        let mut liquid = Liquid::with_seed(cfg, 2).unwrap();
        let ids = liquid.spawn_particles(2, Vec2::new(0.0, 5.0));

        let mut dropped = 0;
        for _ in 0..120 {
            dropped += liquid.advance(1.0 / 60.0, Vec2::new(30.0, 30.0), &world).dropped_force_tasks;
        }

        assert_eq!(dropped, 0);
        for id in ids {
            let p = liquid.particles().get(id).unwrap();
            assert!(p.position.y < 5.0, "particle {id} stuck at {}", p.position);
            assert!(p.velocity.y < 0.0);
        }
    }

    #[test]
    fn placed_magnets_are_solid() {
        let world = StaticWorld::new();
        let cfg = Config {
            spawn_jitter: Vec2::ZERO,
            source_rate: 0,
            ..config(1)
        };
        let mut liquid = Liquid::with_seed(cfg, 4).unwrap();
        liquid.update(1.0 / 60.0, Vec2::ZERO, true, &world);
        assert_eq!(liquid.magnets().placed().len(), 1);

        let id = liquid.spawn_particles(1, Vec2::new(0.0, 3.0))[0];
        let mut collisions = 0;
        for _ in 0..240 {
            collisions += liquid.advance(1.0 / 60.0, Vec2::new(30.0, 30.0), &world).collisions;
        }

        assert!(collisions > 0);
        let pos = liquid.particles().get(id).unwrap().position;
        let half = liquid.magnets().placed()[0].half_extent;
        assert!(
            pos.x.abs() >= half || pos.y.abs() >= half,
            "particle inside the magnet at {pos}"
        );
        assert!(pos.y > 0.0);
    }

    #[test]
    fn despawn_frees_the_slot() {
        let mut liquid = Liquid::with_seed(config(1), 1).unwrap();
        let ids = liquid.spawn_particles(3, Vec2::ZERO);
        assert!(liquid.despawn(ids[1]));
        assert!(!liquid.despawn(ids[1]));
        assert_eq!(liquid.particles().active_count(), 2);
    }
}
