//! Per-frame phases of the liquid pipeline.
//!
//! A frame runs, strictly in this order:
//! 1. [`prepare_phase`]: rebuild neighbor lists, snapshot rescaled positions
//!    and velocities, reset per-frame accumulators. Parallel.
//! 2. [`gather_phase`]: map rigid-body fixtures onto grid cells and hand them
//!    to the particles inside as collision candidates. Sequential.
//! 3. [`pressure_phase`]: accumulate near and far density. Parallel.
//! 4. [`forces_phase`]: pairwise pressure/viscosity corrections, gravity and
//!    magnet forces; corrections are then merged into the frame delta
//!    buffer. Parallel, followed by a sequential merge.
//! 5. [`collision_phase`]: push particles whose predicted position falls
//!    inside a candidate fixture back to its surface. Parallel.
//! 6. [`integrate_phase`]: apply deltas, move particles, update grid
//!    membership. Sequential.
//!
//! Parallel phases expect to run inside the caller's rayon pool. Each one
//! returns only after every particle has been processed, which is the barrier
//! the next phase relies on.

use glam::Vec2;
use rayon::prelude::*;
use tracing::warn;

use crate::config::Config;
use crate::delta_buffer::DeltaBuffer;
use crate::error::{LiquidError, Result};
use crate::grid::SpatialGrid;
use crate::magnet::Magnet;
use crate::particle::{Particle, ParticlePool};
use crate::world::{Fixture, RigidWorld, Shape};

/// Frame-global buffers indexed by particle slot.
#[derive(Debug, Clone)]
pub struct FrameScratch {
    pub scaled_positions: Vec<Vec2>,
    pub scaled_velocities: Vec<Vec2>,
    pub deltas: DeltaBuffer,
}

impl FrameScratch {
    pub fn with_len(len: usize) -> Self {
        Self {
            scaled_positions: vec![Vec2::ZERO; len],
            scaled_velocities: vec![Vec2::ZERO; len],
            deltas: DeltaBuffer::with_len(len),
        }
    }
}

/// Counters reported by [`gather_phase`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GatherStats {
    pub fixtures: usize,
    pub candidates: usize,
}

/// Counters reported by [`collision_phase`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionStats {
    pub collisions: usize,
    pub failures: usize,
}

/// Prepares every alive particle for the frame.
///
/// Rebuilds the neighbor list from the grid, stores position and velocity
/// multiplied by [`Config::multiplier`], and clears densities, fixture
/// candidates, force contributions and the frame delta buffer.
pub fn prepare_phase(
    pool: &mut ParticlePool,
    grid: &SpatialGrid,
    scratch: &mut FrameScratch,
    cfg: &Config,
) {
    let multiplier = cfg.multiplier();
    let max_neighbors = cfg.max_neighbors;

    scratch.deltas.ensure_len(pool.capacity());

    pool.slots_mut()
        .par_iter_mut()
        .zip(scratch.scaled_positions.par_iter_mut())
        .zip(scratch.scaled_velocities.par_iter_mut())
        .filter(|((p, _), _)| p.alive)
        .for_each(|((p, scaled_pos), scaled_vel)| {
            p.find_neighbors(grid, max_neighbors);
            *scaled_pos = p.position * multiplier;
            *scaled_vel = p.velocity * multiplier;
            p.reset_frame_state();
        });
}

/// Assigns rigid-body fixtures to the particles that may hit them.
///
/// The world is queried once over the simulation bounds. Each reported
/// fixture's bounds are mapped to grid cells, and every particle in those
/// cells gets the fixture as a candidate until its candidate list is full.
pub fn gather_phase<W: RigidWorld>(
    pool: &mut ParticlePool,
    grid: &SpatialGrid,
    world: &W,
    cfg: &Config,
) -> GatherStats {
    let mut stats = GatherStats::default();
    let bounds = cfg.simulation_bounds();
    let slots = pool.slots_mut();

    for fixture_id in world.query_region(&bounds) {
        let Some(fixture) = world.fixture(fixture_id) else {
            continue;
        };
        stats.fixtures += 1;

        let aabb = fixture.aabb();
        for (_, ids) in grid.cells_in(&aabb) {
            for &id in ids {
                if slots[id].push_fixture(fixture_id, cfg.max_fixtures_to_test) {
                    stats.candidates += 1;
                }
            }
        }
    }
    stats
}

/// Accumulates density for every alive particle.
pub fn pressure_phase(pool: &mut ParticlePool, scratch: &FrameScratch, cfg: &Config) {
    let scaled_positions = scratch.scaled_positions.as_slice();
    let ideal_radius = cfg.ideal_radius;

    pool.slots_mut()
        .par_iter_mut()
        .filter(|p| p.alive)
        .for_each(|p| accumulate_density(p, scaled_positions, ideal_radius));
}

/// Double-density accumulation for a single particle.
///
/// For each neighbor closer than `ideal_radius` (in rescaled space) with
/// `q = 1 - d / ideal_radius`, adds `q²` to `p` and `q³` to `pnear` and
/// records `d`. Neighbors out of range get `f32::MAX` as their distance.
pub fn accumulate_density(particle: &mut Particle, scaled_positions: &[Vec2], ideal_radius: f32) {
    let me = scaled_positions[particle.id];
    let ideal_radius_sq = ideal_radius * ideal_radius;

    for (a, &j) in particle.neighbors.iter().enumerate() {
        let distance_sq = scaled_positions[j].distance_squared(me);
        if distance_sq < ideal_radius_sq {
            let distance = distance_sq.sqrt();
            particle.distances[a] = distance;
            let one_minus_q = 1.0 - distance / ideal_radius;
            particle.p += one_minus_q * one_minus_q;
            particle.pnear += one_minus_q * one_minus_q * one_minus_q;
        } else {
            particle.distances[a] = f32::MAX;
        }
    }
}

/// Computes pairwise corrections and body forces, then merges the
/// corrections into the frame delta buffer.
///
/// A particle whose corrections turn out non-finite is logged and none of
/// its corrections are merged. Gravity and magnet pull still apply to it.
///
/// ### Returns
/// The number of particles whose corrections were dropped.
pub fn forces_phase(
    pool: &mut ParticlePool,
    scratch: &mut FrameScratch,
    magnets: &[Magnet],
    dt: f32,
    cfg: &Config,
) -> usize {
    let failures = {
        let scaled_positions = scratch.scaled_positions.as_slice();
        let scaled_velocities = scratch.scaled_velocities.as_slice();

        pool.slots_mut()
            .par_iter_mut()
            .filter(|p| p.alive)
            .map(|p| {
                match compute_forces(p, scaled_positions, scaled_velocities, magnets, dt, cfg) {
                    Ok(()) => 0,
                    Err(e) => {
                        warn!(particle = p.id, error = %e, "force task dropped");
                        p.contributions.clear();
                        1
                    }
                }
            })
            .sum::<usize>()
    };

    // Single-threaded reduction in active order keeps the summation order
    // independent of how the parallel tasks were scheduled.
    let inv_multiplier = 1.0 / cfg.multiplier();
    for &id in pool.active() {
        let contributions = &pool.slots()[id].contributions;
        scratch.deltas.merge_contributions(contributions, inv_multiplier);
    }

    failures
}

/// Force computation for a single particle.
///
/// Fills `particle.contributions` with one `(neighbor, d)` entry per neighbor
/// inside the ideal radius and a final `(self, -Σd)` entry, all in rescaled
/// units. Neighbors at zero distance have no direction and are skipped.
/// Gravity and the Coulomb pull of every magnet within range go directly to
/// the velocity, whether or not the corrections are usable.
///
/// ### Errors
/// [`LiquidError::NonFinite`] if any correction is NaN or infinite.
pub fn compute_forces(
    particle: &mut Particle,
    scaled_positions: &[Vec2],
    scaled_velocities: &[Vec2],
    magnets: &[Magnet],
    dt: f32,
    cfg: &Config,
) -> Result<()> {
    let i = particle.id;
    let pressure = (particle.p - cfg.rest_density) / 2.0;
    let presnear = particle.pnear / 2.0;
    let mut change = Vec2::ZERO;

    particle.contributions.clear();
    for (&j, &distance) in particle.neighbors.iter().zip(particle.distances.iter()) {
        if distance >= cfg.ideal_radius || distance <= f32::EPSILON {
            continue;
        }
        let relative_position = scaled_positions[j] - scaled_positions[i];
        let q = distance / cfg.ideal_radius;
        let one_minus_q = 1.0 - q;

        let factor = one_minus_q * (pressure + presnear * one_minus_q) / (2.0 * distance);
        let mut d = relative_position * factor;

        let relative_velocity = scaled_velocities[j] - scaled_velocities[i];
        d -= relative_velocity * (cfg.viscosity * one_minus_q * dt);

        particle.contributions.push((j, d));
        change -= d;
    }

    particle.velocity += cfg.gravity;
    for magnet in magnets {
        if let Some(dv) = magnet.coulomb_velocity_delta(
            particle.position,
            cfg.particle_charge,
            cfg.coulomb_min_distance,
            cfg.coulomb_max_distance,
        ) {
            particle.velocity += dv;
        }
    }

    if !change.is_finite() || particle.contributions.iter().any(|(_, d)| !d.is_finite()) {
        return Err(LiquidError::NonFinite { particle: i });
    }
    particle.contributions.push((i, change));
    Ok(())
}

/// Resolves collisions against every candidate fixture of every alive
/// particle.
pub fn collision_phase<W: RigidWorld>(
    pool: &mut ParticlePool,
    deltas: &mut DeltaBuffer,
    world: &W,
    cfg: &Config,
) -> CollisionStats {
    pool.slots_mut()
        .par_iter_mut()
        .zip(deltas.as_mut_slice().par_iter_mut())
        .filter(|(p, _)| p.alive)
        .map(|(p, delta)| resolve_collisions(p, delta, world, cfg))
        .reduce(CollisionStats::default, |a, b| CollisionStats {
            collisions: a.collisions + b.collisions,
            failures: a.failures + b.failures,
        })
}

/// Collision response for a single particle.
///
/// For each candidate, the particle's next position is predicted as
/// `position + velocity + delta`. If the fixture contains it, the particle is
/// moved onto the fixture's surface plus [`Config::collision_skin`], the
/// normal component of its velocity is removed
/// [`Config::restitution_damping`] times, and its pending delta is dropped.
///
/// Fixtures that fail to resolve are logged and skipped.
pub fn resolve_collisions<W: RigidWorld>(
    particle: &mut Particle,
    delta: &mut Vec2,
    world: &W,
    cfg: &Config,
) -> CollisionStats {
    let mut stats = CollisionStats::default();

    for k in 0..particle.fixtures.len() {
        let fixture_id = particle.fixtures[k];
        let predicted = particle.position + particle.velocity + *delta;

        let Some(fixture) = world.fixture(fixture_id) else {
            let e = LiquidError::UnknownFixture {
                fixture: fixture_id,
            };
            warn!(particle = particle.id, error = %e, "collision skipped");
            stats.failures += 1;
            continue;
        };
        if !fixture.contains_point(predicted) {
            continue;
        }

        match push_out(particle, fixture, cfg.collision_skin) {
            Ok(normal) => {
                let vn = particle.velocity.dot(normal);
                particle.velocity -= normal * (vn * cfg.restitution_damping);
                *delta = Vec2::ZERO;
                stats.collisions += 1;
            }
            Err(e) => {
                warn!(particle = particle.id, fixture = fixture_id, error = %e, "collision skipped");
                stats.failures += 1;
            }
        }
    }
    stats
}

/// Moves `particle` onto the surface of `fixture` plus `skin` and returns the
/// surface normal used.
fn push_out(particle: &mut Particle, fixture: &Fixture, skin: f32) -> Result<Vec2> {
    let xf = fixture.transform;
    match &fixture.shape {
        Shape::Polygon { vertices } => {
            let n = fixture.local_normals(&mut particle.collision_normals)?;
            for v in 0..n {
                particle.collision_vertices[v] = xf.apply(vertices[v]);
                particle.collision_normals[v] = xf.rotate(particle.collision_normals[v]);
            }

            // Supporting edge: smallest signed distance from the particle
            // along each edge normal.
            let mut shortest = f32::MAX;
            let mut normal = Vec2::ZERO;
            for v in 0..n {
                let nv = particle.collision_normals[v];
                let distance = nv.dot(particle.collision_vertices[v] - particle.position);
                if distance < shortest {
                    shortest = distance;
                    normal = nv;
                }
            }
            let closest = particle.position + normal * shortest;
            particle.position = closest + normal * skin;
            Ok(normal)
        }
        Shape::Circle { center, radius } => {
            let center = xf.apply(*center);
            let normal = (particle.position - center)
                .try_normalize()
                .ok_or(LiquidError::DegenerateContact)?;
            let closest = center + normal * *radius;
            particle.position = closest + normal * skin;
            Ok(normal)
        }
    }
}

/// Applies pending deltas, advances positions and keeps grid membership in
/// sync, in active order.
pub fn integrate_phase(pool: &mut ParticlePool, grid: &mut SpatialGrid, deltas: &DeltaBuffer) {
    for k in 0..pool.active_count() {
        let id = pool.active()[k];
        let Some(particle) = pool.get_mut(id) else {
            continue;
        };
        let d = deltas.get(id);
        particle.velocity += d;
        particle.position += d;
        particle.position += particle.velocity;

        let cell = grid.cell_of(particle.position);
        if cell != particle.cell {
            grid.relocate(particle.cell, cell, id);
            particle.cell = cell;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{StaticWorld, Transform};
    use glam::IVec2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const EPS: f32 = 1e-5;

    /// Pool with particles at exact positions (no jitter).
    fn setup(positions: &[Vec2]) -> (ParticlePool, SpatialGrid, FrameScratch, Config) {
        let cfg = Config::default();
        let mut pool = ParticlePool::new(64, cfg.max_neighbors, cfg.max_fixtures_to_test);
        let mut grid = SpatialGrid::new(cfg.cell_size);
        let mut rng = StdRng::seed_from_u64(0);
        for &pos in positions {
            pool.spawn(1, pos, Vec2::ZERO, &mut grid, &mut rng);
        }
        let scratch = FrameScratch::with_len(pool.capacity());
        (pool, grid, scratch, cfg)
    }

    #[test]
    fn prepare_collects_neighbors_and_scales_state() {
        let (mut pool, grid, mut scratch, cfg) =
            setup(&[Vec2::ZERO, Vec2::new(0.3, 0.0), Vec2::new(5.0, 5.0)]);
        pool.get_mut(0).unwrap().velocity = Vec2::new(0.1, 0.0);
        pool.get_mut(0).unwrap().p = 42.0;

        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);

        let p0 = pool.get(0).unwrap();
        assert_eq!(p0.neighbors, vec![1]);
        assert_eq!(p0.distances, vec![0.0]);
        assert_eq!(p0.p, 0.0);
        assert!((scratch.scaled_velocities[0].x - 0.1 * cfg.multiplier()).abs() < EPS);
        assert!((scratch.scaled_positions[1].x - 0.3 * cfg.multiplier()).abs() < EPS);
        assert!(pool.get(2).unwrap().neighbors.is_empty());
    }

    #[test]
    fn pressure_accumulates_quadratic_and_cubic_terms() {
        let (mut pool, grid, mut scratch, cfg) = setup(&[Vec2::ZERO, Vec2::new(0.45, 0.0)]);
        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        pressure_phase(&mut pool, &scratch, &cfg);

        // 0.45 world units is half the interaction radius.
        let p0 = pool.get(0).unwrap();
        assert!((p0.distances[0] - 25.0).abs() < 1e-3);
        assert!((p0.p - 0.25).abs() < 1e-4);
        assert!((p0.pnear - 0.125).abs() < 1e-4);
    }

    #[test]
    fn pressure_marks_out_of_range_neighbors() {
        // Same 3x3 block, but farther apart than the interaction radius.
        let (mut pool, grid, mut scratch, cfg) = setup(&[Vec2::new(0.0, 0.0), Vec2::new(1.1, 0.0)]);
        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        pressure_phase(&mut pool, &scratch, &cfg);

        let p0 = pool.get(0).unwrap();
        assert_eq!(p0.neighbors, vec![1]);
        assert_eq!(p0.distances[0], f32::MAX);
        assert_eq!(p0.p, 0.0);
        assert_eq!(p0.pnear, 0.0);
    }

    #[test]
    fn density_is_never_negative() {
        let mut rng = StdRng::seed_from_u64(99);
        let cfg = Config::default();
        let mut pool = ParticlePool::new(400, cfg.max_neighbors, cfg.max_fixtures_to_test);
        let mut grid = SpatialGrid::new(cfg.cell_size);
        pool.spawn(400, Vec2::new(0.2, -0.3), Vec2::new(1.5, 1.5), &mut grid, &mut rng);
        let mut scratch = FrameScratch::with_len(pool.capacity());

        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        pressure_phase(&mut pool, &scratch, &cfg);

        for p in pool.slots() {
            assert!(p.p >= 0.0 && p.pnear >= 0.0);
            assert!(p.neighbor_count() <= cfg.max_neighbors);
            assert_eq!(p.neighbors.len(), p.distances.len());
        }
    }

    #[test]
    fn forces_are_antisymmetric_between_a_pair() {
        let (mut pool, grid, mut scratch, mut cfg) = setup(&[Vec2::ZERO, Vec2::new(0.3, 0.0)]);
        cfg.gravity = Vec2::ZERO;
        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        pressure_phase(&mut pool, &scratch, &cfg);
        let failures = forces_phase(&mut pool, &mut scratch, &[], cfg.dt, &cfg);

        assert_eq!(failures, 0);
        let d0 = scratch.deltas.get(0);
        let d1 = scratch.deltas.get(1);
        // Low density: pressure is negative, so the pair is pulled together.
        assert!(d0.x > 0.0);
        assert!((d0 + d1).length() < EPS);
        assert_eq!(d0.y, 0.0);
    }

    #[test]
    fn forces_apply_gravity_and_magnets_to_velocity() {
        let (mut pool, grid, mut scratch, cfg) = setup(&[Vec2::ZERO]);
        let magnet = Magnet::new(Vec2::new(3.0, 0.0), cfg.magnet_charge, cfg.magnet_half_extent);
        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        pressure_phase(&mut pool, &scratch, &cfg);
        forces_phase(&mut pool, &mut scratch, &[magnet], cfg.dt, &cfg);

        let v = pool.get(0).unwrap().velocity;
        let pull = cfg.particle_charge * cfg.magnet_charge / (9.0 * 4.0 * std::f32::consts::PI);
        assert!((v.x - pull).abs() < 1e-6);
        assert!((v.y - cfg.gravity.y).abs() < 1e-7);
    }

    #[test]
    fn coincident_particles_still_feel_gravity() {
        let (mut pool, grid, mut scratch, cfg) =
            setup(&[Vec2::ZERO, Vec2::ZERO, Vec2::new(0.3, 0.0)]);
        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        pressure_phase(&mut pool, &scratch, &cfg);
        let failures = forces_phase(&mut pool, &mut scratch, &[], cfg.dt, &cfg);

        assert_eq!(failures, 0);
        for id in 0..3 {
            assert!(scratch.deltas.get(id).is_finite());
            assert_eq!(pool.get(id).unwrap().velocity, cfg.gravity);
        }
        // The stacked pair is still pushed by its third neighbor.
        assert_ne!(scratch.deltas.get(0), Vec2::ZERO);
        assert_eq!(scratch.deltas.get(0), scratch.deltas.get(1));
    }

    #[test]
    fn non_finite_corrections_are_dropped_but_gravity_applies() {
        let (mut pool, grid, mut scratch, cfg) = setup(&[Vec2::ZERO, Vec2::new(0.3, 0.0)]);
        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        pressure_phase(&mut pool, &scratch, &cfg);
        scratch.scaled_velocities[1] = Vec2::new(f32::NAN, 0.0);

        let failures = forces_phase(&mut pool, &mut scratch, &[], cfg.dt, &cfg);

        // Both particles read the poisoned velocity.
        assert_eq!(failures, 2);
        assert!(pool.get(0).unwrap().contributions.is_empty());
        assert_eq!(scratch.deltas.get(0), Vec2::ZERO);
        assert_eq!(pool.get(0).unwrap().velocity, cfg.gravity);
    }

    #[test]
    fn gather_assigns_fixtures_to_particles_in_overlapping_cells() {
        let (mut pool, grid, mut scratch, cfg) = setup(&[Vec2::new(0.1, 0.1), Vec2::new(20.0, 20.0)]);
        let mut world = StaticWorld::new();
        let floor = world.add(Fixture::rect(Vec2::new(0.0, -0.5), 4.0, 1.0, 0.0));

        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        let stats = gather_phase(&mut pool, &grid, &world, &cfg);

        assert_eq!(stats, GatherStats { fixtures: 1, candidates: 1 });
        assert_eq!(pool.get(0).unwrap().fixtures, vec![floor]);
        assert!(pool.get(1).unwrap().fixtures.is_empty());
    }

    #[test]
    fn gather_respects_candidate_cap() {
        let (mut pool, grid, mut scratch, cfg) = setup(&[Vec2::new(0.1, 0.1)]);
        let mut world = StaticWorld::new();
        for _ in 0..30 {
            world.add(Fixture::circle(Vec2::ZERO, 0.5, 0.0));
        }
        prepare_phase(&mut pool, &grid, &mut scratch, &cfg);
        let stats = gather_phase(&mut pool, &grid, &world, &cfg);

        assert_eq!(stats.fixtures, 30);
        assert_eq!(stats.candidates, 20);
        assert_eq!(pool.get(0).unwrap().fixtures.len(), cfg.max_fixtures_to_test);
    }

    #[test]
    fn circle_collision_pushes_out_and_damps_velocity() {
        let (mut pool, _grid, _scratch, cfg) = setup(&[Vec2::new(2.0, 0.0)]);
        let mut world = StaticWorld::new();
        let circle = world.add(Fixture::circle(Vec2::ZERO, 1.0, 0.0));

        let p = pool.get_mut(0).unwrap();
        p.velocity = Vec2::new(-3.0, 0.0);
        p.fixtures.push(circle);
        let mut delta = Vec2::ZERO;

        let stats = resolve_collisions(p, &mut delta, &world, &cfg);

        assert_eq!(stats.collisions, 1);
        assert!((p.position.length() - 1.05).abs() < EPS);
        assert!(p.position.x > 0.0 && p.position.y.abs() < EPS);
        // Radial velocity went from -3 (inward) to +0.6.
        assert!(p.velocity.x.abs() < 3.0);
        assert!((p.velocity.x - 0.6).abs() < EPS);
        assert_eq!(delta, Vec2::ZERO);
    }

    #[test]
    fn polygon_collision_snaps_to_nearest_edge() {
        let (mut pool, _grid, _scratch, cfg) = setup(&[Vec2::new(0.0, 1.2)]);
        let mut world = StaticWorld::new();
        let floor = world.add(Fixture::rect(Vec2::ZERO, 10.0, 2.0, 0.0));

        let p = pool.get_mut(0).unwrap();
        p.velocity = Vec2::new(0.5, -0.5);
        p.fixtures.push(floor);
        let mut delta = Vec2::new(0.0, -0.1);

        let stats = resolve_collisions(p, &mut delta, &world, &cfg);

        assert_eq!(stats.collisions, 1);
        assert!((p.position.y - 1.05).abs() < EPS);
        assert!((p.position.x - 0.0).abs() < EPS);
        // Normal component reversed and damped, tangential kept.
        assert!((p.velocity.y - 0.1).abs() < EPS);
        assert!((p.velocity.x - 0.5).abs() < EPS);
        assert_eq!(delta, Vec2::ZERO);
    }

    #[test]
    fn rotated_polygon_normals_follow_the_body() {
        let (mut pool, _grid, _scratch, cfg) = setup(&[Vec2::new(1.2, 0.0)]);
        let mut world = StaticWorld::new();
        // 10 wide, 2 tall, turned a quarter: its +x face is at x = 1.
        let wall = world.add(Fixture::rect(Vec2::ZERO, 10.0, 2.0, std::f32::consts::FRAC_PI_2));

        let p = pool.get_mut(0).unwrap();
        p.velocity = Vec2::new(-0.5, 0.0);
        p.fixtures.push(wall);
        let mut delta = Vec2::ZERO;

        resolve_collisions(p, &mut delta, &world, &cfg);
        assert!((p.position.x - 1.05).abs() < 1e-4);
        assert!(p.velocity.x > 0.0);
    }

    #[test]
    fn degenerate_polygon_is_skipped_and_reported() {
        let (mut pool, _grid, _scratch, cfg) = setup(&[Vec2::new(0.5, 0.5)]);
        let mut world = StaticWorld::new();
        let bad = world.add(
            Fixture::polygon(
                vec![
                    Vec2::new(-1.0, -1.0),
                    Vec2::new(1.0, -1.0),
                    Vec2::new(1.0, -1.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(-1.0, 1.0),
                ],
                Transform::default(),
            )
            .unwrap(),
        );

        let p = pool.get_mut(0).unwrap();
        p.fixtures.push(bad);
        let mut delta = Vec2::new(0.01, 0.0);

        let stats = resolve_collisions(p, &mut delta, &world, &cfg);

        assert_eq!(stats, CollisionStats { collisions: 0, failures: 1 });
        assert_eq!(p.position, Vec2::new(0.5, 0.5));
        assert_eq!(delta, Vec2::new(0.01, 0.0));
    }

    #[test]
    fn unknown_fixture_is_reported() {
        let (mut pool, _grid, _scratch, cfg) = setup(&[Vec2::ZERO]);
        let world = StaticWorld::new();
        let p = pool.get_mut(0).unwrap();
        p.fixtures.push(3);
        let mut delta = Vec2::ZERO;

        let stats = resolve_collisions(p, &mut delta, &world, &cfg);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn integrate_moves_particles_and_updates_cells() {
        let (mut pool, mut grid, mut scratch, _cfg) = setup(&[Vec2::new(0.1, 0.1)]);
        pool.get_mut(0).unwrap().velocity = Vec2::new(0.5, 0.0);
        scratch.deltas.add(0, Vec2::new(0.1, 0.0));

        integrate_phase(&mut pool, &mut grid, &scratch.deltas);

        let p = pool.get(0).unwrap();
        // velocity 0.5 + 0.1, position 0.1 + 0.1 + 0.6
        assert!((p.velocity.x - 0.6).abs() < EPS);
        assert!((p.position.x - 0.8).abs() < EPS);
        assert_eq!(p.cell, IVec2::new(1, 0));
        assert_eq!(p.cell, grid.cell_of(p.position));
        assert!(grid.cell(IVec2::ZERO).is_empty());
        assert_eq!(grid.cell(IVec2::new(1, 0)), &[0]);
        assert_eq!(grid.occupied_cells(), 1);
    }
}
