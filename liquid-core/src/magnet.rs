use glam::Vec2;

use crate::aabb::Aabb;
use crate::world::{Fixture, Transform};

/// Point charge pulling on nearby particles. Its box is also a solid body
/// the liquid collides with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Magnet {
    pub pos: Vec2,
    pub charge: f32,
    pub half_extent: f32,
}

impl Magnet {
    pub fn new(pos: Vec2, charge: f32, half_extent: f32) -> Self {
        Self {
            pos,
            charge,
            half_extent,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_half_extent(self.pos, Vec2::splat(self.half_extent))
    }

    /// The magnet's solid box as a collision fixture.
    pub fn fixture(&self) -> Fixture {
        let side = self.half_extent * 2.0;
        Fixture::rect(self.pos, side, side, 0.0)
    }

    /// Moves an existing box fixture onto this magnet.
    pub fn place_fixture(&self, fixture: &mut Fixture) {
        fixture.transform = Transform::new(self.pos, 0.0);
    }

    pub fn overlaps(&self, other: &Magnet) -> bool {
        Aabb::test_overlap(&self.aabb(), &other.aabb())
    }

    /// Velocity change a particle at `particle_pos` with charge
    /// `particle_charge` picks up from this magnet in one frame.
    ///
    /// Coulomb's law `q1 q2 / (4π d²)` along the unit vector from the particle
    /// towards the magnet, applied only for `min_distance < d < max_distance`.
    /// The magnet itself feels nothing.
    pub fn coulomb_velocity_delta(
        &self,
        particle_pos: Vec2,
        particle_charge: f32,
        min_distance: f32,
        max_distance: f32,
    ) -> Option<Vec2> {
        let offset = self.pos - particle_pos;
        let d2 = offset.length_squared();
        let d = d2.sqrt();
        if d <= min_distance || d >= max_distance {
            return None;
        }
        let force = particle_charge * self.charge / (d2 * 4.0 * std::f32::consts::PI);
        Some(offset / d * force)
    }
}

/// All magnets in the scene. The first one always exists and follows the pointer.
#[derive(Debug, Clone)]
pub struct MagnetSet {
    pub magnets: Vec<Magnet>,
    charge: f32,
    half_extent: f32,
}

impl MagnetSet {
    /// Creates the set with its pointer-tracking magnet at `pointer`.
    pub fn new(pointer: Vec2, charge: f32, half_extent: f32) -> Self {
        Self {
            magnets: vec![Magnet::new(pointer, charge, half_extent)],
            charge,
            half_extent,
        }
    }

    /// The pointer-tracking magnet.
    #[inline]
    pub fn cursor(&self) -> &Magnet {
        &self.magnets[0]
    }

    pub fn track(&mut self, pointer: Vec2) {
        self.magnets[0].pos = pointer;
    }

    /// Drops a fixed magnet at the cursor position.
    ///
    /// Only succeeds when the cursor magnet overlaps no placed magnet and lies
    /// (at least partly) inside `bounds`.
    ///
    /// ### Returns
    /// `true` if a magnet was added.
    pub fn try_spawn(&mut self, bounds: &Aabb) -> bool {
        let cursor = *self.cursor();
        if self.magnets[1..].iter().any(|m| cursor.overlaps(m)) {
            return false;
        }
        if !Aabb::test_overlap(bounds, &cursor.aabb()) {
            return false;
        }
        self.magnets
            .push(Magnet::new(cursor.pos, self.charge, self.half_extent));
        true
    }

    /// Magnets placed by the user, excluding the cursor.
    pub fn placed(&self) -> &[Magnet] {
        &self.magnets[1..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Magnet> + '_ {
        self.magnets.iter()
    }

    pub fn len(&self) -> usize {
        self.magnets.len()
    }

    /// Always `false`: the cursor magnet is never removed.
    pub fn is_empty(&self) -> bool {
        self.magnets.is_empty()
    }
}
