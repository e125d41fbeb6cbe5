use glam::IVec2;

/// Identifier for a particle slot in a [`crate::particle::ParticlePool`].
///
/// This is an index into the pool's slot array. A slot keeps its id for the
/// whole lifetime of the pool; it is only handed out again after the particle
/// occupying it has been despawned.
pub type ParticleId = usize;

/// Identifier for a fixture owned by a [`crate::world::RigidWorld`].
pub type FixtureId = usize;

/// Integer coordinates of a spatial grid cell.
pub type Cell = IVec2;
