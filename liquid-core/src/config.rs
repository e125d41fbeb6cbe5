use std::path::Path;

use glam::Vec2;
use serde::Deserialize;

use crate::aabb::Aabb;
use crate::error::{LiquidError, Result};

/// Tunables for the liquid pipeline.
///
/// Distances are world units. Velocities are per-frame displacements, which is
/// why [`Config::gravity`] is a per-frame velocity increment and `dt` only
/// enters the viscosity term.
///
/// Every field can be overridden from TOML; missing fields keep their default.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_particles: usize,
    pub max_neighbors: usize,
    pub max_fixtures_to_test: usize,

    pub cell_size: f32,
    /// Interaction radius in world space.
    pub radius: f32,
    /// Kernel support radius in the rescaled space.
    pub ideal_radius: f32,

    pub rest_density: f32,
    pub viscosity: f32,
    pub gravity: Vec2,
    pub dt: f32,

    pub particle_charge: f32,
    pub magnet_charge: f32,
    pub magnet_half_extent: f32,
    pub coulomb_min_distance: f32,
    pub coulomb_max_distance: f32,

    pub collision_skin: f32,
    pub restitution_damping: f32,

    /// Half-range of the spawn jitter per axis.
    pub spawn_jitter: Vec2,
    pub simulation_half_extents: Vec2,

    pub source_position: Vec2,
    pub source_rate: usize,

    /// 0 picks the available hardware parallelism.
    pub worker_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_particles: 3000,
            max_neighbors: 75,
            max_fixtures_to_test: 20,
            cell_size: 0.6,
            radius: 0.9,
            ideal_radius: 50.0,
            rest_density: 5.0,
            viscosity: 0.004,
            gravity: Vec2::new(0.0, -9.81 / 3000.0),
            dt: 1.0 / 60.0,
            particle_charge: 6e-20,
            magnet_charge: 1e19,
            magnet_half_extent: 0.75,
            coulomb_min_distance: 1.0,
            coulomb_max_distance: 10.0,
            collision_skin: 0.05,
            restitution_damping: 1.2,
            spawn_jitter: Vec2::new(1.0, 0.5),
            simulation_half_extents: Vec2::new(700.0, 400.0),
            source_position: Vec2::new(-21.25, 10.0),
            source_rate: 1,
            worker_threads: 0,
        }
    }
}

impl Config {
    /// Scale factor from world space into the kernel's rescaled space.
    #[inline]
    pub fn multiplier(&self) -> f32 {
        self.ideal_radius / self.radius
    }

    #[inline]
    pub fn ideal_radius_sq(&self) -> f32 {
        self.ideal_radius * self.ideal_radius
    }

    /// The region queried against the rigid-body world every frame.
    pub fn simulation_bounds(&self) -> Aabb {
        Aabb::new(-self.simulation_half_extents, self.simulation_half_extents)
    }

    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_particles == 0 {
            return Err(LiquidError::config("max_particles must be non-zero"));
        }
        if self.max_neighbors == 0 {
            return Err(LiquidError::config("max_neighbors must be non-zero"));
        }
        if self.max_fixtures_to_test == 0 {
            return Err(LiquidError::config("max_fixtures_to_test must be non-zero"));
        }
        if !(self.cell_size > 0.0) {
            return Err(LiquidError::config("cell_size must be positive"));
        }
        if !(self.radius > 0.0) || !(self.ideal_radius > 0.0) {
            return Err(LiquidError::config("radius and ideal_radius must be positive"));
        }
        if self.simulation_half_extents.min_element() <= 0.0 {
            return Err(LiquidError::config("simulation_half_extents must be positive"));
        }
        if self.spawn_jitter.min_element() < 0.0 {
            return Err(LiquidError::config("spawn_jitter must not be negative"));
        }
        if self.coulomb_min_distance > self.coulomb_max_distance {
            return Err(LiquidError::config(format!(
                "coulomb window ({}, {}) is empty",
                self.coulomb_min_distance, self.coulomb_max_distance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_match_reference_tuning() {
        let cfg = Config::default();
        assert_eq!(cfg.max_particles, 3000);
        assert_eq!(cfg.max_neighbors, 75);
        assert_eq!(cfg.max_fixtures_to_test, 20);
        assert_eq!(cfg.cell_size, 0.6);
        assert!((cfg.multiplier() - 50.0 / 0.9).abs() < 1e-4);
        assert_eq!(cfg.ideal_radius_sq(), 2500.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_fields() {
        let cfg = Config::from_toml_str(
            r#"
            viscosity = 0.01
            gravity = [0.0, -0.001]
            worker_threads = 1
            "#,
        )
        .unwrap();

        assert_eq!(cfg.viscosity, 0.01);
        assert_eq!(cfg.gravity, Vec2::new(0.0, -0.001));
        assert_eq!(cfg.worker_threads, 1);
        assert_eq!(cfg.max_particles, 3000);
        assert_eq!(cfg.rest_density, 5.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_toml_str("cell_size = 0.0").unwrap_err();
        assert!(matches!(err, LiquidError::InvalidConfig(_)));

        let err = Config::from_toml_str("max_neighbors = 0").unwrap_err();
        assert!(matches!(err, LiquidError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml_str("viscosity = \"thick\"").unwrap_err();
        assert!(matches!(err, LiquidError::ConfigParse(_)));
    }

    #[test]
    fn simulation_bounds_are_centered() {
        let cfg = Config::default();
        let bounds = cfg.simulation_bounds();
        assert_eq!(bounds.lower, Vec2::new(-700.0, -400.0));
        assert_eq!(bounds.upper, Vec2::new(700.0, 400.0));
    }
}
