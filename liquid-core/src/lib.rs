//! Core 2-D particle liquid simulation library.
//!
//! Main components:
//! - [`simulation`]: the [`Liquid`] that owns all state and runs frames.
//! - [`phases`]: the six per-frame phases of the pipeline.
//! - [`particle`]: fixed-capacity particle pool.
//! - [`grid`]: sparse spatial hash for neighbor and region queries.
//! - [`world`]: the rigid-body contract the liquid collides against.
//! - [`magnet`]: point charges attracting particles.
//! - [`delta_buffer`]: frame-global accumulation of positional corrections.
//! - [`aabb`]: axis-aligned boxes.
//! - [`config`]: tunable constants, loadable from TOML.
//! - [`scene`]: the built-in demo obstacle course.
//! - [`error`] and [`types`]: shared error type and ids.

pub mod aabb;
pub mod config;
pub mod delta_buffer;
pub mod error;
pub mod grid;
pub mod magnet;
pub mod particle;
pub mod phases;
pub mod scene;
pub mod simulation;
pub mod types;
pub mod world;

pub use config::Config;
pub use error::{LiquidError, Result};
pub use simulation::{FrameStats, Liquid};
pub use world::{Fixture, RigidWorld, Shape, StaticWorld, Transform};
