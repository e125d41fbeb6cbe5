//! Built-in obstacle course used by the viewer and the integration tests.

use glam::Vec2;

use crate::world::{Fixture, StaticWorld};

/// Pixels per world unit of the layout below.
const SCALE: f32 = 40.0;

fn px(x: f32, y: f32) -> Vec2 {
    Vec2::new(x, y) / SCALE
}

/// Floor, two side walls, a tilted shelf under the particle source and a
/// round bumper.
pub fn demo_world() -> StaticWorld {
    let mut world = StaticWorld::new();
    world.add(Fixture::rect(px(0.0, -400.0), 1500.0 / SCALE, 80.0 / SCALE, 0.0));
    world.add(Fixture::rect(px(-710.0, -100.0), 80.0 / SCALE, 600.0 / SCALE, 0.0));
    world.add(Fixture::rect(px(710.0, 0.0), 80.0 / SCALE, 800.0 / SCALE, 0.0));
    world.add(Fixture::rect(px(-920.0, 250.0), 520.0 / SCALE, 40.0 / SCALE, -0.25));
    world.add(Fixture::circle(px(-400.0, 0.0), 50.0 / SCALE, -0.25));
    world
}
