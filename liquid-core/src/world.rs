//! The rigid-body side of the simulation, seen from the liquid.
//!
//! The liquid never steps rigid bodies. It only asks the world which fixtures
//! lie in a region, and for each fixture its shape, world transform and a
//! point-containment test. [`RigidWorld`] is that contract; [`StaticWorld`]
//! is a plain fixture list implementing it for static obstacles.

use glam::Vec2;

use crate::aabb::Aabb;
use crate::error::{LiquidError, Result};
use crate::particle::MAX_POLYGON_VERTICES;
use crate::types::FixtureId;

/// Rigid transform of a body: translation plus rotation in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
}

impl Transform {
    pub fn new(position: Vec2, rotation: f32) -> Self {
        Self { position, rotation }
    }

    /// Rotates a direction without translating it.
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::from_angle(self.rotation).rotate(v)
    }

    /// Maps a body-local point into world space.
    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        self.rotate(p) + self.position
    }

    /// Maps a world-space point into body-local space.
    #[inline]
    pub fn apply_inverse(&self, p: Vec2) -> Vec2 {
        Vec2::from_angle(-self.rotation).rotate(p - self.position)
    }
}

/// Collision geometry in body-local space.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Convex polygon, vertices in counter-clockwise order.
    Polygon { vertices: Vec<Vec2> },
    Circle { center: Vec2, radius: f32 },
}

/// One piece of collision geometry attached to a body.
#[derive(Clone, Debug, PartialEq)]
pub struct Fixture {
    pub shape: Shape,
    pub transform: Transform,
}

impl Fixture {
    /// Builds a polygon fixture. Vertex count must fit the per-particle
    /// collision scratch. Clockwise input is reversed so edge normals always
    /// point outward.
    pub fn polygon(mut vertices: Vec<Vec2>, transform: Transform) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(LiquidError::TooFewVertices {
                count: vertices.len(),
            });
        }
        if vertices.len() > MAX_POLYGON_VERTICES {
            return Err(LiquidError::TooManyVertices {
                count: vertices.len(),
                max: MAX_POLYGON_VERTICES,
            });
        }
        if signed_area(&vertices) < 0.0 {
            vertices.reverse();
        }
        Ok(Self {
            shape: Shape::Polygon { vertices },
            transform,
        })
    }

    /// Box of the given full size centered on the body origin.
    pub fn rect(center: Vec2, width: f32, height: f32, rotation: f32) -> Self {
        let hx = width / 2.0;
        let hy = height / 2.0;
        Self {
            shape: Shape::Polygon {
                vertices: vec![
                    Vec2::new(-hx, -hy),
                    Vec2::new(hx, -hy),
                    Vec2::new(hx, hy),
                    Vec2::new(-hx, hy),
                ],
            },
            transform: Transform::new(center, rotation),
        }
    }

    pub fn circle(center: Vec2, radius: f32, rotation: f32) -> Self {
        Self {
            shape: Shape::Circle {
                center: Vec2::ZERO,
                radius,
            },
            transform: Transform::new(center, rotation),
        }
    }

    /// World-space bounds of the transformed shape.
    pub fn aabb(&self) -> Aabb {
        match &self.shape {
            Shape::Polygon { vertices } => {
                Aabb::from_points(vertices.iter().map(|&v| self.transform.apply(v)))
                    .unwrap_or_else(|| Aabb::new(self.transform.position, self.transform.position))
            }
            Shape::Circle { center, radius } => {
                let c = self.transform.apply(*center);
                Aabb::from_center_half_extent(c, Vec2::splat(*radius))
            }
        }
    }

    /// Point-in-shape test, inclusive on the boundary.
    pub fn contains_point(&self, point: Vec2) -> bool {
        match &self.shape {
            Shape::Polygon { vertices } => {
                let local = self.transform.apply_inverse(point);
                let n = vertices.len();
                (0..n).all(|i| {
                    let edge = vertices[(i + 1) % n] - vertices[i];
                    edge.perp_dot(local - vertices[i]) >= 0.0
                })
            }
            Shape::Circle { center, radius } => {
                let c = self.transform.apply(*center);
                point.distance_squared(c) <= radius * radius
            }
        }
    }

    /// Writes the unit outward edge normals of a polygon, in local space, into
    /// `out` and returns how many were written. Circles have no edge normals.
    ///
    /// Fails on the first zero-length edge; `out` is left partially written.
    pub fn local_normals(&self, out: &mut [Vec2]) -> Result<usize> {
        let Shape::Polygon { vertices } = &self.shape else {
            return Ok(0);
        };
        let n = vertices.len();
        if n > out.len() {
            return Err(LiquidError::TooManyVertices {
                count: n,
                max: out.len(),
            });
        }
        for i in 0..n {
            let edge = vertices[(i + 1) % n] - vertices[i];
            // Right-hand perpendicular: outward for counter-clockwise winding.
            let normal = Vec2::new(edge.y, -edge.x);
            out[i] = normal
                .try_normalize()
                .ok_or(LiquidError::DegenerateEdge { vertex: i })?;
        }
        Ok(n)
    }
}

/// Twice the signed area of a closed polygon; positive when counter-clockwise.
fn signed_area(vertices: &[Vec2]) -> f32 {
    let n = vertices.len();
    (0..n)
        .map(|i| vertices[i].perp_dot(vertices[(i + 1) % n]))
        .sum()
}

/// Read-only view of the rigid-body world used by the liquid each frame.
pub trait RigidWorld: Sync {
    /// Fixtures whose bounds may overlap `region`.
    fn query_region(&self, region: &Aabb) -> impl Iterator<Item = FixtureId> + '_;

    fn fixture(&self, id: FixtureId) -> Option<&Fixture>;

    /// One past the largest id this world hands out.
    fn fixture_id_bound(&self) -> FixtureId;
}

/// A world plus a slice of extra fixtures layered on top of it.
///
/// Extra fixtures get ids starting at the base world's
/// [`RigidWorld::fixture_id_bound`], in slice order.
pub struct LayeredWorld<'a, W> {
    base: &'a W,
    extra: &'a [Fixture],
    first_extra: FixtureId,
}

impl<'a, W: RigidWorld> LayeredWorld<'a, W> {
    pub fn new(base: &'a W, extra: &'a [Fixture]) -> Self {
        Self {
            base,
            extra,
            first_extra: base.fixture_id_bound(),
        }
    }
}

impl<W: RigidWorld> RigidWorld for LayeredWorld<'_, W> {
    fn query_region(&self, region: &Aabb) -> impl Iterator<Item = FixtureId> + '_ {
        let area = *region;
        let first_extra = self.first_extra;
        self.base.query_region(region).chain(
            self.extra
                .iter()
                .enumerate()
                .filter(move |(_, f)| f.aabb().overlaps(&area))
                .map(move |(i, _)| first_extra + i),
        )
    }

    fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        if id >= self.first_extra {
            self.extra.get(id - self.first_extra)
        } else {
            self.base.fixture(id)
        }
    }

    fn fixture_id_bound(&self) -> FixtureId {
        self.first_extra + self.extra.len()
    }
}

/// A fixed set of static fixtures; ids are insertion indices.
#[derive(Clone, Debug, Default)]
pub struct StaticWorld {
    fixtures: Vec<Fixture>,
}

impl StaticWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fixture: Fixture) -> FixtureId {
        let id = self.fixtures.len();
        self.fixtures.push(fixture);
        id
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FixtureId, &Fixture)> + '_ {
        self.fixtures.iter().enumerate()
    }
}

impl RigidWorld for StaticWorld {
    fn query_region(&self, region: &Aabb) -> impl Iterator<Item = FixtureId> + '_ {
        let region = *region;
        self.fixtures
            .iter()
            .enumerate()
            .filter(move |(_, f)| f.aabb().overlaps(&region))
            .map(|(id, _)| id)
    }

    fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(id)
    }

    fn fixture_id_bound(&self) -> FixtureId {
        self.fixtures.len()
    }
}
