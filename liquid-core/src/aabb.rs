use glam::Vec2;

/// An axis-aligned bounding box.
///
/// `lower` is the bottom-left corner and `upper` the top-right corner; a valid
/// box has `lower <= upper` componentwise.
///
/// Both [`Aabb::contains`] and [`Aabb::test_overlap`] are strict: boxes that
/// only touch along an edge or corner are neither contained nor overlapping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    pub fn from_center_half_extent(center: Vec2, half_extent: Vec2) -> Self {
        Self {
            lower: center - half_extent,
            upper: center + half_extent,
        }
    }

    /// Smallest box covering every point in `points`, or `None` if empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut aabb = Self::new(first, first);
        for p in it {
            aabb.lower = aabb.lower.min(p);
            aabb.upper = aabb.upper.max(p);
        }
        Some(aabb)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.lower.cmple(self.upper).all()
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }

    /// Half-widths of the box.
    #[inline]
    pub fn extents(&self) -> Vec2 {
        (self.upper - self.lower) * 0.5
    }

    pub fn perimeter(&self) -> f32 {
        let size = self.upper - self.lower;
        2.0 * (size.x + size.y)
    }

    /// Corners in counter-clockwise order starting at `lower`.
    pub fn vertices(&self) -> [Vec2; 4] {
        [
            self.lower,
            Vec2::new(self.upper.x, self.lower.y),
            self.upper,
            Vec2::new(self.lower.x, self.upper.y),
        ]
    }

    /// Grows this box to also cover `other`.
    pub fn combine(&mut self, other: &Aabb) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    pub fn combined(a: &Aabb, b: &Aabb) -> Aabb {
        let mut out = *a;
        out.combine(b);
        out
    }

    /// Returns `true` if `other` lies strictly inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x < other.lower.x
            && self.lower.y < other.lower.y
            && other.upper.x < self.upper.x
            && other.upper.y < self.upper.y
    }

    /// Returns `true` if the interiors of `a` and `b` intersect.
    pub fn test_overlap(a: &Aabb, b: &Aabb) -> bool {
        if b.lower.x - a.upper.x >= 0.0 || b.lower.y - a.upper.y >= 0.0 {
            return false;
        }
        if a.lower.x - b.upper.x >= 0.0 || a.lower.y - b.upper.y >= 0.0 {
            return false;
        }
        true
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        Self::test_overlap(self, other)
    }
}
