use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

pub mod circle;
pub mod curve;
pub mod ids;
pub mod islands;
pub mod mesh;
pub mod offset;
pub mod region;
pub mod surface;

// Re-export public types
pub use circle::fit_circle_2d;
pub use curve::Curve;
pub use ids::{OperationId, SourceId};
pub use islands::{connected_components, sorted_islands};
pub use mesh::Mesh;
pub use offset::{
    difference_regions, inset_levels, intersect_regions, nest_rings, offset_regions, union_faces, JoinStyle, UNION_BUFFER,
};
pub use region::Region;
pub use surface::SurfaceSampler;

/// Number of fractional digits kept for coordinates in comparisons and output.
pub const PRECISION: i32 = 5;
/// Distance below which two coordinates are considered equal.
pub const EPSILON: f64 = 1e-5;

/// Round a value to [`PRECISION`] fractional digits.
pub fn round_to_precision(value: f64) -> f64 {
    let scale = 10f64.powi(PRECISION);
    let rounded = (value * scale).round() / scale;
    // avoid "-0.00000" in printed output
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// A 3D coordinate in millimetres.
///
/// Equality, ordering and hashing work on coordinates quantized to
/// [`PRECISION`] digits, so points that print identically compare equal and
/// can be deduplicated in sets.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ZERO: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn with_z(&self, z: f64) -> Self {
        Self::new(self.x, self.y, z)
    }

    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Planar distance, ignoring Z.
    pub fn distance_xy(&self, other: &Point3) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let dz = self.z - other.z;
        (self.distance_xy(other).powi(2) + dz * dz).sqrt()
    }

    /// True when both points share the same XY position.
    pub fn same_xy(&self, other: &Point3) -> bool {
        approx_eq(self.x, other.x) && approx_eq(self.y, other.y)
    }

    pub fn lerp(&self, other: &Point3, t: f64) -> Point3 {
        Point3::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    fn key(&self) -> [i64; 3] {
        let scale = 10f64.powi(PRECISION);
        [
            (self.x * scale).round() as i64,
            (self.y * scale).round() as i64,
            (self.z * scale).round() as i64,
        ]
    }
}

impl PartialEq for Point3 {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Point3 {}

impl Hash for Point3 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Point3 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point3 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl From<(f64, f64, f64)> for Point3 {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

/// Component-wise min/max of `points`.
///
/// Empty input yields the degenerate `(ZERO, ZERO)` box; callers must check
/// emptiness before reading depths from it.
pub fn bounding_box(points: &[Point3]) -> (Point3, Point3) {
    let Some(first) = points.first() else {
        return (Point3::ZERO, Point3::ZERO);
    };
    points.iter().skip(1).fold((*first, *first), |(min, max), p| {
        (
            Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z)),
            Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z)),
        )
    })
}

/// Merge two boxes produced by [`bounding_box`].
pub fn merge_bounds(a: (Point3, Point3), b: (Point3, Point3)) -> (Point3, Point3) {
    bounding_box(&[a.0, a.1, b.0, b.1])
}

/// An ordered run of points that is either an open polyline or a closed ring.
///
/// Closed paths store each vertex once; [`Path::emit_points`] appends the
/// closing vertex when the ring is cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub points: Vec<Point3>,
    pub closed: bool,
}

impl Path {
    pub fn open(points: Vec<Point3>) -> Self {
        Self {
            points,
            closed: false,
        }
    }

    pub fn closed(mut points: Vec<Point3>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self {
            points,
            closed: true,
        }
    }

    /// Build a closed path at height `z` from a planar ring.
    pub fn from_ring(ring: &[(f64, f64)], z: f64) -> Self {
        Self::closed(ring.iter().map(|&(x, y)| Point3::new(x, y, z)).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Point3> {
        self.points.first().copied()
    }

    /// Last point the tool reaches when cutting this path.
    pub fn last(&self) -> Option<Point3> {
        if self.closed {
            self.first()
        } else {
            self.points.last().copied()
        }
    }

    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self {
            points,
            closed: self.closed,
        }
    }

    pub fn with_z(&self, z: f64) -> Self {
        Self {
            points: self.points.iter().map(|p| p.with_z(z)).collect(),
            closed: self.closed,
        }
    }

    /// Points in cutting order, with the start repeated at the end of rings.
    pub fn emit_points(&self) -> Vec<Point3> {
        let mut points = self.points.clone();
        if self.closed && points.len() > 1 {
            points.push(points[0]);
        }
        points
    }

    /// Consecutive segments in cutting order.
    pub fn segments(&self) -> Vec<(Point3, Point3)> {
        let points = self.emit_points();
        points.windows(2).map(|w| (w[0], w[1])).collect()
    }

    pub fn length_xy(&self) -> f64 {
        self.segments()
            .iter()
            .map(|(a, b)| a.distance_xy(b))
            .sum()
    }

    /// Shoelace area in the XY plane, positive for counter-clockwise rings.
    pub fn signed_area_xy(&self) -> f64 {
        let ring: Vec<(f64, f64)> = self.points.iter().map(Point3::xy).collect();
        region::signed_area(&ring)
    }

    pub fn is_ccw(&self) -> bool {
        self.signed_area_xy() > 0.0
    }

    /// Resample so that no segment is longer than `step`.
    pub fn densified(&self, step: f64) -> Self {
        if step <= EPSILON || self.points.len() < 2 {
            return self.clone();
        }
        let mut points = Vec::new();
        for (a, b) in self.segments() {
            let count = (a.distance_xy(&b) / step).ceil().max(1.0) as usize;
            for i in 0..count {
                points.push(a.lerp(&b, i as f64 / count as f64));
            }
        }
        if !self.closed {
            if let Some(last) = self.points.last() {
                points.push(*last);
            }
        }
        Self {
            points,
            closed: self.closed,
        }
    }
}
