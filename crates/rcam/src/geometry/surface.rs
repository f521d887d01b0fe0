//! Drop-cutter height queries over source meshes.
//!
//! A flat-bottomed cutter of the given radius is lowered onto the triangles
//! around `(x, y)`; it stops at the highest face, edge or vertex contact.

use super::{Mesh, Point3};

#[derive(Debug, Clone)]
struct Triangle {
    v: [Point3; 3],
    min: (f64, f64),
    max: (f64, f64),
}

impl Triangle {
    fn new(v: [Point3; 3]) -> Self {
        let min = (
            v[0].x.min(v[1].x).min(v[2].x),
            v[0].y.min(v[1].y).min(v[2].y),
        );
        let max = (
            v[0].x.max(v[1].x).max(v[2].x),
            v[0].y.max(v[1].y).max(v[2].y),
        );
        Self { v, min, max }
    }

    fn near(&self, x: f64, y: f64, radius: f64) -> bool {
        x >= self.min.0 - radius
            && x <= self.max.0 + radius
            && y >= self.min.1 - radius
            && y <= self.max.1 + radius
    }

    fn barycentric(&self, x: f64, y: f64) -> Option<(f64, f64, f64)> {
        let [a, b, c] = self.v;
        let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
        if det.abs() < 1e-12 {
            return None;
        }
        let l1 = ((b.y - c.y) * (x - c.x) + (c.x - b.x) * (y - c.y)) / det;
        let l2 = ((c.y - a.y) * (x - c.x) + (a.x - c.x) * (y - c.y)) / det;
        Some((l1, l2, 1.0 - l1 - l2))
    }

    /// Height of the face plane at `(x, y)` when the point projects inside.
    fn z_at_xy(&self, x: f64, y: f64) -> Option<f64> {
        let (l1, l2, l3) = self.barycentric(x, y)?;
        let eps = -1e-9;
        if l1 >= eps && l2 >= eps && l3 >= eps {
            Some(l1 * self.v[0].z + l2 * self.v[1].z + l3 * self.v[2].z)
        } else {
            None
        }
    }

    fn edges(&self) -> [(Point3, Point3); 3] {
        [
            (self.v[0], self.v[1]),
            (self.v[1], self.v[2]),
            (self.v[2], self.v[0]),
        ]
    }
}

fn edge_contact(x: f64, y: f64, radius: f64, v0: Point3, v1: Point3) -> Option<f64> {
    let dx = v1.x - v0.x;
    let dy = v1.y - v0.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-10 {
        return vertex_contact(x, y, radius, v0);
    }
    let t = (((x - v0.x) * dx + (y - v0.y) * dy) / len_sq).clamp(0.0, 1.0);
    let p = v0.lerp(&v1, t);
    ((x - p.x).hypot(y - p.y) <= radius).then_some(p.z)
}

fn vertex_contact(x: f64, y: f64, radius: f64, v: Point3) -> Option<f64> {
    ((x - v.x).hypot(y - v.y) <= radius).then_some(v.z)
}

/// Height sampler over the faces of a set of meshes.
#[derive(Debug, Clone)]
pub struct SurfaceSampler {
    triangles: Vec<Triangle>,
    radius: f64,
}

impl SurfaceSampler {
    pub fn new(meshes: &[Mesh], radius: f64) -> Self {
        let triangles = meshes
            .iter()
            .flat_map(|mesh| mesh.triangles())
            .map(Triangle::new)
            .collect();
        Self {
            triangles,
            radius: radius.max(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Lowest height the cutter can sit at above `(x, y)`, or `None` when it
    /// touches no geometry there.
    pub fn height_at(&self, x: f64, y: f64) -> Option<f64> {
        let mut max_z: Option<f64> = None;
        let mut raise = |z: Option<f64>| {
            if let Some(z) = z {
                max_z = Some(max_z.map_or(z, |m: f64| m.max(z)));
            }
        };

        for tri in self.triangles.iter().filter(|t| t.near(x, y, self.radius)) {
            raise(tri.z_at_xy(x, y));
            if self.radius > 0.0 {
                for (v0, v1) in tri.edges() {
                    raise(edge_contact(x, y, self.radius, v0, v1));
                }
            }
        }
        max_z
    }
}
