use super::islands::{connected_components, sorted_islands};
use super::{bounding_box, Path, Point3};
use serde::{Deserialize, Serialize};

/// World-space source geometry: a triangulated/polygonal mesh, or a curve
/// given as vertices joined by edges (no faces).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3>,
    pub edges: Vec<(usize, usize)>,
    pub faces: Vec<Vec<usize>>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh from polygon faces, deriving the edge list.
    pub fn from_faces(vertices: Vec<Point3>, faces: Vec<Vec<usize>>) -> Self {
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for face in &faces {
            for i in 0..face.len() {
                let a = face[i];
                let b = face[(i + 1) % face.len()];
                if !edges.iter().any(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a)) {
                    edges.push((a, b));
                }
            }
        }
        Self {
            vertices,
            edges,
            faces,
        }
    }

    /// Build an edge-only mesh for a polyline.
    pub fn from_polyline(points: &[Point3], closed: bool) -> Self {
        let mut mesh = Self::new();
        mesh.add_polyline(points, closed);
        mesh
    }

    /// Append a polyline as a new island.
    pub fn add_polyline(&mut self, points: &[Point3], closed: bool) {
        let base = self.vertices.len();
        self.vertices.extend_from_slice(points);
        for i in 1..points.len() {
            self.edges.push((base + i - 1, base + i));
        }
        if closed && points.len() > 2 {
            self.edges.push((base + points.len() - 1, base));
        }
    }

    /// Append a planar polygon face at height `z`.
    pub fn add_face(&mut self, ring: &[(f64, f64)], z: f64) {
        let base = self.vertices.len();
        self.vertices
            .extend(ring.iter().map(|&(x, y)| Point3::new(x, y, z)));
        let face: Vec<usize> = (base..base + ring.len()).collect();
        for i in 0..face.len() {
            self.edges.push((face[i], face[(i + 1) % face.len()]));
        }
        self.faces.push(face);
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn bounds(&self) -> (Point3, Point3) {
        bounding_box(&self.vertices)
    }

    /// Fan-triangulate every face.
    pub fn triangles(&self) -> Vec<[Point3; 3]> {
        let mut triangles = Vec::new();
        for face in &self.faces {
            let corners: Vec<Point3> = face
                .iter()
                .filter_map(|&i| self.vertices.get(i).copied())
                .collect();
            for i in 1..corners.len().saturating_sub(1) {
                triangles.push([corners[0], corners[i], corners[i + 1]]);
            }
        }
        triangles
    }

    /// Vertex positions of every island.
    pub fn islands(&self) -> Vec<Vec<Point3>> {
        connected_components(self.vertices.len(), &self.edges)
            .into_iter()
            .map(|component| component.into_iter().map(|i| self.vertices[i]).collect())
            .collect()
    }

    /// Islands walked in edge order, as open or closed paths.
    pub fn island_paths(&self) -> Vec<Path> {
        sorted_islands(self.vertices.len(), &self.edges)
            .into_iter()
            .map(|(order, is_cycle)| {
                let points = order.into_iter().map(|i| self.vertices[i]).collect();
                if is_cycle {
                    Path::closed(points)
                } else {
                    Path::open(points)
                }
            })
            .collect()
    }

    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) {
        for v in &mut self.vertices {
            *v = v.translated(dx, dy, dz);
        }
    }
}

/// Bounds over every vertex of `meshes`, degenerate when there are none.
pub fn meshes_bounds(meshes: &[Mesh]) -> (Point3, Point3) {
    let vertices: Vec<Point3> = meshes
        .iter()
        .flat_map(|m| m.vertices.iter().copied())
        .collect();
    bounding_box(&vertices)
}
