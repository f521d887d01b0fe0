use super::{Mesh, Point3};
use kurbo::{BezPath, Circle, Line, PathEl, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use kurbo::Point;

/// A planar curve that can be flattened into source geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Curve {
    /// A straight line segment.
    Line(Line),
    /// A circle.
    Circle(Circle),
    /// A Bézier path, possibly with several subpaths.
    BezPath(BezPath),
    /// An explicit 3D polyline.
    Polyline { points: Vec<Point3>, closed: bool },
}

impl Curve {
    /// Get the planar bounding box of the curve.
    pub fn bounding_box(&self) -> Rect {
        match self {
            Curve::Line(line) => line.bounding_box(),
            Curve::Circle(circle) => circle.bounding_box(),
            Curve::BezPath(path) => path.bounding_box(),
            Curve::Polyline { points, .. } => points
                .iter()
                .map(|p| Rect::new(p.x, p.y, p.x, p.y))
                .reduce(|a, b| a.union(b))
                .unwrap_or(Rect::ZERO),
        }
    }

    /// Flatten into subpaths of `(points, closed)` at height `z`.
    ///
    /// Closed subpaths do not repeat their first point.
    pub fn flatten(&self, tolerance: f64, z: f64) -> Vec<(Vec<Point3>, bool)> {
        match self {
            Curve::Line(line) => vec![(
                vec![
                    Point3::new(line.p0.x, line.p0.y, z),
                    Point3::new(line.p1.x, line.p1.y, z),
                ],
                false,
            )],
            Curve::Circle(circle) => {
                let segments = (std::f64::consts::TAU * circle.radius / tolerance.max(1e-6))
                    .ceil()
                    .max(8.0) as usize;
                let points = (0..segments)
                    .map(|i| {
                        let angle = std::f64::consts::TAU * i as f64 / segments as f64;
                        Point3::new(
                            circle.center.x + circle.radius * angle.cos(),
                            circle.center.y + circle.radius * angle.sin(),
                            z,
                        )
                    })
                    .collect();
                vec![(points, true)]
            }
            Curve::BezPath(path) => flatten_bezpath(path, tolerance, z),
            Curve::Polyline { points, closed } => vec![(points.clone(), *closed)],
        }
    }

    /// Edge-only mesh of the flattened curve.
    pub fn to_mesh(&self, tolerance: f64, z: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for (points, closed) in self.flatten(tolerance, z) {
            mesh.add_polyline(&points, closed);
        }
        mesh
    }

    /// Check if the curve is closed (forms a loop).
    pub fn is_closed(&self) -> bool {
        match self {
            Curve::Line(_) => false,
            Curve::Circle(_) => true,
            Curve::BezPath(path) => path
                .elements()
                .last()
                .map(|el| matches!(el, PathEl::ClosePath))
                .unwrap_or(false),
            Curve::Polyline { closed, .. } => *closed,
        }
    }
}

fn flatten_bezpath(path: &BezPath, tolerance: f64, z: f64) -> Vec<(Vec<Point3>, bool)> {
    let mut subpaths = Vec::new();
    let mut current: Vec<Point3> = Vec::new();

    kurbo::flatten(path.iter(), tolerance, |el| match el {
        PathEl::MoveTo(p) => {
            if current.len() > 1 {
                subpaths.push((std::mem::take(&mut current), false));
            }
            current.clear();
            current.push(Point3::new(p.x, p.y, z));
        }
        PathEl::LineTo(p) => current.push(Point3::new(p.x, p.y, z)),
        PathEl::ClosePath => {
            if current.len() > 1 && current.first() == current.last() {
                current.pop();
            }
            if current.len() > 2 {
                subpaths.push((std::mem::take(&mut current), true));
            }
            current.clear();
        }
        // flatten only reports move/line/close
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    if current.len() > 1 {
        subpaths.push((current, false));
    }
    subpaths
}
