use anyhow::{anyhow, Result};
use geo::algorithm::euclidean_distance::EuclideanDistance;
use geo::{Area, Contains, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};

/// A planar area: an outer boundary with optional holes.
///
/// Rings store each vertex once. Regions produced by the polygon engine have
/// counter-clockwise outers and clockwise holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub outer: Vec<(f64, f64)>,
    pub holes: Vec<Vec<(f64, f64)>>,
}

impl Region {
    /// Create a new region with just an outer boundary.
    pub fn new(outer: Vec<(f64, f64)>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    /// Create a new region with an outer boundary and holes.
    pub fn with_holes(outer: Vec<(f64, f64)>, holes: Vec<Vec<(f64, f64)>>) -> Self {
        Self { outer, holes }
    }

    /// Axis-aligned rectangle.
    pub fn rectangle(min: (f64, f64), max: (f64, f64)) -> Self {
        Self::new(vec![min, (max.0, min.1), max, (min.0, max.1)])
    }

    /// Outer and hole rings with their role.
    pub fn rings(&self) -> impl Iterator<Item = (&Vec<(f64, f64)>, bool)> {
        std::iter::once((&self.outer, false)).chain(self.holes.iter().map(|h| (h, true)))
    }

    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in &self.outer {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        if self.outer.is_empty() {
            return ((0.0, 0.0), (0.0, 0.0));
        }
        (min, max)
    }

    /// Convert to a `geo` polygon for containment and distance queries.
    pub fn to_geo(&self) -> Result<Polygon<f64>> {
        fn to_line_string(points: &[(f64, f64)]) -> Result<LineString<f64>> {
            if points.len() < 3 {
                return Err(anyhow!("Polygon loop must contain at least three points"));
            }
            let mut coords = points.to_vec();
            if let (Some(first), Some(last)) = (coords.first(), coords.last()) {
                if first != last {
                    coords.push(*first);
                }
            }
            Ok(LineString::from(coords))
        }

        let exterior = to_line_string(&self.outer)?;
        let mut interiors = Vec::new();
        for hole in &self.holes {
            interiors.push(to_line_string(hole)?);
        }
        Ok(Polygon::new(exterior, interiors))
    }

    pub fn area(&self) -> f64 {
        self.to_geo().map(|p| p.unsigned_area()).unwrap_or(0.0)
    }
}

/// A region prepared for repeated point queries.
pub struct RegionQuery {
    polygon: Polygon<f64>,
}

impl RegionQuery {
    pub fn new(region: &Region) -> Result<Self> {
        Ok(Self {
            polygon: region.to_geo()?,
        })
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygon.contains(&Point::new(x, y))
    }

    /// Distance from `(x, y)` to the nearest outer or hole boundary.
    pub fn distance_to_boundary(&self, x: f64, y: f64) -> f64 {
        let point = Point::new(x, y);
        let mut distance = point.euclidean_distance(self.polygon.exterior());
        for interior in self.polygon.interiors() {
            distance = distance.min(point.euclidean_distance(interior));
        }
        distance
    }
}

/// Shoelace area, positive for counter-clockwise rings.
pub fn signed_area(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % ring.len()];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Reorder `ring` in place to the requested winding.
pub fn orient_ring(ring: &mut [(f64, f64)], ccw: bool) {
    if (signed_area(ring) > 0.0) != ccw {
        ring.reverse();
    }
}

/// Even-odd ray cast against a single ring.
pub fn ring_contains(ring: &[(f64, f64)], point: (f64, f64)) -> bool {
    let (x, y) = point;
    let mut inside = false;
    if ring.is_empty() {
        return inside;
    }
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Vec<(f64, f64)> {
        vec![(min, min), (max, min), (max, max), (min, max)]
    }

    #[test]
    fn test_region_with_hole_contains() {
        let mut hole = square(4.0, 6.0);
        orient_ring(&mut hole, false);
        let region = Region::with_holes(square(0.0, 10.0), vec![hole]);
        let query = RegionQuery::new(&region).expect("valid region");
        assert!(query.contains(1.0, 1.0));
        assert!(!query.contains(5.0, 5.0), "hole should be excluded");
        assert!(!query.contains(11.0, 5.0));
        assert!((region.area() - 96.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_boundary_includes_holes() {
        let region = Region::with_holes(square(0.0, 10.0), vec![square(4.0, 6.0)]);
        let query = RegionQuery::new(&region).expect("valid region");
        assert!((query.distance_to_boundary(2.0, 5.0) - 2.0).abs() < 1e-9);
        assert!((query.distance_to_boundary(3.5, 5.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_orient_ring() {
        let mut ring = square(0.0, 1.0);
        assert!(signed_area(&ring) > 0.0);
        orient_ring(&mut ring, false);
        assert!(signed_area(&ring) < 0.0);
        assert!(ring_contains(&ring, (0.5, 0.5)));
    }

    #[test]
    fn test_degenerate_region_is_rejected() {
        let region = Region::new(vec![(0.0, 0.0), (1.0, 0.0)]);
        assert!(region.to_geo().is_err());
        assert_eq!(region.area(), 0.0);
    }
}
