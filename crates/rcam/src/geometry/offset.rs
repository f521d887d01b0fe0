use super::region::{orient_ring, ring_contains, signed_area, Region};
use clipper2::{difference, inflate, intersect, EndType, JoinType, Path, PathType, Polygon, Polygons, Vertex};
use serde::{Deserialize, Serialize};

/// Outward buffer applied when merging faces, absorbs shared-edge noise.
pub const UNION_BUFFER: f64 = 1e-4;
/// Upper bound on inset iterations when clearing an area.
const MAX_INSET_LEVELS: usize = 10_000;
const ARC_TOLERANCE: f64 = 0.01;
const MITER_LIMIT: f64 = 2.0;

/// Corner treatment for offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinStyle {
    Round,
    Miter,
}

impl From<JoinStyle> for JoinType {
    fn from(style: JoinStyle) -> Self {
        match style {
            JoinStyle::Round => JoinType::Round,
            JoinStyle::Miter => JoinType::Miter,
        }
    }
}

fn to_path(ring: &[(f64, f64)]) -> Path {
    let vertices: Vec<Vertex> = ring.iter().map(|(x, y)| Vertex::new(*x, *y)).collect();
    Path::new(vertices, true)
}

fn to_polygons(regions: &[Region], path_type: PathType) -> Polygons {
    let polygons = regions
        .iter()
        .filter(|region| region.outer.len() >= 3)
        .map(|region| {
            let mut outer = region.outer.clone();
            orient_ring(&mut outer, true);
            let mut paths = vec![to_path(&outer)];
            for hole in region.holes.iter().filter(|h| h.len() >= 3) {
                let mut hole = hole.clone();
                orient_ring(&mut hole, false);
                paths.push(to_path(&hole));
            }
            Polygon::new(paths, path_type.clone())
        })
        .collect();
    Polygons::new(polygons)
}

/// Rebuild regions from clipper output by ring nesting depth.
fn from_polygons(polygons: &Polygons) -> Vec<Region> {
    let mut rings: Vec<Vec<(f64, f64)>> = Vec::new();
    for polygon in polygons.polygons() {
        for path in polygon.paths() {
            rings.push(path.vertices().iter().map(|v| (v.x(), v.y())).collect());
        }
    }
    nest_rings(rings)
}

/// Group loose rings into regions: rings nested at an even depth become
/// exteriors, odd ones holes of the exterior one level up.
pub fn nest_rings(rings: Vec<Vec<(f64, f64)>>) -> Vec<Region> {
    let rings: Vec<Vec<(f64, f64)>> = rings
        .into_iter()
        .filter(|ring| ring.len() >= 3 && signed_area(ring).abs() > 1e-12)
        .collect();

    let depths: Vec<usize> = rings
        .iter()
        .enumerate()
        .map(|(i, ring)| {
            rings
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && ring_contains(other, ring[0]))
                .count()
        })
        .collect();

    let mut regions: Vec<(usize, Region)> = Vec::new();
    for (ring, depth) in rings.iter().zip(&depths) {
        if depth % 2 == 0 {
            let mut outer = ring.clone();
            orient_ring(&mut outer, true);
            regions.push((*depth, Region::new(outer)));
        }
    }
    for (ring, depth) in rings.iter().zip(&depths) {
        if depth % 2 == 1 {
            // the enclosing outer is the one nested exactly one level up
            let owner = regions
                .iter_mut()
                .filter(|(d, region)| *d + 1 == *depth && ring_contains(&region.outer, ring[0]))
                .min_by(|(_, a), (_, b)| {
                    signed_area(&a.outer).total_cmp(&signed_area(&b.outer))
                });
            if let Some((_, region)) = owner {
                let mut hole = ring.clone();
                orient_ring(&mut hole, false);
                region.holes.push(hole);
            }
        }
    }

    regions.into_iter().map(|(_, region)| region).collect()
}

/// Merge planar faces into regions.
///
/// Each face is normalized counter-clockwise and the whole set is inflated by
/// `buffer`, which unions overlapping and edge-sharing faces.
pub fn union_faces(faces: &[Vec<(f64, f64)>], buffer: f64) -> Vec<Region> {
    let regions: Vec<Region> = faces
        .iter()
        .filter(|face| face.len() >= 3 && signed_area(face).abs() > 1e-12)
        .map(|face| Region::new(face.clone()))
        .collect();
    if regions.is_empty() {
        return Vec::new();
    }
    let merged = inflate(
        to_polygons(&regions, PathType::Subject),
        buffer,
        JoinType::Miter,
        EndType::ClosedPolygon,
        MITER_LIMIT,
        ARC_TOLERANCE,
    );
    from_polygons(&merged)
}

/// Offset regions outward (`delta > 0`) or inward (`delta < 0`).
pub fn offset_regions(regions: &[Region], delta: f64, join: JoinStyle) -> Vec<Region> {
    if regions.is_empty() {
        return Vec::new();
    }
    if delta < 0.0 {
        return erode(regions, -delta, join);
    }
    let result = inflate(
        to_polygons(regions, PathType::Subject),
        delta,
        join.into(),
        EndType::ClosedPolygon,
        MITER_LIMIT,
        ARC_TOLERANCE,
    );
    from_polygons(&result)
}

/// Inward offset: whatever is left of the regions once a band of `distance`
/// around every ring is cut away.
///
/// `inflate` with a negative delta drops the whole result once the inset
/// passes a quarter of the polygon's width.
fn erode(regions: &[Region], distance: f64, join: JoinStyle) -> Vec<Region> {
    let rings: Vec<Polygon> = regions
        .iter()
        .filter(|region| region.outer.len() >= 3)
        .flat_map(|region| region.rings())
        .filter(|(ring, _)| ring.len() >= 3)
        .map(|(ring, _)| Polygon::new(vec![to_path(ring)], PathType::Subject))
        .collect();
    let band = inflate(
        Polygons::new(rings),
        distance,
        join.into(),
        EndType::ClosedJoined,
        MITER_LIMIT,
        ARC_TOLERANCE,
    );
    let result = difference(to_polygons(regions, PathType::Subject), band);
    from_polygons(&result)
}

/// Area of `subject` not covered by `clip`.
pub fn difference_regions(subject: &[Region], clip: &[Region]) -> Vec<Region> {
    if clip.is_empty() {
        return subject.to_vec();
    }
    let result = difference(
        to_polygons(subject, PathType::Subject),
        to_polygons(clip, PathType::Clip),
    );
    from_polygons(&result)
}

/// Area covered by both `subject` and `clip`.
pub fn intersect_regions(subject: &[Region], clip: &[Region]) -> Vec<Region> {
    if subject.is_empty() || clip.is_empty() {
        return Vec::new();
    }
    let result = intersect(
        to_polygons(subject, PathType::Subject),
        to_polygons(clip, PathType::Clip),
    );
    from_polygons(&result)
}

/// Successive inward offsets for area clearing.
///
/// The first level is inset by `first`, every following level by `step` from
/// the previous one, until the area collapses.
pub fn inset_levels(regions: &[Region], first: f64, step: f64, join: JoinStyle) -> Vec<Vec<Region>> {
    let mut levels = Vec::new();
    let mut current = offset_regions(regions, -first, join);
    if step <= 0.0 {
        if !current.is_empty() {
            levels.push(current);
        }
        return levels;
    }
    while !current.is_empty() && levels.len() < MAX_INSET_LEVELS {
        let next = offset_regions(&current, -step, join);
        levels.push(current);
        current = next;
    }
    levels
}
