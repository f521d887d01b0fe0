use super::layers::{get_layers, link_passes, orient};
use super::{Candidates, DistanceBetweenPaths, StrategyContext};
use crate::error::CancelReason;
use crate::geometry::{
    difference_regions, intersect_regions, offset_regions, union_faces, JoinStyle, Path, Point3, Region, EPSILON,
    UNION_BUFFER,
};
use crate::tsp::order_curves;
use crate::types::ComputeResult;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on fill rings per slice.
const MAX_FILL_RINGS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterlineRoughingParams {
    #[serde(flatten)]
    pub between: DistanceBetweenPaths,
    /// Z spacing of the horizontal slices.
    pub distance_between_slices: f64,
    /// Clear the stock around each slice's contour.
    pub fill_between_slices: bool,
}

impl Default for WaterlineRoughingParams {
    fn default() -> Self {
        Self {
            between: DistanceBetweenPaths::default(),
            distance_between_slices: 1.0,
            fill_between_slices: true,
        }
    }
}

/// The part of a triangle at or above `z`, projected onto XY.
fn clip_above(triangle: &[Point3; 3], z: f64) -> Vec<(f64, f64)> {
    let mut polygon = Vec::with_capacity(4);
    for i in 0..3 {
        let a = triangle[i];
        let b = triangle[(i + 1) % 3];
        let (a_in, b_in) = (a.z >= z, b.z >= z);
        if a_in {
            polygon.push(a.xy());
        }
        if a_in != b_in {
            let t = (z - a.z) / (b.z - a.z);
            polygon.push(a.lerp(&b, t).xy());
        }
    }
    polygon
}

/// Area the cutter centre must stay out of at height `z`.
fn island(triangles: &[[Point3; 3]], z: f64, radius: f64) -> Vec<Region> {
    let faces: Vec<Vec<(f64, f64)>> = triangles
        .iter()
        .map(|t| clip_above(t, z))
        .filter(|face| face.len() >= 3)
        .collect();
    offset_regions(&union_faces(&faces, UNION_BUFFER), radius, JoinStyle::Round)
}

/// Area the fill may reach: the job stock, or the sources grown by one cutter
/// diameter when the job has none.
fn stock_area(ctx: &StrategyContext) -> Region {
    match ctx.stock {
        Some((min, max)) => Region::rectangle(min.xy(), max.xy()),
        None => {
            let (min, max) = ctx.bounds;
            let grow = ctx.cutter.diameter;
            Region::rectangle((min.x - grow, min.y - grow), (max.x + grow, max.y + grow))
        }
    }
}

/// Rings around the keep-out, `between` apart and clipped to the stock, out to
/// the last one that reaches the stock edge.
fn fill_rings(params: &WaterlineRoughingParams, ctx: &StrategyContext, keep_out: &[Region], z: f64) -> Vec<Path> {
    if keep_out.is_empty() {
        return Vec::new();
    }
    let stock = [stock_area(ctx)];
    let between = params.between.distance_between_paths;
    let mut rings = Vec::new();
    for k in 1..=MAX_FILL_RINGS {
        let grown = offset_regions(keep_out, k as f64 * between, JoinStyle::Round);
        for region in intersect_regions(&grown, &stock) {
            for (ring, is_hole) in region.rings() {
                rings.push(orient(Path::from_ring(ring, z), !is_hole, ctx.movement, ctx.spindle));
            }
        }
        if difference_regions(&stock, &grown).is_empty() {
            break;
        }
    }
    rings
}

fn slice_rings(params: &WaterlineRoughingParams, ctx: &StrategyContext, triangles: &[[Point3; 3]], z: f64) -> Vec<Path> {
    let keep_out = island(triangles, z, ctx.cutter.radius());
    let mut rings = Vec::new();
    for region in &keep_out {
        rings.push(orient(Path::from_ring(&region.outer, z), true, ctx.movement, ctx.spindle));
        for hole in &region.holes {
            rings.push(orient(Path::from_ring(hole, z), false, ctx.movement, ctx.spindle));
        }
    }

    if params.fill_between_slices {
        rings.extend(fill_rings(params, ctx, &keep_out, z));
    }
    rings
}

pub fn candidates(params: &WaterlineRoughingParams, ctx: &StrategyContext) -> Result<Candidates> {
    let triangles: Vec<[Point3; 3]> = ctx.sources.iter().flat_map(|m| m.triangles()).collect();
    if triangles.is_empty() {
        return Ok(Candidates {
            paths: Vec::new(),
            rejected: vec!["waterline needs sources with faces".to_string()],
        });
    }
    if params.between.distance_between_paths <= EPSILON {
        return Ok(Candidates {
            paths: Vec::new(),
            rejected: vec!["distance between paths must be positive".to_string()],
        });
    }

    let slices = get_layers(ctx.top, params.distance_between_slices, ctx.depth_end);
    let paths: Vec<Path> = slices
        .iter()
        .flat_map(|&z| slice_rings(params, ctx, &triangles, z))
        .collect();
    debug!("Waterline: {} slice(s), {} ring(s)", slices.len(), paths.len());
    Ok(Candidates {
        paths,
        rejected: Vec::new(),
    })
}

pub fn compute(params: &WaterlineRoughingParams, ctx: &StrategyContext, last_position: Point3) -> Result<ComputeResult> {
    let candidates = candidates(params, ctx)?;
    if candidates.paths.is_empty() {
        return Ok(ComputeResult::cancelled(CancelReason::NoValidFeature {
            rejected: candidates.rejected,
        }));
    }

    // slices are cut top-down, each one ordered on its own
    let mut slices: Vec<(f64, Vec<Path>)> = Vec::new();
    for path in candidates.paths {
        let z = path.points.first().map_or(ctx.depth_end, |p| p.z);
        match slices.last_mut() {
            Some((slice_z, paths)) if (*slice_z - z).abs() < EPSILON => paths.push(path),
            _ => slices.push((z, vec![path])),
        }
    }

    let mut passes = Vec::new();
    let mut current = last_position;
    for (_, paths) in slices {
        for path in order_curves(paths, current) {
            if let Some(end) = path.last() {
                current = end;
            }
            passes.push(path.emit_points());
        }
    }

    let adjacency = if params.fill_between_slices {
        params.between.distance_between_paths + EPSILON
    } else {
        0.0
    };
    Ok(ComputeResult::finished(link_passes(&passes, ctx.zero, adjacency)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use crate::types::{Ambient, Cutter, CutterKind, MachineState, MovementKind, SpindleDirection};

    /// 10 x 10 x 4 block standing on Z=-4, top face and the four walls.
    fn block() -> Mesh {
        let v = vec![
            Point3::new(0.0, 0.0, -4.0),
            Point3::new(10.0, 0.0, -4.0),
            Point3::new(10.0, 10.0, -4.0),
            Point3::new(0.0, 10.0, -4.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ];
        Mesh::from_faces(
            v,
            vec![
                vec![4, 5, 6, 7],
                vec![0, 1, 5, 4],
                vec![1, 2, 6, 5],
                vec![2, 3, 7, 6],
                vec![3, 0, 4, 7],
            ],
        )
    }

    fn context<'a>(sources: &'a [Mesh], cutter: &'a Cutter) -> StrategyContext<'a> {
        StrategyContext {
            sources,
            curves: &[],
            cutter,
            zero: MachineState::default(),
            movement: MovementKind::Climb,
            spindle: SpindleDirection::Clockwise,
            ambient: Ambient::All,
            layer_size: 0.0,
            top: 0.0,
            depth_end: -2.0,
            bounds: crate::geometry::mesh::meshes_bounds(sources),
            stock: None,
        }
    }

    #[test]
    fn test_clip_above_cuts_triangle() {
        let tri = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 10.0),
        ];
        assert_eq!(clip_above(&tri, 5.0).len(), 3);
        assert_eq!(clip_above(&tri, 20.0).len(), 0);
    }

    #[test]
    fn test_contour_keeps_cutter_outside_the_block() {
        let sources = [block()];
        let cutter = Cutter::new(CutterKind::Cylinder, 2.0);
        let params = WaterlineRoughingParams {
            fill_between_slices: false,
            ..WaterlineRoughingParams::default()
        };
        let rings = candidates(&params, &context(&sources, &cutter)).unwrap().paths;
        // slices at -1 and -2, one contour each
        assert_eq!(rings.len(), 2);
        for ring in &rings {
            let (min, max) = crate::geometry::bounding_box(&ring.points);
            assert!((min.x + 1.0).abs() < 0.05 && (max.x - 11.0).abs() < 0.05);
        }
    }

    #[test]
    fn test_fill_adds_rings_around_the_contour() {
        let sources = [block()];
        let cutter = Cutter::new(CutterKind::Cylinder, 2.0);
        let result = compute(&WaterlineRoughingParams::default(), &context(&sources, &cutter), Point3::ZERO)
            .unwrap();
        assert!(result.status.is_finished());
        let lowest = result
            .points
            .iter()
            .map(|p| p.position.z)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(lowest, -2.0);
        let outermost = result
            .points
            .iter()
            .map(|p| p.position.x)
            .fold(f64::INFINITY, f64::min);
        assert!(outermost < -1.5, "fill reaches past the contour, got {outermost}");
    }

    #[test]
    fn test_fill_steps_out_to_the_job_stock() {
        let sources = [block()];
        let cutter = Cutter::new(CutterKind::Cylinder, 2.0);
        let ctx = StrategyContext {
            stock: Some((Point3::new(-6.0, -6.0, -4.0), Point3::new(16.0, 16.0, 0.0))),
            ..context(&sources, &cutter)
        };
        let rings = candidates(&WaterlineRoughingParams::default(), &ctx).unwrap().paths;
        let points: Vec<Point3> = rings.iter().flat_map(|ring| ring.points.clone()).collect();
        let (min, max) = crate::geometry::bounding_box(&points);
        assert!((min.x + 6.0).abs() < 0.05 && (max.x - 16.0).abs() < 0.05, "fill spans the stock");
        assert!(min.y > -6.05 && max.y < 16.05, "fill stays inside the stock");
        // contour at -1, then one ring per millimetre outwards
        for x in [-2.0, -3.0, -4.0, -5.0] {
            assert!(
                points.iter().any(|p| (p.x - x).abs() < 0.05 && (p.y - 5.0).abs() < 6.5),
                "no fill ring at x = {x}"
            );
        }
    }

    #[test]
    fn test_flat_curves_are_rejected() {
        let sources = [Mesh::from_polyline(
            &[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            false,
        )];
        let cutter = Cutter::default();
        let result = compute(&WaterlineRoughingParams::default(), &context(&sources, &cutter), Point3::ZERO)
            .unwrap();
        assert!(!result.status.is_finished());
    }
}
