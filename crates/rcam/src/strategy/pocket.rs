use super::layers::{link_passes, orient};
use super::{footprint, Candidates, StrategyContext};
use crate::error::CancelReason;
use crate::geometry::{inset_levels, offset_regions, JoinStyle, Path, Point3, Region, EPSILON};
use crate::tsp::order_curves;
use crate::types::{ComputeResult, MovementKind};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PocketParams {
    /// Distance between neighbouring rings as a fraction of the cutter
    /// diameter.
    pub stepover: f64,
}

impl Default for PocketParams {
    fn default() -> Self {
        Self { stepover: 0.5 }
    }
}

impl PocketParams {
    pub fn step(&self, cutter_diameter: f64) -> f64 {
        self.stepover * cutter_diameter
    }
}

fn level_rings(level: &[Region], ctx: &StrategyContext) -> Vec<Path> {
    let mut rings = Vec::new();
    for region in level {
        rings.push(orient(Path::from_ring(&region.outer, 0.0), true, ctx.movement, ctx.spindle));
        for hole in &region.holes {
            rings.push(orient(Path::from_ring(hole, 0.0), false, ctx.movement, ctx.spindle));
        }
    }
    rings
}

/// Inset rings of the source footprint, outermost level first.
///
/// The first level keeps the cutter off the walls; every following level is
/// one stepover further in. With a stepover above the cutter radius the
/// innermost level can leave its middle uncut, which gets one more ring.
fn levels(params: &PocketParams, ctx: &StrategyContext) -> Vec<Vec<Path>> {
    let step = params.step(ctx.cutter.diameter);
    let radius = ctx.cutter.radius();
    let mut levels = inset_levels(&footprint(ctx.sources), radius, step, JoinStyle::Round);
    if let Some(last) = levels.last() {
        let centre = offset_regions(last, -radius, JoinStyle::Round);
        if !centre.is_empty() {
            levels.push(centre);
        }
    }
    levels
        .iter()
        .map(|level| level_rings(level, ctx))
        .filter(|rings| !rings.is_empty())
        .collect()
}

pub fn candidates(params: &PocketParams, ctx: &StrategyContext) -> Result<Candidates> {
    Ok(Candidates {
        paths: levels(params, ctx)
            .into_iter()
            .flatten()
            .map(|ring| ring.with_z(ctx.depth_end))
            .collect(),
        rejected: Vec::new(),
    })
}

pub fn compute(params: &PocketParams, ctx: &StrategyContext, last_position: Point3) -> Result<ComputeResult> {
    let levels = levels(params, ctx);
    if levels.is_empty() {
        return Ok(ComputeResult::cancelled(CancelReason::NoValidFeature {
            rejected: vec!["pocket area is narrower than the cutter".to_string()],
        }));
    }

    let step = params.step(ctx.cutter.diameter);
    let adjacency = (1.5 * step).min(ctx.cutter.diameter - EPSILON);
    let layers = ctx.layers();
    debug!("Pocket: {} level(s), {} layer(s)", levels.len(), layers.len());

    let mut passes: Vec<Vec<Point3>> = Vec::new();
    let mut current = last_position;
    for (layer_index, &z) in layers.iter().enumerate() {
        let inward = ctx.movement != MovementKind::Meander || layer_index % 2 == 0;
        let ordered_levels: Vec<&Vec<Path>> = if inward {
            levels.iter().collect()
        } else {
            levels.iter().rev().collect()
        };
        for level in ordered_levels {
            let rings: Vec<Path> = level
                .iter()
                .map(|ring| if inward { ring.with_z(z) } else { ring.with_z(z).reversed() })
                .collect();
            for ring in order_curves(rings, current) {
                if let Some(end) = ring.last() {
                    current = end;
                }
                passes.push(ring.emit_points());
            }
        }
    }

    Ok(ComputeResult::finished(link_passes(&passes, ctx.zero, adjacency)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Mesh;
    use crate::types::{Ambient, Cutter, CutterKind, MachineState, SpindleDirection};

    fn plate(size: f64) -> Mesh {
        Mesh::from_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(size, 0.0, 0.0),
                Point3::new(size, size, 0.0),
                Point3::new(0.0, size, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
        )
    }

    fn context<'a>(sources: &'a [Mesh], cutter: &'a Cutter, movement: MovementKind) -> StrategyContext<'a> {
        StrategyContext {
            sources,
            curves: &[],
            cutter,
            zero: MachineState::default(),
            movement,
            spindle: SpindleDirection::Clockwise,
            ambient: Ambient::All,
            layer_size: 1.0,
            top: 0.0,
            depth_end: -2.0,
            bounds: crate::geometry::mesh::meshes_bounds(sources),
            stock: None,
        }
    }

    #[test]
    fn test_rings_stay_inside_the_walls() {
        let sources = [plate(30.0)];
        let cutter = Cutter::new(CutterKind::Cylinder, 4.0);
        let ctx = context(&sources, &cutter, MovementKind::Climb);
        let result = compute(&PocketParams::default(), &ctx, Point3::ZERO).unwrap();
        assert!(result.status.is_finished());
        for point in result.points.iter().filter(|p| p.position.z < 0.0) {
            assert!(
                point.position.x > 1.9 && point.position.x < 28.1,
                "cutter centre keeps a radius from the wall: {:?}",
                point.position
            );
        }
    }

    #[test]
    fn test_level_count_follows_stepover() {
        let sources = [plate(30.0)];
        let cutter = Cutter::new(CutterKind::Cylinder, 4.0);
        let ctx = context(&sources, &cutter, MovementKind::Climb);
        // 26mm wide after the wall inset, then every 2mm until it collapses
        let rings = candidates(&PocketParams::default(), &ctx).unwrap().paths;
        assert_eq!(rings.len(), 7);
        assert!(rings.iter().all(|r| r.points.iter().all(|p| p.z == -2.0)));
    }

    fn distance_to_segment(p: (f64, f64), a: Point3, b: Point3) -> f64 {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len_sq = dx * dx + dy * dy;
        let t = if len_sq < 1e-20 {
            0.0
        } else {
            (((p.0 - a.x) * dx + (p.1 - a.y) * dy) / len_sq).clamp(0.0, 1.0)
        };
        (a.x + t * dx - p.0).hypot(a.y + t * dy - p.1)
    }

    /// Largest distance from a point of the cutter-centre area to the nearest
    /// cutting move at `z`.
    fn worst_gap(result: &ComputeResult, lo: f64, hi: f64, z: f64) -> f64 {
        let moves: Vec<(Point3, Point3)> = result
            .points
            .windows(2)
            .filter(|w| w[0].position.z == z && w[1].position.z == z)
            .map(|w| (w[0].position, w[1].position))
            .collect();
        let mut worst: f64 = 0.0;
        let steps = 60;
        for i in 0..=steps {
            for j in 0..=steps {
                let p = (
                    lo + (hi - lo) * i as f64 / steps as f64,
                    lo + (hi - lo) * j as f64 / steps as f64,
                );
                let nearest = moves
                    .iter()
                    .map(|(a, b)| distance_to_segment(p, *a, *b))
                    .fold(f64::INFINITY, f64::min);
                worst = worst.max(nearest);
            }
        }
        worst
    }

    #[test]
    fn test_floor_is_cleared_to_the_centre() {
        let sources = [plate(30.0)];
        let cutter = Cutter::new(CutterKind::Cylinder, 4.0);
        let ctx = context(&sources, &cutter, MovementKind::Climb);
        let result = compute(&PocketParams::default(), &ctx, Point3::ZERO).unwrap();
        let gap = worst_gap(&result, 2.0, 28.0, -2.0);
        assert!(gap <= 2.05, "floor left {gap:.3} away from any cut");
    }

    #[test]
    fn test_wide_stepover_still_reaches_the_centre() {
        let sources = [plate(34.0)];
        let cutter = Cutter::new(CutterKind::Cylinder, 4.0);
        let ctx = context(&sources, &cutter, MovementKind::Climb);
        let params = PocketParams { stepover: 1.0 };
        // insets 2, 6, 10 and 14 leave a 6mm square, then one more ring 2mm further in
        assert_eq!(candidates(&params, &ctx).unwrap().paths.len(), 5);
        let result = compute(&params, &ctx, Point3::ZERO).unwrap();
        let gap = worst_gap(&result, 2.0, 32.0, -2.0);
        assert!(gap <= 2.05, "floor left {gap:.3} away from any cut");
    }

    #[test]
    fn test_meander_alternates_direction() {
        let sources = [plate(30.0)];
        let cutter = Cutter::new(CutterKind::Cylinder, 4.0);
        let ctx = context(&sources, &cutter, MovementKind::Meander);
        let result = compute(&PocketParams::default(), &ctx, Point3::ZERO).unwrap();
        let first_deep = result
            .points
            .iter()
            .position(|p| p.position.z == -2.0)
            .expect("second layer reached");
        let p = result.points[first_deep].position;
        // the second layer starts from the innermost ring
        assert!(p.x > 10.0 && p.x < 20.0, "expected a central start, got {p:?}");
    }

    #[test]
    fn test_too_narrow_is_cancelled() {
        let sources = [plate(3.0)];
        let cutter = Cutter::new(CutterKind::Cylinder, 4.0);
        let ctx = context(&sources, &cutter, MovementKind::Climb);
        let result = compute(&PocketParams::default(), &ctx, Point3::ZERO).unwrap();
        assert!(!result.status.is_finished());
    }
}
