use super::{split_runs, Candidates, DistanceAlongPaths, StrategyContext};
use crate::geometry::{Path, SourceId, SurfaceSampler, EPSILON};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// CurveToPath has no parameters of its own: source curves are followed
/// as drawn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveToPathParams {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarveProjectParams {
    #[serde(flatten)]
    pub along: DistanceAlongPaths,
    /// Curves engraved into the surface of the operation's sources.
    pub curve: Vec<SourceId>,
    /// Engraving depth below the surface.
    pub depth: f64,
}

impl Default for CarveProjectParams {
    fn default() -> Self {
        Self {
            along: DistanceAlongPaths::default(),
            curve: Vec::new(),
            depth: 1.0,
        }
    }
}

/// Every source curve walked in link order, at its own height but never
/// below the depth end.
pub fn curve_to_path_candidates(ctx: &StrategyContext) -> Result<Candidates> {
    let paths: Vec<Path> = ctx
        .sources
        .iter()
        .flat_map(|mesh| mesh.island_paths())
        .filter(|path| path.points.len() > 1)
        .map(|path| Path {
            points: path
                .points
                .iter()
                .map(|p| p.with_z(p.z.max(ctx.depth_end)))
                .collect(),
            closed: path.closed,
        })
        .collect();
    debug!("CurveToPath: {} curve(s)", paths.len());
    Ok(Candidates {
        paths,
        rejected: Vec::new(),
    })
}

/// The `curve` sources sampled along their length and dropped `depth` below
/// the surface of the operation's sources. Curve parts that leave the
/// surface are not cut.
pub fn carve_project_candidates(params: &CarveProjectParams, ctx: &StrategyContext) -> Result<Candidates> {
    if ctx.curves.is_empty() {
        return Ok(Candidates {
            paths: Vec::new(),
            rejected: vec!["no curve selected to project".to_string()],
        });
    }

    let sampler = SurfaceSampler::new(ctx.sources, ctx.cutter.radius());
    let along = params.along.distance_along_paths.max(EPSILON);
    let mut paths = Vec::new();
    let mut rejected = Vec::new();

    for (index, curve) in ctx.curves.iter().flat_map(|mesh| mesh.island_paths()).enumerate() {
        let sampled = curve.densified(along);
        let heights: Vec<Option<f64>> = sampled
            .points
            .iter()
            .map(|p| sampler.height_at(p.x, p.y))
            .collect();
        if heights.iter().all(Option::is_none) {
            rejected.push(format!("curve {index}: does not cross the surface"));
            continue;
        }

        let projected = Path {
            points: sampled
                .points
                .iter()
                .zip(&heights)
                .map(|(p, h)| p.with_z(h.map_or(ctx.depth_end, |h| (h - params.depth).max(ctx.depth_end))))
                .collect(),
            closed: sampled.closed,
        };
        let on_surface: Vec<bool> = heights.iter().map(Option::is_some).collect();
        paths.extend(split_runs(&projected, &on_surface));
    }

    Ok(Candidates { paths, rejected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Mesh, Point3};
    use crate::types::{Ambient, Cutter, MachineState, MovementKind, SpindleDirection};

    fn context<'a>(sources: &'a [Mesh], curves: &'a [Mesh], cutter: &'a Cutter) -> StrategyContext<'a> {
        StrategyContext {
            sources,
            curves,
            cutter,
            zero: MachineState::default(),
            movement: MovementKind::Climb,
            spindle: SpindleDirection::Clockwise,
            ambient: Ambient::All,
            layer_size: 0.0,
            top: 0.0,
            depth_end: -5.0,
            bounds: crate::geometry::mesh::meshes_bounds(sources),
            stock: None,
        }
    }

    #[test]
    fn test_curve_keeps_direction_and_height() {
        let points = [
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(5.0, 0.0, -2.0),
            Point3::new(5.0, 5.0, -9.0),
        ];
        let sources = [Mesh::from_polyline(&points, false)];
        let cutter = Cutter::default();
        let paths = curve_to_path_candidates(&context(&sources, &[], &cutter))
            .unwrap()
            .paths;
        assert_eq!(paths.len(), 1);
        let z: Vec<f64> = paths[0].points.iter().map(|p| p.z).collect();
        assert_eq!(z, vec![-1.0, -2.0, -5.0], "clamped to the depth end");
        assert_eq!(paths[0].points[0].x, 0.0);
    }

    #[test]
    fn test_carve_project_follows_surface() {
        let plate = Mesh::from_faces(
            vec![
                Point3::new(0.0, 0.0, -1.0),
                Point3::new(10.0, 0.0, -1.0),
                Point3::new(10.0, 10.0, -1.0),
                Point3::new(0.0, 10.0, -1.0),
            ],
            vec![vec![0, 1, 2, 3]],
        );
        let line = Mesh::from_polyline(
            &[Point3::new(2.0, 5.0, 0.0), Point3::new(20.0, 5.0, 0.0)],
            false,
        );
        let sources = [plate];
        let curves = [line];
        let cutter = Cutter::new(crate::types::CutterKind::Cone, 0.0);
        let params = CarveProjectParams {
            depth: 0.5,
            ..CarveProjectParams::default()
        };
        let candidates = carve_project_candidates(&params, &context(&sources, &curves, &cutter)).unwrap();
        assert_eq!(candidates.paths.len(), 1, "the part beyond the plate is dropped");
        let path = &candidates.paths[0];
        assert!(path.points.iter().all(|p| (p.z + 1.5).abs() < 1e-9));
        assert!(path.points.iter().all(|p| p.x <= 10.0 + 1e-9));
    }

    #[test]
    fn test_carve_project_without_curves_rejects() {
        let cutter = Cutter::default();
        let candidates =
            carve_project_candidates(&CarveProjectParams::default(), &context(&[], &[], &cutter)).unwrap();
        assert!(candidates.paths.is_empty());
        assert_eq!(candidates.rejected.len(), 1);
    }
}
