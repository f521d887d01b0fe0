//! Toolpath strategies.
//!
//! A [`Strategy`] turns the resolved source geometry of one operation into an
//! ordered, annotated point list. Every variant follows the same pipeline:
//! derive candidate geometry, order it from the previous operation's last
//! position, thread it through the Z layers and link the passes.

pub mod curve_path;
pub mod drill;
pub mod layers;
pub mod medial_axis;
pub mod pattern;
pub mod pocket;
pub mod profile;
pub mod waterline;

pub use curve_path::{CarveProjectParams, CurveToPathParams};
pub use drill::DrillParams;
pub use medial_axis::MedialAxisParams;
pub use pattern::{AreaPatternParams, LinePatternParams, PatternKind};
pub use pocket::PocketParams;
pub use profile::{CutType, ProfileParams, ProfileStyle};
pub use waterline::WaterlineRoughingParams;

use self::layers::link_passes;
use crate::error::CancelReason;
use crate::geometry::{
    nest_rings, union_faces, Mesh, Path, Point3, Region, SourceId, EPSILON, UNION_BUFFER,
};
use crate::tsp::order_curves;
use crate::types::{Ambient, ComputeResult, Cutter, CutterKind, MachineState, MovementKind, SpindleDirection};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spacing of samples along a generated path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceAlongPaths {
    pub distance_along_paths: f64,
}

impl Default for DistanceAlongPaths {
    fn default() -> Self {
        Self {
            distance_along_paths: 0.2,
        }
    }
}

/// Spacing between neighbouring passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceBetweenPaths {
    pub distance_between_paths: f64,
}

impl Default for DistanceBetweenPaths {
    fn default() -> Self {
        Self {
            distance_between_paths: 1.0,
        }
    }
}

/// Direction of straight pattern lines, in degrees from the X axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsAngle {
    pub paths_angle: f64,
}

/// Strategy variant without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    Block,
    CarveProject,
    Circles,
    Cross,
    CurveToPath,
    Drill,
    MedialAxis,
    OutlineFill,
    Pocket,
    Profile,
    Parallel,
    Spiral,
    WaterlineRoughing,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 13] = [
        StrategyKind::Block,
        StrategyKind::CarveProject,
        StrategyKind::Circles,
        StrategyKind::Cross,
        StrategyKind::CurveToPath,
        StrategyKind::Drill,
        StrategyKind::MedialAxis,
        StrategyKind::OutlineFill,
        StrategyKind::Pocket,
        StrategyKind::Profile,
        StrategyKind::Parallel,
        StrategyKind::Spiral,
        StrategyKind::WaterlineRoughing,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How an operation turns its sources into a toolpath, with the parameters
/// of that method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Strategy {
    Block(AreaPatternParams),
    CarveProject(CarveProjectParams),
    Circles(AreaPatternParams),
    Cross(LinePatternParams),
    CurveToPath(CurveToPathParams),
    Drill(DrillParams),
    MedialAxis(MedialAxisParams),
    OutlineFill(AreaPatternParams),
    Pocket(PocketParams),
    Profile(ProfileParams),
    Parallel(LinePatternParams),
    Spiral(AreaPatternParams),
    WaterlineRoughing(WaterlineRoughingParams),
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Profile(ProfileParams::default())
    }
}

/// Everything a strategy needs to know about the operation being computed.
#[derive(Debug, Clone)]
pub struct StrategyContext<'a> {
    /// Machinable source geometry in world space.
    pub sources: &'a [Mesh],
    /// Extra curves referenced by the strategy itself (CarveProject).
    pub curves: &'a [Mesh],
    pub cutter: &'a Cutter,
    /// Machine state attached to every emitted point.
    pub zero: MachineState,
    pub movement: MovementKind,
    pub spindle: SpindleDirection,
    pub ambient: Ambient,
    pub layer_size: f64,
    /// Resolved top bound, never below `depth_end`.
    pub top: f64,
    pub depth_end: f64,
    /// Bounding box of `sources`.
    pub bounds: (Point3, Point3),
    /// Stock bounds of the job, when known.
    pub stock: Option<(Point3, Point3)>,
}

impl StrategyContext<'_> {
    pub fn layers(&self) -> Vec<f64> {
        layers::get_layers(self.top, self.layer_size, self.depth_end)
    }
}

/// Raw candidate geometry of a strategy, before ordering and layering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub paths: Vec<Path>,
    /// Candidates that failed validation, with the reason.
    pub rejected: Vec<String>,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Block(_) => StrategyKind::Block,
            Strategy::CarveProject(_) => StrategyKind::CarveProject,
            Strategy::Circles(_) => StrategyKind::Circles,
            Strategy::Cross(_) => StrategyKind::Cross,
            Strategy::CurveToPath(_) => StrategyKind::CurveToPath,
            Strategy::Drill(_) => StrategyKind::Drill,
            Strategy::MedialAxis(_) => StrategyKind::MedialAxis,
            Strategy::OutlineFill(_) => StrategyKind::OutlineFill,
            Strategy::Pocket(_) => StrategyKind::Pocket,
            Strategy::Profile(_) => StrategyKind::Profile,
            Strategy::Parallel(_) => StrategyKind::Parallel,
            Strategy::Spiral(_) => StrategyKind::Spiral,
            Strategy::WaterlineRoughing(_) => StrategyKind::WaterlineRoughing,
        }
    }

    /// The variant of `kind` with default parameters.
    pub fn default_for(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Block => Strategy::Block(AreaPatternParams::default()),
            StrategyKind::CarveProject => Strategy::CarveProject(CarveProjectParams::default()),
            StrategyKind::Circles => Strategy::Circles(AreaPatternParams::default()),
            StrategyKind::Cross => Strategy::Cross(LinePatternParams::default()),
            StrategyKind::CurveToPath => Strategy::CurveToPath(CurveToPathParams::default()),
            StrategyKind::Drill => Strategy::Drill(DrillParams::default()),
            StrategyKind::MedialAxis => Strategy::MedialAxis(MedialAxisParams::default()),
            StrategyKind::OutlineFill => Strategy::OutlineFill(AreaPatternParams::default()),
            StrategyKind::Pocket => Strategy::Pocket(PocketParams::default()),
            StrategyKind::Profile => Strategy::Profile(ProfileParams::default()),
            StrategyKind::Parallel => Strategy::Parallel(LinePatternParams::default()),
            StrategyKind::Spiral => Strategy::Spiral(AreaPatternParams::default()),
            StrategyKind::WaterlineRoughing => {
                Strategy::WaterlineRoughing(WaterlineRoughingParams::default())
            }
        }
    }

    /// Replace the variant by `kind`, carrying over every parameter group
    /// both variants share.
    pub fn switch_to(&self, kind: StrategyKind) -> Self {
        let mut next = Strategy::default_for(kind);
        if let (Some(value), Some(slot)) = (self.distance_along(), next.distance_along_mut()) {
            *slot = value;
        }
        if let (Some(value), Some(slot)) = (self.distance_between(), next.distance_between_mut()) {
            *slot = value;
        }
        if let (Some(value), Some(slot)) = (self.paths_angle(), next.paths_angle_mut()) {
            *slot = value;
        }
        next
    }

    pub fn distance_along(&self) -> Option<DistanceAlongPaths> {
        match self {
            Strategy::Block(p) | Strategy::Circles(p) | Strategy::OutlineFill(p) | Strategy::Spiral(p) => {
                Some(p.along)
            }
            Strategy::Cross(p) | Strategy::Parallel(p) => Some(p.along),
            Strategy::CarveProject(p) => Some(p.along),
            _ => None,
        }
    }

    fn distance_along_mut(&mut self) -> Option<&mut DistanceAlongPaths> {
        match self {
            Strategy::Block(p) | Strategy::Circles(p) | Strategy::OutlineFill(p) | Strategy::Spiral(p) => {
                Some(&mut p.along)
            }
            Strategy::Cross(p) | Strategy::Parallel(p) => Some(&mut p.along),
            Strategy::CarveProject(p) => Some(&mut p.along),
            _ => None,
        }
    }

    pub fn distance_between(&self) -> Option<DistanceBetweenPaths> {
        match self {
            Strategy::Block(p) | Strategy::Circles(p) | Strategy::OutlineFill(p) | Strategy::Spiral(p) => {
                Some(p.between)
            }
            Strategy::Cross(p) | Strategy::Parallel(p) => Some(p.between),
            Strategy::WaterlineRoughing(p) => Some(p.between),
            _ => None,
        }
    }

    fn distance_between_mut(&mut self) -> Option<&mut DistanceBetweenPaths> {
        match self {
            Strategy::Block(p) | Strategy::Circles(p) | Strategy::OutlineFill(p) | Strategy::Spiral(p) => {
                Some(&mut p.between)
            }
            Strategy::Cross(p) | Strategy::Parallel(p) => Some(&mut p.between),
            Strategy::WaterlineRoughing(p) => Some(&mut p.between),
            _ => None,
        }
    }

    pub fn paths_angle(&self) -> Option<PathsAngle> {
        match self {
            Strategy::Cross(p) | Strategy::Parallel(p) => Some(p.angle),
            _ => None,
        }
    }

    fn paths_angle_mut(&mut self) -> Option<&mut PathsAngle> {
        match self {
            Strategy::Cross(p) | Strategy::Parallel(p) => Some(&mut p.angle),
            _ => None,
        }
    }

    /// Whether a cutter of `kind` can run this strategy.
    ///
    /// Engraving, laser and plasma heads only follow outlines and axes; drill
    /// bits only drill.
    pub fn accepts(&self, kind: CutterKind) -> bool {
        match kind {
            CutterKind::VCarve | CutterKind::Laser | CutterKind::Plasma => matches!(
                self,
                Strategy::MedialAxis(_) | Strategy::Profile(_)
            ),
            CutterKind::Drill => matches!(self, Strategy::Drill(_)),
            _ => true,
        }
    }

    /// Additional source ids the strategy reads besides the operation's own.
    pub fn curve_sources(&self) -> &[SourceId] {
        match self {
            Strategy::CarveProject(p) => &p.curve,
            _ => &[],
        }
    }

    /// Raw candidate geometry, before ordering and layering.
    pub fn compute_geometry(&self, ctx: &StrategyContext) -> Result<Candidates> {
        match self {
            Strategy::Block(p) => pattern::candidates(PatternKind::Block, p.along, p.between, 0.0, ctx),
            Strategy::Circles(p) => pattern::candidates(PatternKind::Circles, p.along, p.between, 0.0, ctx),
            Strategy::Spiral(p) => pattern::candidates(PatternKind::Spiral, p.along, p.between, 0.0, ctx),
            Strategy::Parallel(p) => {
                pattern::candidates(PatternKind::Parallel, p.along, p.between, p.angle.paths_angle, ctx)
            }
            Strategy::Cross(p) => {
                pattern::candidates(PatternKind::Cross, p.along, p.between, p.angle.paths_angle, ctx)
            }
            Strategy::OutlineFill(p) => pattern::outline_fill_candidates(p, ctx),
            Strategy::CarveProject(p) => curve_path::carve_project_candidates(p, ctx),
            Strategy::CurveToPath(_) => curve_path::curve_to_path_candidates(ctx),
            Strategy::Drill(p) => drill::candidates(p, ctx),
            Strategy::MedialAxis(p) => medial_axis::candidates(p, ctx),
            Strategy::Pocket(p) => pocket::candidates(p, ctx),
            Strategy::Profile(p) => profile::candidates(p, ctx),
            Strategy::WaterlineRoughing(p) => waterline::candidates(p, ctx),
        }
    }

    /// Points of interest of the candidate geometry: drill targets, the
    /// corners of a profile, or the entry of every other candidate path.
    pub fn feature_positions(&self, ctx: &StrategyContext) -> Result<Vec<Point3>> {
        match self {
            Strategy::Drill(p) => Ok(drill::targets(p, ctx).0),
            Strategy::Profile(_) => Ok(profile::feature_positions(ctx)),
            _ => Ok(self
                .compute_geometry(ctx)?
                .paths
                .iter()
                .filter_map(Path::first)
                .collect()),
        }
    }

    /// Ordered, layered and annotated toolpath starting from `last_position`.
    pub fn execute_compute(&self, ctx: &StrategyContext, last_position: Point3) -> Result<ComputeResult> {
        match self {
            Strategy::Drill(p) => drill::compute(p, ctx, last_position),
            Strategy::Profile(p) => profile::compute(p, ctx, last_position),
            Strategy::Pocket(p) => pocket::compute(p, ctx, last_position),
            Strategy::MedialAxis(p) => medial_axis::compute(p, ctx, last_position),
            Strategy::WaterlineRoughing(p) => waterline::compute(p, ctx, last_position),
            Strategy::CurveToPath(_) | Strategy::CarveProject(_) => {
                let candidates = self.compute_geometry(ctx)?;
                Ok(layered_compute(
                    candidates,
                    ctx,
                    last_position,
                    0.0,
                    "no curve to follow in the sources",
                ))
            }
            Strategy::Block(_)
            | Strategy::Circles(_)
            | Strategy::Cross(_)
            | Strategy::OutlineFill(_)
            | Strategy::Parallel(_)
            | Strategy::Spiral(_) => {
                let adjacency = self
                    .distance_between()
                    .map_or(0.0, |d| d.distance_between_paths + EPSILON);
                let candidates = self.compute_geometry(ctx)?;
                Ok(layered_compute(
                    candidates,
                    ctx,
                    last_position,
                    adjacency,
                    "pattern does not cover the machining area",
                ))
            }
        }
    }
}

/// Split `path` into the runs of points whose `keep` flag is set.
///
/// A closed path that keeps every point stays closed; otherwise each run
/// becomes an open path, the last run of a closed path wrapping into its
/// first.
pub fn split_runs(path: &Path, keep: &[bool]) -> Vec<Path> {
    if keep.iter().all(|k| *k) {
        return vec![path.clone()];
    }

    let mut runs: Vec<Vec<Point3>> = Vec::new();
    let mut current: Vec<Point3> = Vec::new();
    for (point, kept) in path.points.iter().zip(keep) {
        if *kept {
            current.push(*point);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        if path.closed && keep.first() == Some(&true) && !runs.is_empty() {
            let head = runs.remove(0);
            current.extend(head);
        }
        runs.push(current);
    }

    runs.into_iter()
        .filter(|run| run.len() > 1)
        .map(Path::open)
        .collect()
}

/// Thread candidate paths through the layers and link them.
///
/// Every layer copy keeps points that lie above the layer at their own
/// height. Passes closer than `adjacency` are joined without leaving the
/// material.
pub fn layered_compute(
    candidates: Candidates,
    ctx: &StrategyContext,
    last_position: Point3,
    adjacency: f64,
    empty_reason: &str,
) -> ComputeResult {
    if candidates.paths.is_empty() {
        let mut rejected = candidates.rejected;
        if rejected.is_empty() {
            rejected.push(empty_reason.to_string());
        }
        return ComputeResult::cancelled(CancelReason::NoValidFeature { rejected });
    }

    let mut passes: Vec<Vec<Point3>> = Vec::new();
    let mut current = last_position;
    for z in ctx.layers() {
        let layer: Vec<Path> = candidates
            .paths
            .iter()
            .map(|path| Path {
                points: path.points.iter().map(|p| p.with_z(p.z.max(z))).collect(),
                closed: path.closed,
            })
            .collect();
        for path in order_curves(layer, current) {
            if let Some(end) = path.last() {
                current = end;
            }
            passes.push(path.emit_points());
        }
    }

    ComputeResult::finished(link_passes(&passes, ctx.zero, adjacency))
        .with_diagnostics(candidates.rejected)
}

/// Planar footprint of the sources: the union of every face, plus the area
/// enclosed by closed curves of face-less sources.
pub fn footprint(sources: &[Mesh]) -> Vec<Region> {
    let mut faces: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut curve_rings: Vec<Vec<(f64, f64)>> = Vec::new();
    for mesh in sources {
        if mesh.faces.is_empty() {
            curve_rings.extend(
                mesh.island_paths()
                    .into_iter()
                    .filter(|path| path.closed)
                    .map(|path| path.points.iter().map(Point3::xy).collect()),
            );
        } else {
            faces.extend(
                mesh.triangles()
                    .iter()
                    .map(|tri| tri.iter().map(Point3::xy).collect()),
            );
        }
    }

    let mut regions = union_faces(&faces, UNION_BUFFER);
    regions.extend(nest_rings(curve_rings));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_keeps_shared_groups() {
        let mut parallel = LinePatternParams::default();
        parallel.along.distance_along_paths = 0.5;
        parallel.between.distance_between_paths = 2.5;
        parallel.angle.paths_angle = 45.0;
        let strategy = Strategy::Parallel(parallel);

        let cross = strategy.switch_to(StrategyKind::Cross);
        assert_eq!(cross.distance_along().map(|d| d.distance_along_paths), Some(0.5));
        assert_eq!(cross.paths_angle().map(|a| a.paths_angle), Some(45.0));

        let waterline = strategy.switch_to(StrategyKind::WaterlineRoughing);
        assert_eq!(
            waterline.distance_between().map(|d| d.distance_between_paths),
            Some(2.5)
        );
        assert_eq!(waterline.distance_along(), None);

        let drill = strategy.switch_to(StrategyKind::Drill);
        assert_eq!(drill, Strategy::Drill(DrillParams::default()));
    }

    #[test]
    fn test_default_for_matches_kind() {
        for kind in StrategyKind::ALL {
            assert_eq!(Strategy::default_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_cutter_availability() {
        let profile = Strategy::default_for(StrategyKind::Profile);
        let pocket = Strategy::default_for(StrategyKind::Pocket);
        let drill = Strategy::default_for(StrategyKind::Drill);
        assert!(profile.accepts(CutterKind::Laser));
        assert!(!pocket.accepts(CutterKind::VCarve));
        assert!(drill.accepts(CutterKind::Drill));
        assert!(!pocket.accepts(CutterKind::Drill));
        assert!(pocket.accepts(CutterKind::Ball));
    }

    #[test]
    fn test_strategy_json_is_tagged() {
        let json = serde_json::to_value(Strategy::default_for(StrategyKind::Drill)).unwrap();
        assert_eq!(json["type"], "Drill");
        let back: Strategy = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), StrategyKind::Drill);

        let parsed: Strategy =
            serde_json::from_str(r#"{"type":"Parallel","distance_between_paths":3.0}"#).unwrap();
        assert_eq!(
            parsed.distance_between().map(|d| d.distance_between_paths),
            Some(3.0)
        );
        assert_eq!(parsed.distance_along(), Some(DistanceAlongPaths::default()));
    }

    #[test]
    fn test_split_runs_wraps_closed_paths() {
        let ring = Path::closed(
            (0..6)
                .map(|i| Point3::new(i as f64, 0.0, 0.0))
                .collect(),
        );
        let runs = split_runs(&ring, &[true, true, false, true, true, true]);
        assert_eq!(runs.len(), 1);
        let xs: Vec<f64> = runs[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![3.0, 4.0, 5.0, 0.0, 1.0]);
        assert!(!runs[0].closed);
    }

    #[test]
    fn test_layered_compute_without_candidates_is_cancelled() {
        let cutter = Cutter::default();
        let ctx = StrategyContext {
            sources: &[],
            curves: &[],
            cutter: &cutter,
            zero: MachineState::default(),
            movement: MovementKind::Climb,
            spindle: SpindleDirection::Clockwise,
            ambient: Ambient::All,
            layer_size: 0.0,
            top: 0.0,
            depth_end: -1.0,
            bounds: (Point3::ZERO, Point3::ZERO),
            stock: None,
        };
        let result = layered_compute(Candidates::default(), &ctx, Point3::ZERO, 1.0, "nothing here");
        assert_eq!(
            result.status,
            crate::types::ComputeStatus::Cancelled(CancelReason::NoValidFeature {
                rejected: vec!["nothing here".to_string()]
            })
        );
    }

    #[test]
    fn test_footprint_of_curve_ring_keeps_hole() {
        let mut mesh = Mesh::new();
        let square = |a: f64, b: f64| {
            vec![
                Point3::new(a, a, 0.0),
                Point3::new(b, a, 0.0),
                Point3::new(b, b, 0.0),
                Point3::new(a, b, 0.0),
            ]
        };
        mesh.add_polyline(&square(0.0, 10.0), true);
        mesh.add_polyline(&square(3.0, 7.0), true);
        let regions = footprint(&[mesh]);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].holes.len(), 1);
    }
}
