use super::layers::{link_passes, orient};
use super::{footprint, Candidates, StrategyContext};
use crate::error::CancelReason;
use crate::geometry::{approx_eq, offset_regions, JoinStyle, Path, Point3, Region, EPSILON};
use crate::tsp::order_curves;
use crate::types::ComputeResult;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Side of the outline the cutter runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CutType {
    #[default]
    OnLine,
    Inside,
    Outside,
}

impl CutType {
    fn sign(self) -> f64 {
        match self {
            CutType::OnLine => 0.0,
            CutType::Inside => -1.0,
            CutType::Outside => 1.0,
        }
    }
}

/// Corner treatment of offset outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProfileStyle {
    /// Rounded corners.
    #[default]
    Conventional,
    /// Sharp corners the cutter overshoots.
    Overshoot,
}

impl From<ProfileStyle> for JoinStyle {
    fn from(style: ProfileStyle) -> Self {
        match style {
            ProfileStyle::Conventional => JoinStyle::Round,
            ProfileStyle::Overshoot => JoinStyle::Miter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileParams {
    pub cut_type: CutType,
    /// Number of concentric outlines, at least one.
    pub outlines_count: u32,
    /// Extra offset added to every outline.
    pub outlines_offset: f64,
    /// Spacing between successive outlines.
    pub outlines_distance: f64,
    /// Tabs spread evenly along each ring; 0 disables them.
    pub bridges_count: u32,
    pub bridges_length: f64,
    /// Height of the tabs above the depth end.
    pub bridges_height: f64,
    pub style: ProfileStyle,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            cut_type: CutType::OnLine,
            outlines_count: 1,
            outlines_offset: 0.0,
            outlines_distance: 3.0,
            bridges_count: 0,
            bridges_length: 3.0,
            bridges_height: 1.0,
            style: ProfileStyle::Conventional,
        }
    }
}

impl ProfileParams {
    /// Offset of outline `index` (1-based) from the source outline.
    pub fn outline_distance(&self, cutter_radius: f64, index: u32) -> f64 {
        let spacing = (index.max(1) - 1) as f64 * self.outlines_distance;
        self.cut_type.sign() * (cutter_radius + spacing) + self.outlines_offset
    }
}

/// Corners of the source bounding box at the depth end, or nothing when
/// the sources lie entirely below it.
pub fn feature_positions(ctx: &StrategyContext) -> Vec<Point3> {
    let (min, max) = ctx.bounds;
    if max.z <= ctx.depth_end {
        return Vec::new();
    }
    vec![
        Point3::new(min.x, min.y, ctx.depth_end),
        Point3::new(min.x, max.y, ctx.depth_end),
        Point3::new(max.x, max.y, ctx.depth_end),
        Point3::new(max.x, min.y, ctx.depth_end),
    ]
}

fn outlines(params: &ProfileParams, ctx: &StrategyContext) -> Vec<Region> {
    let base = footprint(ctx.sources);
    if params.cut_type == CutType::OnLine {
        return base;
    }
    (1..=params.outlines_count.max(1))
        .flat_map(|index| {
            let delta = params.outline_distance(ctx.cutter.radius(), index);
            offset_regions(&base, delta, params.style.into())
        })
        .collect()
}

/// Outline rings at the depth end, exteriors first, each wound for the
/// configured movement.
pub fn candidates(params: &ProfileParams, ctx: &StrategyContext) -> Result<Candidates> {
    let regions = outlines(params, ctx);
    let exteriors = regions
        .iter()
        .map(|region| orient(Path::from_ring(&region.outer, ctx.depth_end), true, ctx.movement, ctx.spindle));
    let interiors = regions.iter().flat_map(|region| {
        region
            .holes
            .iter()
            .map(|hole| orient(Path::from_ring(hole, ctx.depth_end), false, ctx.movement, ctx.spindle))
    });
    let paths = exteriors.chain(interiors).collect();
    Ok(Candidates {
        paths,
        rejected: Vec::new(),
    })
}

/// Tab centres at `i / count` of every ring's length.
fn bridge_centres(rings: &[Path], count: u32) -> Vec<Point3> {
    if count == 0 {
        return Vec::new();
    }
    let mut centres = Vec::new();
    for ring in rings {
        let length = ring.length_xy();
        if length <= EPSILON {
            continue;
        }
        for i in 0..count {
            centres.extend(point_at_distance(ring, length * i as f64 / count as f64));
        }
    }
    centres
}

fn point_at_distance(path: &Path, distance: f64) -> Option<Point3> {
    let mut travelled = 0.0;
    for (a, b) in path.segments() {
        let step = a.distance_xy(&b);
        if travelled + step >= distance && step > 0.0 {
            return Some(a.lerp(&b, (distance - travelled) / step));
        }
        travelled += step;
    }
    path.last()
}

/// Segment parameters in (0, 1) where `a-b` crosses the circle.
fn circle_crossings(a: Point3, b: Point3, centre: Point3, radius: f64) -> Vec<f64> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (fx, fy) = (a.x - centre.x, a.y - centre.y);
    let qa = dx * dx + dy * dy;
    if qa < 1e-20 {
        return Vec::new();
    }
    let qb = 2.0 * (fx * dx + fy * dy);
    let qc = fx * fx + fy * fy - radius * radius;
    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return Vec::new();
    }
    let root = disc.sqrt();
    [(-qb - root) / (2.0 * qa), (-qb + root) / (2.0 * qa)]
        .into_iter()
        .filter(|t| *t > 1e-9 && *t < 1.0 - 1e-9)
        .collect()
}

/// Split the ring at the tab boundaries and flag every resulting segment
/// that lies inside a tab.
fn split_at_bridges(ring: &Path, centres: &[Point3], radius: f64) -> (Vec<Point3>, Vec<bool>) {
    let mut points = Vec::new();
    for (a, b) in ring.segments() {
        let mut cuts: Vec<f64> = centres
            .iter()
            .flat_map(|c| circle_crossings(a, b, *c, radius))
            .collect();
        cuts.sort_by(f64::total_cmp);
        points.push(a);
        points.extend(cuts.into_iter().map(|t| a.lerp(&b, t)));
    }
    if let Some(last) = ring.emit_points().last() {
        points.push(*last);
    }
    points.dedup();

    let bridged = points
        .windows(2)
        .map(|w| {
            let mid = w[0].lerp(&w[1], 0.5);
            centres.iter().any(|c| c.distance_xy(&mid) < radius)
        })
        .collect();
    (points, bridged)
}

/// One layer of a ring, raised to `bridge_z` over the tabs with vertical
/// steps at their boundaries.
fn layer_pass(points: &[Point3], bridged: &[bool], z: f64, bridge_z: f64) -> Vec<Point3> {
    let height = |on_bridge: bool| if on_bridge { z.max(bridge_z) } else { z };
    let mut pass = Vec::with_capacity(points.len() + 2);
    let mut previous: Option<f64> = None;
    for (point, &on_bridge) in points.iter().zip(bridged) {
        let h = height(on_bridge);
        if let Some(prev) = previous {
            if !approx_eq(prev, h) {
                pass.push(point.with_z(prev));
            }
        }
        pass.push(point.with_z(h));
        previous = Some(h);
    }
    if let (Some(last), Some(h)) = (points.last(), previous) {
        pass.push(last.with_z(h));
    }
    pass
}

pub fn compute(params: &ProfileParams, ctx: &StrategyContext, last_position: Point3) -> Result<ComputeResult> {
    let rings = candidates(params, ctx)?.paths;
    if rings.is_empty() {
        return Ok(ComputeResult::cancelled(CancelReason::NoValidFeature {
            rejected: vec!["no closed outline in the sources".to_string()],
        }));
    }

    let centres = bridge_centres(&rings, params.bridges_count);
    let radius = params.bridges_length / 2.0;
    let bridge_z = ctx.depth_end + params.bridges_height;
    let layers = ctx.layers();
    debug!(
        "Profile: {} ring(s), {} layer(s), {} bridge(s)",
        rings.len(),
        layers.len(),
        centres.len()
    );

    let mut passes = Vec::new();
    for ring in order_curves(rings, last_position) {
        let (points, bridged) = split_at_bridges(&ring, &centres, radius);
        for &z in &layers {
            passes.push(layer_pass(&points, &bridged, z, bridge_z));
        }
    }

    Ok(ComputeResult::finished(link_passes(&passes, ctx.zero, 0.0)))
}
