//! Area-covering patterns: Block, Circles, Spiral, Parallel, Cross and
//! OutlineFill.
//!
//! Each pattern is laid out over the bounding box of the ambient area,
//! resampled, clipped to the area and lifted onto the source surface. The
//! passes then descend through the layers, never below the surface.

use super::{footprint, split_runs, Candidates, DistanceAlongPaths, DistanceBetweenPaths, PathsAngle, StrategyContext};
use crate::geometry::region::RegionQuery;
use crate::geometry::{inset_levels, offset_regions, JoinStyle, Path, Point3, Region, SurfaceSampler, EPSILON};
use crate::types::Ambient;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use tracing::debug;

/// Patterns bounded by an upper limit on generated passes.
const MAX_PASSES: usize = 100_000;

/// Parameters of Block, Circles, Spiral and OutlineFill.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaPatternParams {
    #[serde(flatten)]
    pub along: DistanceAlongPaths,
    #[serde(flatten)]
    pub between: DistanceBetweenPaths,
}

/// Parameters of Parallel and Cross.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinePatternParams {
    #[serde(flatten)]
    pub along: DistanceAlongPaths,
    #[serde(flatten)]
    pub between: DistanceBetweenPaths,
    #[serde(flatten)]
    pub angle: PathsAngle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Concentric rectangles.
    Block,
    /// Concentric circles around the area centre.
    Circles,
    /// Archimedean spiral out of the area centre.
    Spiral,
    /// One family of straight lines.
    Parallel,
    /// Two perpendicular families of straight lines.
    Cross,
}

/// The area a pattern may cover.
pub fn ambient_area(ctx: &StrategyContext) -> Vec<Region> {
    match ctx.ambient {
        Ambient::Inside => footprint(ctx.sources),
        Ambient::Around => offset_regions(&footprint(ctx.sources), ctx.cutter.radius(), JoinStyle::Round),
        Ambient::All => {
            let (min, max) = ctx.bounds;
            if max.x - min.x <= EPSILON || max.y - min.y <= EPSILON {
                return Vec::new();
            }
            vec![Region::rectangle(min.xy(), max.xy())]
        }
    }
}

fn area_bounds(area: &[Region]) -> Option<((f64, f64), (f64, f64))> {
    area.iter().map(Region::bounds).reduce(|(amin, amax), (bmin, bmax)| {
        (
            (amin.0.min(bmin.0), amin.1.min(bmin.1)),
            (amax.0.max(bmax.0), amax.1.max(bmax.1)),
        )
    })
}

fn block(min: (f64, f64), max: (f64, f64), between: f64) -> Vec<Path> {
    let mut rings = Vec::new();
    let mut inset = 0.0;
    while rings.len() < MAX_PASSES {
        let (x0, y0, x1, y1) = (min.0 + inset, min.1 + inset, max.0 - inset, max.1 - inset);
        if x1 - x0 <= EPSILON || y1 - y0 <= EPSILON {
            break;
        }
        rings.push(Path::closed(vec![
            Point3::new(x0, y0, 0.0),
            Point3::new(x1, y0, 0.0),
            Point3::new(x1, y1, 0.0),
            Point3::new(x0, y1, 0.0),
        ]));
        inset += between;
    }
    rings
}

fn circles(centre: (f64, f64), reach: f64, between: f64, along: f64) -> Vec<Path> {
    let mut rings = Vec::new();
    let mut radius = between;
    while radius <= reach + between && rings.len() < MAX_PASSES {
        let segments = (TAU * radius / along).ceil().max(8.0) as usize;
        rings.push(Path::closed(
            (0..segments)
                .map(|i| {
                    let a = TAU * i as f64 / segments as f64;
                    Point3::new(centre.0 + radius * a.cos(), centre.1 + radius * a.sin(), 0.0)
                })
                .collect(),
        ));
        radius += between;
    }
    rings
}

fn spiral(centre: (f64, f64), reach: f64, between: f64, along: f64) -> Vec<Path> {
    let end = TAU * (reach + between) / between;
    let mut points = vec![Point3::new(centre.0, centre.1, 0.0)];
    let mut angle = 0.0;
    while angle < end && points.len() < MAX_PASSES * 10 {
        let radius = between * angle / TAU;
        angle += along / radius.max(along);
        let radius = between * angle / TAU;
        points.push(Point3::new(
            centre.0 + radius * angle.cos(),
            centre.1 + radius * angle.sin(),
            0.0,
        ));
    }
    vec![Path::open(points)]
}

fn parallel(min: (f64, f64), max: (f64, f64), between: f64, angle_degrees: f64) -> Vec<Path> {
    let angle = angle_degrees.to_radians();
    let (dx, dy) = (angle.cos(), angle.sin());
    let (nx, ny) = (-dy, dx);
    let corners = [min, (max.0, min.1), max, (min.0, max.1)];
    let along: Vec<f64> = corners.iter().map(|(x, y)| x * dx + y * dy).collect();
    let across: Vec<f64> = corners.iter().map(|(x, y)| x * nx + y * ny).collect();
    let (t0, t1) = (
        along.iter().copied().fold(f64::INFINITY, f64::min),
        along.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    );
    let (s0, s1) = (
        across.iter().copied().fold(f64::INFINITY, f64::min),
        across.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    );

    let mut lines = Vec::new();
    let mut s = s0;
    while s <= s1 + EPSILON && lines.len() < MAX_PASSES {
        let point = |t: f64| Point3::new(t * dx + s * nx, t * dy + s * ny, 0.0);
        lines.push(Path::open(vec![point(t0), point(t1)]));
        s += between;
    }
    lines
}

fn layout(kind: PatternKind, min: (f64, f64), max: (f64, f64), between: f64, along: f64, angle: f64) -> Vec<Path> {
    let centre = ((min.0 + max.0) / 2.0, (min.1 + max.1) / 2.0);
    let reach = (max.0 - min.0).hypot(max.1 - min.1) / 2.0;
    match kind {
        PatternKind::Block => block(min, max, between),
        PatternKind::Circles => circles(centre, reach, between, along),
        PatternKind::Spiral => spiral(centre, reach, between, along),
        PatternKind::Parallel => parallel(min, max, between, angle),
        PatternKind::Cross => {
            let mut lines = parallel(min, max, between, angle);
            lines.extend(parallel(min, max, between, angle + 90.0));
            lines
        }
    }
}

/// Keep the parts of `path` inside the area.
fn clip_to_area(path: &Path, area: &[RegionQuery]) -> Vec<Path> {
    let inside: Vec<bool> = path
        .points
        .iter()
        .map(|p| area.iter().any(|q| q.contains(p.x, p.y)))
        .collect();
    split_runs(path, &inside)
}

/// Height every point at the surface under the cutter, or at the depth end
/// where the cutter touches nothing.
fn lift(path: &Path, sampler: &SurfaceSampler, depth_end: f64) -> Path {
    Path {
        points: path
            .points
            .iter()
            .map(|p| {
                let z = sampler
                    .height_at(p.x, p.y)
                    .map_or(depth_end, |h| h.max(depth_end));
                p.with_z(z)
            })
            .collect(),
        closed: path.closed,
    }
}

fn finish_candidates(paths: Vec<Path>, area: &[Region], along: f64, ctx: &StrategyContext) -> Result<Candidates> {
    let queries = area.iter().map(RegionQuery::new).collect::<Result<Vec<_>>>()?;
    let sampler = SurfaceSampler::new(ctx.sources, ctx.cutter.radius());
    let paths = paths
        .iter()
        .map(|path| path.densified(along))
        .flat_map(|path| clip_to_area(&path, &queries))
        .map(|path| lift(&path, &sampler, ctx.depth_end))
        .collect();
    Ok(Candidates {
        paths,
        rejected: Vec::new(),
    })
}

fn invalid_spacing(between: DistanceBetweenPaths) -> Option<Candidates> {
    (between.distance_between_paths <= EPSILON).then(|| Candidates {
        paths: Vec::new(),
        rejected: vec!["distance between paths must be positive".to_string()],
    })
}

pub fn candidates(
    kind: PatternKind,
    along: DistanceAlongPaths,
    between: DistanceBetweenPaths,
    angle_degrees: f64,
    ctx: &StrategyContext,
) -> Result<Candidates> {
    if let Some(invalid) = invalid_spacing(between) {
        return Ok(invalid);
    }
    let area = ambient_area(ctx);
    let Some((min, max)) = area_bounds(&area) else {
        return Ok(Candidates::default());
    };
    let along = along.distance_along_paths.max(EPSILON);
    let paths = layout(kind, min, max, between.distance_between_paths, along, angle_degrees);
    debug!("{:?} pattern: {} raw path(s)", kind, paths.len());
    finish_candidates(paths, &area, along, ctx)
}

/// Concentric rings following the outline of the ambient area.
pub fn outline_fill_candidates(params: &AreaPatternParams, ctx: &StrategyContext) -> Result<Candidates> {
    if let Some(invalid) = invalid_spacing(params.between) {
        return Ok(invalid);
    }
    let radius = ctx.cutter.radius();
    let (base, first) = match ctx.ambient {
        Ambient::Inside => (footprint(ctx.sources), radius),
        Ambient::Around => (footprint(ctx.sources), -radius),
        Ambient::All => (ambient_area(ctx), 0.0),
    };
    let levels = inset_levels(&base, first, params.between.distance_between_paths, JoinStyle::Round);
    let rings: Vec<Path> = levels
        .iter()
        .flatten()
        .flat_map(|region| {
            region
                .rings()
                .map(|(ring, _)| Path::from_ring(ring, 0.0))
                .collect::<Vec<_>>()
        })
        .collect();

    let along = params.along.distance_along_paths.max(EPSILON);
    let sampler = SurfaceSampler::new(ctx.sources, radius);
    Ok(Candidates {
        paths: rings
            .iter()
            .map(|ring| lift(&ring.densified(along), &sampler, ctx.depth_end))
            .collect(),
        rejected: Vec::new(),
    })
}
