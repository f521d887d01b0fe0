//! Medial-axis carving.
//!
//! The axis is the straight skeleton of each footprint region. Skeleton
//! points are kept where the inscribed circle is wider than `threshold`, and
//! tapered and ball cutters cut each of them as deep as needed to touch both
//! walls.

use super::layers::link_passes;
use super::{footprint, Candidates, StrategyContext};
use crate::error::CancelReason;
use crate::geometry::region::RegionQuery;
use crate::geometry::{connected_components, sorted_islands, Path, Point3, Region, EPSILON};
use crate::tsp::order_curves;
use crate::types::ComputeResult;
use anyhow::{Context, Result};
use geo::algorithm::coords_iter::CoordsIter;
use geo::Simplify;
use geo_buffer::skeleton_of_polygon_to_linestring;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Collinear vertices left by face merging make the skeleton comb.
const SIMPLIFY_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedialAxisParams {
    /// Minimum width of the area around a kept axis point, and the minimum
    /// length of a kept branch.
    pub threshold: f64,
    /// Sampling step along the skeleton.
    pub subdivision: f64,
    /// Drop branches shorter than `threshold`.
    pub do_clean_finish: bool,
}

impl Default for MedialAxisParams {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            subdivision: 0.2,
            do_clean_finish: true,
        }
    }
}

/// Skeleton samples wide enough to carve, linked along the skeleton.
#[derive(Debug, Default)]
struct AxisGraph {
    /// Position in XY, clearance to the nearest wall in Z.
    vertices: Vec<Point3>,
    edges: Vec<(usize, usize)>,
    index: HashMap<Point3, usize>,
}

impl AxisGraph {
    fn intern(&mut self, position: (f64, f64), clearance: f64) -> usize {
        let key = Point3::new(position.0, position.1, 0.0);
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        self.vertices.push(Point3::new(position.0, position.1, clearance));
        self.index.insert(key, self.vertices.len() - 1);
        self.vertices.len() - 1
    }

    fn link(&mut self, a: usize, b: usize) {
        if a != b {
            self.edges.push((a, b));
        }
    }

    fn edge_length(&self, (a, b): (usize, usize)) -> f64 {
        self.vertices[a].distance_xy(&self.vertices[b])
    }
}

/// Add the skeleton of `region` to `graph`, sampled every `subdivision`.
fn add_skeleton(graph: &mut AxisGraph, region: &Region, params: &MedialAxisParams) -> Result<()> {
    let polygon = region.to_geo().context("convert region for the medial axis")?;
    let query = RegionQuery::new(region)?;
    let polygon = polygon.simplify(&SIMPLIFY_TOLERANCE);
    let step = params.subdivision.max(EPSILON);
    let wide_enough = |p: (f64, f64)| {
        let clearance = query.distance_to_boundary(p.0, p.1);
        (2.0 * clearance > params.threshold).then_some(clearance)
    };

    // true: exterior counter-clockwise, holes clockwise
    for segment in skeleton_of_polygon_to_linestring(&polygon, true) {
        let coords: Vec<(f64, f64)> = segment.coords_iter().map(|c| (c.x, c.y)).collect();
        for pair in coords.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = (b.0 - a.0).hypot(b.1 - a.1);
            let count = ((length / step).ceil() as usize).max(1);
            let mut previous: Option<usize> = None;
            for i in 0..=count {
                let t = i as f64 / count as f64;
                let p = (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
                let current = wide_enough(p).map(|clearance| graph.intern(p, clearance));
                if let (Some(from), Some(to)) = (previous, current) {
                    graph.link(from, to);
                }
                previous = current;
            }
        }
    }
    Ok(())
}

/// Walk every kept branch into open paths, or a closed one for a loop.
fn branch_paths(graph: &AxisGraph, params: &MedialAxisParams) -> (Vec<Vec<Point3>>, Vec<bool>, Vec<String>) {
    let count = graph.vertices.len();
    let linked: HashSet<(usize, usize)> = graph
        .edges
        .iter()
        .flat_map(|&(a, b)| [(a, b), (b, a)])
        .collect();
    let mut neighbours: Vec<Vec<usize>> = vec![Vec::new(); count];
    for &(a, b) in &graph.edges {
        neighbours[a].push(b);
        neighbours[b].push(a);
    }

    let mut paths = Vec::new();
    let mut closed = Vec::new();
    let mut rejected = Vec::new();
    let components = connected_components(count, &graph.edges);
    for (component, (order, is_cycle)) in components.iter().zip(sorted_islands(count, &graph.edges)) {
        if component.len() < 2 {
            continue;
        }
        let length: f64 = graph
            .edges
            .iter()
            .filter(|(a, _)| component.contains(a))
            .map(|&edge| graph.edge_length(edge))
            .sum();
        if params.do_clean_finish && length < params.threshold {
            rejected.push(format!("axis branch of {length:.3} is shorter than the threshold"));
            continue;
        }

        // the walk jumps back at forks, restart there from an already cut neighbour
        let mut walked = HashSet::new();
        let mut run: Vec<usize> = Vec::new();
        for v in order {
            if let Some(&last) = run.last() {
                if !linked.contains(&(last, v)) {
                    paths.push(std::mem::take(&mut run));
                    closed.push(false);
                }
            }
            if run.is_empty() {
                if let Some(&joint) = neighbours[v].iter().find(|n| walked.contains(*n)) {
                    run.push(joint);
                }
            }
            run.push(v);
            walked.insert(v);
        }
        if run.len() > 1 {
            paths.push(run);
            closed.push(is_cycle);
        }
    }

    let paths = paths
        .into_iter()
        .map(|run| run.into_iter().map(|i| graph.vertices[i]).collect())
        .collect();
    (paths, closed, rejected)
}

/// Axis chains at their cutting depth.
pub fn candidates(params: &MedialAxisParams, ctx: &StrategyContext) -> Result<Candidates> {
    let mut graph = AxisGraph::default();
    for region in footprint(ctx.sources) {
        add_skeleton(&mut graph, &region, params)?;
    }
    let (chains, closed, rejected) = branch_paths(&graph, params);

    let paths: Vec<Path> = chains
        .into_iter()
        .zip(closed)
        .filter(|(chain, _)| chain.len() > 1)
        .map(|(chain, closed)| {
            let points = chain
                .iter()
                .map(|a| {
                    let z = match ctx.cutter.depth_at_radius(a.z) {
                        Some(depth) => (ctx.top - depth).max(ctx.depth_end),
                        None => ctx.depth_end,
                    };
                    a.with_z(z)
                })
                .collect();
            if closed {
                Path::closed(points)
            } else {
                Path::open(points)
            }
        })
        .collect();
    debug!("Medial axis: {} chain(s), {} dropped", paths.len(), rejected.len());
    Ok(Candidates { paths, rejected })
}

pub fn compute(params: &MedialAxisParams, ctx: &StrategyContext, last_position: Point3) -> Result<ComputeResult> {
    let candidates = candidates(params, ctx)?;
    if candidates.paths.is_empty() {
        let mut rejected = candidates.rejected;
        rejected.push("no medial axis wider than the threshold".to_string());
        return Ok(ComputeResult::cancelled(CancelReason::NoValidFeature { rejected }));
    }

    let layers = ctx.layers();
    let mut passes = Vec::new();
    let mut current = last_position;
    for (k, &z) in layers.iter().enumerate() {
        // a chain already at its final depth on the previous layer is skipped
        let deeper: Vec<Path> = candidates
            .paths
            .iter()
            .filter(|path| k == 0 || path.points.iter().any(|p| p.z < layers[k - 1] - EPSILON))
            .map(|path| Path {
                points: path.points.iter().map(|p| p.with_z(p.z.max(z))).collect(),
                closed: path.closed,
            })
            .collect();
        for path in order_curves(deeper, current) {
            let points = path.emit_points();
            if let Some(&end) = points.last() {
                current = end;
            }
            passes.push(points);
        }
    }

    Ok(ComputeResult::finished(link_passes(&passes, ctx.zero, 0.0)).with_diagnostics(candidates.rejected))
}
