use super::layers::{get_layers, intersperse, link_passes};
use super::{Candidates, StrategyContext};
use crate::error::CancelReason;
use crate::geometry::{approx_eq, fit_circle_2d, Path, Point3, EPSILON};
use crate::tsp::order_points;
use crate::types::ComputeResult;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Largest deviation from a perfect circle a hole outline may have, in mm.
pub const CIRCLE_FIT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillParams {
    /// Seconds to wait at the bottom of every hole.
    pub dwell: f64,
}

/// Drill targets found in the sources, and the islands that were rejected.
///
/// Every island whose outline fits a circle at least as wide as the cutter
/// becomes a target at its vertex mean, at the island top (never above Z=0).
pub fn targets(_params: &DrillParams, ctx: &StrategyContext) -> (Vec<Point3>, Vec<String>) {
    let mut targets = Vec::new();
    let mut rejected = Vec::new();

    for (mesh_index, mesh) in ctx.sources.iter().enumerate() {
        for (island_index, island) in mesh.islands().into_iter().enumerate() {
            let label = format!("island {mesh_index}.{island_index}");
            let xy: Vec<(f64, f64)> = island.iter().map(Point3::xy).collect();

            let Some((_, diameter)) = fit_circle_2d(&xy, CIRCLE_FIT_TOLERANCE) else {
                rejected.push(format!("{label}: outline is not circular"));
                continue;
            };
            if ctx.cutter.diameter > diameter + EPSILON {
                rejected.push(format!(
                    "{label}: hole diameter {diameter:.3} is smaller than the cutter ({:.3})",
                    ctx.cutter.diameter
                ));
                continue;
            }

            let n = island.len() as f64;
            let (sx, sy) = xy.iter().fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
            let top = island
                .iter()
                .map(|p| p.z)
                .fold(f64::NEG_INFINITY, f64::max)
                .min(0.0);
            if ctx.depth_end >= top {
                rejected.push(format!(
                    "{label}: depth end {:.3} is not below the hole top {top:.3}",
                    ctx.depth_end
                ));
                continue;
            }
            targets.push(Point3::new(sx / n, sy / n, top));
        }
    }

    (targets, rejected)
}

pub fn candidates(params: &DrillParams, ctx: &StrategyContext) -> Result<Candidates> {
    let (targets, rejected) = targets(params, ctx);
    Ok(Candidates {
        paths: targets.into_iter().map(|t| Path::open(vec![t])).collect(),
        rejected,
    })
}

/// Plunge positions above one target: straight to depth, or a peck cycle
/// returning to the hole top between layers.
fn plunge(target: Point3, ctx: &StrategyContext) -> Vec<Point3> {
    let layers = get_layers(target.z, ctx.layer_size, ctx.depth_end);
    let depths = if layers.len() == 1 {
        layers
    } else {
        intersperse(&layers, target.z)
    };
    depths.into_iter().map(|z| target.with_z(z)).collect()
}

pub fn compute(params: &DrillParams, ctx: &StrategyContext, last_position: Point3) -> Result<ComputeResult> {
    let (targets, rejected) = targets(params, ctx);
    for reason in &rejected {
        warn!("Drill candidate rejected: {}", reason);
    }
    if targets.is_empty() {
        return Ok(ComputeResult::cancelled(CancelReason::NoValidFeature {
            rejected: rejected.clone(),
        })
        .with_diagnostics(rejected));
    }
    debug!("Drilling {} hole(s)", targets.len());

    let passes: Vec<Vec<Point3>> = order_points(&targets, last_position)
        .into_iter()
        .map(|target| plunge(target, ctx))
        .collect();
    let points = link_passes(&passes, ctx.zero, 0.0)
        .into_iter()
        .map(|point| {
            if approx_eq(point.position.z, ctx.depth_end) && !point.is_at_rapid_height() {
                point.with_dwell(params.dwell)
            } else {
                point
            }
        })
        .collect();

    Ok(ComputeResult::finished(points).with_diagnostics(rejected))
}
