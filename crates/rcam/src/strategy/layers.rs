//! Z layering and pass linking shared by every strategy.

use crate::geometry::{approx_eq, Path, Point3, EPSILON};
use crate::types::{ComputedPoint, MachineState, MovementKind, SpindleDirection};

/// Values from `start` towards `end` (exclusive) in increments of `step`.
///
/// Empty when `step` is zero or points away from `end`.
pub fn seq(start: f64, end: f64, step: f64) -> Vec<f64> {
    if step.abs() < EPSILON {
        return Vec::new();
    }
    let ratio = (end - start) / step;
    if ratio <= 0.0 {
        return Vec::new();
    }
    let count = (ratio - 1e-9).ceil() as usize;
    (0..count).map(|i| start + i as f64 * step).collect()
}

/// Z heights of the passes from `top` down to `depth_end`, always ending at
/// `depth_end`. A `layer_size` of zero yields the single final pass.
pub fn get_layers(top: f64, layer_size: f64, depth_end: f64) -> Vec<f64> {
    let mut layers = if layer_size > EPSILON {
        seq(top - layer_size, depth_end, -layer_size)
    } else {
        Vec::new()
    };
    layers.push(depth_end);
    layers
}

/// `items` with `delim` placed between every pair of neighbours.
pub fn intersperse<T: Clone>(items: &[T], delim: T) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len() * 2);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(delim.clone());
        }
        out.push(item.clone());
    }
    out
}

/// Winding a ring must have to be cut with the configured movement, or
/// `None` when the movement keeps rings as they are.
///
/// Climb milling with a clockwise spindle cuts exterior rings
/// counter-clockwise and interior rings clockwise. Conventional milling and a
/// counter-clockwise spindle each mirror the result.
pub fn desired_ccw(exterior: bool, movement: MovementKind, spindle: SpindleDirection) -> Option<bool> {
    let conventional = match movement {
        MovementKind::Climb => false,
        MovementKind::Conventional => true,
        MovementKind::Meander => return None,
    };
    let ccw_spindle = spindle == SpindleDirection::CounterClockwise;
    Some(exterior ^ conventional ^ ccw_spindle)
}

/// Whether `path` has to be reversed before being cut.
pub fn do_reverse(
    path: &Path,
    exterior: bool,
    movement: MovementKind,
    spindle: SpindleDirection,
) -> bool {
    match desired_ccw(exterior, movement, spindle) {
        Some(ccw) => path.closed && path.points.len() > 2 && path.is_ccw() != ccw,
        None => false,
    }
}

pub fn orient(path: Path, exterior: bool, movement: MovementKind, spindle: SpindleDirection) -> Path {
    if do_reverse(&path, exterior, movement, spindle) {
        path.reversed()
    } else {
        path
    }
}

/// Attach the operation's machine state to bare positions.
pub fn annotate(points: impl IntoIterator<Item = Point3>, zero: MachineState) -> Vec<ComputedPoint> {
    points
        .into_iter()
        .map(|p| ComputedPoint::new(p, zero))
        .collect()
}

/// Chain cut passes into one annotated point list.
///
/// The tool approaches the first pass and leaves the last at rapid height.
/// Consecutive passes whose end and start lie within `adjacency` (XY) are
/// joined directly at depth, others through a rapid-height travel pair.
pub fn link_passes(passes: &[Vec<Point3>], zero: MachineState, adjacency: f64) -> Vec<ComputedPoint> {
    let rapid = zero.rapid_height;
    let mut points: Vec<Point3> = Vec::new();

    for pass in passes.iter().filter(|pass| !pass.is_empty()) {
        let start = pass[0];
        match points.last().copied() {
            None => points.push(start.with_z(rapid)),
            Some(end) => {
                let adjacent = end.same_xy(&start) || end.distance_xy(&start) <= adjacency;
                if !adjacent {
                    if !approx_eq(end.z, rapid) {
                        points.push(end.with_z(rapid));
                    }
                    points.push(start.with_z(rapid));
                }
            }
        }
        points.extend_from_slice(pass);
    }

    if let Some(end) = points.last().copied() {
        if !approx_eq(end.z, rapid) {
            points.push(end.with_z(rapid));
        }
    }

    annotate(points, zero)
}

/// Copies of `pass` at every layer height. Points lying above a layer keep
/// their own height.
pub fn stack_layers(pass: &[Point3], layers: &[f64]) -> Vec<Vec<Point3>> {
    layers
        .iter()
        .map(|&z| pass.iter().map(|p| p.with_z(p.z.max(z))).collect())
        .collect()
}
