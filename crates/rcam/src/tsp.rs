//! Travel ordering for cut features.
//!
//! Greedy nearest-neighbour tours over points and curves. Distances are
//! measured in the XY plane only. Ties go to the candidate that comes first in
//! the input, so identical input always yields the identical tour.

use crate::geometry::{approx_eq, Path, Point3};

/// Order `points` by repeatedly visiting the nearest unvisited one, starting
/// from `start`.
pub fn order_points(points: &[Point3], start: Point3) -> Vec<Point3> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut order = Vec::with_capacity(points.len());
    let mut current = start;

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (slot, &index) in remaining.iter().enumerate() {
            let distance = current.distance_xy(&points[index]);
            if distance < best_distance {
                best = slot;
                best_distance = distance;
            }
        }
        let next = points[remaining.remove(best)];
        order.push(next);
        current = next;
    }

    order
}

/// Closest point of segment `a-b` to `p` in XY, with Z interpolated, and the
/// segment parameter.
fn closest_on_segment(a: Point3, b: Point3, p: Point3) -> (Point3, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-20 {
        return (a, 0.0);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    (a.lerp(&b, t), t)
}

/// Nearest entry point of `path` to `p` and its XY distance.
///
/// Any boundary point qualifies for closed paths; open paths can only be
/// entered at one of their ends.
pub fn nearest_on_path(path: &Path, p: Point3) -> Option<(Point3, f64)> {
    if path.closed && path.points.len() > 1 {
        path.segments()
            .into_iter()
            .map(|(a, b)| {
                let (q, _) = closest_on_segment(a, b, p);
                (q, q.distance_xy(&p))
            })
            .fold(None, |best: Option<(Point3, f64)>, cand| match best {
                Some(b) if b.1 <= cand.1 => Some(b),
                _ => Some(cand),
            })
    } else {
        let first = path.points.first()?;
        let last = path.points.last()?;
        let (d_first, d_last) = (first.distance_xy(&p), last.distance_xy(&p));
        if d_last < d_first {
            Some((*last, d_last))
        } else {
            Some((*first, d_first))
        }
    }
}

/// Restart a closed path at the boundary point `at`.
///
/// `at` becomes a vertex when it falls inside a segment. Repeated points are
/// removed. Open paths are returned unchanged.
pub fn reroot(path: &Path, at: Point3) -> Path {
    if !path.closed || path.points.len() < 2 {
        return path.clone();
    }

    let n = path.points.len();
    let (mut best_index, mut best_t, mut best_distance) = (0, 0.0, f64::INFINITY);
    for i in 0..n {
        let (q, t) = closest_on_segment(path.points[i], path.points[(i + 1) % n], at);
        let distance = q.distance_xy(&at);
        if distance < best_distance {
            best_index = i;
            best_t = t;
            best_distance = distance;
        }
    }

    let mut points = Vec::with_capacity(n + 1);
    let start_vertex = if approx_eq(best_t, 1.0) {
        (best_index + 1) % n
    } else {
        best_index
    };
    if approx_eq(best_t, 0.0) || approx_eq(best_t, 1.0) {
        points.extend((0..n).map(|k| path.points[(start_vertex + k) % n]));
    } else {
        let a = path.points[best_index];
        let b = path.points[(best_index + 1) % n];
        points.push(a.lerp(&b, best_t));
        points.extend((1..=n).map(|k| path.points[(best_index + k) % n]));
    }
    points.dedup();
    Path::closed(points)
}

/// Order curves by nearest entry point, starting from `start`.
///
/// Closed curves are rerooted at their nearest point, open curves are flipped
/// so the nearer end comes first. The current position then advances to the
/// chosen curve's start.
pub fn order_curves(curves: Vec<Path>, start: Point3) -> Vec<Path> {
    let mut remaining: Vec<Path> = curves.into_iter().filter(|c| !c.is_empty()).collect();
    let mut order = Vec::with_capacity(remaining.len());
    let mut current = start;

    while !remaining.is_empty() {
        let mut best: Option<(usize, Point3, f64)> = None;
        for (index, curve) in remaining.iter().enumerate() {
            if let Some((entry, distance)) = nearest_on_path(curve, current) {
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((index, entry, distance));
                }
            }
        }
        let Some((index, entry, _)) = best else {
            break;
        };

        let curve = remaining.remove(index);
        let curve = if curve.closed {
            reroot(&curve, entry)
        } else if curve.last() == Some(entry) && curve.first() != Some(entry) {
            curve.reversed()
        } else {
            curve
        };
        if let Some(first) = curve.first() {
            current = first;
        }
        order.push(curve);
    }

    order
}

/// XY length of an open tour through `points`.
pub fn tour_length(points: &[Point3]) -> f64 {
    points.windows(2).map(|w| w[0].distance_xy(&w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 0.0)
    }

    #[test]
    fn test_order_points_greedy() {
        let points = [p(10.0, 0.0), p(1.0, 0.0), p(5.0, 0.0), p(2.0, 0.0)];
        let order = order_points(&points, p(0.0, 0.0));
        assert_eq!(order, vec![p(1.0, 0.0), p(2.0, 0.0), p(5.0, 0.0), p(10.0, 0.0)]);
    }

    #[test]
    fn test_order_points_ignores_z() {
        let points = [Point3::new(3.0, 0.0, -100.0), Point3::new(4.0, 0.0, 0.0)];
        let order = order_points(&points, p(0.0, 0.0));
        assert_eq!(order[0].z, -100.0);
    }

    #[test]
    fn test_order_points_degenerate() {
        assert!(order_points(&[], p(0.0, 0.0)).is_empty());
        assert_eq!(order_points(&[p(3.0, 4.0)], p(0.0, 0.0)), vec![p(3.0, 4.0)]);
    }

    #[test]
    fn test_reroot_inside_segment() {
        let square = Path::closed(vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);
        let rerooted = reroot(&square, p(10.0, 4.0));
        assert_eq!(
            rerooted.points,
            vec![p(10.0, 4.0), p(10.0, 10.0), p(0.0, 10.0), p(0.0, 0.0), p(10.0, 0.0)]
        );
        assert!(rerooted.closed);
    }

    #[test]
    fn test_reroot_at_vertex() {
        let square = Path::closed(vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)]);
        let rerooted = reroot(&square, p(10.0, 10.0));
        assert_eq!(rerooted.points[0], p(10.0, 10.0));
        assert_eq!(rerooted.points.len(), 4);
    }

    #[test]
    fn test_order_curves_reroots_and_flips() {
        let far_square = Path::closed(vec![p(20.0, 0.0), p(30.0, 0.0), p(30.0, 10.0), p(20.0, 10.0)]);
        let line = Path::open(vec![p(5.0, 5.0), p(1.0, 1.0)]);
        let order = order_curves(vec![far_square, line], p(0.0, 0.0));
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].first(), Some(p(1.0, 1.0)), "line flipped to nearer end");
        // from (1, 1) the square is entered on its left edge
        assert_eq!(order[1].first(), Some(p(20.0, 1.0)));
    }
}
