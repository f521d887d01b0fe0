//! Algebraic least-squares circle fitting.

use nalgebra::{Matrix3, Vector3};

/// Fit a circle through `points`.
///
/// Solves the normal equations of `x² + y² = 2·cx·x + 2·cy·y + k` and returns
/// `(center, diameter)`. Returns `None` for fewer than three points, for a
/// degenerate (collinear) point set, or when the population standard
/// deviation of the point-to-center distances exceeds `tolerance`.
pub fn fit_circle_2d(points: &[(f64, f64)], tolerance: f64) -> Option<((f64, f64), f64)> {
    if points.len() < 3 {
        return None;
    }

    // Center the data first, the normal matrix is badly conditioned far from
    // the origin.
    let n = points.len() as f64;
    let (mx, my) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let (mx, my) = (mx / n, my / n);

    let mut normal = Matrix3::zeros();
    let mut rhs = Vector3::zeros();
    for &(px, py) in points {
        let (x, y) = (px - mx, py - my);
        let row = Vector3::new(x, y, 1.0);
        normal += row * row.transpose();
        rhs += row * (x * x + y * y);
    }

    // collinear points leave the normal matrix singular
    if normal.determinant().abs() <= f64::EPSILON * normal.norm().powi(3) {
        return None;
    }
    let c = normal.lu().solve(&rhs)?;
    let (xc, yc) = (c[0] / 2.0, c[1] / 2.0);
    let radius_sq = c[2] + xc * xc + yc * yc;
    if radius_sq <= 0.0 || !radius_sq.is_finite() {
        return None;
    }

    let center = (xc + mx, yc + my);
    let radii: Vec<f64> = points
        .iter()
        .map(|(x, y)| (x - center.0).hypot(y - center.1))
        .collect();
    let mean = radii.iter().sum::<f64>() / n;
    let variance = radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    if variance.sqrt() > tolerance {
        return None;
    }

    Some((center, 2.0 * radius_sq.sqrt()))
}
