//! Affine map solving from three point correspondences.

use crate::foundation::core::{Affine, Point};

/// Triangles whose doubled area falls below this are treated as degenerate.
pub const DET_EPSILON: f64 = 1e-9;

/// Solve the affine map sending each `rest[i]` to `current[i]`.
///
/// Returns `None` when the rest triangle is degenerate (collinear or coincident vertices).
/// The result maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)` with kurbo's `[a, b, c, d, e, f]`
/// coefficient order.
pub fn solve_affine(rest: [Point; 3], current: [Point; 3]) -> Option<Affine> {
    let [p0, p1, p2] = rest;
    let [q0, q1, q2] = current;

    let ta = p1.x - p0.x;
    let tb = p1.y - p0.y;
    let tc = p2.x - p0.x;
    let td = p2.y - p0.y;
    let det = ta * td - tb * tc;
    if !det.is_finite() || det.abs() < DET_EPSILON {
        return None;
    }
    let r = 1.0 / det;

    let da = q1.x - q0.x;
    let db = q1.y - q0.y;
    let dc = q2.x - q0.x;
    let dd = q2.y - q0.y;

    let a = (da * td - dc * tb) * r;
    let b = (db * td - dd * tb) * r;
    let c = (dc * ta - da * tc) * r;
    let d = (dd * ta - db * tc) * r;
    let e = q0.x - a * p0.x - c * p0.y;
    let f = q0.y - b * p0.x - d * p0.y;

    let m = Affine::new([a, b, c, d, e, f]);
    m.is_finite().then_some(m)
}

/// Inverse of `m`, or `None` when `m` collapses area.
pub fn invert_affine(m: Affine) -> Option<Affine> {
    if !m.is_finite() || m.determinant().abs() < DET_EPSILON {
        return None;
    }
    let inv = m.inverse();
    inv.is_finite().then_some(inv)
}

#[cfg(test)]
#[path = "../../tests/unit/render/affine.rs"]
mod tests;
