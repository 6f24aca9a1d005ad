//! Closed-form time-to-impact kernel.
//!
//! Every predictor casts the ray `p + t·r` with `r = max_path · (cos α, sin α)`
//! and accepts parametric roots in `(ε, 1)`, so a returned distance is always
//! positive and below the no-hit bound. Reflective surfaces (rails, arcs)
//! return the root minus `ε`, keeping the particle strictly inside the
//! domain; the non-reflective gate and mid-line crossings are biased by `+ε`
//! in the planner instead, so the particle lands strictly past the boundary.

use crate::core::geometry::{Geometry, Side};
use std::f64::consts::{FRAC_PI_2, PI};

/// Floating tolerance for root acceptance and boundary biasing.
pub const EPS: f64 = 1e-14;

/// A predicted impact on a reflective surface.
#[derive(Debug, Clone, Copy)]
pub struct Impact {
    /// Travel distance to the surface (speed is unit, so also the time).
    pub distance: f64,
    /// Angle of the inward surface normal at the impact point.
    pub normal_angle: f64,
}

/// Specular reflection of `angle_in` about the surface normal.
pub fn reflection_angle(angle_in: f64, normal_angle: f64) -> f64 {
    (2.0 * normal_angle - angle_in + PI) % (2.0 * PI)
}

/// Earliest impact with the top or bottom bridge rail, if any.
///
/// Rails are the segments `y = ±h/2, |x| ≤ L/2`; the 2×2 line-line system is
/// solved for the ray parameter `t` and the segment parameter `u`.
pub fn predict_bridge_hit(geo: &Geometry, x: f64, y: f64, dir: f64) -> Option<Impact> {
    let rx = geo.max_path * dir.cos();
    let ry = geo.max_path * dir.sin();
    let (sx, sy) = (geo.bridge_length, 0.0);
    let qx = -geo.bridge_length / 2.0;
    let q_bottom = -geo.bridge_height / 2.0;
    let q_top = geo.bridge_height / 2.0;
    // u = (q − p) × r / (r × s), t = (q − p) × s / (r × s)
    let denom = rx * sy - ry * sx;
    let u1 = ((qx - x) * ry - (q_bottom - y) * rx) / denom;
    let u2 = ((qx - x) * ry - (q_top - y) * rx) / denom;
    let t1 = ((qx - x) * sy - (q_bottom - y) * sx) / denom;
    let t2 = ((qx - x) * sy - (q_top - y) * sx) / denom;

    let mut min_t = 1.0;
    let mut normal = None;
    if EPS < t1 && t1 < min_t && (0.0..=1.0).contains(&u1) {
        min_t = t1 - EPS;
        normal = Some(FRAC_PI_2);
    }
    if EPS < t2 && t2 < min_t && (0.0..=1.0).contains(&u2) {
        min_t = t2 - EPS;
        normal = Some(-FRAC_PI_2);
    }
    normal.map(|normal_angle| Impact {
        distance: min_t * geo.max_path,
        normal_angle,
    })
}

/// Parametric roots of the ray against the circle centered at `center_x`,
/// or `None` when the ray misses it. Roots are ordered, may be negative, and
/// are expressed in units of `max_path`.
fn circle_intersections(geo: &Geometry, x: f64, y: f64, dir: f64, center_x: f64) -> Option<(f64, f64)> {
    let r = geo.circle_radius;
    let px = (x - center_x) / r;
    let py = y / r;
    let add_x = geo.max_path * dir.cos() / r;
    let add_y = geo.max_path * dir.sin() / r;
    let a = add_x * add_x + add_y * add_y;
    let b = 2.0 * (px * add_x + py * add_y);
    let c = px * px + py * py - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    Some(((-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)))
}

/// Earliest impact with the reservoir arc on `side`, if any.
///
/// Roots whose impact point lies inside the bridge rectangle are rejected:
/// there the arc is an opening (the gate), not a wall.
pub fn predict_circle_hit(geo: &Geometry, x: f64, y: f64, dir: f64, side: Side) -> Option<Impact> {
    let center_x = geo.center_x(side);
    let (t1, t2) = circle_intersections(geo, x, y, dir, center_x)?;
    let add_x = geo.max_path * dir.cos();
    let add_y = geo.max_path * dir.sin();

    let mut min_t = 1.0;
    let mut normal = None;
    for t in [t1, t2] {
        if EPS < t && t < min_t {
            let ix = x + t * add_x;
            let iy = y + t * add_y;
            if !geo.in_bridge(ix, iy) {
                normal = Some((0.0 - iy).atan2(center_x - ix));
                min_t = t - EPS;
            }
        }
    }
    normal.map(|normal_angle| Impact {
        distance: min_t * geo.max_path,
        normal_angle,
    })
}

/// Travel distance to the gate aperture, if the ray reaches it.
///
/// Flat gate: the earliest positive crossing of the planes `x = ±L/2`.
/// Arc gate: the circle intersections whose impact point lies inside the
/// bridge rectangle — the complement of [`predict_circle_hit`]'s acceptance.
/// Gate crossings are non-reflective resync events.
pub fn predict_gate_crossing(geo: &Geometry, x: f64, y: f64, dir: f64) -> Option<f64> {
    if geo.gate_is_flat {
        let mut min_path = geo.max_path;
        let mut hit = false;
        for plane_x in [-geo.bridge_length / 2.0, geo.bridge_length / 2.0] {
            let t = (plane_x - x) / dir.cos();
            if t > 0.0 && t < min_path {
                min_path = t;
                hit = true;
            }
        }
        hit.then_some(min_path)
    } else {
        let add_x = geo.max_path * dir.cos();
        let add_y = geo.max_path * dir.sin();
        let mut min_t = 1.0;
        let mut hit = false;
        for side in Side::BOTH {
            let Some((t1, t2)) = circle_intersections(geo, x, y, dir, geo.center_x(side)) else {
                continue;
            };
            for t in [t1, t2] {
                if EPS < t && t < min_t && geo.in_bridge(x + t * add_x, y + t * add_y) {
                    min_t = t;
                    hit = true;
                }
            }
        }
        hit.then_some(min_t * geo.max_path)
    }
}

/// Travel distance to the mid-line segment `x = 0, |y| ≤ h/2`, if crossed.
///
/// A synthetic, non-reflective event: it only exists so the left-side count
/// flips at the exact crossing instant.
pub fn predict_middle_crossing(geo: &Geometry, x: f64, y: f64, dir: f64) -> Option<f64> {
    let rx = geo.max_path * dir.cos();
    let ry = geo.max_path * dir.sin();
    let (sx, sy) = (0.0, geo.bridge_height);
    let qy = -geo.bridge_height / 2.0;
    let denom = rx * sy - ry * sx;
    let u = ((0.0 - x) * ry - (qy - y) * rx) / denom;
    let t = ((0.0 - x) * sy - (qy - y) * sx) / denom;
    (EPS < t && t < 1.0 && (0.0..=1.0).contains(&u)).then(|| (t + EPS) * geo.max_path)
}
