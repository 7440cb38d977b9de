//! Unit-sphere conversions and great-circle interpolation.
//!
//! Globe space is a permuted ECEF with y up: `(cos φ cos λ, sin φ, -cos φ sin λ)`.
//! East (+λ) therefore corresponds to -z.

use super::{LngLat, Vec3, wrap_lng_deg};

/// Angular separation (radians) below which two points are treated as one.
pub const SAME_POINT_EPSILON_RAD: f64 = 1e-9;

pub fn lng_lat_to_unit(p: LngLat) -> Vec3 {
    let lng = p.lng.to_radians();
    let lat = p.lat.to_radians();
    let cos_lat = lat.cos();
    Vec3::new(cos_lat * lng.cos(), lat.sin(), -cos_lat * lng.sin())
}

/// Inverse of [`lng_lat_to_unit`]. The input need not be normalized.
pub fn unit_to_lng_lat(v: Vec3) -> Option<LngLat> {
    let u = v.normalized()?;
    let lng = (-u.z).atan2(u.x).to_degrees();
    let lat = u.y.clamp(-1.0, 1.0).asin().to_degrees();
    Some(LngLat::new(wrap_lng_deg(lng), lat))
}

/// Central angle between two unit vectors (radians).
pub fn angle_between(a: Vec3, b: Vec3) -> f64 {
    // atan2 form stays accurate for tiny and near-antipodal angles.
    a.cross(b).length().atan2(a.dot(b))
}

/// Spherical linear interpolation between two unit vectors.
pub fn slerp_unit(a: Vec3, b: Vec3, t: f64) -> Vec3 {
    let omega = angle_between(a, b);
    let sin_omega = omega.sin();
    if sin_omega.abs() < 1e-9 {
        return a.lerp(b, t).normalized().unwrap_or(a);
    }
    let a_scale = ((1.0 - t) * omega).sin() / sin_omega;
    let b_scale = (t * omega).sin() / sin_omega;
    a.scale(a_scale) + b.scale(b_scale)
}

/// Slerp between two geographic positions.
pub fn slerp_lng_lat(a: LngLat, b: LngLat, t: f64) -> LngLat {
    let u = slerp_unit(lng_lat_to_unit(a), lng_lat_to_unit(b), t);
    unit_to_lng_lat(u).unwrap_or(a)
}

/// Points along the great circle from `a` to `b`, both endpoints included.
///
/// Coincident (or near-coincident) inputs yield a single-point sequence.
/// Antipodal inputs have no unique great circle; the path then runs through
/// the pole nearest to `a`.
pub fn great_circle_points(a: LngLat, b: LngLat, segments: usize) -> Vec<LngLat> {
    let ua = lng_lat_to_unit(a);
    let ub = lng_lat_to_unit(b);
    let omega = angle_between(ua, ub);
    if !omega.is_finite() || omega < SAME_POINT_EPSILON_RAD {
        return vec![a];
    }

    let segments = segments.max(1);
    let mut out = Vec::with_capacity(segments + 1);
    out.push(a);

    if (std::f64::consts::PI - omega) < 1e-9 {
        let pole = if a.lat >= 0.0 {
            LngLat::new(a.lng, 90.0)
        } else {
            LngLat::new(a.lng, -90.0)
        };
        let half = segments.div_ceil(2);
        let first = great_circle_points(a, pole, half);
        let second = great_circle_points(pole, b, segments - half.min(segments));
        out.extend(first.into_iter().skip(1));
        out.extend(second.into_iter().skip(1));
        return out;
    }

    for i in 1..segments {
        let t = i as f64 / segments as f64;
        let u = slerp_unit(ua, ub, t);
        if let Some(p) = unit_to_lng_lat(u) {
            out.push(p);
        }
    }
    out.push(b);
    out
}

/// Segment count giving roughly one vertex per degree of arc, bounded.
pub fn great_circle_segments(a: LngLat, b: LngLat) -> usize {
    let deg = angle_between(lng_lat_to_unit(a), lng_lat_to_unit(b)).to_degrees();
    (deg.ceil() as usize).clamp(2, 180)
}
