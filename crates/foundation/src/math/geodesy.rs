use serde::{Deserialize, Serialize};

/// Mean Earth radius (kilometers) used for all great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;
/// WGS84 semi-major axis (meters). Used by the Web Mercator scale math.
pub const WGS84_A: f64 = 6_378_137.0;

/// Geographic position in degrees.
///
/// Serialized as a `[lng, lat]` pair, matching GeoJSON coordinate order.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Builds a position from a `[lon, lat]` pair, rejecting non-finite or
    /// out-of-range values.
    pub fn from_pair(pair: [f64; 2]) -> Option<Self> {
        let [lng, lat] = pair;
        if !lng.is_finite() || !lat.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some(Self::new(wrap_lng_deg(lng), lat))
    }

    pub fn is_finite(self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }

    pub fn as_pair(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        p.as_pair()
    }
}

/// Wraps a longitude into `[-180, 180)`.
pub fn wrap_lng_deg(lng: f64) -> f64 {
    if !lng.is_finite() {
        return lng;
    }
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -0.0 { 0.0 } else { wrapped }
}

/// Great-circle distance (haversine) in kilometers.
pub fn haversine_km(a: LngLat, b: LngLat) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng * 0.5).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` towards `b`, degrees clockwise from north in `[0, 360)`.
pub fn initial_bearing_deg(a: LngLat, b: LngLat) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Point reached by travelling `distance_km` from `origin` along `bearing_deg`.
pub fn destination_point(origin: LngLat, bearing_deg: f64, distance_km: f64) -> LngLat {
    let delta = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lng1 = origin.lng.to_radians();

    let sin_lat2 = lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();
    let lng2 = lng1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * sin_lat2);

    LngLat::new(wrap_lng_deg(lng2.to_degrees()), lat2.to_degrees())
}

/// Closed ring approximating a circle of `radius_km` around `center`.
///
/// The first vertex is repeated at the end. `steps` is clamped to at least 8.
pub fn circle_ring(center: LngLat, radius_km: f64, steps: usize) -> Vec<LngLat> {
    let steps = steps.max(8);
    let mut ring = Vec::with_capacity(steps + 1);
    for i in 0..steps {
        let bearing = 360.0 * i as f64 / steps as f64;
        ring.push(destination_point(center, bearing, radius_km.max(0.0)));
    }
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

/// Human-readable distance label. Identical in both engines because it is
/// derived from geographic coordinates only.
pub fn format_distance_km(km: f64) -> String {
    if !km.is_finite() || km < 0.0 {
        return "-".to_string();
    }
    if km < 1.0 {
        format!("{} m", (km * 1000.0).round() as i64)
    } else if km < 10.0 {
        format!("{km:.2} km")
    } else if km < 100.0 {
        format!("{km:.1} km")
    } else {
        format!("{} km", group_thousands(km.round() as i64))
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 { format!("-{out}") } else { out }
}
