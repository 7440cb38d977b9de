use serde::{Deserialize, Serialize};

use crate::math::LngLat;

/// Geographic bounding box in degrees (`west <= east`, no antimeridian wrap).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Bounds of a set of points; `None` when no point is finite.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LngLat>) -> Option<Self> {
        let mut out: Option<Self> = None;
        for p in points {
            if !p.is_finite() {
                continue;
            }
            out = Some(match out {
                None => Self::new(p.lng, p.lat, p.lng, p.lat),
                Some(b) => b.extended(*p),
            });
        }
        out
    }

    pub fn extended(self, p: LngLat) -> Self {
        Self::new(
            self.west.min(p.lng),
            self.south.min(p.lat),
            self.east.max(p.lng),
            self.north.max(p.lat),
        )
    }

    pub fn union(self, other: Self) -> Self {
        Self::new(
            self.west.min(other.west),
            self.south.min(other.south),
            self.east.max(other.east),
            self.north.max(other.north),
        )
    }

    pub fn contains(&self, p: LngLat) -> bool {
        p.lng >= self.west && p.lng <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    pub fn center(&self) -> LngLat {
        LngLat::new((self.west + self.east) * 0.5, (self.south + self.north) * 0.5)
    }
}

/// Even-odd ray-casting test in lng/lat space.
///
/// Rings may be open or closed; a closing duplicate vertex is harmless.
pub fn point_in_ring(p: LngLat, ring: &[LngLat]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = (b.lng - a.lng) * (p.lat - a.lat) / (b.lat - a.lat) + a.lng;
            if p.lng < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Polygon with holes: inside the outer ring and outside every hole.
pub fn point_in_polygon(p: LngLat, rings: &[Vec<LngLat>]) -> bool {
    let Some((outer, holes)) = rings.split_first() else {
        return false;
    };
    point_in_ring(p, outer) && !holes.iter().any(|h| point_in_ring(p, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(w: f64, s: f64, e: f64, n: f64) -> Vec<LngLat> {
        vec![
            LngLat::new(w, s),
            LngLat::new(e, s),
            LngLat::new(e, n),
            LngLat::new(w, n),
            LngLat::new(w, s),
        ]
    }

    #[test]
    fn bounds_from_points_skips_non_finite() {
        let pts = [
            LngLat::new(1.0, 2.0),
            LngLat::new(f64::NAN, 0.0),
            LngLat::new(-3.0, 5.0),
        ];
        let b = GeoBounds::from_points(&pts).expect("bounds");
        assert_eq!(b, GeoBounds::new(-3.0, 2.0, 1.0, 5.0));
        assert!(GeoBounds::from_points(&[] as &[LngLat]).is_none());
    }

    #[test]
    fn polygon_with_hole() {
        let rings = vec![square(0.0, 0.0, 10.0, 10.0), square(4.0, 4.0, 6.0, 6.0)];
        assert!(point_in_polygon(LngLat::new(1.0, 1.0), &rings));
        assert!(!point_in_polygon(LngLat::new(5.0, 5.0), &rings));
        assert!(!point_in_polygon(LngLat::new(11.0, 5.0), &rings));
    }
}
