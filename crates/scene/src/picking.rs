use foundation::math::Vec3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

/// Nearest intersection of `ray` with a sphere at the origin.
///
/// Returns the ray parameter of the entry point, or the exit point when the
/// origin is inside the sphere. `None` for a miss or a degenerate ray.
pub fn ray_sphere_hit_t(ray: Ray, radius: f64) -> Option<f64> {
    let dir = ray.dir.normalized()?;
    let b = ray.origin.dot(dir);
    let c = ray.origin.dot(ray.origin) - radius * radius;
    let disc = b * b - c;
    if !disc.is_finite() || disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t0 = -b - sq;
    let t1 = -b + sq;
    let t = if t0 >= 0.0 { t0 } else { t1 };
    // Scale back to the caller's (possibly unnormalized) direction.
    (t >= 0.0).then(|| t / ray.dir.length())
}

/// Something that can be hit in screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenCandidate<K> {
    pub key: K,
    pub screen_px: [f64; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenHit<K> {
    pub key: K,
    pub distance_px: f64,
}

/// Closest candidate within `radius_px` of `cursor_px`.
///
/// Ordering contract:
/// - The smallest screen distance wins.
/// - Equal distances are broken by the smaller key, so the result does not
///   depend on input order.
/// - Candidates with non-finite screen positions are ignored.
pub fn pick_nearest<K, I>(candidates: I, cursor_px: [f64; 2], radius_px: f64) -> Option<ScreenHit<K>>
where
    K: Ord,
    I: IntoIterator<Item = ScreenCandidate<K>>,
{
    if !cursor_px[0].is_finite() || !cursor_px[1].is_finite() || radius_px.is_nan() || radius_px < 0.0 {
        return None;
    }

    let mut best: Option<ScreenHit<K>> = None;
    for c in candidates {
        let dx = c.screen_px[0] - cursor_px[0];
        let dy = c.screen_px[1] - cursor_px[1];
        let d = (dx * dx + dy * dy).sqrt();
        if !d.is_finite() || d > radius_px {
            continue;
        }
        let replace = match &best {
            None => true,
            Some(b) => d
                .total_cmp(&b.distance_px)
                .then_with(|| c.key.cmp(&b.key))
                .is_lt(),
        };
        if replace {
            best = Some(ScreenHit {
                key: c.key,
                distance_px: d,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(key: u32, x: f64, y: f64) -> ScreenCandidate<u32> {
        ScreenCandidate {
            key,
            screen_px: [x, y],
        }
    }

    #[test]
    fn picks_closest_within_radius() {
        let hit = pick_nearest(
            vec![cand(1, 10.0, 10.0), cand(2, 13.0, 14.0), cand(3, 2.0, 2.0)],
            [12.0, 12.0],
            8.0,
        )
        .expect("hit");
        assert_eq!(hit.key, 2);

        assert!(pick_nearest(vec![cand(1, 100.0, 100.0)], [0.0, 0.0], 8.0).is_none());
    }

    #[test]
    fn tie_breaks_by_key_regardless_of_order() {
        let a = pick_nearest(vec![cand(5, 3.0, 0.0), cand(4, -3.0, 0.0)], [0.0, 0.0], 8.0);
        let b = pick_nearest(vec![cand(4, -3.0, 0.0), cand(5, 3.0, 0.0)], [0.0, 0.0], 8.0);
        assert_eq!(a.map(|h| h.key), Some(4));
        assert_eq!(b.map(|h| h.key), Some(4));
    }

    #[test]
    fn ignores_non_finite_candidates() {
        let hit = pick_nearest(
            vec![cand(1, f64::NAN, 0.0), cand(2, 1.0, 0.0)],
            [0.0, 0.0],
            8.0,
        );
        assert_eq!(hit.map(|h| h.key), Some(2));
    }

    #[test]
    fn ray_hits_unit_sphere_front_face() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, -1.0));
        let t = ray_sphere_hit_t(ray, 1.0).expect("hit");
        assert!((t - 2.0).abs() < 1e-12);
        assert!((ray.at(t).z - 1.0).abs() < 1e-12);

        let miss = Ray::new(Vec3::new(0.0, 2.0, 3.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(ray_sphere_hit_t(miss, 1.0).is_none());

        let behind = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(ray_sphere_hit_t(behind, 1.0).is_none());
    }
}
