use foundation::{LngLat, Time, slerp_lng_lat};

use crate::camera::{GlobeView, clamp_percent};

/// Animated move of the stored view: centre along the great circle, zoom
/// eased between the two percents.
#[derive(Debug, Clone, PartialEq)]
pub struct FlyTo {
    from: GlobeView,
    to: GlobeView,
    started: Time,
    duration_ms: u64,
}

impl FlyTo {
    pub fn new(from: GlobeView, target: LngLat, zoom_percent: f64, started: Time, duration_ms: u64) -> Self {
        Self {
            from,
            to: GlobeView::from_center(target, clamp_percent(zoom_percent)),
            started,
            duration_ms,
        }
    }

    pub fn target(&self) -> GlobeView {
        self.to
    }

    /// View at `now` and whether the flight has landed.
    pub fn sample(&self, now: Time) -> (GlobeView, bool) {
        let t = if self.duration_ms == 0 {
            1.0
        } else {
            (now.millis_since(self.started) / self.duration_ms as f64).clamp(0.0, 1.0)
        };
        if t >= 1.0 {
            return (self.to, true);
        }
        let e = ease_in_out_cubic(t);
        let center = slerp_lng_lat(self.from.center(), self.to.center(), e);
        let zoom = self.from.zoom_percent + (self.to.zoom_percent - self.from.zoom_percent) * e;
        (GlobeView::from_center(center, zoom), false)
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn lands_exactly_on_target() {
        let from = GlobeView::new(0.0, 0.0, 10.0);
        let fly = FlyTo::new(from, LngLat::new(90.0, 0.0), 80.0, Time::ZERO, 1000);

        let (start, done) = fly.sample(Time::ZERO);
        assert!(!done);
        assert_close(start.longitude, 0.0, 1e-9);
        assert_close(start.zoom_percent, 10.0, 1e-9);

        let (mid, _) = fly.sample(Time::ZERO.plus_millis(500));
        assert_close(mid.longitude, 45.0, 1e-6);
        assert_close(mid.zoom_percent, 45.0, 1e-9);

        let (end, done) = fly.sample(Time::ZERO.plus_millis(1000));
        assert!(done);
        assert_eq!(end, fly.target());
    }

    #[test]
    fn zero_duration_jumps() {
        let fly = FlyTo::new(GlobeView::default(), LngLat::new(5.0, 5.0), 150.0, Time::ZERO, 0);
        let (view, done) = fly.sample(Time::ZERO);
        assert!(done);
        assert_eq!(view.zoom_percent, 100.0);
    }
}
