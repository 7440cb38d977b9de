//! Engine-neutral camera pose and its mapping onto each engine.
//!
//! `zoom_percent` is the one stored zoom value. The sphere distance and the
//! tile zoom are derived from it through fixed piecewise-linear maps with a
//! knee at the switch threshold; reading a pose back from an engine prefers
//! the stored percent whenever the engine still sits where that percent
//! put it, so repeated switches cannot drift.

use foundation::LngLat;
use serde::{Deserialize, Serialize};

/// Sphere camera distance (globe radius 1) at 0 %.
pub const MAX_DIST: f64 = 4.0;
/// Sphere camera distance at the knee.
pub const MID_DIST: f64 = 1.35;
/// Sphere camera distance at 100 %.
pub const MIN_DIST: f64 = 1.02;

pub const TILE_MIN_ZOOM: f64 = 1.0;
pub const TILE_MID_ZOOM: f64 = 3.0;
pub const TILE_MAX_ZOOM: f64 = 18.0;

/// zoomPercent of the knee in both maps.
pub const KNEE_PERCENT: f64 = 66.0;

/// Tolerance for recognising an engine pose as the image of the stored percent.
const ANCHOR_EPSILON: f64 = 1e-9;

/// Clamps to `[0, 100]`; `NaN` becomes 0.
pub fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }
}

/// Evaluates a two-segment linear map with its knee at [`KNEE_PERCENT`].
fn knee_map(p: f64, at0: f64, at_knee: f64, at100: f64) -> f64 {
    let p = clamp_percent(p);
    if p <= KNEE_PERCENT {
        at0 + (at_knee - at0) * (p / KNEE_PERCENT)
    } else {
        at_knee + (at100 - at_knee) * ((p - KNEE_PERCENT) / (100.0 - KNEE_PERCENT))
    }
}

/// Inverse of [`knee_map`] for a monotonic map.
fn knee_inverse(v: f64, at0: f64, at_knee: f64, at100: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    let (lo, hi) = if at0 < at100 { (at0, at100) } else { (at100, at0) };
    let v = v.clamp(lo, hi);
    let first = if at0 < at_knee {
        v <= at_knee
    } else {
        v >= at_knee
    };
    let p = if first {
        KNEE_PERCENT * (v - at0) / (at_knee - at0)
    } else {
        KNEE_PERCENT + (100.0 - KNEE_PERCENT) * (v - at_knee) / (at100 - at_knee)
    };
    clamp_percent(p)
}

pub fn percent_to_distance(p: f64) -> f64 {
    knee_map(p, MAX_DIST, MID_DIST, MIN_DIST)
}

pub fn distance_to_percent(d: f64) -> f64 {
    knee_inverse(d, MAX_DIST, MID_DIST, MIN_DIST)
}

pub fn percent_to_tile_zoom(p: f64) -> f64 {
    knee_map(p, TILE_MIN_ZOOM, TILE_MID_ZOOM, TILE_MAX_ZOOM)
}

pub fn tile_zoom_to_percent(z: f64) -> f64 {
    knee_inverse(z, TILE_MIN_ZOOM, TILE_MID_ZOOM, TILE_MAX_ZOOM)
}

/// The single camera descriptor both engines are driven from.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobeView {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom_percent: f64,
}

impl Default for GlobeView {
    fn default() -> Self {
        Self {
            latitude: 20.0,
            longitude: 10.0,
            zoom_percent: 0.0,
        }
    }
}

impl GlobeView {
    /// Builds a sanitized view: zoom clamped, latitude clamped, longitude
    /// wrapped. Non-finite coordinates fall back to 0.
    pub fn new(latitude: f64, longitude: f64, zoom_percent: f64) -> Self {
        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            latitude: finite_or_zero(latitude).clamp(-90.0, 90.0),
            longitude: foundation::wrap_lng_deg(finite_or_zero(longitude)),
            zoom_percent: clamp_percent(zoom_percent),
        }
    }

    pub fn from_center(center: LngLat, zoom_percent: f64) -> Self {
        Self::new(center.lat, center.lng, zoom_percent)
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }
}

/// Sphere engine camera: look-at point on the globe and eye distance.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpherePose {
    pub center: LngLat,
    pub distance: f64,
}

/// Tile engine camera: map center and continuous zoom level.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilePose {
    pub center: LngLat,
    pub zoom: f64,
}

/// Holds the authoritative [`GlobeView`] and converts it to and from engine
/// poses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraViewModel {
    view: GlobeView,
}

impl CameraViewModel {
    pub fn new(view: GlobeView) -> Self {
        Self {
            view: GlobeView::new(view.latitude, view.longitude, view.zoom_percent),
        }
    }

    pub fn view(&self) -> GlobeView {
        self.view
    }

    pub fn zoom_percent(&self) -> f64 {
        self.view.zoom_percent
    }

    /// Returns `true` if the stored view changed.
    pub fn set_view(&mut self, view: GlobeView) -> bool {
        let view = GlobeView::new(view.latitude, view.longitude, view.zoom_percent);
        let changed = view != self.view;
        self.view = view;
        changed
    }

    /// Moves the look-at point, keeping the zoom.
    pub fn set_center(&mut self, center: LngLat) -> bool {
        self.set_view(GlobeView::from_center(center, self.view.zoom_percent))
    }

    /// Returns `true` if the stored zoom changed.
    pub fn set_zoom_percent(&mut self, zoom_percent: f64) -> bool {
        let next = clamp_percent(zoom_percent);
        let changed = next != self.view.zoom_percent;
        self.view.zoom_percent = next;
        changed
    }

    pub fn to_engine_a(&self, view: &GlobeView) -> SpherePose {
        SpherePose {
            center: view.center(),
            distance: percent_to_distance(view.zoom_percent),
        }
    }

    pub fn to_engine_b(&self, view: &GlobeView) -> TilePose {
        TilePose {
            center: view.center(),
            zoom: percent_to_tile_zoom(view.zoom_percent),
        }
    }

    /// Reads a tile pose back into a view. The stored percent wins when the
    /// tile zoom is still its image.
    pub fn from_engine_b(&self, pose: TilePose) -> GlobeView {
        let stored = self.view.zoom_percent;
        let zoom_percent = if (pose.zoom - percent_to_tile_zoom(stored)).abs() <= ANCHOR_EPSILON {
            stored
        } else {
            tile_zoom_to_percent(pose.zoom)
        };
        GlobeView::from_center(pose.center, zoom_percent)
    }

    /// Sphere counterpart of [`from_engine_b`](Self::from_engine_b).
    pub fn from_engine_a(&self, pose: SpherePose) -> GlobeView {
        let stored = self.view.zoom_percent;
        let zoom_percent = if (pose.distance - percent_to_distance(stored)).abs() <= ANCHOR_EPSILON {
            stored
        } else {
            distance_to_percent(pose.distance)
        };
        GlobeView::from_center(pose.center, zoom_percent)
    }
}
