//! Sphere engine adapter (engine A).
//!
//! Owns the orbit camera and everything the host renderer needs to draw the
//! globe: marker layers, overlay primitives and label draws. GPU residency is
//! modelled as a single flag; losing the context drops every piece of
//! derived geometry, and nothing is patched back in place.

use std::collections::BTreeMap;

use foundation::{LngLat, Time, Vec3};
use layers::{EngineKind, LabelDraw, MarkerSet, OverlayKind, OverlayPrimitive, OverlaySink};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::camera::CameraViewModel;
use crate::engine::{EngineAdapter, ViewTransition, pick_site};
use crate::interaction::{DragPhase, InteractionSink, PointerSample, ToolMode};
use crate::orbit::{FOV_Y_RAD, OrbitCamera};

/// Per-frame camera and visibility summary for the host renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SphereFrame {
    pub eye: Vec3,
    pub view_dir: Vec3,
    pub distance: f64,
    pub fov_y_rad: f64,
    pub viewport_px: [f64; 2],
    pub opacity: f32,
    pub markers_visible: bool,
    pub input_enabled: bool,
    pub cursor: &'static str,
    /// Bumped whenever markers, overlays or labels change.
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct SphereEngine {
    orbit: OrbitCamera,
    context_live: bool,
    input_enabled: bool,
    cursor: ToolMode,
    opacity: f32,
    markers: Option<MarkerSet>,
    markers_visible: bool,
    overlays: BTreeMap<OverlayKind, Vec<OverlayPrimitive>>,
    labels: Vec<LabelDraw>,
    generation: u64,
}

impl Default for SphereEngine {
    fn default() -> Self {
        Self {
            orbit: OrbitCamera::new(),
            context_live: true,
            input_enabled: true,
            cursor: ToolMode::Normal,
            opacity: 1.0,
            markers: None,
            markers_visible: true,
            overlays: BTreeMap::new(),
            labels: Vec::new(),
            generation: 0,
        }
    }
}

impl SphereEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orbit(&self) -> &OrbitCamera {
        &self.orbit
    }

    pub fn overlays(&self) -> &BTreeMap<OverlayKind, Vec<OverlayPrimitive>> {
        &self.overlays
    }

    pub fn labels(&self) -> &[LabelDraw] {
        &self.labels
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_context_live(&self) -> bool {
        self.context_live
    }

    /// Everything resident on the GPU is gone.
    pub fn context_lost(&mut self) {
        warn!("sphere engine lost its graphics context; dropping geometry");
        self.context_live = false;
        self.orbit.stop_inertia();
        self.markers = None;
        self.overlays.clear();
        self.labels.clear();
        self.generation += 1;
    }

    /// The context is back but empty; the caller rebuilds everything.
    pub fn context_restored(&mut self) {
        info!("sphere engine graphics context restored");
        self.context_live = true;
        self.generation += 1;
    }

    /// Advances inertia and zoom smoothing. Returns `true` if the globe
    /// rotated on its own.
    pub fn update(&mut self, dt_s: f64) -> bool {
        self.orbit.update(dt_s)
    }

    pub fn stop_inertia(&mut self) {
        self.orbit.stop_inertia();
    }

    pub fn is_dragging(&self) -> bool {
        self.orbit.is_dragging()
    }

    pub fn frame(&self) -> SphereFrame {
        SphereFrame {
            eye: self.orbit.eye(),
            view_dir: self.orbit.view_dir(),
            distance: self.orbit.distance(),
            fov_y_rad: FOV_Y_RAD,
            viewport_px: self.orbit.viewport_px(),
            opacity: self.opacity,
            markers_visible: self.markers_visible,
            input_enabled: self.input_enabled,
            cursor: self.cursor.cursor(),
            generation: self.generation,
        }
    }

    fn sample(&self, px: [f64; 2], radius_px: f64) -> PointerSample {
        if !self.context_live {
            return PointerSample {
                px,
                lng_lat: None,
                site: None,
            };
        }
        let visible = self.markers.as_ref().filter(|_| self.markers_visible);
        PointerSample {
            px,
            lng_lat: self.orbit.ray_hit(px),
            site: pick_site(visible, px, radius_px, |p| self.orbit.project(p)),
        }
    }
}

impl InteractionSink for SphereEngine {
    fn on_pointer_move(&self, px: [f64; 2], radius_px: f64) -> PointerSample {
        self.sample(px, radius_px)
    }

    fn on_click(&self, px: [f64; 2], radius_px: f64) -> PointerSample {
        self.sample(px, radius_px)
    }

    fn on_drag(&mut self, phase: DragPhase, px: [f64; 2], now: Time) {
        if !self.input_enabled && phase != DragPhase::End {
            return;
        }
        match phase {
            DragPhase::Start => self.orbit.on_pointer_down(px, now),
            DragPhase::Move => self.orbit.on_pointer_move(px, now),
            DragPhase::End => self.orbit.on_pointer_up(),
        }
    }

    fn project(&self, p: LngLat) -> Option<[f64; 2]> {
        self.orbit.project(p)
    }

    fn meters_per_pixel(&self) -> Option<f64> {
        self.context_live.then(|| self.orbit.meters_per_pixel())
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
        if !enabled {
            self.orbit.on_pointer_up();
            self.orbit.stop_inertia();
        }
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    fn set_tool_cursor(&mut self, tool: ToolMode) {
        self.cursor = tool;
    }
}

impl OverlaySink for SphereEngine {
    fn clear_overlay(&mut self, kind: OverlayKind) {
        if self.overlays.remove(&kind).is_some() {
            self.generation += 1;
        }
    }

    fn draw_overlay(&mut self, kind: OverlayKind, primitives: &[OverlayPrimitive]) {
        if !self.context_live {
            debug!(?kind, "overlay draw skipped while the context is lost");
            return;
        }
        self.overlays.insert(kind, primitives.to_vec());
        self.generation += 1;
    }
}

impl EngineAdapter for SphereEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sphere
    }

    fn is_initialized(&self) -> bool {
        self.context_live
    }

    /// Orientation from the view's centre, distance from its zoom percent.
    fn apply_view(&mut self, camera: &CameraViewModel, transition: ViewTransition) {
        let pose = camera.to_engine_a(&camera.view());
        self.orbit.look_at(pose.center);
        match transition {
            ViewTransition::Jump => self.orbit.set_distance(pose.distance),
            ViewTransition::Ease => self.orbit.set_target_distance(pose.distance),
        }
    }

    fn look_at(&self) -> Option<LngLat> {
        self.orbit.center()
    }

    fn set_markers(&mut self, markers: MarkerSet) {
        if !self.context_live {
            debug!(sites = markers.site_count(), "marker upload skipped while the context is lost");
            return;
        }
        self.markers = Some(markers);
        self.generation += 1;
    }

    fn markers(&self) -> Option<&MarkerSet> {
        self.markers.as_ref()
    }

    fn set_markers_visible(&mut self, visible: bool) {
        if self.markers_visible != visible {
            self.markers_visible = visible;
            self.generation += 1;
        }
    }

    fn markers_visible(&self) -> bool {
        self.markers_visible
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn view_dir(&self) -> Option<Vec3> {
        Some(self.orbit.view_dir())
    }

    fn viewport_px(&self) -> [f64; 2] {
        self.orbit.viewport_px()
    }

    fn set_viewport(&mut self, width_px: f64, height_px: f64) {
        self.orbit.set_viewport(width_px, height_px);
    }

    fn draw_labels(&mut self, labels: Vec<LabelDraw>) {
        if !self.context_live || labels == self.labels {
            return;
        }
        self.labels = labels;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::GlobeView;
    use layers::{ColorMode, MarkerTarget, SiteMarkerRenderer};
    use pretty_assertions::assert_eq;
    use scene::{SiteId, SiteRecord};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn engine_at(lng: f64, lat: f64, zoom_percent: f64) -> SphereEngine {
        let mut e = SphereEngine::new();
        e.set_viewport(800.0, 600.0);
        let camera = CameraViewModel::new(GlobeView::new(lat, lng, zoom_percent));
        e.apply_view(&camera, ViewTransition::Jump);
        e
    }

    fn markers(records: &[SiteRecord]) -> MarkerSet {
        SiteMarkerRenderer::default().build(records, ColorMode::BySource, MarkerTarget::Sphere { satellite: false })
    }

    #[test]
    fn apply_view_points_the_camera_at_the_view_center() {
        let e = engine_at(30.0, 45.0, 50.0);
        let c = e.look_at().expect("center");
        assert_close(c.lng, 30.0, 1e-6);
        assert_close(c.lat, 45.0, 1e-6);

        let hit = e.on_click([400.0, 300.0], 0.0).lng_lat.expect("hit");
        assert_close(hit.lng, 30.0, 1e-6);
        assert_close(hit.lat, 45.0, 1e-6);
    }

    #[test]
    fn only_front_hemisphere_markers_are_pickable() {
        let mut e = engine_at(0.0, 0.0, 0.0);
        e.set_markers(markers(&[
            SiteRecord::new("front", 0.0, 0.0),
            SiteRecord::new("back", 180.0, 0.0),
        ]));

        let front = e.on_pointer_move([400.0, 300.0], 8.0);
        assert_eq!(front.site.map(|s| s.id), Some(SiteId::new("front")));

        let back = e.on_pointer_move([10.0, 10.0], 1000.0);
        assert_eq!(back.site.map(|s| s.id), Some(SiteId::new("front")));

        e.set_markers_visible(false);
        assert_eq!(e.on_pointer_move([400.0, 300.0], 8.0).site, None);
    }

    #[test]
    fn context_loss_drops_geometry_until_rebuilt() {
        let mut e = engine_at(0.0, 0.0, 0.0);
        e.set_markers(markers(&[SiteRecord::new("a", 0.0, 0.0)]));
        e.draw_overlay(
            OverlayKind::Highlight,
            &[OverlayPrimitive::Point {
                position: LngLat::new(0.0, 0.0),
                color: layers::HIGHLIGHT_COLOR,
                radius_px: 4.0,
            }],
        );
        let before = e.generation();

        e.context_lost();
        assert!(!e.is_initialized());
        assert!(e.markers().is_none());
        assert!(e.overlays().is_empty());
        assert!(e.generation() > before);

        e.set_markers(markers(&[SiteRecord::new("a", 0.0, 0.0)]));
        assert!(e.markers().is_none());

        e.context_restored();
        e.set_markers(markers(&[SiteRecord::new("a", 0.0, 0.0)]));
        assert_eq!(e.markers().map(MarkerSet::site_count), Some(1));
    }

    #[test]
    fn disabled_input_ignores_drags() {
        let mut e = engine_at(0.0, 0.0, 0.0);
        e.set_input_enabled(false);
        e.on_drag(DragPhase::Start, [400.0, 300.0], Time::ZERO);
        e.on_drag(DragPhase::Move, [500.0, 300.0], Time::ZERO.plus_millis(16));
        assert!(!e.is_dragging());
        let c = e.look_at().expect("center");
        assert_close(c.lng, 0.0, 1e-9);
    }

    #[test]
    fn ease_keeps_current_distance_until_updated() {
        let mut e = engine_at(0.0, 0.0, 0.0);
        let camera = CameraViewModel::new(GlobeView::new(0.0, 0.0, 66.0));
        e.apply_view(&camera, ViewTransition::Ease);
        assert_close(e.orbit().distance(), crate::camera::MAX_DIST, 1e-12);
        for _ in 0..200 {
            e.update(0.05);
        }
        assert_close(e.orbit().distance(), crate::camera::MID_DIST, 1e-6);
    }
}
