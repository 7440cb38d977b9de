//! Tile engine adapter (engine B).
//!
//! The map library lives on the host side. This adapter mirrors its camera
//! as a Web Mercator viewport for hit testing and translates every operation
//! into a serialisable [`TileCommand`], queued until the host drains it.

use std::collections::BTreeMap;

use foundation::{LngLat, MercatorViewport, Time, Vec3, meters_per_pixel};
use layers::{EngineKind, LabelDraw, Marker, MarkerSet, OverlayKind, OverlayPrimitive, OverlaySink};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::camera::{CameraViewModel, TILE_MAX_ZOOM, TILE_MIN_ZOOM, TilePose};
use crate::engine::{EngineAdapter, ViewTransition, pick_site};
use crate::interaction::{DragPhase, InteractionSink, PointerSample, ToolMode};

/// Duration of an eased camera move, in milliseconds.
pub const EASE_MS: u64 = 250;

/// Instructions for the host-side map library, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TileCommand {
    #[serde(rename_all = "camelCase")]
    JumpTo { center: LngLat, zoom: f64 },
    #[serde(rename_all = "camelCase")]
    EaseTo {
        center: LngLat,
        zoom: f64,
        duration_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    SetMarkers { markers: Vec<Marker> },
    #[serde(rename_all = "camelCase")]
    SetMarkersVisible { visible: bool },
    #[serde(rename_all = "camelCase")]
    ClearOverlay { kind: OverlayKind },
    #[serde(rename_all = "camelCase")]
    DrawOverlay {
        kind: OverlayKind,
        primitives: Vec<OverlayPrimitive>,
    },
    #[serde(rename_all = "camelCase")]
    SetLabels { labels: Vec<LabelDraw> },
    #[serde(rename_all = "camelCase")]
    SetInputEnabled { enabled: bool },
    #[serde(rename_all = "camelCase")]
    SetCursor { cursor: String },
    #[serde(rename_all = "camelCase")]
    SetOpacity { opacity: f32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TileStatus {
    Pending,
    Ready,
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct TileEngine {
    status: TileStatus,
    pose: TilePose,
    viewport_px: [f64; 2],
    input_enabled: bool,
    cursor: ToolMode,
    opacity: f32,
    markers: Option<MarkerSet>,
    markers_visible: bool,
    overlays: BTreeMap<OverlayKind, Vec<OverlayPrimitive>>,
    labels: Vec<LabelDraw>,
    drag_last_px: Option<[f64; 2]>,
    outbox: Vec<TileCommand>,
}

impl Default for TileEngine {
    fn default() -> Self {
        Self {
            status: TileStatus::Pending,
            pose: TilePose {
                center: LngLat::new(0.0, 0.0),
                zoom: TILE_MIN_ZOOM,
            },
            viewport_px: [1280.0, 720.0],
            input_enabled: false,
            cursor: ToolMode::Normal,
            opacity: 0.0,
            markers: None,
            markers_visible: false,
            overlays: BTreeMap::new(),
            labels: Vec::new(),
            drag_last_px: None,
            outbox: Vec::new(),
        }
    }
}

impl TileEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &TileStatus {
        &self.status
    }

    pub fn pose(&self) -> TilePose {
        self.pose
    }

    pub fn overlays(&self) -> &BTreeMap<OverlayKind, Vec<OverlayPrimitive>> {
        &self.overlays
    }

    pub fn labels(&self) -> &[LabelDraw] {
        &self.labels
    }

    /// The host's map library finished loading.
    pub fn mark_ready(&mut self) {
        if self.status == TileStatus::Ready {
            return;
        }
        info!("tile engine ready");
        self.status = TileStatus::Ready;
    }

    /// The map library could not start. Queued commands are dropped and no
    /// new ones are produced.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%reason, "tile engine failed to initialize");
        self.status = TileStatus::Failed { reason };
        self.outbox.clear();
    }

    /// Camera moved inside the map library (its own animations or
    /// gestures). Returns `true` if the mirrored pose changed.
    pub fn camera_moved(&mut self, pose: TilePose) -> bool {
        if !pose.center.is_finite() || !pose.zoom.is_finite() {
            return false;
        }
        let pose = TilePose {
            center: pose.center,
            zoom: pose.zoom.clamp(TILE_MIN_ZOOM, TILE_MAX_ZOOM),
        };
        let changed = pose != self.pose;
        self.pose = pose;
        changed
    }

    pub fn take_commands(&mut self) -> Vec<TileCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_commands(&self) -> &[TileCommand] {
        &self.outbox
    }

    fn push(&mut self, command: TileCommand) {
        if matches!(self.status, TileStatus::Failed { .. }) {
            return;
        }
        self.outbox.push(command);
    }

    fn viewport(&self) -> MercatorViewport {
        MercatorViewport::new(self.pose.center, self.pose.zoom, self.viewport_px[0], self.viewport_px[1])
    }

    fn sample(&self, px: [f64; 2], radius_px: f64) -> PointerSample {
        if self.status != TileStatus::Ready {
            return PointerSample {
                px,
                lng_lat: None,
                site: None,
            };
        }
        let viewport = self.viewport();
        let visible = self.markers.as_ref().filter(|_| self.markers_visible);
        PointerSample {
            px,
            lng_lat: Some(viewport.unproject(px)),
            site: pick_site(visible, px, radius_px, |p| Some(viewport.project(p))),
        }
    }
}

impl InteractionSink for TileEngine {
    fn on_pointer_move(&self, px: [f64; 2], radius_px: f64) -> PointerSample {
        self.sample(px, radius_px)
    }

    fn on_click(&self, px: [f64; 2], radius_px: f64) -> PointerSample {
        self.sample(px, radius_px)
    }

    /// Pans so the point under the pointer follows it.
    fn on_drag(&mut self, phase: DragPhase, px: [f64; 2], _now: Time) {
        if !self.input_enabled {
            self.drag_last_px = None;
            return;
        }
        match phase {
            DragPhase::Start => self.drag_last_px = Some(px),
            DragPhase::Move => {
                let Some(last) = self.drag_last_px.replace(px) else {
                    return;
                };
                let [w, h] = self.viewport_px;
                let target = [w * 0.5 - (px[0] - last[0]), h * 0.5 - (px[1] - last[1])];
                let center = self.viewport().unproject(target);
                if center != self.pose.center {
                    self.pose.center = center;
                    self.push(TileCommand::JumpTo {
                        center,
                        zoom: self.pose.zoom,
                    });
                }
            }
            DragPhase::End => self.drag_last_px = None,
        }
    }

    fn project(&self, p: LngLat) -> Option<[f64; 2]> {
        (self.status == TileStatus::Ready && p.is_finite()).then(|| self.viewport().project(p))
    }

    fn meters_per_pixel(&self) -> Option<f64> {
        (self.status == TileStatus::Ready).then(|| meters_per_pixel(self.pose.center.lat, self.pose.zoom))
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        if self.input_enabled == enabled {
            return;
        }
        self.input_enabled = enabled;
        if !enabled {
            self.drag_last_px = None;
        }
        self.push(TileCommand::SetInputEnabled { enabled });
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    fn set_tool_cursor(&mut self, tool: ToolMode) {
        self.cursor = tool;
        self.push(TileCommand::SetCursor {
            cursor: tool.cursor().to_string(),
        });
    }
}

impl OverlaySink for TileEngine {
    fn clear_overlay(&mut self, kind: OverlayKind) {
        if self.overlays.remove(&kind).is_some() {
            self.push(TileCommand::ClearOverlay { kind });
        }
    }

    fn draw_overlay(&mut self, kind: OverlayKind, primitives: &[OverlayPrimitive]) {
        self.overlays.insert(kind, primitives.to_vec());
        self.push(TileCommand::DrawOverlay {
            kind,
            primitives: primitives.to_vec(),
        });
    }
}

impl EngineAdapter for TileEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tile
    }

    fn is_initialized(&self) -> bool {
        self.status == TileStatus::Ready
    }

    fn apply_view(&mut self, camera: &CameraViewModel, transition: ViewTransition) {
        let pose = camera.to_engine_b(&camera.view());
        if pose == self.pose {
            return;
        }
        self.pose = pose;
        let command = match transition {
            ViewTransition::Jump => TileCommand::JumpTo {
                center: pose.center,
                zoom: pose.zoom,
            },
            ViewTransition::Ease => TileCommand::EaseTo {
                center: pose.center,
                zoom: pose.zoom,
                duration_ms: EASE_MS,
            },
        };
        self.push(command);
    }

    fn look_at(&self) -> Option<LngLat> {
        (self.status == TileStatus::Ready).then_some(self.pose.center)
    }

    fn set_markers(&mut self, markers: MarkerSet) {
        let flat: Vec<Marker> = markers.layers.iter().flat_map(|l| l.markers.iter().cloned()).collect();
        debug!(sites = markers.site_count(), "tile markers rebuilt");
        self.markers = Some(markers);
        self.push(TileCommand::SetMarkers { markers: flat });
    }

    fn markers(&self) -> Option<&MarkerSet> {
        self.markers.as_ref()
    }

    fn set_markers_visible(&mut self, visible: bool) {
        if self.markers_visible == visible {
            return;
        }
        self.markers_visible = visible;
        self.push(TileCommand::SetMarkersVisible { visible });
    }

    fn markers_visible(&self) -> bool {
        self.markers_visible
    }

    fn set_opacity(&mut self, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity == self.opacity {
            return;
        }
        self.opacity = opacity;
        self.push(TileCommand::SetOpacity { opacity });
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn view_dir(&self) -> Option<Vec3> {
        None
    }

    fn viewport_px(&self) -> [f64; 2] {
        self.viewport_px
    }

    fn set_viewport(&mut self, width_px: f64, height_px: f64) {
        self.viewport_px = [width_px.max(1.0), height_px.max(1.0)];
    }

    fn draw_labels(&mut self, labels: Vec<LabelDraw>) {
        if labels == self.labels {
            return;
        }
        self.labels = labels.clone();
        self.push(TileCommand::SetLabels { labels });
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

    fn ready_engine() -> TileEngine {
        let mut e = TileEngine::new();
        e.set_viewport(800.0, 600.0);
        e.mark_ready();
        e
    }

    #[test]
    fn pending_engine_is_not_initialized_and_misses_hits() {
        let e = TileEngine::new();
        assert!(!e.is_initialized());
        assert_eq!(e.look_at(), None);
        assert_eq!(e.on_click([10.0, 10.0], 8.0).lng_lat, None);
    }

    #[test]
    fn apply_view_emits_one_camera_command_per_change() {
        let mut e = ready_engine();
        let camera = CameraViewModel::new(GlobeView::new(48.0, 2.0, 80.0));
        e.apply_view(&camera, ViewTransition::Jump);
        e.apply_view(&camera, ViewTransition::Jump);
        let cmds = e.take_commands();
        assert_eq!(cmds.len(), 1);
        let TileCommand::JumpTo { center, zoom } = &cmds[0] else {
            panic!("expected jumpTo, got {cmds:?}");
        };
        assert_eq!(*center, LngLat::new(2.0, 48.0));
        assert_close(*zoom, crate::camera::percent_to_tile_zoom(80.0), 1e-12);
    }

    #[test]
    fn center_pixel_unprojects_to_the_pose_center() {
        let mut e = ready_engine();
        e.camera_moved(TilePose {
            center: LngLat::new(13.4, 52.5),
            zoom: 10.0,
        });
        let p = e.on_pointer_move([400.0, 300.0], 0.0).lng_lat.expect("lng_lat");
        assert_close(p.lng, 13.4, 1e-9);
        assert_close(p.lat, 52.5, 1e-9);
    }

    #[test]
    fn drag_pans_the_map_with_the_pointer() {
        let mut e = ready_engine();
        e.set_input_enabled(true);
        e.camera_moved(TilePose {
            center: LngLat::new(0.0, 0.0),
            zoom: 4.0,
        });
        let grabbed = e.on_click([500.0, 300.0], 0.0).lng_lat.expect("grabbed");

        e.on_drag(DragPhase::Start, [500.0, 300.0], Time::ZERO);
        e.on_drag(DragPhase::Move, [400.0, 300.0], Time::ZERO);
        e.on_drag(DragPhase::End, [400.0, 300.0], Time::ZERO);

        let under = e.on_click([400.0, 300.0], 0.0).lng_lat.expect("under");
        assert_close(under.lng, grabbed.lng, 1e-9);
        assert_close(under.lat, grabbed.lat, 1e-9);
        assert!(matches!(e.take_commands().last(), Some(TileCommand::JumpTo { .. })));
    }

    #[test]
    fn markers_are_flattened_and_pickable() {
        let mut e = ready_engine();
        e.set_markers_visible(true);
        let set = SiteMarkerRenderer::default().build(
            &[SiteRecord::new("a", 0.0, 0.0), SiteRecord::new("b", 0.0, f64::NAN)],
            ColorMode::BySource,
            MarkerTarget::Tile,
        );
        e.set_markers(set);
        let cmds = e.take_commands();
        assert!(cmds.contains(&TileCommand::SetMarkersVisible { visible: true }));
        let Some(TileCommand::SetMarkers { markers }) = cmds.last() else {
            panic!("expected setMarkers, got {cmds:?}");
        };
        assert_eq!(markers.len(), 1);

        let center = e.project(LngLat::new(0.0, 0.0)).expect("projected");
        let hit = e.on_click(center, 8.0).site.expect("site");
        assert_eq!(hit.id, SiteId::new("a"));
    }

    #[test]
    fn failed_engine_stops_emitting_commands() {
        let mut e = TileEngine::new();
        e.set_opacity(1.0);
        e.mark_failed("no access token");
        assert!(e.take_commands().is_empty());
        e.set_opacity(0.5);
        assert!(e.pending_commands().is_empty());
        assert_eq!(
            e.status(),
            &TileStatus::Failed {
                reason: "no access token".to_string()
            }
        );
    }

    #[test]
    fn commands_serialise_with_type_tags() {
        let json = serde_json::to_value(TileCommand::SetCursor {
            cursor: "crosshair".to_string(),
        })
        .expect("json");
        assert_eq!(json, serde_json::json!({ "type": "setCursor", "cursor": "crosshair" }));
    }
}
