//! One input model for both engines.
//!
//! Engine adapters translate raw pointer positions into neutral
//! [`PointerSample`]s through [`InteractionSink`]; the router turns those
//! into state changes, recompute marks and UI events. The router is created
//! once and is handed whichever engine is primary; it is never re-wired.

use foundation::{LngLat, Time};
use layers::{OverlayKind, PendingPoint};
use runtime::{Dwell, Throttle};
use scene::SiteId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GlobeConfig;
use crate::events::UiEvent;
use crate::readout::{SCALE_BAR_MAX_PX, ScaleBar, scale_bar};
use crate::state::{FrozenTooltip, GlobeControllerState, Recompute};

/// Pointer travel (pixels) before a press becomes a drag.
pub const DRAG_START_PX: f64 = 4.0;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolMode {
    #[default]
    Normal,
    Measuring,
    ProximityPicking,
}

impl ToolMode {
    /// CSS cursor the primary engine shows in this mode.
    pub fn cursor(self) -> &'static str {
        match self {
            ToolMode::Normal => "grab",
            ToolMode::Measuring | ToolMode::ProximityPicking => "crosshair",
        }
    }

    fn drags_camera(self) -> bool {
        !matches!(self, ToolMode::Measuring)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DragPhase {
    Start,
    Move,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteHit {
    pub id: SiteId,
    pub lng_lat: LngLat,
    pub distance_px: f64,
}

/// What lies under a screen position, in engine-neutral terms.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerSample {
    pub px: [f64; 2],
    /// `None` when the pointer is off the globe.
    pub lng_lat: Option<LngLat>,
    pub site: Option<SiteHit>,
}

/// Input capabilities every engine adapter provides.
pub trait InteractionSink {
    /// Hover hit test: globe position and nearest site within `radius_px`.
    fn on_pointer_move(&self, px: [f64; 2], radius_px: f64) -> PointerSample;
    /// Click hit test. Same contract as [`on_pointer_move`](Self::on_pointer_move).
    fn on_click(&self, px: [f64; 2], radius_px: f64) -> PointerSample;
    /// Camera drag (rotate or pan, depending on the engine).
    fn on_drag(&mut self, phase: DragPhase, px: [f64; 2], now: Time);
    fn project(&self, p: LngLat) -> Option<[f64; 2]>;
    fn meters_per_pixel(&self) -> Option<f64>;
    fn set_input_enabled(&mut self, enabled: bool);
    fn input_enabled(&self) -> bool;
    fn set_tool_cursor(&mut self, tool: ToolMode);
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RouterSettings {
    pub hover_radius_px: f64,
    pub snap_radius_px: f64,
    pub pointer_throttle_ms: u64,
    pub freeze_dwell_ms: u64,
    pub freeze_release_px: f64,
}

impl From<&GlobeConfig> for RouterSettings {
    fn from(cfg: &GlobeConfig) -> Self {
        Self {
            hover_radius_px: cfg.hover_radius_px,
            snap_radius_px: cfg.snap_radius_px,
            pointer_throttle_ms: cfg.pointer_throttle_ms,
            freeze_dwell_ms: cfg.freeze_dwell_ms,
            freeze_release_px: cfg.freeze_release_px,
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&GlobeConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PointerReport {
    lng_lat: Option<LngLat>,
    hovered: Option<SiteId>,
    scale: Option<ScaleBar>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Press {
    px: [f64; 2],
    tool: ToolMode,
    moved: bool,
}

#[derive(Debug, Clone)]
pub struct InteractionRouter {
    settings: RouterSettings,
    reports: Throttle<PointerReport>,
    dwell: Dwell<SiteId>,
    press: Option<Press>,
    /// Release point of the last drag; the click the host sends right after
    /// it is swallowed.
    swallow_click_at: Option<[f64; 2]>,
    reported_hover: Option<SiteId>,
}

impl InteractionRouter {
    pub fn new(settings: RouterSettings) -> Self {
        Self {
            settings,
            reports: Throttle::new(settings.pointer_throttle_ms),
            dwell: Dwell::new(),
            press: None,
            swallow_click_at: None,
            reported_hover: None,
        }
    }

    pub fn settings(&self) -> RouterSettings {
        self.settings
    }

    pub fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    /// Drops in-flight gesture and hover tracking. Used when the primary
    /// engine changes so both engines start clean.
    pub fn reset(&mut self) {
        self.reports.reset();
        self.dwell.reset();
        self.press = None;
        self.swallow_click_at = None;
        self.reported_hover = None;
    }

    pub fn pointer_down(
        &mut self,
        sink: &mut dyn InteractionSink,
        px: [f64; 2],
        now: Time,
        state: &GlobeControllerState,
    ) {
        if !is_finite_px(px) {
            return;
        }
        self.swallow_click_at = None;
        self.press = Some(Press {
            px,
            tool: state.tool,
            moved: false,
        });
        if state.tool.drags_camera() {
            sink.on_drag(DragPhase::Start, px, now);
        }
    }

    /// Returns `true` if the gesture moved the engine camera.
    pub fn pointer_move(
        &mut self,
        sink: &mut dyn InteractionSink,
        px: [f64; 2],
        now: Time,
        state: &mut GlobeControllerState,
        events: &mut Vec<UiEvent>,
    ) -> bool {
        if !is_finite_px(px) {
            return false;
        }

        let mut camera_moved = false;
        if let Some(press) = self.press.as_mut() {
            let starts_drag = !press.moved && distance_px(px, press.px) >= DRAG_START_PX;
            if starts_drag {
                press.moved = true;
            }
            if press.moved && press.tool.drags_camera() {
                sink.on_drag(DragPhase::Move, px, now);
                camera_moved = true;
            }
            if starts_drag && press.tool == ToolMode::Measuring {
                // A drag-measure replaces any half-placed measurement.
                let origin = press.px;
                state.measure.pending = None;
                self.place_measure_point(&*sink, origin, state, events);
            }
        }

        let sample = sink.on_pointer_move(px, self.settings.hover_radius_px);
        let hovered = sample.site.map(|s| s.id);
        state.cursor = sample.lng_lat;

        if let Some(frozen) = &state.hover.frozen {
            if distance_px(px, frozen.anchor_px) > self.settings.freeze_release_px {
                state.hover.frozen = None;
                self.dwell.reset();
                events.push(UiEvent::TooltipReleased);
            }
        }
        self.dwell.observe(hovered.clone(), now);
        state.hover.hovered = hovered.clone();
        state.hover.last_px = Some(px);

        match state.tool {
            ToolMode::Measuring if state.measure.pending.is_some() => {
                state.dirty.mark(Recompute::Overlay(OverlayKind::MeasurementPreview));
            }
            ToolMode::ProximityPicking => {
                state.proximity.preview = sample.lng_lat;
                state.dirty.mark(Recompute::Overlay(OverlayKind::ProximityPreview));
            }
            _ => {}
        }

        let report = PointerReport {
            lng_lat: sample.lng_lat,
            hovered,
            scale: sink
                .meters_per_pixel()
                .and_then(|mpp| scale_bar(mpp, SCALE_BAR_MAX_PX)),
        };
        if let Some(report) = self.reports.offer(now, report) {
            self.emit_report(report, events);
        }
        camera_moved
    }

    /// Returns `true` if the gesture moved the engine camera.
    pub fn pointer_up(
        &mut self,
        sink: &mut dyn InteractionSink,
        px: [f64; 2],
        now: Time,
        state: &mut GlobeControllerState,
        events: &mut Vec<UiEvent>,
    ) -> bool {
        let Some(press) = self.press.take() else {
            return false;
        };
        let px = if is_finite_px(px) { px } else { press.px };
        if press.tool.drags_camera() {
            sink.on_drag(DragPhase::End, px, now);
        }
        if !press.moved {
            return false;
        }
        self.swallow_click_at = Some(px);
        if press.tool == ToolMode::Measuring && state.tool == ToolMode::Measuring {
            self.place_measure_point(&*sink, px, state, events);
            return false;
        }
        press.tool.drags_camera()
    }

    pub fn click(
        &mut self,
        sink: &mut dyn InteractionSink,
        px: [f64; 2],
        multi_select: bool,
        state: &mut GlobeControllerState,
        events: &mut Vec<UiEvent>,
    ) {
        if let Some(at) = self.swallow_click_at.take() {
            if distance_px(px, at) < DRAG_START_PX {
                return;
            }
        }
        if !is_finite_px(px) {
            return;
        }
        match state.tool {
            ToolMode::Measuring => self.place_measure_point(&*sink, px, state, events),
            ToolMode::ProximityPicking => self.pick_proximity(sink, px, state, events),
            ToolMode::Normal => self.select_at(&*sink, px, multi_select, state, events),
        }
    }

    /// Trailing pointer report and the freeze dwell.
    pub fn poll(&mut self, now: Time, state: &mut GlobeControllerState, events: &mut Vec<UiEvent>) {
        if let Some(report) = self.reports.poll(now) {
            self.emit_report(report, events);
        }
        if state.hover.frozen.is_some() {
            return;
        }
        let Some(site) = self.dwell.reached(now, self.settings.freeze_dwell_ms) else {
            return;
        };
        if state.hover.hovered.as_ref() != Some(site) {
            return;
        }
        let site = site.clone();
        state.hover.frozen = Some(FrozenTooltip {
            site: site.clone(),
            anchor_px: state.hover.last_px.unwrap_or([0.0, 0.0]),
        });
        events.push(UiEvent::TooltipFrozen { site });
    }

    pub fn dismiss_tooltip(&mut self, state: &mut GlobeControllerState, events: &mut Vec<UiEvent>) {
        if state.hover.frozen.take().is_some() {
            self.dwell.reset();
            events.push(UiEvent::TooltipReleased);
        }
    }

    fn emit_report(&mut self, report: PointerReport, events: &mut Vec<UiEvent>) {
        events.push(UiEvent::Cursor {
            lng_lat: report.lng_lat,
            scale: report.scale,
        });
        if report.hovered != self.reported_hover {
            self.reported_hover = report.hovered.clone();
            events.push(UiEvent::Hover { site: report.hovered });
        }
    }

    /// Exact coordinate of the nearest marker or pending endpoint within the
    /// snap radius, else the raw pick.
    fn snap(&self, sink: &dyn InteractionSink, px: [f64; 2], state: &GlobeControllerState) -> Option<PendingPoint> {
        let radius = self.settings.snap_radius_px;
        let sample = sink.on_click(px, radius);

        let marker = sample.site.as_ref().map(|s| (s.distance_px, s.lng_lat));
        let pending = state.measure.pending.and_then(|p| {
            let d = distance_px(sink.project(p.position)?, px);
            (d <= radius).then_some((d, p.position))
        });
        let target = match (pending, marker) {
            (Some(p), Some(m)) => Some(if p.0 <= m.0 { p } else { m }),
            (p, m) => p.or(m),
        };

        match target {
            Some((_, position)) => Some(PendingPoint {
                position,
                snapped: true,
            }),
            None => sample.lng_lat.map(|position| PendingPoint {
                position,
                snapped: false,
            }),
        }
    }

    fn place_measure_point(
        &self,
        sink: &dyn InteractionSink,
        px: [f64; 2],
        state: &mut GlobeControllerState,
        events: &mut Vec<UiEvent>,
    ) {
        let Some(point) = self.snap(sink, px, state) else {
            debug!(?px, "measurement click missed the globe");
            return;
        };
        events.push(UiEvent::MeasurePointAdd {
            coord: point.position,
            snapped: point.snapped,
        });
        if state.measure.pending.is_none() {
            state.measure.pending = Some(point);
        } else if let Some(measurement) = state.measure.commit(point) {
            events.push(UiEvent::MeasurementAdded { measurement });
            state.dirty.mark(Recompute::Overlay(OverlayKind::Measurements));
        }
        state.dirty.mark(Recompute::Overlay(OverlayKind::MeasurementPreview));
    }

    fn pick_proximity(
        &self,
        sink: &mut dyn InteractionSink,
        px: [f64; 2],
        state: &mut GlobeControllerState,
        events: &mut Vec<UiEvent>,
    ) {
        let Some(center) = sink.on_click(px, 0.0).lng_lat else {
            return;
        };
        state.proximity.center = Some(center);
        state.proximity.is_picking = false;
        state.proximity.preview = None;
        state.tool = ToolMode::Normal;
        sink.set_tool_cursor(ToolMode::Normal);
        state.dirty.mark_all([
            Recompute::Overlay(OverlayKind::Proximity),
            Recompute::Overlay(OverlayKind::ProximityPreview),
        ]);
        events.push(UiEvent::ProximitySet { coord: center });
    }

    fn select_at(
        &self,
        sink: &dyn InteractionSink,
        px: [f64; 2],
        multi_select: bool,
        state: &mut GlobeControllerState,
        events: &mut Vec<UiEvent>,
    ) {
        let sample = sink.on_click(px, self.settings.hover_radius_px);
        let changed = match sample.site {
            Some(hit) => {
                let changed = if multi_select {
                    state.selection.toggle(hit.id.clone());
                    true
                } else {
                    state.selection.select_only(hit.id.clone())
                };
                events.push(UiEvent::SiteClick {
                    record: state.record(&hit.id).cloned(),
                });
                events.push(UiEvent::SiteSelect {
                    id: Some(hit.id),
                    multi_select,
                });
                changed
            }
            None => {
                if state.hover.frozen.take().is_some() {
                    events.push(UiEvent::TooltipReleased);
                }
                events.push(UiEvent::SiteClick { record: None });
                events.push(UiEvent::SiteSelect {
                    id: None,
                    multi_select,
                });
                state.selection.clear()
            }
        };
        if changed {
            state.dirty.mark(Recompute::Overlay(OverlayKind::SelectionRings));
            events.push(UiEvent::SelectionChanged {
                ids: state.selection.iter().cloned().collect(),
            });
        }
    }
}

fn is_finite_px(px: [f64; 2]) -> bool {
    px[0].is_finite() && px[1].is_finite()
}

pub(crate) fn distance_px(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}
