//! Top-level view controller.
//!
//! Every mutation goes through [`GlobeController`]: it writes
//! [`GlobeControllerState`], marks the recomputes the change needs, and
//! [`tick`](GlobeController::tick) processes them once per frame in a fixed
//! order. UI notifications, fetch work and tile commands are queued for the
//! host to drain.

use std::collections::{BTreeMap, BTreeSet};

use foundation::{LngLat, Time};
use layers::{
    BaseLayer, ColorMode, EngineKind, HIGHLIGHT_COLOR, LabelCategory, LabelSpec, LabelVisibilityManager, LayerLoad,
    LayersReady, MarkerTarget, MeasurementId, OverlayKind, OverlayPrimitive, OverlayRenderer, SELECTION_COLOR,
    SiteMarkerRenderer, border_primitives, measurement_preview_primitives, measurement_primitives,
    proximity_primitives, ring_primitives,
};
use runtime::Frame;
use scene::{SiteId, SiteRecord};
use streaming::{BoundaryError, Completion, EmpireBorderLoader, FetchCommand, Request};
use tracing::{debug, info, warn};

use crate::camera::{GlobeView, TilePose};
use crate::config::GlobeConfig;
use crate::engine::{EngineAdapter, EngineProjector, ViewTransition};
use crate::events::UiEvent;
use crate::fly::FlyTo;
use crate::interaction::{InteractionRouter, InteractionSink, RouterSettings, ToolMode};
use crate::mode_switch::{ModeSwitchController, SwitchContext, SwitchOutcome};
use crate::sphere::SphereEngine;
use crate::state::{GlobeControllerState, Recompute};
use crate::status::{Advisories, Advisory, AdvisoryKind, StatusBoard};
use crate::tile::{TileCommand, TileEngine};

/// Recompute passes per tick. A pass may mark follow-up work (an engine
/// switch marks markers and overlays); it runs in the same tick.
const MAX_RECOMPUTE_PASSES: usize = 3;

const SELECTION_RING_PX: f32 = 10.0;
const HIGHLIGHT_RING_PX: f32 = 14.0;

const LOADING_BORDERS: &str = "Loading borders...";

pub struct GlobeController {
    config: GlobeConfig,
    state: GlobeControllerState,
    sphere: SphereEngine,
    tile: TileEngine,
    router: InteractionRouter,
    marker_renderer: SiteMarkerRenderer,
    overlays: OverlayRenderer,
    labels: LabelVisibilityManager,
    borders: EmpireBorderLoader,
    layers_ready: LayersReady,
    status: StatusBoard,
    advisories: Advisories,
    frame: Frame,
    fly: Option<FlyTo>,
    view_transition: Option<ViewTransition>,
    events: Vec<UiEvent>,
    fetches: Vec<FetchCommand>,
}

impl GlobeController {
    pub fn new(config: GlobeConfig, now: Time) -> Self {
        Self::with_view(config, GlobeView::default(), now)
    }

    pub fn with_view(config: GlobeConfig, view: GlobeView, now: Time) -> Self {
        let mode = ModeSwitchController::new(config.switch_threshold_percent, config.crossfade_ms);
        Self {
            state: GlobeControllerState::new(view, mode),
            sphere: SphereEngine::new(),
            tile: TileEngine::new(),
            router: InteractionRouter::new(RouterSettings::from(&config)),
            marker_renderer: SiteMarkerRenderer::new(config.palette.clone()),
            overlays: OverlayRenderer::new(),
            labels: LabelVisibilityManager::new(config.label_settings(), config.label_zoom_ranges.clone()),
            borders: EmpireBorderLoader::new(config.boundary_base_url.clone()),
            layers_ready: LayersReady::new(),
            status: StatusBoard::new(config.status_min_display_ms),
            advisories: Advisories::new(),
            frame: Frame::first(now),
            fly: None,
            view_transition: None,
            events: Vec::new(),
            fetches: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &GlobeConfig {
        &self.config
    }

    pub fn state(&self) -> &GlobeControllerState {
        &self.state
    }

    pub fn view(&self) -> GlobeView {
        self.state.camera.view()
    }

    pub fn primary(&self) -> EngineKind {
        self.state.mode.primary()
    }

    pub fn sphere(&self) -> &SphereEngine {
        &self.sphere
    }

    pub fn tile(&self) -> &TileEngine {
        &self.tile
    }

    pub fn borders(&self) -> &EmpireBorderLoader {
        &self.borders
    }

    pub fn labels(&self) -> &LabelVisibilityManager {
        &self.labels
    }

    pub fn overlay_renderer(&self) -> &OverlayRenderer {
        &self.overlays
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status.current()
    }

    pub fn advisories(&self) -> &Advisories {
        &self.advisories
    }

    pub fn is_flying(&self) -> bool {
        self.fly.is_some()
    }

    pub fn take_events(&mut self) -> Vec<UiEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_fetch_commands(&mut self) -> Vec<FetchCommand> {
        std::mem::take(&mut self.fetches)
    }

    pub fn take_tile_commands(&mut self) -> Vec<TileCommand> {
        self.tile.take_commands()
    }

    fn primary_engine(&self) -> &dyn EngineAdapter {
        match self.state.mode.primary() {
            EngineKind::Sphere => &self.sphere,
            EngineKind::Tile => &self.tile,
        }
    }

    fn primary_engine_mut(&mut self) -> &mut dyn EngineAdapter {
        match self.state.mode.primary() {
            EngineKind::Sphere => &mut self.sphere,
            EngineKind::Tile => &mut self.tile,
        }
    }

    fn mark_camera(&mut self, transition: ViewTransition) {
        self.view_transition = Some(match (self.view_transition, transition) {
            (Some(ViewTransition::Jump), _) | (_, ViewTransition::Jump) => ViewTransition::Jump,
            _ => ViewTransition::Ease,
        });
        self.state.dirty.mark_all([Recompute::Camera, Recompute::EngineSelection]);
    }

    // ---- frame loop ----------------------------------------------------

    /// Advances one frame at host time `now`.
    ///
    /// Order: fly-to, sphere inertia, pointer timers, queued recomputes,
    /// crossfade, labels, status line.
    pub fn tick(&mut self, now: Time) {
        self.frame = self.frame.advance(now);
        let now = self.frame.time;

        if let Some((view, landed)) = self.fly.as_ref().map(|fly| fly.sample(now)) {
            self.state.camera.set_view(view);
            self.mark_camera(ViewTransition::Jump);
            if landed {
                self.fly = None;
            }
        }

        let rotated = self.sphere.update(self.frame.dt_s);
        if rotated && self.primary() == EngineKind::Sphere && self.fly.is_none() {
            if let Some(center) = self.sphere.look_at() {
                self.state.camera.set_center(center);
            }
        }

        self.router.poll(now, &mut self.state, &mut self.events);

        for _ in 0..MAX_RECOMPUTE_PASSES {
            let batch = self.state.dirty.drain();
            if batch.is_empty() {
                break;
            }
            for item in batch {
                self.recompute(item, now);
            }
        }

        self.state.mode.advance(now, &mut self.sphere, &mut self.tile);

        self.labels.set_zoom_percent(self.state.camera.zoom_percent(), now);
        let engine: &dyn EngineAdapter = match self.state.mode.primary() {
            EngineKind::Sphere => &self.sphere,
            EngineKind::Tile => &self.tile,
        };
        let draws = self.labels.frame(now, &EngineProjector(engine));
        self.primary_engine_mut().draw_labels(draws);

        if self.status.poll(now) {
            self.events.push(UiEvent::Status { message: None });
        }
    }

    fn recompute(&mut self, item: Recompute, now: Time) {
        match item {
            Recompute::EngineSelection => self.select_engine(now),
            Recompute::Camera => {
                let transition = self.view_transition.take().unwrap_or(ViewTransition::Jump);
                let camera = self.state.camera.clone();
                self.primary_engine_mut().apply_view(&camera, transition);
            }
            Recompute::Markers => {
                let target = match self.state.mode.primary() {
                    EngineKind::Sphere => MarkerTarget::Sphere {
                        satellite: self.state.satellite,
                    },
                    EngineKind::Tile => MarkerTarget::Tile,
                };
                let set = self
                    .marker_renderer
                    .build(&self.state.records, self.state.color_mode, target);
                self.primary_engine_mut().set_markers(set);
            }
            Recompute::Overlay(kind) => {
                let primitives = self.overlay_primitives(kind);
                match self.state.mode.primary() {
                    EngineKind::Sphere => self.overlays.sync(kind, &primitives, &mut self.sphere),
                    EngineKind::Tile => self.overlays.sync(kind, &primitives, &mut self.tile),
                }
            }
        }
    }

    fn select_engine(&mut self, now: Time) {
        let target = self.state.mode.target_for(self.state.camera.zoom_percent());
        let outcome = self.state.mode.switch_to(
            target,
            now,
            SwitchContext {
                camera: &mut self.state.camera,
                tool: self.state.tool,
                sphere: &mut self.sphere,
                tile: &mut self.tile,
            },
        );
        let SwitchOutcome::Switched { from, to } = outcome else {
            return;
        };
        self.router.reset();
        let frozen = self.state.hover.frozen.is_some();
        self.state.hover.clear();
        if frozen {
            self.events.push(UiEvent::TooltipReleased);
        }
        self.overlays.reset();
        self.state.dirty.mark(Recompute::Markers);
        self.state.dirty.mark_all(Recompute::all_overlays());
        self.events.push(UiEvent::EngineSwitched { from, to });
    }

    /// Engine-neutral primitives for one overlay kind, from current state.
    fn overlay_primitives(&self, kind: OverlayKind) -> Vec<OverlayPrimitive> {
        let s = &self.state;
        match kind {
            OverlayKind::EmpireBorders => border_primitives(self.borders.displayed().map(|b| b.as_ref())),
            OverlayKind::Measurements => measurement_primitives(&s.measure.measurements),
            OverlayKind::MeasurementPreview => {
                if s.tool != ToolMode::Measuring {
                    return Vec::new();
                }
                measurement_preview_primitives(s.measure.pending.as_ref(), s.cursor, s.measure.next_color())
            }
            OverlayKind::Proximity => s
                .proximity
                .center
                .map(|c| proximity_primitives(c, s.proximity.radius_km, false))
                .unwrap_or_default(),
            OverlayKind::ProximityPreview => match (s.proximity.is_picking, s.proximity.preview) {
                (true, Some(c)) => proximity_primitives(c, s.proximity.radius_km, true),
                _ => Vec::new(),
            },
            OverlayKind::SelectionRings => {
                let positions: Vec<LngLat> = s
                    .selection
                    .iter()
                    .filter_map(|id| s.record(id).and_then(SiteRecord::lng_lat))
                    .collect();
                ring_primitives(&positions, SELECTION_COLOR, SELECTION_RING_PX)
            }
            OverlayKind::Highlight => {
                let positions: Vec<LngLat> = s
                    .highlighted
                    .iter()
                    .filter_map(|id| s.record(id).and_then(SiteRecord::lng_lat))
                    .collect();
                ring_primitives(&positions, HIGHLIGHT_COLOR, HIGHLIGHT_RING_PX)
            }
        }
    }

    // ---- camera --------------------------------------------------------

    pub fn set_viewport(&mut self, width_px: f64, height_px: f64) {
        self.sphere.set_viewport(width_px, height_px);
        self.tile.set_viewport(width_px, height_px);
    }

    pub fn set_view(&mut self, view: GlobeView) {
        self.fly = None;
        if self.state.camera.set_view(view) {
            self.mark_camera(ViewTransition::Jump);
        }
    }

    /// Zoom slider.
    pub fn set_zoom_percent(&mut self, zoom_percent: f64) {
        self.fly = None;
        if self.state.camera.set_zoom_percent(zoom_percent) {
            self.mark_camera(ViewTransition::Ease);
        }
    }

    /// Wheel or pinch, in zoom percent.
    pub fn zoom_by(&mut self, delta_percent: f64) {
        if delta_percent.is_finite() {
            self.set_zoom_percent(self.state.camera.zoom_percent() + delta_percent);
        }
    }

    /// Animates to `target` over `duration_ms`. A later camera gesture
    /// cancels the flight; crossing the threshold mid-flight switches
    /// engines as usual.
    pub fn fly_to(&mut self, target: LngLat, zoom_percent: f64, duration_ms: u64, now: Time) {
        if !target.is_finite() {
            debug!(?target, "fly-to ignored: non-finite target");
            return;
        }
        self.fly = Some(FlyTo::new(self.state.camera.view(), target, zoom_percent, now, duration_ms));
    }

    fn camera_gesture(&mut self) {
        self.fly = None;
        if let Some(center) = self.primary_engine().look_at() {
            self.state.camera.set_center(center);
        }
    }

    // ---- pointer input -------------------------------------------------

    fn accepts_input_from(&self, engine: EngineKind) -> bool {
        let primary = self.state.mode.primary();
        if engine != primary {
            debug!(engine = ?engine, primary = ?primary, "ignoring input from the non-primary engine");
        }
        engine == primary
    }

    fn route<R>(
        &mut self,
        f: impl FnOnce(&mut InteractionRouter, &mut dyn InteractionSink, &mut GlobeControllerState, &mut Vec<UiEvent>) -> R,
    ) -> R {
        let sink: &mut dyn InteractionSink = match self.state.mode.primary() {
            EngineKind::Sphere => &mut self.sphere,
            EngineKind::Tile => &mut self.tile,
        };
        f(&mut self.router, sink, &mut self.state, &mut self.events)
    }

    pub fn pointer_down(&mut self, engine: EngineKind, px: [f64; 2], now: Time) {
        if !self.accepts_input_from(engine) {
            return;
        }
        if self.state.tool != ToolMode::Measuring {
            self.fly = None;
        }
        self.route(|router, sink, state, _| router.pointer_down(sink, px, now, state));
    }

    pub fn pointer_move(&mut self, engine: EngineKind, px: [f64; 2], now: Time) {
        if !self.accepts_input_from(engine) {
            return;
        }
        let moved = self.route(|router, sink, state, events| router.pointer_move(sink, px, now, state, events));
        if moved {
            self.camera_gesture();
        }
    }

    pub fn pointer_up(&mut self, engine: EngineKind, px: [f64; 2], now: Time) {
        if !self.accepts_input_from(engine) {
            return;
        }
        let moved = self.route(|router, sink, state, events| router.pointer_up(sink, px, now, state, events));
        if moved {
            self.camera_gesture();
        }
    }

    pub fn click(&mut self, engine: EngineKind, px: [f64; 2], multi_select: bool) {
        if !self.accepts_input_from(engine) {
            return;
        }
        self.route(|router, sink, state, events| router.click(sink, px, multi_select, state, events));
    }

    pub fn dismiss_tooltip(&mut self) {
        self.router.dismiss_tooltip(&mut self.state, &mut self.events);
    }

    /// Switches tool mode. Leaving a tool cancels its unfinished gesture.
    pub fn set_tool(&mut self, tool: ToolMode) {
        let previous = self.state.tool;
        if previous == tool {
            return;
        }
        if previous == ToolMode::Measuring && self.state.measure.pending.take().is_some() {
            debug!("unfinished measurement discarded");
        }
        self.state.proximity.is_picking = tool == ToolMode::ProximityPicking;
        if tool != ToolMode::ProximityPicking {
            self.state.proximity.preview = None;
        }
        self.state.tool = tool;
        self.primary_engine_mut().set_tool_cursor(tool);
        self.state.dirty.mark_all([
            Recompute::Overlay(OverlayKind::MeasurementPreview),
            Recompute::Overlay(OverlayKind::ProximityPreview),
        ]);
    }

    // ---- data ----------------------------------------------------------

    /// Replaces the filtered record set. Markers are rebuilt wholesale;
    /// selection and highlight drop ids that are gone.
    pub fn set_records(&mut self, records: Vec<SiteRecord>) {
        let ids: BTreeSet<SiteId> = records.iter().map(|r| r.id.clone()).collect();
        self.state.records = records;
        if self.state.selection.retain(|id| ids.contains(id)) {
            self.events.push(UiEvent::SelectionChanged {
                ids: self.state.selection.iter().cloned().collect(),
            });
        }
        if self.state.highlighted.as_ref().is_some_and(|id| !ids.contains(id)) {
            self.state.highlighted = None;
        }
        self.state.dirty.mark_all([
            Recompute::Markers,
            Recompute::Overlay(OverlayKind::SelectionRings),
            Recompute::Overlay(OverlayKind::Highlight),
        ]);
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        if self.state.color_mode != mode {
            self.state.color_mode = mode;
            self.state.dirty.mark(Recompute::Markers);
        }
    }

    pub fn set_satellite(&mut self, satellite: bool) {
        if self.state.satellite != satellite {
            self.state.satellite = satellite;
            self.state.dirty.mark(Recompute::Markers);
        }
    }

    pub fn set_labels(&mut self, labels: Vec<LabelSpec>, now: Time) {
        self.labels.set_labels(labels, now);
    }

    pub fn set_label_category_enabled(&mut self, category: LabelCategory, enabled: bool, now: Time) {
        self.labels.set_category_enabled(category, enabled, now);
    }

    // ---- empire borders ------------------------------------------------

    /// Active historical entities and the year shown for each.
    pub fn set_active_empires(&mut self, active: BTreeMap<String, i32>, now: Time) {
        let commands = self.borders.set_active(&active);
        self.labels.set_visible_empires(active.keys().cloned().collect(), now);
        self.state.active_empires = active;
        self.fetches.extend(commands);
        self.state.dirty.mark(Recompute::Overlay(OverlayKind::EmpireBorders));
        self.refresh_loading_status(now);
    }

    /// Feeds a finished boundary fetch back in. Responses to aborted or
    /// superseded requests are discarded.
    pub fn boundary_response(&mut self, request: Request, payload: Result<&str, BoundaryError>, now: Time) {
        match self.borders.complete(request, payload) {
            Completion::Shown { key, replaced } => {
                debug!(key = %key, ?replaced, "boundary shown");
                self.state.dirty.mark(Recompute::Overlay(OverlayKind::EmpireBorders));
            }
            Completion::Failed { key } => {
                debug!(key = %key, "boundary layer left empty");
                self.state.dirty.mark(Recompute::Overlay(OverlayKind::EmpireBorders));
            }
            Completion::Discarded => {}
        }
        self.refresh_loading_status(now);
    }

    fn refresh_loading_status(&mut self, now: Time) {
        if self.borders.is_loading() {
            if self.status.show(LOADING_BORDERS, now) {
                self.events.push(UiEvent::Status {
                    message: Some(LOADING_BORDERS.to_string()),
                });
            }
        } else {
            self.status.clear();
        }
    }

    /// Records inside any displayed empire boundary, in record order.
    pub fn sites_within_empires(&self) -> Vec<SiteId> {
        self.state
            .records
            .iter()
            .filter(|r| r.lng_lat().is_some_and(|p| self.borders.contains(p)))
            .map(|r| r.id.clone())
            .collect()
    }

    // ---- measurements, proximity, selection ----------------------------

    pub fn remove_measurement(&mut self, id: MeasurementId) -> bool {
        let removed = self.state.measure.remove(id);
        if removed {
            self.events.push(UiEvent::MeasurementRemoved { id });
            self.state.dirty.mark(Recompute::Overlay(OverlayKind::Measurements));
        }
        removed
    }

    pub fn clear_measurements(&mut self) {
        if self.state.measure.clear() {
            self.events.push(UiEvent::MeasurementsCleared);
            self.state.dirty.mark_all([
                Recompute::Overlay(OverlayKind::Measurements),
                Recompute::Overlay(OverlayKind::MeasurementPreview),
            ]);
        }
    }

    pub fn set_proximity_radius(&mut self, radius_km: f64) {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            debug!(radius_km, "proximity radius ignored");
            return;
        }
        self.state.proximity.radius_km = radius_km;
        self.state.dirty.mark_all([
            Recompute::Overlay(OverlayKind::Proximity),
            Recompute::Overlay(OverlayKind::ProximityPreview),
        ]);
    }

    pub fn clear_proximity(&mut self) {
        if self.state.proximity.center.take().is_some() {
            self.events.push(UiEvent::ProximityCleared);
            self.state.dirty.mark(Recompute::Overlay(OverlayKind::Proximity));
        }
    }

    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = SiteId>) {
        let next: BTreeSet<SiteId> = ids.into_iter().collect();
        let current: BTreeSet<SiteId> = self.state.selection.iter().cloned().collect();
        if next == current {
            return;
        }
        self.state.selection.clear();
        for id in next {
            self.state.selection.insert(id);
        }
        self.events.push(UiEvent::SelectionChanged {
            ids: self.state.selection.iter().cloned().collect(),
        });
        self.state.dirty.mark(Recompute::Overlay(OverlayKind::SelectionRings));
    }

    pub fn set_highlighted(&mut self, id: Option<SiteId>) {
        if self.state.highlighted != id {
            self.state.highlighted = id;
            self.state.dirty.mark(Recompute::Overlay(OverlayKind::Highlight));
        }
    }

    // ---- engine lifecycle ----------------------------------------------

    pub fn tile_ready(&mut self) {
        self.tile.mark_ready();
        self.state.dirty.mark(Recompute::EngineSelection);
    }

    /// The tile engine could not start: warn once, stay on the sphere.
    pub fn tile_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tile.mark_failed(reason.clone());
        self.state.mode.pin_tile_off();
        self.state.dirty.mark(Recompute::EngineSelection);
        self.raise_advisory(Advisory::TileEngineUnavailable { reason });
    }

    /// Tile camera as reported by the host's map library. Only the primary
    /// engine writes the stored view.
    pub fn tile_camera_changed(&mut self, pose: TilePose) {
        if !self.tile.camera_moved(pose) || self.state.mode.primary() != EngineKind::Tile {
            return;
        }
        self.fly = None;
        let view = self.state.camera.from_engine_b(self.tile.pose());
        let zoom_changed = view.zoom_percent != self.state.camera.zoom_percent();
        self.state.camera.set_view(view);
        if zoom_changed {
            self.state.dirty.mark(Recompute::EngineSelection);
        }
    }

    pub fn context_lost(&mut self) {
        self.sphere.context_lost();
        self.labels.invalidate();
        if self.state.mode.primary() == EngineKind::Sphere {
            self.overlays.reset();
        }
    }

    /// Rebuilds all sphere geometry from state and asks the host to resend
    /// label data.
    pub fn context_restored(&mut self) {
        self.sphere.context_restored();
        self.state.dirty.mark_all([Recompute::Camera, Recompute::Markers]);
        self.state.dirty.mark_all(Recompute::all_overlays());
        if self.labels.needs_reload() {
            self.events.push(UiEvent::LabelsReloadRequested);
        }
        info!("rebuilding sphere geometry after context restore");
    }

    pub fn report_software_rendering(&mut self) {
        self.raise_advisory(Advisory::SoftwareRendering);
    }

    fn raise_advisory(&mut self, advisory: Advisory) {
        if self.advisories.raise(advisory.clone()) {
            warn!(kind = ?advisory.kind(), "advisory raised");
            self.events.push(UiEvent::Advisory { advisory });
        }
    }

    pub fn dismiss_advisory(&mut self, kind: AdvisoryKind) {
        if self.advisories.dismiss(kind) {
            self.events.push(UiEvent::AdvisoryDismissed { kind });
        }
    }

    /// Outcome of one essential base layer (coastlines, borders, labels).
    pub fn base_layer_loaded(&mut self, layer: BaseLayer, loaded: bool) {
        let state = if loaded {
            LayerLoad::Loaded
        } else {
            warn!(?layer, "base layer failed to load");
            LayerLoad::Failed
        };
        if self.layers_ready.set(layer, state) {
            info!("essential base layers settled");
            self.events.push(UiEvent::LayersReady);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(v: u64) -> Time {
        Time::ZERO.plus_millis(v)
    }

    fn controller() -> GlobeController {
        let mut c = GlobeController::new(GlobeConfig::default(), Time::ZERO);
        c.set_viewport(800.0, 600.0);
        c
    }

    #[test]
    fn first_tick_builds_markers_on_the_sphere() {
        let mut c = controller();
        c.set_records(vec![
            SiteRecord::new("a", 0.0, 0.0),
            SiteRecord::new("b", 1.0, 1.0),
            SiteRecord::new("bad", f64::NAN, 1.0),
        ]);
        c.tick(ms(16));
        assert_eq!(c.primary(), EngineKind::Sphere);
        assert_eq!(c.sphere().markers().map(|m| m.site_count()), Some(2));
        assert!(c.state().dirty.is_empty());
    }

    #[test]
    fn input_from_the_non_primary_engine_is_ignored() {
        let mut c = controller();
        c.tick(ms(16));
        c.set_tool(ToolMode::Measuring);
        c.click(EngineKind::Tile, [400.0, 300.0], false);
        assert!(c.state().measure.pending.is_none());
        c.click(EngineKind::Sphere, [400.0, 300.0], false);
        assert!(c.state().measure.pending.is_some());
    }

    #[test]
    fn tile_failure_raises_one_advisory_and_pins_sphere() {
        let mut c = controller();
        c.tile_failed("offline");
        c.tile_failed("offline");
        c.set_zoom_percent(90.0);
        c.tick(ms(16));
        assert_eq!(c.primary(), EngineKind::Sphere);
        let advisories: Vec<UiEvent> = c
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, UiEvent::Advisory { .. }))
            .collect();
        assert_eq!(advisories.len(), 1);

        c.dismiss_advisory(AdvisoryKind::TileEngineUnavailable);
        assert_eq!(
            c.take_events(),
            vec![UiEvent::AdvisoryDismissed {
                kind: AdvisoryKind::TileEngineUnavailable
            }]
        );
    }

    #[test]
    fn layers_ready_fires_once_even_with_failures() {
        let mut c = controller();
        c.base_layer_loaded(BaseLayer::Coastlines, true);
        c.base_layer_loaded(BaseLayer::Borders, false);
        assert!(c.take_events().is_empty());
        c.base_layer_loaded(BaseLayer::Labels, true);
        c.base_layer_loaded(BaseLayer::Labels, true);
        assert_eq!(c.take_events(), vec![UiEvent::LayersReady]);
    }

    #[test]
    fn tool_change_discards_unfinished_measurement() {
        let mut c = controller();
        c.tick(ms(16));
        c.set_tool(ToolMode::Measuring);
        c.click(EngineKind::Sphere, [400.0, 300.0], false);
        assert!(c.state().measure.pending.is_some());
        c.set_tool(ToolMode::Normal);
        assert!(c.state().measure.pending.is_none());
        assert_eq!(c.sphere().frame().cursor, "grab");
    }

    #[test]
    fn context_restore_rebuilds_and_requests_labels() {
        let mut c = controller();
        c.set_records(vec![SiteRecord::new("a", 0.0, 0.0)]);
        c.tick(ms(16));
        c.context_lost();
        assert!(c.sphere().markers().is_none());

        c.context_restored();
        assert!(c.take_events().contains(&UiEvent::LabelsReloadRequested));
        c.tick(ms(32));
        assert_eq!(c.sphere().markers().map(|m| m.site_count()), Some(1));
    }

    #[test]
    fn records_change_prunes_selection() {
        let mut c = controller();
        c.set_records(vec![SiteRecord::new("a", 0.0, 0.0), SiteRecord::new("b", 1.0, 0.0)]);
        c.set_selection([SiteId::new("a"), SiteId::new("b")]);
        c.set_highlighted(Some(SiteId::new("b")));
        c.take_events();

        c.set_records(vec![SiteRecord::new("a", 0.0, 0.0)]);
        assert_eq!(
            c.take_events(),
            vec![UiEvent::SelectionChanged {
                ids: vec![SiteId::new("a")]
            }]
        );
        assert_eq!(c.state().highlighted, None);
    }
}
