//! Authoritative-engine flag and the crossfade between engines.
//!
//! Two states, sphere-primary and tile-primary, plus an in-flight
//! [`Transition`] during which both engines render. The switch point is a
//! single threshold on zoom percent with no hysteresis.

use foundation::Time;
use layers::EngineKind;
use serde::Serialize;
use tracing::{debug, info};

use crate::camera::CameraViewModel;
use crate::engine::{EngineAdapter, ViewTransition};
use crate::interaction::ToolMode;
use crate::sphere::SphereEngine;
use crate::tile::TileEngine;

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: EngineKind,
    pub to: EngineKind,
    #[serde(skip)]
    pub started: Time,
    /// Opacities at the moment the transition started.
    #[serde(skip)]
    start_opacity: [f32; 2],
}

impl Transition {
    /// Progress in `[0, 1]`.
    pub fn progress(&self, now: Time, crossfade_ms: u64) -> f32 {
        if crossfade_ms == 0 {
            return 1.0;
        }
        (now.millis_since(self.started) / crossfade_ms as f64).clamp(0.0, 1.0) as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchOutcome {
    Switched { from: EngineKind, to: EngineKind },
    /// Already primary.
    Unchanged,
    /// The target engine cannot take over yet; nothing changed.
    NotInitialized { target: EngineKind },
}

/// Everything a switch touches besides the flag itself.
pub struct SwitchContext<'a> {
    pub camera: &'a mut CameraViewModel,
    pub tool: ToolMode,
    pub sphere: &'a mut SphereEngine,
    pub tile: &'a mut TileEngine,
}

/// `(engine of kind, the other engine)`.
pub fn split_engines<'a>(
    kind: EngineKind,
    sphere: &'a mut SphereEngine,
    tile: &'a mut TileEngine,
) -> (&'a mut dyn EngineAdapter, &'a mut dyn EngineAdapter) {
    match kind {
        EngineKind::Sphere => (sphere, tile),
        EngineKind::Tile => (tile, sphere),
    }
}

#[derive(Debug, Clone)]
pub struct ModeSwitchController {
    threshold_percent: f64,
    crossfade_ms: u64,
    primary: EngineKind,
    transition: Option<Transition>,
    /// Tile engine unusable for the rest of the session.
    tile_pinned_off: bool,
    switches: u64,
}

impl ModeSwitchController {
    pub fn new(threshold_percent: f64, crossfade_ms: u64) -> Self {
        Self {
            threshold_percent,
            crossfade_ms,
            primary: EngineKind::Sphere,
            transition: None,
            tile_pinned_off: false,
            switches: 0,
        }
    }

    pub fn primary(&self) -> EngineKind {
        self.primary
    }

    pub fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn switches(&self) -> u64 {
        self.switches
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn is_tile_pinned_off(&self) -> bool {
        self.tile_pinned_off
    }

    /// Engine that should be primary at `zoom_percent`.
    pub fn target_for(&self, zoom_percent: f64) -> EngineKind {
        if !self.tile_pinned_off && zoom_percent >= self.threshold_percent {
            EngineKind::Tile
        } else {
            EngineKind::Sphere
        }
    }

    /// Keeps the sphere engine primary from now on.
    pub fn pin_tile_off(&mut self) {
        self.tile_pinned_off = true;
    }

    /// Makes `target` primary.
    ///
    /// Entering the tile engine takes the view from the sphere camera's
    /// current look-at point. Entering the sphere engine takes only the
    /// orientation from the tile engine; distance comes from the stored zoom
    /// percent, so repeated round trips never drift.
    pub fn switch_to(&mut self, target: EngineKind, now: Time, ctx: SwitchContext<'_>) -> SwitchOutcome {
        if target == self.primary {
            return SwitchOutcome::Unchanged;
        }
        let from = self.primary;
        let (current, next) = split_engines(from, ctx.sphere, ctx.tile);
        if !next.is_initialized() {
            debug!(engine = ?target, "engine switch skipped: target not initialized");
            return SwitchOutcome::NotInitialized { target };
        }

        let start_opacity = [current.opacity(), next.opacity()];
        if let Some(center) = current.look_at() {
            ctx.camera.set_center(center);
        }
        next.apply_view(ctx.camera, ViewTransition::Jump);
        current.set_input_enabled(false);
        next.set_input_enabled(true);
        next.set_tool_cursor(ctx.tool);
        next.set_markers_visible(true);

        self.primary = target;
        self.transition = Some(Transition {
            from,
            to: target,
            started: now,
            start_opacity,
        });
        self.switches += 1;
        info!(from = ?from, to = ?target, zoom_percent = ctx.camera.zoom_percent(), "engine switched");
        SwitchOutcome::Switched { from, to: target }
    }

    /// Advances the crossfade. Once it completes, the outgoing engine's
    /// markers are hidden and its overlays cleared. Returns the finished
    /// transition.
    pub fn advance(&mut self, now: Time, sphere: &mut SphereEngine, tile: &mut TileEngine) -> Option<Transition> {
        let transition = self.transition?;
        let t = transition.progress(now, self.crossfade_ms);
        let (incoming, outgoing) = split_engines(transition.to, sphere, tile);
        let [out_start, in_start] = transition.start_opacity;
        incoming.set_opacity(in_start + (1.0 - in_start) * t);
        outgoing.set_opacity(out_start * (1.0 - t));
        if t < 1.0 {
            return None;
        }
        outgoing.set_markers_visible(false);
        outgoing.clear_all_overlays();
        outgoing.draw_labels(Vec::new());
        self.transition = None;
        debug!(from = ?transition.from, to = ?transition.to, "crossfade finished");
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{GlobeView, percent_to_distance};
    use crate::interaction::InteractionSink;
    use pretty_assertions::assert_eq;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    struct Rig {
        mode: ModeSwitchController,
        camera: CameraViewModel,
        sphere: SphereEngine,
        tile: TileEngine,
    }

    impl Rig {
        fn new() -> Self {
            let mut tile = TileEngine::new();
            tile.mark_ready();
            let camera = CameraViewModel::new(GlobeView::new(20.0, 10.0, 70.0));
            let mut sphere = SphereEngine::new();
            sphere.apply_view(&camera, ViewTransition::Jump);
            Self {
                mode: ModeSwitchController::new(66.0, 300),
                camera,
                sphere,
                tile,
            }
        }

        fn switch(&mut self, target: EngineKind, now: Time) -> SwitchOutcome {
            self.mode.switch_to(
                target,
                now,
                SwitchContext {
                    camera: &mut self.camera,
                    tool: ToolMode::Measuring,
                    sphere: &mut self.sphere,
                    tile: &mut self.tile,
                },
            )
        }
    }

    #[test]
    fn threshold_is_inclusive_and_has_no_band() {
        let mode = ModeSwitchController::new(66.0, 300);
        assert_eq!(mode.target_for(65.999), EngineKind::Sphere);
        assert_eq!(mode.target_for(66.0), EngineKind::Tile);
        assert_eq!(mode.target_for(100.0), EngineKind::Tile);
    }

    #[test]
    fn switching_twice_is_a_no_op() {
        let mut rig = Rig::new();
        let t0 = Time::ZERO;
        assert_eq!(
            rig.switch(EngineKind::Tile, t0),
            SwitchOutcome::Switched {
                from: EngineKind::Sphere,
                to: EngineKind::Tile
            }
        );
        assert_eq!(rig.switch(EngineKind::Tile, t0), SwitchOutcome::Unchanged);
        assert_eq!(rig.mode.switches(), 1);
    }

    #[test]
    fn uninitialized_target_leaves_state_untouched() {
        let mut rig = Rig::new();
        rig.tile = TileEngine::new();
        let before = rig.camera.clone();
        assert_eq!(
            rig.switch(EngineKind::Tile, Time::ZERO),
            SwitchOutcome::NotInitialized {
                target: EngineKind::Tile
            }
        );
        assert_eq!(rig.mode.primary(), EngineKind::Sphere);
        assert!(!rig.mode.is_transitioning());
        assert_eq!(rig.camera, before);
        assert!(rig.sphere.input_enabled());
    }

    #[test]
    fn switch_moves_input_and_tool_cursor_to_the_new_engine() {
        let mut rig = Rig::new();
        rig.switch(EngineKind::Tile, Time::ZERO);
        assert!(!rig.sphere.input_enabled());
        assert!(rig.tile.input_enabled());
        assert!(
            rig.tile
                .pending_commands()
                .contains(&crate::tile::TileCommand::SetCursor {
                    cursor: "crosshair".to_string()
                })
        );
    }

    #[test]
    fn reentering_sphere_keeps_stored_zoom_and_tile_orientation() {
        let mut rig = Rig::new();
        rig.switch(EngineKind::Tile, Time::ZERO);
        rig.mode.advance(Time::ZERO.plus_millis(400), &mut rig.sphere, &mut rig.tile);

        // The user pans the map; the tile engine reports a new centre at a
        // zoom that no longer matches the stored percent.
        rig.tile.camera_moved(crate::camera::TilePose {
            center: foundation::LngLat::new(-40.0, 35.0),
            zoom: 7.5,
        });
        rig.camera.set_zoom_percent(40.0);

        rig.switch(EngineKind::Sphere, Time::ZERO.plus_millis(500));
        let center = rig.sphere.look_at().expect("center");
        assert_close(center.lng, -40.0, 1e-6);
        assert_close(center.lat, 35.0, 1e-6);
        assert_close(rig.sphere.orbit().distance(), percent_to_distance(40.0), 1e-12);
        assert_close(rig.camera.zoom_percent(), 40.0, 0.0);
    }

    #[test]
    fn crossfade_hides_outgoing_markers_only_when_done() {
        let mut rig = Rig::new();
        let t0 = Time::ZERO;
        rig.switch(EngineKind::Tile, t0);

        assert_eq!(rig.mode.advance(t0.plus_millis(150), &mut rig.sphere, &mut rig.tile), None);
        assert!(rig.sphere.markers_visible());
        assert!((rig.tile.opacity() - 0.5).abs() < 1e-6);
        assert!((rig.sphere.opacity() - 0.5).abs() < 1e-6);

        let done = rig
            .mode
            .advance(t0.plus_millis(300), &mut rig.sphere, &mut rig.tile)
            .expect("finished");
        assert_eq!(done.to, EngineKind::Tile);
        assert!(!rig.sphere.markers_visible());
        assert_eq!(rig.sphere.opacity(), 0.0);
        assert_eq!(rig.tile.opacity(), 1.0);
        assert!(!rig.mode.is_transitioning());
    }

    #[test]
    fn pinned_off_tile_never_becomes_target() {
        let mut mode = ModeSwitchController::new(66.0, 300);
        mode.pin_tile_off();
        assert_eq!(mode.target_for(99.0), EngineKind::Sphere);
    }
}
