//! Whole-controller scenarios: recorded input sequences replayed against
//! both engines with a deterministic clock.

use std::collections::BTreeMap;

use foundation::{LngLat, Time};
use layers::{EngineKind, OverlayKind};
use pretty_assertions::assert_eq;
use scene::{SiteId, SiteRecord};
use streaming::{FetchCommand, Request};

use crate::camera::{GlobeView, percent_to_distance};
use crate::config::GlobeConfig;
use crate::controller::GlobeController;
use crate::engine::EngineAdapter;
use crate::events::UiEvent;
use crate::interaction::{InteractionSink, ToolMode};
use crate::status::AdvisoryKind;

const FRAME_MS: u64 = 16;

fn assert_close(a: f64, b: f64, eps: f64) {
    let diff = (a - b).abs();
    assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
}

struct Harness {
    c: GlobeController,
    now_ms: u64,
}

impl Harness {
    fn new(view: GlobeView) -> Self {
        let mut h = Self::pending_tile(view);
        h.c.tile_ready();
        h.tick();
        h
    }

    /// Tile engine not started yet.
    fn pending_tile(view: GlobeView) -> Self {
        let mut c = GlobeController::with_view(GlobeConfig::default(), view, Time::ZERO);
        c.set_viewport(800.0, 600.0);
        Self { c, now_ms: 0 }
    }

    fn now(&self) -> Time {
        Time::ZERO.plus_millis(self.now_ms)
    }

    fn tick(&mut self) {
        self.now_ms += FRAME_MS;
        self.c.tick(self.now());
    }

    /// Long enough for crossfades and eased zoom to finish.
    fn settle(&mut self) {
        for _ in 0..40 {
            self.tick();
        }
    }

    fn zoom(&mut self, percent: f64) {
        self.c.set_zoom_percent(percent);
        self.tick();
    }

    fn project(&self, p: LngLat) -> [f64; 2] {
        let px = match self.c.primary() {
            EngineKind::Sphere => self.c.sphere().project(p),
            EngineKind::Tile => self.c.tile().project(p),
        };
        px.expect("point on screen")
    }

    /// Clicks a few pixels off `p` on whichever engine is primary.
    fn click_near(&mut self, p: LngLat) {
        let [x, y] = self.project(p);
        let engine = self.c.primary();
        self.c.click(engine, [x + 3.0, y - 2.0], false);
    }

    fn switch_events(&mut self) -> Vec<(EngineKind, EngineKind)> {
        self.c
            .take_events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::EngineSwitched { from, to } => Some((from, to)),
                _ => None,
            })
            .collect()
    }
}

fn square(w: f64, s: f64, e: f64, n: f64) -> String {
    format!(
        r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{"name":"x"}},
        "geometry":{{"type":"Polygon","coordinates":[[[{w},{s}],[{e},{s}],[{e},{n}],[{w},{n}],[{w},{s}]]]}}}}]}}"#
    )
}

fn start(cmd: &FetchCommand) -> Request {
    match cmd {
        FetchCommand::Start { request, .. } => *request,
        other => panic!("expected start, got {other:?}"),
    }
}

#[test]
fn replayed_zoom_sequence_ends_on_the_matching_engine() {
    let mut h = Harness::new(GlobeView::new(20.0, 10.0, 0.0));
    h.c.take_events();

    let sequence = [10.0, 70.0, 65.9, 66.0, 100.0, 0.0, 66.0, 65.999, 80.0];
    for z in sequence {
        h.zoom(z);
        let expected = if z >= 66.0 { EngineKind::Tile } else { EngineKind::Sphere };
        assert_eq!(h.c.primary(), expected, "zoom {z}");
        assert_eq!(h.c.view().zoom_percent, z);
    }
    assert_eq!(h.c.state().mode.switches(), 7);

    h.settle();
    assert_eq!(h.c.primary(), EngineKind::Tile);
    assert!(!h.c.state().mode.is_transitioning());
    assert!(h.c.tile().input_enabled());
    assert!(!h.c.sphere().input_enabled());
    assert!(!h.c.sphere().markers_visible());
}

#[test]
fn switching_at_the_same_zoom_twice_is_idempotent() {
    let mut h = Harness::new(GlobeView::new(0.0, 0.0, 30.0));
    h.c.take_events();
    h.zoom(75.0);
    h.c.set_zoom_percent(75.0);
    h.tick();
    h.settle();
    assert_eq!(h.switch_events(), vec![(EngineKind::Sphere, EngineKind::Tile)]);
}

#[test]
fn zoom_round_trips_restore_the_exact_sphere_distance() {
    let mut h = Harness::new(GlobeView::new(35.0, -20.0, 40.0));
    for _ in 0..5 {
        h.zoom(85.0);
        h.settle();
        assert_eq!(h.c.primary(), EngineKind::Tile);

        h.zoom(40.0);
        h.settle();
        assert_eq!(h.c.primary(), EngineKind::Sphere);
        assert_eq!(h.c.view().zoom_percent, 40.0);
        assert_close(h.c.sphere().orbit().distance(), percent_to_distance(40.0), 1e-12);
    }
    let center = h.c.view().center();
    assert_close(center.lat, 35.0, 1e-6);
    assert_close(center.lng, -20.0, 1e-6);
}

#[test]
fn marker_counts_match_valid_records_in_both_engines() {
    let mut h = Harness::new(GlobeView::new(0.0, 0.0, 20.0));
    let mut records: Vec<SiteRecord> = (0..5)
        .map(|i| SiteRecord::new(format!("s{i}"), i as f64 * 3.0, 1.0))
        .collect();
    records.push(SiteRecord::new("no-lng", f64::NAN, 1.0));
    records.push(SiteRecord::new("no-lat", 1.0, f64::INFINITY));
    h.c.set_records(records);
    h.tick();
    assert_eq!(h.c.sphere().markers().map(|m| m.site_count()), Some(5));

    h.c.set_satellite(true);
    h.tick();
    assert_eq!(h.c.sphere().markers().map(|m| m.site_count()), Some(5));

    h.zoom(90.0);
    h.settle();
    assert_eq!(h.c.tile().markers().map(|m| m.site_count()), Some(5));
    assert!(h.c.tile().markers_visible());
    assert!(!h.c.sphere().markers_visible());
}

#[test]
fn measurement_is_identical_whichever_engine_placed_it() {
    let a = LngLat::new(0.0, 10.0);
    let b = LngLat::new(20.0, 10.0);
    let setup = |zoom: f64| {
        let mut h = Harness::new(GlobeView::new(10.0, 10.0, zoom));
        h.c.set_records(vec![
            SiteRecord::new("a", a.lng, a.lat),
            SiteRecord::new("b", b.lng, b.lat),
        ]);
        h.c.set_tool(ToolMode::Measuring);
        h.settle();
        h
    };

    let mut sphere_only = setup(30.0);
    assert_eq!(sphere_only.c.primary(), EngineKind::Sphere);
    sphere_only.click_near(a);
    sphere_only.click_near(b);

    let mut tile_only = setup(66.0);
    assert_eq!(tile_only.c.primary(), EngineKind::Tile);
    tile_only.click_near(a);
    tile_only.click_near(b);

    // First endpoint on the sphere, second after zooming into the map.
    let mut mixed = setup(30.0);
    mixed.click_near(a);
    mixed.zoom(66.0);
    mixed.settle();
    assert_eq!(mixed.c.primary(), EngineKind::Tile);
    assert!(mixed.c.state().measure.pending.is_some());
    mixed.click_near(b);

    // And the other way round: first endpoint on the map, second after
    // zooming back out to the sphere.
    let mut reverse = setup(66.0);
    reverse.click_near(a);
    reverse.zoom(30.0);
    reverse.settle();
    assert_eq!(reverse.c.primary(), EngineKind::Sphere);
    reverse.click_near(b);

    let reference = &sphere_only.c.state().measure.measurements;
    assert_eq!(reference.len(), 1);
    assert_eq!(reference[0].endpoints, [a, b]);
    assert_eq!(reference[0].snapped, [true, true]);
    assert_eq!(&tile_only.c.state().measure.measurements, reference);
    assert_eq!(&mixed.c.state().measure.measurements, reference);
    assert_eq!(&reverse.c.state().measure.measurements, reference);
    assert_eq!(
        reverse.c.state().measure.measurements[0].distance_km(),
        reference[0].distance_km()
    );
    assert!(
        mixed
            .c
            .take_events()
            .iter()
            .any(|e| matches!(e, UiEvent::MeasurementAdded { .. }))
    );
}

#[test]
fn stale_boundary_response_never_reaches_the_globe() {
    let mut h = Harness::new(GlobeView::new(25.0, 25.0, 10.0));
    h.c.set_records(vec![
        SiteRecord::new("inside", 25.0, 25.0),
        SiteRecord::new("outside", 5.0, 5.0),
    ]);
    h.c.take_events();

    let year = |y: i32| BTreeMap::from([("rome".to_string(), y)]);
    h.c.set_active_empires(year(100), h.now());
    let req100 = start(&h.c.take_fetch_commands()[0]);
    assert!(h.c.take_events().contains(&UiEvent::Status {
        message: Some("Loading borders...".to_string())
    }));

    h.c.set_active_empires(year(200), h.now());
    let cmds = h.c.take_fetch_commands();
    assert_eq!(cmds[0], FetchCommand::Abort { request: req100 });
    let req200 = start(&cmds[1]);

    h.c.boundary_response(req100, Ok(square(0.0, 0.0, 10.0, 10.0).as_str()), h.now());
    h.tick();
    assert!(!h.c.sphere().overlays().contains_key(&OverlayKind::EmpireBorders));
    assert_eq!(h.c.sites_within_empires(), Vec::<SiteId>::new());

    h.c.boundary_response(req200, Ok(square(20.0, 20.0, 30.0, 30.0).as_str()), h.now());
    h.tick();
    assert_eq!(h.c.borders().displayed_year("rome"), Some(200));
    assert!(h.c.sphere().overlays().contains_key(&OverlayKind::EmpireBorders));
    assert_eq!(h.c.sites_within_empires(), vec![SiteId::new("inside")]);

    // The loading line stays up for its minimum display time, then clears.
    for _ in 0..100 {
        h.tick();
    }
    assert_eq!(h.c.status_message(), None);
    assert!(h.c.take_events().contains(&UiEvent::Status { message: None }));
}

#[test]
fn tile_engine_that_never_starts_keeps_the_sphere_primary() {
    let mut h = Harness::pending_tile(GlobeView::new(0.0, 0.0, 90.0));
    h.tick();
    assert_eq!(h.c.primary(), EngineKind::Sphere);

    h.c.tile_failed("webgl unavailable");
    h.zoom(95.0);
    h.settle();
    assert_eq!(h.c.primary(), EngineKind::Sphere);
    assert!(h.c.take_tile_commands().is_empty());
    assert!(h.c.advisories().is_active(AdvisoryKind::TileEngineUnavailable));
    assert_eq!(h.switch_events(), Vec::new());
}

#[test]
fn late_tile_start_takes_over_at_high_zoom() {
    let mut h = Harness::pending_tile(GlobeView::new(0.0, 0.0, 80.0));
    h.tick();
    assert_eq!(h.c.primary(), EngineKind::Sphere);

    h.c.tile_ready();
    h.tick();
    assert_eq!(h.c.primary(), EngineKind::Tile);
}

#[test]
fn frozen_tooltip_is_released_by_an_engine_switch() {
    let mut h = Harness::new(GlobeView::new(0.0, 0.0, 30.0));
    h.c.set_records(vec![SiteRecord::new("a", 0.0, 0.0)]);
    h.tick();

    let px = h.project(LngLat::new(0.0, 0.0));
    h.c.pointer_move(EngineKind::Sphere, px, h.now());
    for _ in 0..40 {
        h.tick();
    }
    assert!(h.c.state().hover.frozen.is_some());
    assert!(h.c.take_events().contains(&UiEvent::TooltipFrozen { site: SiteId::new("a") }));

    h.zoom(80.0);
    assert_eq!(h.c.primary(), EngineKind::Tile);
    assert!(h.c.state().hover.frozen.is_none());
    assert!(h.c.take_events().contains(&UiEvent::TooltipReleased));
}

#[test]
fn context_loss_rebuilds_markers_and_overlays_from_state() {
    let mut h = Harness::new(GlobeView::new(0.0, 0.0, 20.0));
    h.c.set_records(vec![SiteRecord::new("a", 0.0, 0.0)]);
    h.c.set_selection([SiteId::new("a")]);
    h.tick();
    assert!(h.c.sphere().overlays().contains_key(&OverlayKind::SelectionRings));

    h.c.context_lost();
    h.tick();
    assert!(h.c.sphere().markers().is_none());
    assert!(h.c.sphere().overlays().is_empty());

    h.c.context_restored();
    h.tick();
    assert_eq!(h.c.sphere().markers().map(|m| m.site_count()), Some(1));
    assert!(h.c.sphere().overlays().contains_key(&OverlayKind::SelectionRings));
    assert!(h.c.labels().needs_reload());
}

#[test]
fn fly_to_crosses_the_threshold_and_lands() {
    let mut h = Harness::new(GlobeView::new(0.0, 0.0, 10.0));
    h.c.fly_to(LngLat::new(30.0, 40.0), 90.0, 400, h.now());
    for _ in 0..40 {
        h.tick();
    }
    assert!(!h.c.is_flying());
    assert_eq!(h.c.primary(), EngineKind::Tile);
    let view = h.c.view();
    assert_close(view.longitude, 30.0, 1e-9);
    assert_close(view.latitude, 40.0, 1e-9);
    assert_eq!(view.zoom_percent, 90.0);
}
