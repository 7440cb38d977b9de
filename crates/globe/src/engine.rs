//! The seam between the controller and a rendering backend.

use std::collections::BTreeMap;

use foundation::{LngLat, Vec3};
use layers::{EngineKind, LabelDraw, LabelProjector, MarkerSet, OverlayKind, OverlaySink};
use scene::{ScreenCandidate, SiteId, pick_nearest};

use crate::camera::CameraViewModel;
use crate::interaction::{InteractionSink, SiteHit};

/// How an engine camera moves to a new view.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewTransition {
    /// Snap immediately (engine switches, programmatic views).
    Jump,
    /// Animate with the engine's own smoothing (wheel zoom).
    Ease,
}

/// One rendering backend as the controller sees it.
///
/// Adapters only ever receive engine-neutral data: views, marker sets,
/// overlay primitives and label draws. They never write controller state.
pub trait EngineAdapter: InteractionSink + OverlaySink {
    fn kind(&self) -> EngineKind;

    /// `false` until the backend can accept a camera; switching to an
    /// uninitialized engine is a no-op.
    fn is_initialized(&self) -> bool;

    fn apply_view(&mut self, camera: &CameraViewModel, transition: ViewTransition);

    /// Geographic point at the centre of the engine's view.
    fn look_at(&self) -> Option<LngLat>;

    /// Replaces the marker set wholesale.
    fn set_markers(&mut self, markers: MarkerSet);
    fn markers(&self) -> Option<&MarkerSet>;
    fn set_markers_visible(&mut self, visible: bool);
    fn markers_visible(&self) -> bool;

    fn set_opacity(&mut self, opacity: f32);
    fn opacity(&self) -> f32;

    /// Direction from the globe centre toward the camera, for engines with a
    /// back hemisphere.
    fn view_dir(&self) -> Option<Vec3>;
    fn viewport_px(&self) -> [f64; 2];
    fn set_viewport(&mut self, width_px: f64, height_px: f64);

    fn draw_labels(&mut self, labels: Vec<LabelDraw>);

    fn clear_all_overlays(&mut self) {
        for kind in OverlayKind::ALL {
            self.clear_overlay(kind);
        }
    }
}

/// Label projection through whichever engine is primary.
pub struct EngineProjector<'a>(pub &'a dyn EngineAdapter);

impl LabelProjector for EngineProjector<'_> {
    fn project(&self, p: LngLat) -> Option<[f32; 2]> {
        self.0.project(p).map(|[x, y]| [x as f32, y as f32])
    }

    fn viewport_px(&self) -> [f32; 2] {
        let [w, h] = self.0.viewport_px();
        [w as f32, h as f32]
    }

    fn view_dir(&self) -> Option<Vec3> {
        self.0.view_dir()
    }
}

/// Nearest site marker within `radius_px`, using `project` for screen space.
/// Markers that do not project (behind the globe, off the map) are skipped.
pub(crate) fn pick_site(
    markers: Option<&MarkerSet>,
    px: [f64; 2],
    radius_px: f64,
    project: impl Fn(LngLat) -> Option<[f64; 2]>,
) -> Option<SiteHit> {
    let markers = markers?;
    let mut positions: BTreeMap<&SiteId, LngLat> = BTreeMap::new();
    let candidates: Vec<ScreenCandidate<&SiteId>> = markers
        .sites()
        .filter_map(|(id, p)| {
            let screen_px = project(p)?;
            positions.insert(id, p);
            Some(ScreenCandidate { key: id, screen_px })
        })
        .collect();
    let hit = pick_nearest(candidates, px, radius_px)?;
    let lng_lat = *positions.get(hit.key)?;
    Some(SiteHit {
        id: hit.key.clone(),
        lng_lat,
        distance_px: hit.distance_px,
    })
}
