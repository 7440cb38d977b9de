//! Shared controller state.
//!
//! Every field that more than one component reads lives here, and each has
//! exactly one writer. The writer is named on the field; nothing else
//! mutates it.

use std::collections::BTreeMap;

use foundation::LngLat;
use layers::{ColorMode, MEASUREMENT_COLORS, Measurement, MeasurementId, OverlayKind, PendingPoint};
use runtime::DirtySet;
use scene::{SelectionSet, SiteId, SiteRecord};
use serde::Serialize;

use crate::camera::{CameraViewModel, GlobeView};
use crate::interaction::ToolMode;
use crate::mode_switch::ModeSwitchController;

/// Deferred work, processed once per tick in this order. The camera goes
/// first so a switch reads the outgoing engine at the latest view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Recompute {
    Camera,
    EngineSelection,
    Markers,
    Overlay(OverlayKind),
}

impl Recompute {
    pub fn all_overlays() -> impl Iterator<Item = Recompute> {
        OverlayKind::ALL.into_iter().map(Recompute::Overlay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenTooltip {
    pub site: SiteId,
    pub anchor_px: [f64; 2],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoverState {
    pub hovered: Option<SiteId>,
    pub frozen: Option<FrozenTooltip>,
    pub last_px: Option<[f64; 2]>,
}

impl HoverState {
    /// Returns `true` if anything was set.
    pub fn clear(&mut self) -> bool {
        let had = self.hovered.is_some() || self.frozen.is_some() || self.last_px.is_some();
        *self = Self::default();
        had
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityState {
    /// User-set centre; survives engine switches.
    pub center: Option<LngLat>,
    pub radius_km: f64,
    pub is_picking: bool,
    /// Live centre under the cursor while picking.
    pub preview: Option<LngLat>,
}

impl Default for ProximityState {
    fn default() -> Self {
        Self {
            center: None,
            radius_km: 50.0,
            is_picking: false,
            preview: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureState {
    pub measurements: Vec<Measurement>,
    /// First point of a measurement being placed.
    pub pending: Option<PendingPoint>,
    next_id: u64,
}

impl MeasureState {
    pub fn next_color(&self) -> layers::Color {
        MEASUREMENT_COLORS[(self.next_id as usize) % MEASUREMENT_COLORS.len()]
    }

    /// Commits the pending point and `end` as a new measurement.
    pub fn commit(&mut self, end: PendingPoint) -> Option<Measurement> {
        let start = self.pending.take()?;
        let m = Measurement {
            id: MeasurementId(self.next_id),
            endpoints: [start.position, end.position],
            snapped: [start.snapped, end.snapped],
            color: self.next_color(),
        };
        self.next_id += 1;
        self.measurements.push(m.clone());
        Some(m)
    }

    pub fn remove(&mut self, id: MeasurementId) -> bool {
        let before = self.measurements.len();
        self.measurements.retain(|m| m.id != id);
        self.measurements.len() != before
    }

    pub fn clear(&mut self) -> bool {
        let had = !self.measurements.is_empty() || self.pending.is_some();
        self.measurements.clear();
        self.pending = None;
        had
    }
}

#[derive(Debug, Clone)]
pub struct GlobeControllerState {
    /// Writer: the primary engine's camera input, wheel zoom and fly-to,
    /// all routed through the controller.
    pub camera: CameraViewModel,
    /// Writer: its own switch methods. Holds the primary-engine flag.
    pub mode: ModeSwitchController,
    /// Writer: `GlobeController::set_tool`, and `InteractionRouter` when a
    /// proximity pick completes.
    pub tool: ToolMode,
    /// Writer: `InteractionRouter`, and engine switches (reset to clean).
    pub hover: HoverState,
    /// Writer: `InteractionRouter`.
    pub cursor: Option<LngLat>,
    /// Writer: `GlobeController::set_records`.
    pub records: Vec<SiteRecord>,
    /// Writer: `GlobeController::set_color_mode`.
    pub color_mode: ColorMode,
    /// Writer: `GlobeController::set_satellite`.
    pub satellite: bool,
    /// Writer: `InteractionRouter` (placement) and the measurement API.
    pub measure: MeasureState,
    /// Writer: `InteractionRouter` (picking) and the proximity API.
    pub proximity: ProximityState,
    /// Writer: `InteractionRouter` (clicks) and the selection API.
    pub selection: SelectionSet,
    /// Writer: `GlobeController::set_highlighted`.
    pub highlighted: Option<SiteId>,
    /// Writer: `GlobeController::set_active_empires`.
    pub active_empires: BTreeMap<String, i32>,
    /// Any writer above marks the recompute its change needs.
    pub dirty: DirtySet<Recompute>,
}

impl GlobeControllerState {
    pub fn new(view: GlobeView, mode: ModeSwitchController) -> Self {
        let mut dirty = DirtySet::new();
        dirty.mark_all([Recompute::EngineSelection, Recompute::Camera, Recompute::Markers]);
        dirty.mark_all(Recompute::all_overlays());
        Self {
            camera: CameraViewModel::new(view),
            mode,
            tool: ToolMode::default(),
            hover: HoverState::default(),
            cursor: None,
            records: Vec::new(),
            color_mode: ColorMode::default(),
            satellite: false,
            measure: MeasureState::default(),
            proximity: ProximityState::default(),
            selection: SelectionSet::new(),
            highlighted: None,
            active_empires: BTreeMap::new(),
            dirty,
        }
    }

    pub fn record(&self, id: &SiteId) -> Option<&SiteRecord> {
        self.records.iter().find(|r| &r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn point(lng: f64, lat: f64) -> PendingPoint {
        PendingPoint {
            position: LngLat::new(lng, lat),
            snapped: false,
        }
    }

    #[test]
    fn commit_needs_pending_point_and_cycles_colours() {
        let mut m = MeasureState::default();
        assert_eq!(m.commit(point(1.0, 1.0)), None);

        m.pending = Some(point(0.0, 0.0));
        let first = m.commit(point(1.0, 1.0)).expect("first");
        m.pending = Some(point(2.0, 2.0));
        let second = m.commit(point(3.0, 3.0)).expect("second");
        assert_eq!(first.id, MeasurementId(0));
        assert_eq!(second.id, MeasurementId(1));
        assert_eq!(first.color, MEASUREMENT_COLORS[0]);
        assert_eq!(second.color, MEASUREMENT_COLORS[1]);
        assert!(m.pending.is_none());

        assert!(m.remove(first.id));
        assert!(!m.remove(first.id));
        assert_eq!(m.measurements.len(), 1);
        assert!(m.clear());
        assert!(!m.clear());
    }

    #[test]
    fn recompute_order_runs_camera_then_engine_selection() {
        let mut d = DirtySet::new();
        d.mark(Recompute::Overlay(OverlayKind::Highlight));
        d.mark(Recompute::Markers);
        d.mark(Recompute::EngineSelection);
        d.mark(Recompute::Camera);
        assert_eq!(
            d.drain(),
            vec![
                Recompute::Camera,
                Recompute::EngineSelection,
                Recompute::Markers,
                Recompute::Overlay(OverlayKind::Highlight),
            ]
        );
    }
}
