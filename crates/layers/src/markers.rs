//! Site markers for both engines.
//!
//! Markers are derived data: every change of record set, colour mode or
//! target engine rebuilds the whole [`MarkerSet`]. Nothing is patched in
//! place.

use std::collections::BTreeSet;

use foundation::{LngLat, Vec3, lng_lat_to_unit};
use scene::{SiteId, SiteRecord};
use serde::Serialize;
use tracing::debug;

use crate::layer::EngineKind;
use crate::symbology::{Color, ColorMode, Palette};

/// Marker radius above the globe surface (globe radius 1).
pub const FRONT_LIFT: f64 = 0.002;
/// Ground shadows sit just above the surface, below the front markers.
pub const SHADOW_LIFT: f64 = 0.0005;
pub const BACK_DIMMED_OPACITY: f32 = 0.25;
pub const SHADOW_OPACITY: f32 = 0.35;
pub const SHADOW_COLOR: Color = Color::rgb(0, 0, 0);
pub const MARKER_SIZE_PX: f32 = 6.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerLayerKind {
    /// Markers on the visible hemisphere.
    Front,
    /// Faint copies seen through the globe.
    BackDimmed,
    /// Ground shadows for the satellite sub-mode.
    Shadow,
    /// Tile-engine markers.
    Flat,
}

/// What the markers are being built for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MarkerTarget {
    Sphere { satellite: bool },
    Tile,
}

impl MarkerTarget {
    pub fn engine(self) -> EngineKind {
        match self {
            MarkerTarget::Sphere { .. } => EngineKind::Sphere,
            MarkerTarget::Tile => EngineKind::Tile,
        }
    }

    pub fn layer_kinds(self) -> &'static [MarkerLayerKind] {
        match self {
            MarkerTarget::Sphere { satellite: true } => {
                &[MarkerLayerKind::Front, MarkerLayerKind::Shadow]
            }
            MarkerTarget::Sphere { satellite: false } => {
                &[MarkerLayerKind::Front, MarkerLayerKind::BackDimmed]
            }
            MarkerTarget::Tile => &[MarkerLayerKind::Flat],
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum MarkerPosition {
    /// Globe-space position (globe radius 1).
    Sphere(Vec3),
    Geo(LngLat),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub site_id: SiteId,
    pub lng_lat: LngLat,
    pub position: MarkerPosition,
    pub color: Color,
    pub opacity: f32,
    pub size_px: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerLayer {
    pub kind: MarkerLayerKind,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerSet {
    pub engine: EngineKind,
    pub layers: Vec<MarkerLayer>,
    /// Records skipped for invalid coordinates or duplicate ids.
    pub dropped: usize,
}

impl MarkerSet {
    pub fn empty(engine: EngineKind) -> Self {
        Self {
            engine,
            layers: Vec::new(),
            dropped: 0,
        }
    }

    /// Number of distinct sites (the primary layer's marker count).
    pub fn site_count(&self) -> usize {
        self.layers.first().map_or(0, |l| l.markers.len())
    }

    pub fn layer(&self, kind: MarkerLayerKind) -> Option<&MarkerLayer> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    /// One `(id, position)` per site, in record order.
    pub fn sites(&self) -> impl Iterator<Item = (&SiteId, LngLat)> + '_ {
        self.layers
            .first()
            .into_iter()
            .flat_map(|l| l.markers.iter().map(|m| (&m.site_id, m.lng_lat)))
    }
}

/// Builds marker sets from the filtered record list.
#[derive(Debug, Clone, Default)]
pub struct SiteMarkerRenderer {
    pub palette: Palette,
}

impl SiteMarkerRenderer {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn build(&self, records: &[SiteRecord], mode: ColorMode, target: MarkerTarget) -> MarkerSet {
        let mut seen: BTreeSet<&SiteId> = BTreeSet::new();
        let mut sites: Vec<(&SiteRecord, LngLat, Color)> = Vec::with_capacity(records.len());
        let mut dropped = 0usize;

        for record in records {
            let Some(p) = record.lng_lat() else {
                dropped += 1;
                continue;
            };
            if !seen.insert(&record.id) {
                dropped += 1;
                continue;
            }
            sites.push((record, p, self.palette.resolve(record, mode)));
        }

        if dropped > 0 {
            debug!(dropped, kept = sites.len(), "skipped site records while building markers");
        }

        let layers = target
            .layer_kinds()
            .iter()
            .map(|&kind| MarkerLayer {
                kind,
                markers: sites
                    .iter()
                    .map(|(record, p, color)| marker_for(kind, record, *p, *color))
                    .collect(),
            })
            .collect();

        MarkerSet {
            engine: target.engine(),
            layers,
            dropped,
        }
    }
}

fn marker_for(kind: MarkerLayerKind, record: &SiteRecord, p: LngLat, color: Color) -> Marker {
    let on_sphere = |lift: f64| MarkerPosition::Sphere(lng_lat_to_unit(p).scale(1.0 + lift));
    let (position, color, opacity) = match kind {
        MarkerLayerKind::Front => (on_sphere(FRONT_LIFT), color, 1.0),
        MarkerLayerKind::BackDimmed => (on_sphere(FRONT_LIFT), color, BACK_DIMMED_OPACITY),
        MarkerLayerKind::Shadow => (on_sphere(SHADOW_LIFT), SHADOW_COLOR, SHADOW_OPACITY),
        MarkerLayerKind::Flat => (MarkerPosition::Geo(p), color, 1.0),
    };
    Marker {
        site_id: record.id.clone(),
        lng_lat: p,
        position,
        color,
        opacity,
        size_px: MARKER_SIZE_PX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbology::NEUTRAL_GRAY;
    use pretty_assertions::assert_eq;

    fn records() -> Vec<SiteRecord> {
        vec![
            SiteRecord::new("a", 10.0, 20.0),
            SiteRecord::new("b", f64::NAN, 20.0),
            SiteRecord::new("c", 30.0, f64::INFINITY),
            SiteRecord::new("d", -70.0, -10.0),
            SiteRecord::new("a", 11.0, 21.0),
        ]
    }

    #[test]
    fn drops_non_finite_and_duplicate_records() {
        let set = SiteMarkerRenderer::default().build(
            &records(),
            ColorMode::BySource,
            MarkerTarget::Tile,
        );
        assert_eq!(set.site_count(), 2);
        assert_eq!(set.dropped, 3);
        let ids: Vec<&str> = set.sites().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert!(set.sites().all(|(_, p)| p.is_finite()));
    }

    #[test]
    fn sphere_sub_modes_choose_duplicate_layers() {
        let r = SiteMarkerRenderer::default();
        let normal = r.build(&records(), ColorMode::ByAge, MarkerTarget::Sphere { satellite: false });
        let kinds: Vec<MarkerLayerKind> = normal.layers.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![MarkerLayerKind::Front, MarkerLayerKind::BackDimmed]);
        assert!(normal.layers.iter().all(|l| l.markers.len() == 2));

        let sat = r.build(&records(), ColorMode::ByAge, MarkerTarget::Sphere { satellite: true });
        let kinds: Vec<MarkerLayerKind> = sat.layers.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![MarkerLayerKind::Front, MarkerLayerKind::Shadow]);
        let shadow = sat.layer(MarkerLayerKind::Shadow).expect("shadow");
        assert_eq!(shadow.markers[0].color, SHADOW_COLOR);
    }

    #[test]
    fn unmapped_colors_are_gray_not_black() {
        let set = SiteMarkerRenderer::default().build(
            &records(),
            ColorMode::ByCountry,
            MarkerTarget::Sphere { satellite: false },
        );
        let front = set.layer(MarkerLayerKind::Front).expect("front");
        assert!(front.markers.iter().all(|m| m.color == NEUTRAL_GRAY));
    }

    #[test]
    fn sphere_positions_are_lifted_unit_vectors() {
        let set = SiteMarkerRenderer::default().build(
            &[SiteRecord::new("x", 0.0, 0.0)],
            ColorMode::BySource,
            MarkerTarget::Sphere { satellite: false },
        );
        let m = &set.layers[0].markers[0];
        match m.position {
            MarkerPosition::Sphere(v) => assert!((v.length() - (1.0 + FRONT_LIFT)).abs() < 1e-12),
            MarkerPosition::Geo(_) => panic!("expected sphere position"),
        }
    }

    #[test]
    fn empty_input_builds_empty_layers() {
        let set = SiteMarkerRenderer::default().build(&[], ColorMode::BySource, MarkerTarget::Tile);
        assert_eq!(set.site_count(), 0);
        assert_eq!(set.dropped, 0);
    }
}
