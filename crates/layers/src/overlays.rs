//! Engine-neutral overlays: measurements, proximity circle, selection rings
//! and historical borders.
//!
//! Each overlay kind is rebuilt from its current value and played into the
//! active engine through an [`OverlaySink`]. Syncing always clears the kind
//! first, then draws; primitives are never patched.

use std::collections::BTreeMap;

use earcutr::earcut;
use foundation::{
    LngLat, Vec3, circle_ring, format_distance_km, great_circle_points, great_circle_segments,
    haversine_km, lng_lat_to_unit, slerp_lng_lat, unit_to_lng_lat,
};
use serde::Serialize;
use streaming::EmpireBoundary;

use crate::symbology::Color;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayKind {
    EmpireBorders,
    Measurements,
    MeasurementPreview,
    Proximity,
    ProximityPreview,
    SelectionRings,
    Highlight,
}

impl OverlayKind {
    pub const ALL: [OverlayKind; 7] = [
        OverlayKind::EmpireBorders,
        OverlayKind::Measurements,
        OverlayKind::MeasurementPreview,
        OverlayKind::Proximity,
        OverlayKind::ProximityPreview,
        OverlayKind::SelectionRings,
        OverlayKind::Highlight,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum OverlayPrimitive {
    Line {
        points: Vec<LngLat>,
        color: Color,
        width_px: f32,
        dashed: bool,
    },
    Fill {
        rings: Vec<Vec<LngLat>>,
        /// Triangles of the fill, for engines without native polygon fill.
        triangles: Vec<[LngLat; 3]>,
        color: Color,
        opacity: f32,
    },
    Point {
        position: LngLat,
        color: Color,
        radius_px: f32,
    },
    Ring {
        position: LngLat,
        color: Color,
        radius_px: f32,
        width_px: f32,
    },
    Label {
        position: LngLat,
        text: String,
        color: Color,
    },
}

/// Receiver of overlay primitives; implemented by each engine adapter.
pub trait OverlaySink {
    fn clear_overlay(&mut self, kind: OverlayKind);
    fn draw_overlay(&mut self, kind: OverlayKind, primitives: &[OverlayPrimitive]);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MeasurementId(pub u64);

/// A committed two-point measurement. Endpoints never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: MeasurementId,
    pub endpoints: [LngLat; 2],
    pub snapped: [bool; 2],
    pub color: Color,
}

impl Measurement {
    pub fn distance_km(&self) -> f64 {
        haversine_km(self.endpoints[0], self.endpoints[1])
    }

    pub fn label(&self) -> String {
        format_distance_km(self.distance_km())
    }
}

/// First point of a measurement still being placed.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPoint {
    pub position: LngLat,
    pub snapped: bool,
}

pub const MEASUREMENT_COLORS: [Color; 6] = [
    Color::rgb(0xff, 0xd6, 0x00),
    Color::rgb(0x00, 0xe5, 0xff),
    Color::rgb(0xff, 0x40, 0x81),
    Color::rgb(0x76, 0xff, 0x03),
    Color::rgb(0xff, 0x91, 0x00),
    Color::rgb(0xe0, 0x40, 0xfb),
];

pub const PROXIMITY_COLOR: Color = Color::rgb(0x29, 0xb6, 0xf6);
pub const SELECTION_COLOR: Color = Color::rgb(0xff, 0xff, 0xff);
pub const HIGHLIGHT_COLOR: Color = Color::rgb(0xff, 0xeb, 0x3b);
pub const LABEL_COLOR: Color = Color::rgb(0xff, 0xff, 0xff);

const BORDER_COLORS: [Color; 8] = [
    Color::rgb(0xe4, 0x1a, 0x1c),
    Color::rgb(0x37, 0x7e, 0xb8),
    Color::rgb(0x4d, 0xaf, 0x4a),
    Color::rgb(0x98, 0x4e, 0xa3),
    Color::rgb(0xff, 0x7f, 0x00),
    Color::rgb(0xa6, 0x56, 0x28),
    Color::rgb(0xf7, 0x81, 0xbf),
    Color::rgb(0x99, 0x99, 0x99),
];

/// Stable colour per empire id.
pub fn border_color(empire_id: &str) -> Color {
    let h = empire_id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    BORDER_COLORS[h as usize % BORDER_COLORS.len()]
}

pub fn measurement_primitives(measurements: &[Measurement]) -> Vec<OverlayPrimitive> {
    let mut out = Vec::with_capacity(measurements.len() * 4);
    for m in measurements {
        let [a, b] = m.endpoints;
        out.push(OverlayPrimitive::Line {
            points: great_circle_points(a, b, great_circle_segments(a, b)),
            color: m.color,
            width_px: 2.5,
            dashed: false,
        });
        for p in m.endpoints {
            out.push(OverlayPrimitive::Point {
                position: p,
                color: m.color,
                radius_px: 4.0,
            });
        }
        out.push(OverlayPrimitive::Label {
            position: slerp_lng_lat(a, b, 0.5),
            text: m.label(),
            color: LABEL_COLOR,
        });
    }
    out
}

/// Pending point plus a dashed segment to the cursor.
pub fn measurement_preview_primitives(
    pending: Option<&PendingPoint>,
    cursor: Option<LngLat>,
    color: Color,
) -> Vec<OverlayPrimitive> {
    let Some(pending) = pending else {
        return Vec::new();
    };
    let a = pending.position;
    let mut out = vec![OverlayPrimitive::Point {
        position: a,
        color,
        radius_px: 4.0,
    }];
    if let Some(b) = cursor.filter(|c| c.is_finite()) {
        out.push(OverlayPrimitive::Line {
            points: great_circle_points(a, b, great_circle_segments(a, b)),
            color,
            width_px: 2.0,
            dashed: true,
        });
        out.push(OverlayPrimitive::Label {
            position: slerp_lng_lat(a, b, 0.5),
            text: format_distance_km(haversine_km(a, b)),
            color: LABEL_COLOR,
        });
    }
    out
}

/// Circle of `radius_km` around `center`. Previews are dashed and unfilled.
pub fn proximity_primitives(center: LngLat, radius_km: f64, preview: bool) -> Vec<OverlayPrimitive> {
    if !center.is_finite() || !radius_km.is_finite() || radius_km <= 0.0 {
        return Vec::new();
    }
    let ring = circle_ring(center, radius_km, 96);
    let mut out = Vec::with_capacity(4);
    if !preview {
        out.push(OverlayPrimitive::Fill {
            triangles: triangulate_polygon(std::slice::from_ref(&ring)),
            rings: vec![ring.clone()],
            color: PROXIMITY_COLOR,
            opacity: 0.12,
        });
    }
    out.push(OverlayPrimitive::Line {
        points: ring,
        color: PROXIMITY_COLOR,
        width_px: 2.0,
        dashed: preview,
    });
    out.push(OverlayPrimitive::Point {
        position: center,
        color: PROXIMITY_COLOR,
        radius_px: 3.0,
    });
    if !preview {
        out.push(OverlayPrimitive::Label {
            position: center,
            text: format_distance_km(radius_km),
            color: LABEL_COLOR,
        });
    }
    out
}

pub fn ring_primitives(positions: &[LngLat], color: Color, radius_px: f32) -> Vec<OverlayPrimitive> {
    positions
        .iter()
        .filter(|p| p.is_finite())
        .map(|&position| OverlayPrimitive::Ring {
            position,
            color,
            radius_px,
            width_px: 2.0,
        })
        .collect()
}

pub fn border_primitives<'a>(
    boundaries: impl IntoIterator<Item = &'a EmpireBoundary>,
) -> Vec<OverlayPrimitive> {
    let mut out = Vec::new();
    for boundary in boundaries {
        let color = border_color(&boundary.key.empire_id);
        for feature in &boundary.collection.features {
            for rings in &feature.polygons {
                out.push(OverlayPrimitive::Fill {
                    triangles: triangulate_polygon(rings),
                    rings: rings.clone(),
                    color,
                    opacity: 0.25,
                });
                for ring in rings {
                    out.push(OverlayPrimitive::Line {
                        points: ring.clone(),
                        color,
                        width_px: 1.5,
                        dashed: false,
                    });
                }
            }
        }
    }
    out
}

/// Triangulates a polygon (outer ring first, then holes) in the tangent
/// plane at the outer ring's centroid.
pub fn triangulate_polygon(rings: &[Vec<LngLat>]) -> Vec<[LngLat; 3]> {
    let Some(outer) = rings.first() else {
        return Vec::new();
    };
    if outer.len() < 3 {
        return Vec::new();
    }

    let sum = outer
        .iter()
        .filter(|p| p.is_finite())
        .fold(Vec3::ZERO, |acc, p| acc + lng_lat_to_unit(*p));
    let Some(n) = sum.normalized() else {
        return Vec::new();
    };

    let up = if n.y.abs() < 0.99 {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    let Some(east) = up.cross(n).normalized() else {
        return Vec::new();
    };
    let north = n.cross(east);

    let mut vertices: Vec<LngLat> = Vec::new();
    let mut coords_2d: Vec<f64> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();

    for (ring_i, ring) in rings.iter().enumerate() {
        let mut pts: Vec<LngLat> = ring.iter().copied().filter(|p| p.is_finite()).collect();
        drop_closing_duplicate(&mut pts);
        if pts.len() < 3 {
            continue;
        }
        if ring_i > 0 {
            hole_indices.push(vertices.len());
        }
        for p in pts {
            let v = lng_lat_to_unit(p);
            // Gnomonic projection keeps great-circle edges straight.
            let d = v.dot(n);
            if d <= 1e-6 {
                return Vec::new();
            }
            let v = v.scale(1.0 / d);
            coords_2d.push(v.dot(east));
            coords_2d.push(v.dot(north));
            vertices.push(p);
        }
    }

    if vertices.len() < 3 {
        return Vec::new();
    }

    let Ok(indices) = earcut(&coords_2d, &hole_indices, 2) else {
        return Vec::new();
    };
    indices
        .chunks_exact(3)
        .filter_map(|tri| {
            Some([
                *vertices.get(tri[0])?,
                *vertices.get(tri[1])?,
                *vertices.get(tri[2])?,
            ])
        })
        .collect()
}

fn drop_closing_duplicate(points: &mut Vec<LngLat>) {
    if let (Some(first), Some(last)) = (points.first(), points.last())
        && points.len() >= 2
        && (first.lng - last.lng).abs() < 1e-9
        && (first.lat - last.lat).abs() < 1e-9
    {
        points.pop();
    }
}

/// Centroid of a ring on the sphere, used to anchor border labels.
pub fn ring_centroid(ring: &[LngLat]) -> Option<LngLat> {
    let sum = ring
        .iter()
        .filter(|p| p.is_finite())
        .fold(Vec3::ZERO, |acc, p| acc + lng_lat_to_unit(*p));
    unit_to_lng_lat(sum)
}

/// Applies the clear-and-rebuild rule per overlay kind.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    drawn: BTreeMap<OverlayKind, usize>,
    rebuilds: u64,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(&mut self, kind: OverlayKind, primitives: &[OverlayPrimitive], sink: &mut dyn OverlaySink) {
        sink.clear_overlay(kind);
        if !primitives.is_empty() {
            sink.draw_overlay(kind, primitives);
        }
        self.drawn.insert(kind, primitives.len());
        self.rebuilds += 1;
    }

    /// Primitive count last drawn for `kind`.
    pub fn drawn_count(&self, kind: OverlayKind) -> usize {
        self.drawn.get(&kind).copied().unwrap_or(0)
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Forgets what was drawn, e.g. after the target engine lost its state.
    pub fn reset(&mut self) {
        self.drawn.clear();
    }
}
