//! Geographic and empire label visibility.
//!
//! A label is drawn with `zoom_alpha * facing_alpha`:
//! - the zoom/type axis (category enabled and inside its zoom range, empire
//!   currently shown) is recomputed only after the debounce settles, and
//!   each change crossfades over `fade_ms`;
//! - the facing axis is a smooth ramp on the dot product between the anchor
//!   and the view direction, recomputed every frame.
//!
//! Placement order is priority (descending) then id; a label whose screen
//! box hits an occupied grid cell is skipped for that frame.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use foundation::{LngLat, Time, Vec3, lng_lat_to_unit};
use runtime::Debounce;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Anchor/view dot product at or below which a label is fully hidden.
pub const FACING_HIDDEN_DOT: f64 = 0.05;
/// Anchor/view dot product at or above which a label is fully visible.
pub const FACING_VISIBLE_DOT: f64 = 0.25;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelCategory {
    Continent,
    Ocean,
    Country,
    City,
    Empire,
}

impl LabelCategory {
    pub const ALL: [LabelCategory; 5] = [
        LabelCategory::Continent,
        LabelCategory::Ocean,
        LabelCategory::Country,
        LabelCategory::City,
        LabelCategory::Empire,
    ];
}

/// Inclusive `[min, max]` zoomPercent window per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelZoomRanges(pub BTreeMap<LabelCategory, [f64; 2]>);

impl Default for LabelZoomRanges {
    fn default() -> Self {
        Self(BTreeMap::from([
            (LabelCategory::Continent, [0.0, 45.0]),
            (LabelCategory::Ocean, [0.0, 70.0]),
            (LabelCategory::Country, [25.0, 90.0]),
            (LabelCategory::City, [55.0, 100.0]),
            (LabelCategory::Empire, [0.0, 100.0]),
        ]))
    }
}

impl LabelZoomRanges {
    /// Categories without an entry are visible at every zoom.
    pub fn contains(&self, category: LabelCategory, zoom_percent: f64) -> bool {
        match self.0.get(&category) {
            Some([min, max]) => zoom_percent >= *min && zoom_percent <= *max,
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSpec {
    pub id: String,
    pub text: String,
    pub category: LabelCategory,
    pub anchor: LngLat,
    #[serde(default)]
    pub priority: f32,
    /// Owning historical entity, for `Empire` labels.
    #[serde(default)]
    pub empire_id: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelSettings {
    pub debounce_ms: u64,
    pub fade_ms: u64,
    pub font_size_px: f32,
    pub cell_px: f32,
    pub padding_px: f32,
    pub max_labels: usize,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            fade_ms: 250,
            font_size_px: 13.0,
            cell_px: 24.0,
            padding_px: 3.0,
            max_labels: 300,
        }
    }
}

/// Screen mapping of the active engine.
pub trait LabelProjector {
    fn project(&self, p: LngLat) -> Option<[f32; 2]>;
    fn viewport_px(&self) -> [f32; 2];
    /// Unit vector from the globe centre toward the camera, or `None` when
    /// the engine has no back hemisphere.
    fn view_dir(&self) -> Option<Vec3>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDraw {
    pub id: String,
    pub text: String,
    pub category: LabelCategory,
    pub screen_px: [f32; 2],
    pub opacity: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    start: Time,
}

impl Fade {
    fn settled(value: f32, now: Time) -> Self {
        Self {
            from: value,
            to: value,
            start: now,
        }
    }

    fn value(&self, now: Time, fade_ms: u64) -> f32 {
        if fade_ms == 0 {
            return self.to;
        }
        let t = (now.millis_since(self.start) / fade_ms as f64).clamp(0.0, 1.0) as f32;
        self.from + (self.to - self.from) * t
    }

    fn retarget(&mut self, to: f32, now: Time, fade_ms: u64) {
        if self.to == to {
            return;
        }
        self.from = self.value(now, fade_ms);
        self.to = to;
        self.start = now;
    }
}

/// Smooth ramp between the hidden and visible facing thresholds.
pub fn facing_alpha(anchor: Vec3, view_dir: Vec3) -> f32 {
    let d = anchor.dot(view_dir);
    if !d.is_finite() {
        return 0.0;
    }
    let t = ((d - FACING_HIDDEN_DOT) / (FACING_VISIBLE_DOT - FACING_HIDDEN_DOT)).clamp(0.0, 1.0);
    (t * t * (3.0 - 2.0 * t)) as f32
}

#[derive(Debug, Clone)]
pub struct LabelVisibilityManager {
    settings: LabelSettings,
    ranges: LabelZoomRanges,
    labels: Vec<LabelSpec>,
    fades: BTreeMap<String, Fade>,
    enabled: BTreeSet<LabelCategory>,
    visible_empires: BTreeSet<String>,
    zoom_percent: f64,
    debounce: Debounce,
    recomputes: u64,
    reload_requested: bool,
}

impl LabelVisibilityManager {
    pub fn new(settings: LabelSettings, ranges: LabelZoomRanges) -> Self {
        Self {
            settings,
            ranges,
            labels: Vec::new(),
            fades: BTreeMap::new(),
            enabled: LabelCategory::ALL.into_iter().collect(),
            visible_empires: BTreeSet::new(),
            zoom_percent: 0.0,
            debounce: Debounce::new(settings.debounce_ms),
            recomputes: 0,
            reload_requested: false,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of zoom/type-axis recomputations so far.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    pub fn is_recompute_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Replaces the label geometry. The zoom/type axis is applied at once,
    /// without fading, since there is nothing on screen to fade from.
    pub fn set_labels(&mut self, mut labels: Vec<LabelSpec>, now: Time) {
        let mut seen = BTreeSet::new();
        labels.retain(|l| {
            l.anchor.is_finite() && !l.text.trim().is_empty() && seen.insert(l.id.clone())
        });
        labels.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then_with(|| a.id.cmp(&b.id))
        });
        self.fades = labels
            .iter()
            .map(|l| (l.id.clone(), Fade::settled(self.zoom_target(l), now)))
            .collect();
        self.labels = labels;
        self.debounce.cancel();
        self.reload_requested = false;
        debug!(count = self.labels.len(), "label set loaded");
    }

    pub fn set_zoom_percent(&mut self, zoom_percent: f64, now: Time) {
        if zoom_percent != self.zoom_percent {
            self.zoom_percent = zoom_percent;
            self.debounce.trigger(now);
        }
    }

    pub fn set_category_enabled(&mut self, category: LabelCategory, enabled: bool, now: Time) {
        let changed = if enabled {
            self.enabled.insert(category)
        } else {
            self.enabled.remove(&category)
        };
        if changed {
            self.debounce.trigger(now);
        }
    }

    pub fn set_visible_empires(&mut self, empires: BTreeSet<String>, now: Time) {
        if empires != self.visible_empires {
            self.visible_empires = empires;
            self.debounce.trigger(now);
        }
    }

    /// Whether `label` passes the zoom/type axis with the current inputs.
    fn zoom_target(&self, label: &LabelSpec) -> f32 {
        let type_ok = self.enabled.contains(&label.category)
            && self.ranges.contains(label.category, self.zoom_percent)
            && match (&label.category, &label.empire_id) {
                (LabelCategory::Empire, Some(id)) => self.visible_empires.contains(id),
                (LabelCategory::Empire, None) => false,
                _ => true,
            };
        if type_ok { 1.0 } else { 0.0 }
    }

    fn recompute_zoom_axis(&mut self, now: Time) {
        let fade_ms = self.settings.fade_ms;
        for label in &self.labels {
            let target = self.zoom_target(label);
            self.fades
                .entry(label.id.clone())
                .or_insert_with(|| Fade::settled(0.0, now))
                .retarget(target, now, fade_ms);
        }
        self.recomputes += 1;
    }

    /// Per-frame update: applies a settled debounce, then evaluates facing
    /// and collision for every label.
    pub fn frame(&mut self, now: Time, projector: &dyn LabelProjector) -> Vec<LabelDraw> {
        if self.debounce.poll(now) {
            self.recompute_zoom_axis(now);
        }

        let viewport = projector.viewport_px();
        let view_dir = projector.view_dir();
        let mut occupied: HashSet<u64> = HashSet::new();
        let mut out = Vec::new();

        for label in &self.labels {
            if out.len() >= self.settings.max_labels {
                break;
            }
            let zoom_alpha = self
                .fades
                .get(&label.id)
                .map_or(0.0, |f| f.value(now, self.settings.fade_ms));
            if zoom_alpha <= 0.0 {
                continue;
            }
            let facing = match view_dir {
                Some(dir) => facing_alpha(lng_lat_to_unit(label.anchor), dir),
                None => 1.0,
            };
            let opacity = zoom_alpha * facing;
            if opacity <= 0.0 {
                continue;
            }

            let Some(screen) = projector.project(label.anchor) else {
                continue;
            };
            if !screen[0].is_finite() || !screen[1].is_finite() {
                continue;
            }

            let size = estimate_text_size(&label.text, self.settings.font_size_px);
            let half_w = size[0] * 0.5 + self.settings.padding_px;
            let half_h = size[1] * 0.5 + self.settings.padding_px;
            if screen[0] + half_w < 0.0
                || screen[1] + half_h < 0.0
                || screen[0] - half_w > viewport[0]
                || screen[1] - half_h > viewport[1]
            {
                continue;
            }
            if !try_place_label(&mut occupied, screen, [half_w, half_h], self.settings.cell_px) {
                continue;
            }

            out.push(LabelDraw {
                id: label.id.clone(),
                text: label.text.clone(),
                category: label.category,
                screen_px: screen,
                opacity,
            });
        }
        out
    }

    /// Drops all label geometry after a graphics context loss. The caller
    /// must reload via [`set_labels`](Self::set_labels).
    pub fn invalidate(&mut self) {
        self.labels.clear();
        self.fades.clear();
        self.debounce.cancel();
        self.reload_requested = true;
    }

    pub fn needs_reload(&self) -> bool {
        self.reload_requested
    }
}

fn estimate_text_size(text: &str, font_size_px: f32) -> [f32; 2] {
    let count = text.chars().count().max(1) as f32;
    [font_size_px * 0.6 * count, font_size_px]
}

fn try_place_label(occupied: &mut HashSet<u64>, screen: [f32; 2], half_size: [f32; 2], cell_px: f32) -> bool {
    let min_x = ((screen[0] - half_size[0]) / cell_px).floor() as i32;
    let max_x = ((screen[0] + half_size[0]) / cell_px).floor() as i32;
    let min_y = ((screen[1] - half_size[1]) / cell_px).floor() as i32;
    let max_y = ((screen[1] + half_size[1]) / cell_px).floor() as i32;

    for cy in min_y..=max_y {
        for cx in min_x..=max_x {
            if occupied.contains(&cell_key(cx, cy)) {
                return false;
            }
        }
    }
    for cy in min_y..=max_y {
        for cx in min_x..=max_x {
            occupied.insert(cell_key(cx, cy));
        }
    }
    true
}

fn cell_key(cx: i32, cy: i32) -> u64 {
    ((cx as u32 as u64) << 32) | (cy as u32 as u64)
}
