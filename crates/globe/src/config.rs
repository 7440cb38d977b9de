use layers::{LabelSettings, LabelZoomRanges, Palette};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid globe config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid globe config: {field} must be {expected}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
    },
}

/// Tunables of the view controller. Every field has a default, so a partial
/// JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobeConfig {
    pub switch_threshold_percent: f64,
    pub crossfade_ms: u64,
    pub label_debounce_ms: u64,
    pub label_fade_ms: u64,
    pub pointer_throttle_ms: u64,
    pub hover_radius_px: f64,
    pub snap_radius_px: f64,
    pub freeze_dwell_ms: u64,
    pub freeze_release_px: f64,
    pub status_min_display_ms: u64,
    pub boundary_base_url: String,
    pub palette: Palette,
    pub label_zoom_ranges: LabelZoomRanges,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            switch_threshold_percent: 66.0,
            crossfade_ms: 300,
            label_debounce_ms: 500,
            label_fade_ms: 250,
            pointer_throttle_ms: 100,
            hover_radius_px: 8.0,
            snap_radius_px: 12.0,
            freeze_dwell_ms: 450,
            freeze_release_px: 24.0,
            status_min_display_ms: 1200,
            boundary_base_url: "/data/empires".to_string(),
            palette: Palette::default(),
            label_zoom_ranges: LabelZoomRanges::default(),
        }
    }
}

impl GlobeConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.switch_threshold_percent;
        if !(t > 0.0 && t < 100.0) {
            return Err(ConfigError::OutOfRange {
                field: "switchThresholdPercent",
                expected: "strictly between 0 and 100",
            });
        }
        for (field, v) in [
            ("hoverRadiusPx", self.hover_radius_px),
            ("snapRadiusPx", self.snap_radius_px),
            ("freezeReleasePx", self.freeze_release_px),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    expected: "a finite, non-negative pixel count",
                });
            }
        }
        Ok(())
    }

    pub fn label_settings(&self) -> LabelSettings {
        LabelSettings {
            debounce_ms: self.label_debounce_ms,
            fade_ms: self.label_fade_ms,
            ..LabelSettings::default()
        }
    }
}
