use serde::Serialize;

/// Longest scale bar, in pixels.
pub const SCALE_BAR_MAX_PX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleBar {
    pub meters: f64,
    pub width_px: f64,
    pub label: String,
}

/// Largest 1/2/5 x 10^n length that fits in `max_px` at `meters_per_pixel`.
pub fn scale_bar(meters_per_pixel: f64, max_px: f64) -> Option<ScaleBar> {
    if !meters_per_pixel.is_finite() || meters_per_pixel <= 0.0 || !(max_px > 0.0) {
        return None;
    }
    let max_m = meters_per_pixel * max_px;
    let pow = 10f64.powf(max_m.log10().floor());
    let meters = [5.0, 2.0, 1.0]
        .into_iter()
        .map(|m| m * pow)
        .find(|m| *m <= max_m)
        .unwrap_or(pow);
    let label = if meters >= 1000.0 {
        format!("{} km", meters / 1000.0)
    } else if meters >= 1.0 {
        format!("{meters} m")
    } else {
        format!("{} cm", meters * 100.0)
    };
    Some(ScaleBar {
        meters,
        width_px: meters / meters_per_pixel,
        label,
    })
}
