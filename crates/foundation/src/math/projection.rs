//! Web Mercator helpers for the tile engine and the scale bar.

use super::{LngLat, WGS84_A, wrap_lng_deg};

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;
/// Tile size (pixels) the zoom levels are expressed against.
pub const TILE_SIZE_PX: f64 = 512.0;

/// Normalized Mercator coordinates in `[0, 1]`, origin top-left.
pub fn lng_lat_to_mercator_unit(p: LngLat) -> [f64; 2] {
    let lat = p.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (p.lng + 180.0) / 360.0;
    let y = 0.5 - ((std::f64::consts::FRAC_PI_4 + lat * 0.5).tan().ln()) / (2.0 * std::f64::consts::PI);
    [x, y]
}

pub fn mercator_unit_to_lng_lat(m: [f64; 2]) -> LngLat {
    let lng = m[0] * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * m[1]);
    let lat = n.sinh().atan().to_degrees();
    LngLat::new(wrap_lng_deg(lng), lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT))
}

/// Ground resolution (meters per pixel) at a latitude and continuous zoom.
pub fn meters_per_pixel(lat_deg: f64, zoom: f64) -> f64 {
    let circumference = 2.0 * std::f64::consts::PI * WGS84_A;
    circumference * lat_deg.to_radians().cos().abs() / (TILE_SIZE_PX * 2f64.powf(zoom))
}

/// Flat map viewport: center, continuous zoom and pixel size.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MercatorViewport {
    pub center: LngLat,
    pub zoom: f64,
    pub width_px: f64,
    pub height_px: f64,
}

impl MercatorViewport {
    pub fn new(center: LngLat, zoom: f64, width_px: f64, height_px: f64) -> Self {
        Self {
            center,
            zoom,
            width_px: width_px.max(1.0),
            height_px: height_px.max(1.0),
        }
    }

    fn world_size_px(&self) -> f64 {
        TILE_SIZE_PX * 2f64.powf(self.zoom)
    }

    /// Screen position of `p`, picking the world copy nearest to the center.
    pub fn project(&self, p: LngLat) -> [f64; 2] {
        let ws = self.world_size_px();
        let c = lng_lat_to_mercator_unit(self.center);
        let m = lng_lat_to_mercator_unit(p);
        let mut dx = m[0] - c[0];
        if dx > 0.5 {
            dx -= 1.0;
        } else if dx < -0.5 {
            dx += 1.0;
        }
        let dy = m[1] - c[1];
        [self.width_px * 0.5 + dx * ws, self.height_px * 0.5 + dy * ws]
    }

    pub fn unproject(&self, px: [f64; 2]) -> LngLat {
        let ws = self.world_size_px();
        let c = lng_lat_to_mercator_unit(self.center);
        let mx = c[0] + (px[0] - self.width_px * 0.5) / ws;
        let my = (c[1] + (px[1] - self.height_px * 0.5) / ws).clamp(0.0, 1.0);
        mercator_unit_to_lng_lat([mx, my])
    }
}
