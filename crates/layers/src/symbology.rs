use std::collections::BTreeMap;
use std::fmt;

use scene::SiteRecord;
use serde::{Deserialize, Serialize};

/// 8-bit sRGB colour, serialized as `#rrggbb`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Fallback for any record a colour mode cannot map.
pub const NEUTRAL_GRAY: Color = Color::rgb(136, 136, 136);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rgb` or `#rrggbb` (the `#` is optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let v = u16::from_str_radix(hex, 16).ok()?;
                let expand = |n: u16| ((n & 0xf) as u8) * 17;
                Some(Self::rgb(expand(v >> 8), expand(v >> 4), expand(v)))
            }
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Self::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8))
            }
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba_f32(self, alpha: f32) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            alpha,
        ]
    }

    /// Channel-wise linear interpolation, rounded to the nearest integer.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self::rgb(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s).ok_or_else(|| format!("invalid colour: {s}"))
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    #[default]
    BySource,
    ByCategory,
    ByCountry,
    ByAge,
}

pub const AGE_MIN_YEAR: f64 = -5000.0;
pub const AGE_MAX_YEAR: f64 = 1500.0;

/// Age gradient, oldest first, at evenly spaced normalized positions.
pub const AGE_STOPS: [(f64, Color); 6] = [
    (0.0, Color::rgb(0x5e, 0x3c, 0x99)),
    (0.2, Color::rgb(0xb2, 0xab, 0xd2)),
    (0.4, Color::rgb(0x45, 0x75, 0xb4)),
    (0.6, Color::rgb(0x74, 0xad, 0xd1)),
    (0.8, Color::rgb(0xfd, 0xae, 0x61)),
    (1.0, Color::rgb(0xd7, 0x30, 0x27)),
];

/// Colour of a start year on the age gradient, clamped to
/// `[AGE_MIN_YEAR, AGE_MAX_YEAR]`. Non-finite years have no age colour.
pub fn age_color(year: f64) -> Option<Color> {
    if !year.is_finite() {
        return None;
    }
    let t = ((year - AGE_MIN_YEAR) / (AGE_MAX_YEAR - AGE_MIN_YEAR)).clamp(0.0, 1.0);
    let (first_t, first) = AGE_STOPS[0];
    if t <= first_t {
        return Some(first);
    }
    for pair in AGE_STOPS.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            return Some(c0.lerp(c1, (t - t0) / (t1 - t0)));
        }
    }
    Some(AGE_STOPS[AGE_STOPS.len() - 1].1)
}

/// Lookup tables for the categorical colour modes, as hex strings.
///
/// Keys are compared case-insensitively after trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub source: BTreeMap<String, String>,
    pub category: BTreeMap<String, String>,
    pub country: BTreeMap<String, String>,
}

impl Default for Palette {
    fn default() -> Self {
        let table = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        Self {
            source: table(&[
                ("wikidata", "#1f77b4"),
                ("pleiades", "#ff7f0e"),
                ("unesco", "#2ca02c"),
                ("osm", "#9467bd"),
                ("community", "#e377c2"),
            ]),
            category: table(&[
                ("settlement", "#e6ab02"),
                ("temple", "#d95f02"),
                ("fortification", "#7570b3"),
                ("tomb", "#66a61e"),
                ("monument", "#e7298a"),
                ("rock art", "#a6761d"),
            ]),
            country: table(&[
                ("egypt", "#c49c3a"),
                ("greece", "#3a7ec4"),
                ("italy", "#3ac46b"),
                ("china", "#c43a3a"),
                ("peru", "#8c3ac4"),
                ("mexico", "#c4793a"),
            ]),
        }
    }
}

impl Palette {
    fn lookup(table: &BTreeMap<String, String>, key: Option<&str>) -> Option<Color> {
        let key = key?.trim();
        if key.is_empty() {
            return None;
        }
        let hex = table
            .get(key)
            .or_else(|| {
                table
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })?;
        Color::from_hex(hex)
    }

    /// Colour of `record` under `mode`, or [`NEUTRAL_GRAY`] when unmapped.
    pub fn resolve(&self, record: &SiteRecord, mode: ColorMode) -> Color {
        let color = match mode {
            ColorMode::BySource => Self::lookup(&self.source, record.source_id.as_deref()),
            ColorMode::ByCategory => Self::lookup(&self.category, record.category.as_deref()),
            ColorMode::ByCountry => Self::lookup(&self.country, record.location.as_deref()),
            ColorMode::ByAge => record.period_start_year.and_then(age_color),
        };
        color.unwrap_or(NEUTRAL_GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Color::from_hex("#5e3c99"), Some(Color::rgb(0x5e, 0x3c, 0x99)));
        assert_eq!(Color::from_hex("fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
        assert_eq!(Color::rgb(1, 2, 255).to_hex(), "#0102ff");
    }

    #[test]
    fn age_gradient_endpoints_are_exact() {
        assert_eq!(age_color(-5000.0), Some(AGE_STOPS[0].1));
        assert_eq!(age_color(-9000.0), Some(AGE_STOPS[0].1));
        assert_eq!(age_color(1500.0), Some(AGE_STOPS[5].1));
        assert_eq!(age_color(2024.0), Some(AGE_STOPS[5].1));
        assert_eq!(age_color(f64::NAN), None);
    }

    #[test]
    fn age_gradient_hits_interior_stops() {
        // t = 0.4 is year -5000 + 0.4 * 6500 = -2400.
        assert_eq!(age_color(-2400.0), Some(AGE_STOPS[2].1));
    }

    #[test]
    fn age_gradient_is_monotonic_per_channel_between_stops() {
        let span = AGE_MAX_YEAR - AGE_MIN_YEAR;
        for pair in AGE_STOPS.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            let mut prev = c0;
            for i in 1..=50 {
                let t = t0 + (t1 - t0) * i as f64 / 50.0;
                let c = age_color(AGE_MIN_YEAR + t * span).expect("color");
                for (p, n, a, b) in [
                    (prev.r, c.r, c0.r, c1.r),
                    (prev.g, c.g, c0.g, c1.g),
                    (prev.b, c.b, c0.b, c1.b),
                ] {
                    if b >= a {
                        assert!(n >= p, "channel decreased between {c0} and {c1}");
                    } else {
                        assert!(n <= p, "channel increased between {c0} and {c1}");
                    }
                }
                prev = c;
            }
        }
    }

    #[test]
    fn unmapped_values_fall_back_to_gray() {
        let palette = Palette::default();
        let mut r = SiteRecord::new("a", 0.0, 0.0);
        assert_eq!(palette.resolve(&r, ColorMode::BySource), NEUTRAL_GRAY);
        assert_eq!(palette.resolve(&r, ColorMode::ByAge), NEUTRAL_GRAY);

        r.source_id = Some("Wikidata".to_string());
        assert_eq!(palette.resolve(&r, ColorMode::BySource), Color::rgb(0x1f, 0x77, 0xb4));

        let mut broken = Palette::default();
        broken.category.insert("tomb".to_string(), "not-a-colour".to_string());
        r.category = Some("tomb".to_string());
        assert_eq!(broken.resolve(&r, ColorMode::ByCategory), NEUTRAL_GRAY);
    }

    #[test]
    fn color_mode_uses_kebab_case() {
        let mode: ColorMode = serde_json::from_str("\"by-age\"").expect("mode");
        assert_eq!(mode, ColorMode::ByAge);
    }
}
