use std::fmt;

use foundation::LngLat;
use serde::{Deserialize, Deserializer, Serialize};

/// Stable record identifier. Numeric ids from the record provider are
/// normalized to their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct SiteId(pub String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SiteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<SiteId> for String {
    fn from(id: SiteId) -> Self {
        id.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<IdRepr> for SiteId {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Text(s) => Self(s),
            IdRepr::Int(n) => Self(n.to_string()),
            IdRepr::Float(f) => Self(f.to_string()),
        }
    }
}

/// A geolocated record as delivered by the record provider.
///
/// Records are immutable once received. Coordinates that are missing, `null`
/// or non-numeric deserialize as `NaN` so that renderers can drop them with a
/// single finiteness check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteRecord {
    pub id: SiteId,
    #[serde(default = "nan_pair", deserialize_with = "lenient_pair")]
    pub coordinates: [f64; 2],
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub period_start_year: Option<f64>,
    #[serde(default)]
    pub source_id: Option<String>,
    /// Country or region name.
    #[serde(default)]
    pub location: Option<String>,
}

impl SiteRecord {
    pub fn new(id: impl Into<String>, lng: f64, lat: f64) -> Self {
        Self {
            id: SiteId(id.into()),
            coordinates: [lng, lat],
            name: None,
            category: None,
            period: None,
            period_start_year: None,
            source_id: None,
            location: None,
        }
    }

    /// Position, or `None` when either coordinate is not a finite number or
    /// the latitude is out of range.
    pub fn lng_lat(&self) -> Option<LngLat> {
        LngLat::from_pair(self.coordinates)
    }

    pub fn has_valid_position(&self) -> bool {
        self.lng_lat().is_some()
    }
}

fn nan_pair() -> [f64; 2] {
    [f64::NAN, f64::NAN]
}

fn lenient_pair<'de, D>(deserializer: D) -> Result<[f64; 2], D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coord {
        Number(f64),
        Other(serde::de::IgnoredAny),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coords {
        List(Vec<Coord>),
        Other(serde::de::IgnoredAny),
    }

    let value = |c: Option<&Coord>| match c {
        Some(Coord::Number(v)) => *v,
        _ => f64::NAN,
    };
    Ok(match Coords::deserialize(deserializer)? {
        Coords::List(items) => [value(items.first()), value(items.get(1))],
        Coords::Other(_) => nan_pair(),
    })
}
