//! GeoJSON payloads for historical-entity boundaries.
//!
//! A boundary file is a `FeatureCollection` whose polygon features outline
//! the territory and whose point features (optional) anchor its labels. Other
//! geometry types are skipped.

use foundation::{GeoBounds, LngLat};
use serde_json::{Map, Value};
use thiserror::Error;

/// One polygon: outer ring first, then holes.
pub type PolygonRings = Vec<Vec<LngLat>>;

#[derive(Debug, Error)]
pub enum GeoJsonError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected GeoJSON FeatureCollection")]
    NotAFeatureCollection,

    #[error("invalid feature at index {index}: {reason}")]
    InvalidFeature { index: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    pub id: Option<String>,
    pub name: Option<String>,
    pub polygons: Vec<PolygonRings>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLabel {
    pub text: String,
    pub position: LngLat,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryCollection {
    pub features: Vec<BoundaryFeature>,
    pub labels: Vec<BoundaryLabel>,
}

impl BoundaryCollection {
    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        let obj = value.as_object().ok_or(GeoJsonError::NotAFeatureCollection)?;
        if obj.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(GeoJsonError::NotAFeatureCollection);
        }
        let features_val = obj
            .get("features")
            .and_then(Value::as_array)
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        let mut out = Self::default();
        for (index, feat_val) in features_val.iter().enumerate() {
            let invalid = |reason: String| GeoJsonError::InvalidFeature { index, reason };
            let feat = feat_val
                .as_object()
                .ok_or_else(|| invalid("feature must be an object".to_string()))?;
            if feat.get("type").and_then(Value::as_str) != Some("Feature") {
                return Err(invalid("feature type must be \"Feature\"".to_string()));
            }

            let properties = feat.get("properties").and_then(Value::as_object);
            let name = properties.and_then(feature_name);
            let id = match feat.get("id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };

            // Null geometry is legal GeoJSON.
            let Some(geometry) = feat.get("geometry").filter(|g| !g.is_null()) else {
                continue;
            };
            let geometry = geometry
                .as_object()
                .ok_or_else(|| invalid("geometry must be an object".to_string()))?;
            let ty = geometry
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("geometry missing type".to_string()))?;
            let coords = geometry
                .get("coordinates")
                .ok_or_else(|| invalid("geometry missing coordinates".to_string()))?;

            match ty {
                "Polygon" => out.features.push(BoundaryFeature {
                    id,
                    name,
                    polygons: vec![parse_polygon(coords).map_err(invalid)?],
                }),
                "MultiPolygon" => out.features.push(BoundaryFeature {
                    id,
                    name,
                    polygons: parse_multi_polygon(coords).map_err(invalid)?,
                }),
                "Point" => {
                    if let Some(text) = name {
                        out.labels.push(BoundaryLabel {
                            text,
                            position: parse_position(coords).map_err(invalid)?,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty() && self.labels.is_empty()
    }

    /// Bounds of every outer ring, `None` for a collection without polygons.
    pub fn bbox(&self) -> Option<GeoBounds> {
        self.outer_rings()
            .filter_map(|ring| GeoBounds::from_points(ring))
            .reduce(GeoBounds::union)
    }

    pub fn outer_rings(&self) -> impl Iterator<Item = &Vec<LngLat>> {
        self.features
            .iter()
            .flat_map(|f| f.polygons.iter())
            .filter_map(|rings| rings.first())
    }

    /// Whether `p` lies inside any polygon of the collection.
    pub fn contains(&self, p: LngLat) -> bool {
        self.features
            .iter()
            .flat_map(|f| f.polygons.iter())
            .any(|rings| foundation::point_in_polygon(p, rings))
    }
}

fn feature_name(properties: &Map<String, Value>) -> Option<String> {
    ["name", "NAME", "label"]
        .iter()
        .find_map(|key| properties.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn parse_position(coords: &Value) -> Result<LngLat, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    LngLat::from_pair([lon, lat]).ok_or(format!("position out of range: [{lon}, {lat}]"))
}

fn parse_ring(coords: &Value) -> Result<Vec<LngLat>, String> {
    let arr = coords.as_array().ok_or("ring must be an array".to_string())?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        out.push(parse_position(item)?);
    }
    if out.len() < 3 {
        return Err(format!("ring needs at least 3 positions, got {}", out.len()));
    }
    Ok(out)
}

fn parse_polygon(coords: &Value) -> Result<PolygonRings, String> {
    let rings = coords
        .as_array()
        .ok_or("Polygon coordinates must be an array of rings".to_string())?;
    let mut out = Vec::with_capacity(rings.len());
    for ring in rings {
        out.push(parse_ring(ring)?);
    }
    if out.is_empty() {
        return Err("Polygon has no rings".to_string());
    }
    Ok(out)
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<PolygonRings>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    let mut out = Vec::with_capacity(polys.len());
    for poly in polys {
        out.push(parse_polygon(poly)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROME: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": 7,
                "properties": { "name": "Roman Empire" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0, 30], [40, 30], [40, 50], [0, 50], [0, 30]],
                         [[10, 35], [20, 35], [20, 45], [10, 45], [10, 35]]],
                        [[[-10, 50], [-5, 50], [-5, 55], [-10, 55], [-10, 50]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Roma" },
                "geometry": { "type": "Point", "coordinates": [12.5, 41.9] }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] }
            },
            { "type": "Feature", "properties": {}, "geometry": null }
        ]
    }"#;

    #[test]
    fn parses_polygons_and_labels() {
        let c = BoundaryCollection::from_geojson_str(ROME).expect("parse");
        assert_eq!(c.features.len(), 1);
        assert_eq!(c.features[0].id.as_deref(), Some("7"));
        assert_eq!(c.features[0].name.as_deref(), Some("Roman Empire"));
        assert_eq!(c.features[0].polygons.len(), 2);
        assert_eq!(
            c.labels,
            vec![BoundaryLabel {
                text: "Roma".to_string(),
                position: LngLat::new(12.5, 41.9),
            }]
        );
    }

    #[test]
    fn bbox_covers_all_outer_rings() {
        let c = BoundaryCollection::from_geojson_str(ROME).expect("parse");
        assert_eq!(c.bbox(), Some(GeoBounds::new(-10.0, 30.0, 40.0, 55.0)));
    }

    #[test]
    fn contains_respects_holes() {
        let c = BoundaryCollection::from_geojson_str(ROME).expect("parse");
        assert!(c.contains(LngLat::new(5.0, 32.0)));
        assert!(!c.contains(LngLat::new(15.0, 40.0)));
        assert!(c.contains(LngLat::new(-7.0, 52.0)));
        assert!(!c.contains(LngLat::new(100.0, 0.0)));
    }

    #[test]
    fn rejects_non_collections() {
        let err = BoundaryCollection::from_geojson_str(r#"{"type":"Feature"}"#).unwrap_err();
        assert!(matches!(err, GeoJsonError::NotAFeatureCollection));
        let err = BoundaryCollection::from_geojson_str("not json").unwrap_err();
        assert!(matches!(err, GeoJsonError::Json(_)));
    }

    #[test]
    fn reports_bad_feature_index() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,"x"],[1,1]]]}}
        ]}"#;
        let err = BoundaryCollection::from_geojson_str(payload).unwrap_err();
        assert!(matches!(err, GeoJsonError::InvalidFeature { index: 0, .. }), "{err}");
    }

    #[test]
    fn empty_collection_has_no_bbox() {
        let c = BoundaryCollection::from_geojson_str(r#"{"type":"FeatureCollection","features":[]}"#)
            .expect("parse");
        assert!(c.is_empty());
        assert_eq!(c.bbox(), None);
    }
}
