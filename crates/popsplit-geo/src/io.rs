//! Unit geometries loaded from GeoJSON.
//!
//! Only `FeatureCollection`s of `Polygon` / `MultiPolygon` features are
//! accepted. Coordinates are taken as planar; any projection must happen
//! upstream. Extra ordinates (z, m) are ignored.

use std::fs;
use std::path::Path;

use geo::{Area, Coord, LineString, MultiPolygon, Polygon};
use popsplit_core::{GeometryConfig, PopsplitError, PopsplitResult};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

/// One areal unit: an identifier, its population and its footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFeature {
    pub id: String,
    pub population: u64,
    pub geometry: MultiPolygon<f64>,
}

impl UnitFeature {
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }
}

/// Ordered unit geometries. Index `i` is unit `i` everywhere downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitLayer {
    features: Vec<UnitFeature>,
}

impl UnitLayer {
    pub fn new(features: Vec<UnitFeature>) -> PopsplitResult<Self> {
        if features.is_empty() {
            return Err(PopsplitError::Validation("unit layer has no features".into()));
        }
        if let Some(feature) = features.iter().find(|f| f.geometry.0.is_empty()) {
            return Err(PopsplitError::Validation(format!(
                "unit '{}' has an empty geometry",
                feature.id
            )));
        }
        Ok(Self { features })
    }

    pub fn read_geojson(path: &Path, config: &GeometryConfig) -> PopsplitResult<Self> {
        let text = fs::read_to_string(path)?;
        let layer = Self::from_geojson_str(&text, config)?;
        info!(path = %path.display(), units = layer.len(), "loaded unit layer");
        Ok(layer)
    }

    pub fn from_geojson_str(text: &str, config: &GeometryConfig) -> PopsplitResult<Self> {
        let collection: RawCollection = serde_json::from_str(text)?;
        if collection.kind != "FeatureCollection" {
            return Err(PopsplitError::Validation(format!(
                "expected a FeatureCollection, found '{}'",
                collection.kind
            )));
        }
        let features = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_unit(index, config))
            .collect::<PopsplitResult<Vec<_>>>()?;
        Self::new(features)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[UnitFeature] {
        &self.features
    }

    pub fn geometries(&self) -> impl Iterator<Item = &MultiPolygon<f64>> + '_ {
        self.features.iter().map(|f| &f.geometry)
    }

    pub fn populations(&self) -> Vec<u64> {
        self.features.iter().map(|f| f.population).collect()
    }

    pub fn areas(&self) -> Vec<f64> {
        self.features.iter().map(UnitFeature::area).collect()
    }

    pub fn total_population(&self) -> u64 {
        self.features.iter().map(|f| f.population).sum()
    }

    pub fn total_area(&self) -> f64 {
        self.features.iter().map(UnitFeature::area).sum()
    }
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<RawGeometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum RawGeometry {
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

impl RawFeature {
    fn into_unit(self, index: usize, config: &GeometryConfig) -> PopsplitResult<UnitFeature> {
        let properties = self.properties.unwrap_or_default();
        let id = config
            .id_field
            .as_deref()
            .and_then(|field| properties.get(field))
            .or(self.id.as_ref())
            .map(value_to_id)
            .unwrap_or_else(|| index.to_string());

        let population = match properties.get(&config.population_field) {
            Some(value) => parse_population(value).ok_or_else(|| {
                PopsplitError::Validation(format!(
                    "unit '{id}' has an invalid '{}' value: {value}",
                    config.population_field
                ))
            })?,
            None => {
                return Err(PopsplitError::Validation(format!(
                    "unit '{id}' has no '{}' property",
                    config.population_field
                )))
            }
        };

        let geometry = match self.geometry {
            Some(RawGeometry::Polygon(rings)) => MultiPolygon::new(vec![polygon(&id, rings)?]),
            Some(RawGeometry::MultiPolygon(polygons)) => MultiPolygon::new(
                polygons
                    .into_iter()
                    .map(|rings| polygon(&id, rings))
                    .collect::<PopsplitResult<_>>()?,
            ),
            None => {
                return Err(PopsplitError::Validation(format!(
                    "unit '{id}' has no geometry"
                )))
            }
        };

        Ok(UnitFeature {
            id,
            population,
            geometry,
        })
    }
}

fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Populations may arrive as integers, floats or numeric strings.
fn parse_population(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => return Some(v),
            None => n.as_f64()?,
        },
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && number >= 0.0).then(|| number.round() as u64)
}

fn polygon(id: &str, rings: Vec<Vec<Vec<f64>>>) -> PopsplitResult<Polygon<f64>> {
    let mut rings = rings.into_iter().map(|ring| ring_from_positions(id, ring));
    let exterior = rings
        .next()
        .ok_or_else(|| PopsplitError::Validation(format!("unit '{id}' has a polygon without rings")))??;
    let interiors = rings.collect::<PopsplitResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from_positions(id: &str, positions: Vec<Vec<f64>>) -> PopsplitResult<LineString<f64>> {
    let coords = positions
        .into_iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(PopsplitError::Validation(format!(
                "unit '{id}' has an invalid position {p:?}"
            ))),
        })
        .collect::<PopsplitResult<Vec<_>>>()?;
    let mut distinct = coords.clone();
    distinct.dedup();
    if distinct.first() == distinct.last() {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return Err(PopsplitError::Validation(format!(
            "unit '{id}' has a ring with fewer than three distinct positions"
        )));
    }
    Ok(LineString::from(coords))
}
