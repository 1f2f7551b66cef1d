//! GeoJSON documents exchanged through the blob store.
//!
//! Coordinates are always `[lon, lat]` or `[lon, lat, alt]`. Geometry types the pipeline
//! does not produce are carried through untouched so a stored collection never loses data.

use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;

const FEATURE_TYPE: &str = "Feature";
const COLLECTION_TYPE: &str = "FeatureCollection";

/// GeoJSON position: `[lon, lat]` or `[lon, lat, alt]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub Vec<f64>);

impl Position {
    pub fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self(vec![lon, lat, alt])
    }

    pub fn lon(&self) -> Option<f64> {
        self.0.first().copied()
    }

    pub fn lat(&self) -> Option<f64> {
        self.0.get(1).copied()
    }

    pub fn alt(&self) -> Option<f64> {
        self.0.get(2).copied()
    }

    /// Planar point (x = lon, y = lat), if the position has both axes
    pub fn to_point(&self) -> Option<Point<f64>> {
        Some(Point::new(self.lon()?, self.lat()?))
    }
}

/// Geometry kinds produced and consumed by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TypedGeometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Geometry {
    Typed(TypedGeometry),
    /// Polygons, malformed points, etc. Kept verbatim.
    Unsupported(Value),
}

fn feature_type() -> String {
    FEATURE_TYPE.to_string()
}

fn collection_type() -> String {
    COLLECTION_TYPE.to_string()
}

/// A single GeoJSON feature with free-form properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub feature_type: String,

    pub geometry: Option<Geometry>,

    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    pub fn point(coordinates: Position, properties: Map<String, Value>) -> Self {
        Self {
            feature_type: feature_type(),
            geometry: Some(Geometry::Typed(TypedGeometry::Point { coordinates })),
            properties: Some(properties),
        }
    }

    pub fn line_string(coordinates: Vec<Position>, properties: Map<String, Value>) -> Self {
        Self {
            feature_type: feature_type(),
            geometry: Some(Geometry::Typed(TypedGeometry::LineString { coordinates })),
            properties: Some(properties),
        }
    }

    /// Point coordinates, or `None` for any other geometry
    pub fn as_point(&self) -> Option<&Position> {
        match &self.geometry {
            Some(Geometry::Typed(TypedGeometry::Point { coordinates })) => Some(coordinates),
            _ => None,
        }
    }

    pub fn as_line_string(&self) -> Option<&[Position]> {
        match &self.geometry {
            Some(Geometry::Typed(TypedGeometry::LineString { coordinates })) => {
                Some(coordinates.as_slice())
            }
            _ => None,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref()?.get(key)
    }

    /// String-valued property, `None` if absent or not a string
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key)?.as_str()
    }
}

/// Ordered group of features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "collection_type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: collection_type(),
            features,
        }
    }

    /// Parse a stored collection
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PipelineError> {
        let collection: Self = serde_json::from_slice(bytes)
            .map_err(|e| PipelineError::Validation(format!("invalid GeoJSON: {}", e)))?;

        if collection.collection_type != COLLECTION_TYPE {
            return Err(PipelineError::Validation(format!(
                "expected a {}, found '{}'",
                COLLECTION_TYPE, collection.collection_type
            )));
        }

        Ok(collection)
    }

    /// Indented JSON, the form collections are persisted in
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, PipelineError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| PipelineError::Validation(format!("unserializable collection: {}", e)))
    }

    /// Iterate over point features only
    pub fn points(&self) -> impl Iterator<Item = (&Feature, &Position)> {
        self.features
            .iter()
            .filter_map(|f| f.as_point().map(|p| (f, p)))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
