//! Route synthesis from a cloud of timestamped point features.

use std::path::Path;

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::guide::haversine_km;
use crate::models::{parse_timestamp, Feature, FeatureCollection, Position};

pub const PATH_DESCRIPTION: &str = "Ruta generada desde puntos ordenados por timestamp";
pub const START_DESCRIPTION: &str = "Inicio de la ruta";
pub const END_DESCRIPTION: &str = "Fin de la ruta";

const MIN_ROUTE_POINTS: usize = 2;

/// What to do with a point whose `timestamp` property cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPolicy {
    /// Treat it as the earliest possible instant
    #[default]
    Permissive,
    /// Leave the point out of the route
    Strict,
}

/// Builds a start marker, path and end marker from point features
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteBuilder {
    policy: TimestampPolicy,
}

impl RouteBuilder {
    pub fn new(policy: TimestampPolicy) -> Self {
        Self { policy }
    }

    /// Build a route collection: `[start marker, path, end marker]`
    pub fn build(&self, collection: &FeatureCollection) -> Result<FeatureCollection> {
        let mut points: Vec<(DateTime<Utc>, &Position)> = Vec::new();
        let mut unparsed = 0usize;

        for (feature, position) in collection.points() {
            match feature.property_str("timestamp").and_then(parse_timestamp) {
                Some(ts) => points.push((ts, position)),
                None => {
                    unparsed += 1;
                    if self.policy == TimestampPolicy::Permissive {
                        points.push((DateTime::<Utc>::MIN_UTC, position));
                    }
                }
            }
        }

        if unparsed > 0 {
            warn!(
                "{} points have a missing or unparseable timestamp (policy: {:?})",
                unparsed, self.policy
            );
        }

        if points.len() < MIN_ROUTE_POINTS {
            return Err(PipelineError::InsufficientData {
                found: points.len(),
            });
        }

        // Stable: points sharing a timestamp keep their collection order
        points.sort_by_key(|(ts, _)| *ts);

        let coordinates: Vec<Position> = points.iter().map(|(_, p)| (*p).clone()).collect();
        let first = coordinates[0].clone();
        let last = coordinates[coordinates.len() - 1].clone();

        debug!(
            "Route spans {} points, {:.3} km",
            coordinates.len(),
            path_length_km(&coordinates)
        );

        let features = vec![
            Feature::point(first, description(START_DESCRIPTION)),
            Feature::line_string(coordinates, description(PATH_DESCRIPTION)),
            Feature::point(last, description(END_DESCRIPTION)),
        ];

        info!("Built route from {} points", points.len());

        Ok(FeatureCollection::new(features))
    }
}

/// Build a route with the permissive timestamp policy
pub fn build_route(collection: &FeatureCollection) -> Result<FeatureCollection> {
    RouteBuilder::default().build(collection)
}

/// Name of the route derived from a source blob: `<stem>-ruta.geojson`
pub fn route_blob_name(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source);
    format!("{}-ruta.geojson", stem)
}

/// Sum of haversine legs along a path, in kilometers
pub fn path_length_km(path: &[Position]) -> f64 {
    let points: Vec<Point<f64>> = path.iter().filter_map(Position::to_point).collect();
    points
        .windows(2)
        .map(|leg| haversine_km(leg[0], leg[1]))
        .sum()
}

fn description(text: &str) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert("description".to_string(), Value::String(text.to_string()));
    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lon: f64, lat: f64, timestamp: Option<&str>) -> Feature {
        let mut properties = Map::new();
        if let Some(ts) = timestamp {
            properties.insert("timestamp".to_string(), Value::String(ts.to_string()));
        }
        Feature::point(Position::new(lon, lat, 0.0), properties)
    }

    fn path_of(route: &FeatureCollection) -> Vec<f64> {
        route.features[1]
            .as_line_string()
            .unwrap()
            .iter()
            .map(|p| p.lon().unwrap())
            .collect()
    }

    #[test]
    fn test_orders_by_timestamp() {
        let collection = FeatureCollection::new(vec![
            point(3.0, 0.0, Some("2024-05-01T10:00:03Z")),
            point(1.0, 0.0, Some("2024-05-01T10:00:01Z")),
            point(2.0, 0.0, Some("2024-05-01T10:00:02Z")),
        ]);

        let route = build_route(&collection).unwrap();
        assert_eq!(path_of(&route), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_marker_layout() {
        let collection = FeatureCollection::new(vec![
            point(2.0, 20.0, Some("2024-05-01T10:00:02Z")),
            point(1.0, 10.0, Some("2024-05-01T10:00:01Z")),
        ]);

        let route = build_route(&collection).unwrap();
        assert_eq!(route.len(), 3);

        let start = &route.features[0];
        assert_eq!(start.as_point().unwrap().0, vec![1.0, 10.0, 0.0]);
        assert_eq!(start.property_str("description"), Some(START_DESCRIPTION));

        assert_eq!(
            route.features[1].property_str("description"),
            Some(PATH_DESCRIPTION)
        );

        let end = &route.features[2];
        assert_eq!(end.as_point().unwrap().0, vec![2.0, 20.0, 0.0]);
        assert_eq!(end.property_str("description"), Some(END_DESCRIPTION));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let collection = FeatureCollection::new(vec![
            point(1.0, 0.0, Some("2024-05-01T10:00:00Z")),
            point(2.0, 0.0, Some("2024-05-01T10:00:00Z")),
            point(0.0, 0.0, Some("2024-05-01T09:00:00Z")),
        ]);

        let route = build_route(&collection).unwrap();
        assert_eq!(path_of(&route), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_minimum_points() {
        let one = FeatureCollection::new(vec![point(1.0, 0.0, Some("2024-05-01T10:00:00Z"))]);
        assert!(matches!(
            build_route(&one),
            Err(PipelineError::InsufficientData { found: 1 })
        ));

        let two = FeatureCollection::new(vec![
            point(1.0, 0.0, Some("2024-05-01T10:00:00Z")),
            point(2.0, 0.0, Some("2024-05-01T10:00:01Z")),
        ]);
        assert!(build_route(&two).is_ok());
    }

    #[test]
    fn test_ignores_non_point_features() {
        let collection = FeatureCollection::new(vec![
            point(1.0, 0.0, Some("2024-05-01T10:00:00Z")),
            Feature::line_string(
                vec![Position::new(0.0, 0.0, 0.0), Position::new(1.0, 1.0, 0.0)],
                Map::new(),
            ),
        ]);
        assert!(matches!(
            build_route(&collection),
            Err(PipelineError::InsufficientData { found: 1 })
        ));
    }

    #[test]
    fn test_permissive_policy_puts_bad_timestamps_first() {
        let collection = FeatureCollection::new(vec![
            point(1.0, 0.0, Some("2024-05-01T10:00:00Z")),
            point(9.0, 0.0, Some("yesterday")),
            point(2.0, 0.0, Some("2024-05-01T10:00:01Z")),
            point(8.0, 0.0, None),
        ]);

        let route = build_route(&collection).unwrap();
        assert_eq!(path_of(&route), vec![9.0, 8.0, 1.0, 2.0]);
    }

    #[test]
    fn test_strict_policy_drops_bad_timestamps() {
        let collection = FeatureCollection::new(vec![
            point(1.0, 0.0, Some("2024-05-01T10:00:00Z")),
            point(9.0, 0.0, Some("yesterday")),
            point(2.0, 0.0, Some("2024-05-01T10:00:01Z")),
        ]);

        let route = RouteBuilder::new(TimestampPolicy::Strict)
            .build(&collection)
            .unwrap();
        assert_eq!(path_of(&route), vec![1.0, 2.0]);

        let sparse = FeatureCollection::new(vec![
            point(1.0, 0.0, Some("2024-05-01T10:00:00Z")),
            point(9.0, 0.0, Some("yesterday")),
        ]);
        assert!(matches!(
            RouteBuilder::new(TimestampPolicy::Strict).build(&sparse),
            Err(PipelineError::InsufficientData { found: 1 })
        ));
    }

    #[test]
    fn test_input_is_untouched_and_output_idempotent() {
        let collection = FeatureCollection::new(vec![
            point(2.0, 0.0, Some("2024-05-01T10:00:02Z")),
            point(1.0, 0.0, Some("2024-05-01T10:00:01Z")),
        ]);
        let before = collection.clone();

        let a = build_route(&collection).unwrap().to_pretty_json().unwrap();
        let b = build_route(&collection).unwrap().to_pretty_json().unwrap();
        assert_eq!(a, b);
        assert_eq!(collection, before);
    }

    #[test]
    fn test_route_blob_name() {
        assert_eq!(
            route_blob_name("batch_dev_20240501_103000.geojson"),
            "batch_dev_20240501_103000-ruta.geojson"
        );
        assert_eq!(route_blob_name("walk"), "walk-ruta.geojson");
    }

    #[test]
    fn test_path_length() {
        let path = vec![
            Position::new(0.0, 0.0, 0.0),
            Position::new(1.0, 0.0, 0.0),
            Position::new(2.0, 0.0, 0.0),
        ];
        let km = path_length_km(&path);
        assert!((km - 222.39).abs() < 0.5);
    }
}
