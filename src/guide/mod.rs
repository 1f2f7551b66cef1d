//! Proximity guidance: classify a live position against the nearest route waypoint.

mod distance;

use geo::Point;
use serde::Serialize;
use tracing::{debug, info};

pub use distance::{haversine_km, EARTH_RADIUS_M};

use crate::error::{PipelineError, Result};
use crate::models::{FeatureCollection, ZoneType};

/// Default proximity threshold (50 m)
pub const DEFAULT_THRESHOLD_KM: f64 = 0.05;

pub const NO_ZONE_TEXT: &str = "No se detecta una zona cercana en la ruta.";

/// Guidance for one query position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceResult {
    pub text: String,
    /// Distance to the nearest point; infinite when the collection has no points
    pub distance_km: f64,
    /// Set only when the nearest point is within the threshold
    pub zone: Option<ZoneType>,
    /// Raw `zoneType` of that point, including tags outside the known set
    pub zone_tag: Option<String>,
}

impl GuidanceResult {
    pub fn is_near_zone(&self) -> bool {
        self.zone.is_some()
    }
}

/// Nearest-waypoint guidance over a feature collection
#[derive(Debug, Clone, Copy)]
pub struct GuidanceEngine {
    threshold_km: f64,
}

impl Default for GuidanceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_KM)
    }
}

impl GuidanceEngine {
    pub fn new(threshold_km: f64) -> Self {
        Self { threshold_km }
    }

    /// Find the nearest point feature and describe its zone.
    ///
    /// Linear scan; a later point replaces the best only when strictly closer, so the
    /// first of several equidistant points wins.
    pub fn guide(
        &self,
        collection: &FeatureCollection,
        lat: f64,
        lon: f64,
    ) -> Result<GuidanceResult> {
        validate_query(lat, lon)?;
        let query = Point::new(lon, lat);

        let mut best_km = f64::INFINITY;
        let mut best_tag: Option<&str> = None;
        let mut scanned = 0usize;

        for (feature, position) in collection.points() {
            let Some(point) = position.to_point() else {
                continue;
            };
            scanned += 1;

            let km = haversine_km(query, point);
            if km < best_km {
                best_km = km;
                best_tag = feature.property_str("zoneType");
            }
        }

        debug!(
            "Scanned {} of {} features, nearest at {:.4} km",
            scanned,
            collection.len(),
            best_km
        );

        if best_km > self.threshold_km {
            info!("No zone within {} km of ({}, {})", self.threshold_km, lat, lon);
            return Ok(GuidanceResult {
                text: NO_ZONE_TEXT.to_string(),
                distance_km: best_km,
                zone: None,
                zone_tag: None,
            });
        }

        let zone = ZoneType::from_tag(best_tag);
        info!("Nearest zone: {} at {:.4} km", zone, best_km);

        Ok(GuidanceResult {
            text: format!(
                "Estás cerca de {}. Sigue recto por 15 metros.",
                zone.description()
            ),
            distance_km: best_km,
            zone: Some(zone),
            zone_tag: best_tag.map(String::from),
        })
    }
}

/// Guidance with the default 50 m threshold
pub fn guide(collection: &FeatureCollection, lat: f64, lon: f64) -> Result<GuidanceResult> {
    GuidanceEngine::default().guide(collection, lat, lon)
}

fn validate_query(lat: f64, lon: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(PipelineError::Validation(format!(
            "latitude {} is outside -90..90",
            lat
        )));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(PipelineError::Validation(format!(
            "longitude {} is outside -180..180",
            lon
        )));
    }
    Ok(())
}
