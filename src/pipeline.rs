//! Request-level operations: fetch blobs, run the core, persist results.
//!
//! Shared by the HTTP server and the CLI. Core failures surface as [`PipelineError`]
//! inside the returned `anyhow::Error`, so callers can downcast to pick a status.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Config;
use crate::error::PipelineError;
use crate::guide::{GuidanceEngine, GuidanceResult};
use crate::models::FeatureCollection;
use crate::route::{route_blob_name, RouteBuilder};
use crate::store::BlobStore;
use crate::synth::{batch_blob_name, batch_prefix, parse_batch, synthesize_with_report};

/// Outcome of storing one telemetry batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBatch {
    pub name: String,
    pub kept: usize,
    pub dropped: usize,
}

pub struct Pipeline {
    store: Arc<dyn BlobStore>,
    config: Config,
}

impl Pipeline {
    pub fn new(store: Arc<dyn BlobStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Synthesize a raw batch body and store it in the telemetry container
    pub fn save_batch(&self, body: &[u8], now: DateTime<Utc>) -> Result<SavedBatch> {
        let batch = parse_batch(body)?;
        let synthesis = synthesize_with_report(&batch, now)?;

        // synthesize rejects empty batches, so there is a first sample
        let name = batch_blob_name(&batch[0].device_id, now);
        let container = &self.config.storage.telemetry_container;
        self.store
            .put(container, &name, &synthesis.collection.to_pretty_json()?)
            .with_context(|| format!("Failed to store batch {}", name))?;

        info!(
            "Stored batch {} ({} kept, {} dropped)",
            name, synthesis.report.kept, synthesis.report.dropped
        );

        Ok(SavedBatch {
            name,
            kept: synthesis.report.kept,
            dropped: synthesis.report.dropped,
        })
    }

    /// Stored batch names for a device, oldest first
    pub fn list_batches(&self, device_id: &str) -> Result<Vec<String>> {
        self.store.list(
            &self.config.storage.telemetry_container,
            &batch_prefix(device_id),
        )
    }

    /// Build a route from a stored collection and store it next to the source.
    /// Returns the new blob name.
    pub fn generate_route(&self, source: &str) -> Result<String> {
        if source.is_empty() {
            return Err(PipelineError::Validation("missing source blob name".to_string()).into());
        }

        let container = &self.config.storage.telemetry_container;
        let collection = self.load(container, source)?;

        let route = RouteBuilder::new(self.config.route.timestamp_policy).build(&collection)?;

        let name = route_blob_name(source);
        self.store
            .put(container, &name, &route.to_pretty_json()?)
            .with_context(|| format!("Failed to store route {}", name))?;

        info!("Generated route {} from {}", name, source);
        Ok(name)
    }

    /// Guidance for a live position against a stored collection
    pub fn navigate(&self, blob_name: &str, lat: f64, lon: f64) -> Result<GuidanceResult> {
        if blob_name.is_empty() {
            return Err(PipelineError::Validation("missing blobName".to_string()).into());
        }

        let container = self.config.storage.container_for(blob_name);
        info!("Guidance request at ({}, {}) against {}/{}", lat, lon, container, blob_name);

        let collection = self.load(container, blob_name)?;
        let engine = GuidanceEngine::new(self.config.guidance.threshold_km);
        Ok(engine.guide(&collection, lat, lon)?)
    }

    /// Store a client-supplied collection verbatim in the custom route container
    pub fn upload_geojson(&self, name: &str, body: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(PipelineError::Validation("missing fileName".to_string()).into());
        }
        FeatureCollection::from_slice(body)?;

        self.store
            .put(&self.config.storage.custom_route_container, name, body)
            .with_context(|| format!("Failed to store {}", name))?;
        info!("Uploaded custom collection {}", name);
        Ok(())
    }

    /// Raw stored GeoJSON for a client to draw. Custom routes resolve to their own
    /// container, like guidance blobs.
    pub fn fetch(&self, blob_name: &str) -> Result<Vec<u8>> {
        if blob_name.is_empty() {
            return Err(PipelineError::Validation("missing blobName".to_string()).into());
        }

        let container = self.config.storage.container_for(blob_name);
        if !self.store.exists(container, blob_name)? {
            return Err(not_found(container, blob_name).into());
        }

        // The blob may vanish between the two calls
        self.store
            .get(container, blob_name)?
            .ok_or_else(|| not_found(container, blob_name).into())
    }

    fn load(&self, container: &str, name: &str) -> Result<FeatureCollection> {
        let bytes = self
            .store
            .get(container, name)?
            .ok_or_else(|| not_found(container, name))?;
        Ok(FeatureCollection::from_slice(&bytes)?)
    }
}

fn not_found(container: &str, name: &str) -> PipelineError {
    PipelineError::NotFound {
        container: container.to_string(),
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ZoneType;
    use crate::store::MemoryBlobStore;
    use chrono::TimeZone;

    fn pipeline() -> (Pipeline, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        (Pipeline::new(store.clone(), Config::default()), store)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
    }

    fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
        err.downcast_ref::<PipelineError>()
    }

    const BATCH: &str = r#"[
        {"deviceId": "esp32", "timestamp": "2024-05-01T10:00:02Z",
         "location": {"latitude": 3.3730, "longitude": -76.5355, "altitude": 990.0},
         "accelerometer": {"x": 0, "y": 0, "z": 9.8}, "gyroscope": {"x": 0, "y": 0, "z": 0}},
        {"deviceId": "esp32", "timestamp": "2024-05-01T10:00:01Z",
         "accelerometer": {"x": 0, "y": 0, "z": 9.8}, "gyroscope": {"x": 0, "y": 0, "z": 0}},
        {"deviceId": "esp32", "timestamp": "2024-05-01T10:00:00Z",
         "location": {"latitude": 3.3745, "longitude": -76.5367, "altitude": 1000.0},
         "accelerometer": {"x": 0, "y": 0, "z": 9.8}, "gyroscope": {"x": 0, "y": 0, "z": 0}}
    ]"#;

    #[test]
    fn test_batch_to_route_to_guidance() {
        let (pipeline, store) = pipeline();

        let saved = pipeline.save_batch(BATCH.as_bytes(), now()).unwrap();
        assert_eq!(saved.name, "batch_esp32_20240501_103000.geojson");
        assert_eq!((saved.kept, saved.dropped), (2, 1));
        assert_eq!(pipeline.list_batches("esp32").unwrap(), vec![saved.name.clone()]);

        let route_name = pipeline.generate_route(&saved.name).unwrap();
        assert_eq!(route_name, "batch_esp32_20240501_103000-ruta.geojson");

        let bytes = store.get("telemetry-data", &route_name).unwrap().unwrap();
        let route = FeatureCollection::from_slice(&bytes).unwrap();
        assert_eq!(route.features[0].as_point().unwrap().lon(), Some(-76.5367));
        assert_eq!(route.features[2].as_point().unwrap().lon(), Some(-76.5355));

        let near = pipeline.navigate(&route_name, 3.3745, -76.5367).unwrap();
        assert_eq!(near.zone, Some(ZoneType::Unknown));

        let far = pipeline.navigate(&route_name, 4.0, -76.0).unwrap();
        assert!(!far.is_near_zone());
    }

    #[test]
    fn test_zoneless_sample_timestamp_is_accepted() {
        let (pipeline, store) = pipeline();
        let body = r#"[{"deviceId": "esp32", "timestamp": "2024-05-01T10:00:00",
                        "location": {"latitude": 1, "longitude": 2, "altitude": 0},
                        "accelerometer": {"x": 0, "y": 0, "z": 0}, "gyroscope": {"x": 0, "y": 0, "z": 0}}]"#;

        let saved = pipeline.save_batch(body.as_bytes(), now()).unwrap();
        let bytes = store.get("telemetry-data", &saved.name).unwrap().unwrap();
        let collection = FeatureCollection::from_slice(&bytes).unwrap();
        assert_eq!(
            collection.features[0].property_str("timestamp"),
            Some("2024-05-01T10:00:00Z")
        );
    }

    #[test]
    fn test_unstorable_names_are_validation_errors() {
        let (pipeline, _) = pipeline();
        let body = r#"[{"deviceId": "site/dev-1", "location": {"latitude": 1, "longitude": 2, "altitude": 0},
                        "accelerometer": {"x": 0, "y": 0, "z": 0}, "gyroscope": {"x": 0, "y": 0, "z": 0}}]"#;

        let err = pipeline.save_batch(body.as_bytes(), now()).unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::Validation(_))));

        let err = pipeline.generate_route("../batch.geojson").unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::Validation(_))));

        let err = pipeline.navigate("..", 0.0, 0.0).unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::Validation(_))));
    }

    #[test]
    fn test_fetch_stored_geojson() {
        let (pipeline, _) = pipeline();
        let saved = pipeline.save_batch(BATCH.as_bytes(), now()).unwrap();
        let route_name = pipeline.generate_route(&saved.name).unwrap();

        let bytes = pipeline.fetch(&route_name).unwrap();
        let route = FeatureCollection::from_slice(&bytes).unwrap();
        assert_eq!(route.len(), 3);

        let geojson = r#"{"type": "FeatureCollection", "features": []}"#;
        pipeline
            .upload_geojson("customroute_empty.geojson", geojson.as_bytes())
            .unwrap();
        assert_eq!(
            pipeline.fetch("customroute_empty.geojson").unwrap(),
            geojson.as_bytes()
        );

        let err = pipeline.fetch("batch_ghost_20240501_000000.geojson").unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::NotFound { .. })));

        let err = pipeline.fetch("").unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::Validation(_))));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let (pipeline, _) = pipeline();
        let err = pipeline.save_batch(b"[]", now()).unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::Validation(_))));

        let err = pipeline.save_batch(b"", now()).unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::Validation(_))));
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let (pipeline, _) = pipeline();
        let err = pipeline.generate_route("nope.geojson").unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::NotFound { .. })));

        let err = pipeline.navigate("customroute_nope.geojson", 0.0, 0.0).unwrap_err();
        match pipeline_error(&err) {
            Some(PipelineError::NotFound { container, .. }) => assert_eq!(container, "geojsonfiles"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_single_point_route_is_insufficient() {
        let (pipeline, _) = pipeline();
        let body = r#"[{"deviceId": "solo", "location": {"latitude": 1, "longitude": 2, "altitude": 0},
                        "accelerometer": {"x": 0, "y": 0, "z": 0}, "gyroscope": {"x": 0, "y": 0, "z": 0}}]"#;
        let saved = pipeline.save_batch(body.as_bytes(), now()).unwrap();

        let err = pipeline.generate_route(&saved.name).unwrap_err();
        assert!(matches!(
            pipeline_error(&err),
            Some(PipelineError::InsufficientData { found: 1 })
        ));
    }

    #[test]
    fn test_custom_route_upload_and_guidance() {
        let (pipeline, _) = pipeline();
        let geojson = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-76.5328, 3.3759]},
             "properties": {"zoneType": "hallway"}}
        ]}"#;

        pipeline
            .upload_geojson("customroute_lobby.geojson", geojson.as_bytes())
            .unwrap();
        let result = pipeline
            .navigate("customroute_lobby.geojson", 3.3759, -76.5328)
            .unwrap();
        assert_eq!(result.zone, Some(ZoneType::Hallway));

        let err = pipeline.upload_geojson("bad.geojson", b"{}").unwrap_err();
        assert!(matches!(pipeline_error(&err), Some(PipelineError::Validation(_))));
    }
}
