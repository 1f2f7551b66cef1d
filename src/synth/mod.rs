//! Feature synthesis: raw telemetry batches to GeoJSON point features.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::models::{Feature, FeatureCollection, Position, SensorVector, TelemetrySample};

/// Counts of samples kept and dropped during one synthesis run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisReport {
    pub kept: usize,
    pub dropped: usize,
}

/// Result of synthesizing one batch
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub collection: FeatureCollection,
    pub report: SynthesisReport,
}

/// Parse a request body (JSON array of samples) into a batch
pub fn parse_batch(body: &[u8]) -> Result<Vec<TelemetrySample>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(PipelineError::Validation(
            "request body must not be empty".to_string(),
        ));
    }

    serde_json::from_slice(body)
        .map_err(|e| PipelineError::Validation(format!("malformed telemetry batch: {}", e)))
}

/// Convert a batch of samples into point features.
///
/// Samples without a location are dropped. Output order follows input order. `now`
/// stands in for any missing sample timestamp.
pub fn synthesize(batch: &[TelemetrySample], now: DateTime<Utc>) -> Result<FeatureCollection> {
    synthesize_with_report(batch, now).map(|s| s.collection)
}

/// Same as [`synthesize`], also returning kept/dropped counts
pub fn synthesize_with_report(batch: &[TelemetrySample], now: DateTime<Utc>) -> Result<Synthesis> {
    if batch.is_empty() {
        return Err(PipelineError::Validation(
            "telemetry batch is empty".to_string(),
        ));
    }

    let mut report = SynthesisReport::default();
    let mut features = Vec::with_capacity(batch.len());

    for (i, sample) in batch.iter().enumerate() {
        if sample.device_id.is_empty() {
            return Err(PipelineError::Validation(format!(
                "sample {} has an empty deviceId",
                i
            )));
        }

        let Some(location) = sample.location else {
            warn!(
                "Skipping sample {} from device {}: no location data",
                i, sample.device_id
            );
            report.dropped += 1;
            continue;
        };

        let timestamp = sample.timestamp.unwrap_or(now);
        let mut properties = Map::new();
        properties.insert(
            "timestamp".to_string(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        properties.insert(
            "accelerometer".to_string(),
            vector_value(&sample.accelerometer),
        );
        properties.insert("gyroscope".to_string(), vector_value(&sample.gyroscope));
        properties.insert(
            "deviceId".to_string(),
            Value::String(sample.device_id.clone()),
        );

        features.push(Feature::point(
            Position::new(location.longitude, location.latitude, location.altitude),
            properties,
        ));
        report.kept += 1;
    }

    debug!(
        "Synthesized {} point features ({} samples dropped)",
        report.kept, report.dropped
    );

    Ok(Synthesis {
        collection: FeatureCollection::new(features),
        report,
    })
}

/// Blob name for a stored batch: `batch_<deviceId>_<yyyyMMdd_HHmmss>.geojson`
pub fn batch_blob_name(device_id: &str, now: DateTime<Utc>) -> String {
    format!("{}{}.geojson", batch_prefix(device_id), now.format("%Y%m%d_%H%M%S"))
}

/// Common prefix of every batch stored for a device
pub fn batch_prefix(device_id: &str) -> String {
    format!("batch_{}_", device_id)
}

fn vector_value(v: &SensorVector) -> Value {
    json!({ "x": widen(v.x), "y": widen(v.y), "z": widen(v.z) })
}

/// f32 -> f64 through the shortest decimal form, so 0.1f32 is written as 0.1
fn widen(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(v as f64)
}
