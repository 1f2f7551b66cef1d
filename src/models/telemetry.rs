//! Raw telemetry samples as posted by devices.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Parse a sample timestamp.
///
/// Accepts RFC 3339 and the common zone-less ISO forms, which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_timestamp(&s).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid timestamp '{}'", s))
        }),
    }
}

/// Three-axis sensor reading (accelerometer or gyroscope)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorVector {
    #[serde(alias = "X")]
    pub x: f32,
    #[serde(alias = "Y")]
    pub y: f32,
    #[serde(alias = "Z")]
    pub z: f32,
}

/// GPS fix attached to a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(alias = "Latitude")]
    pub latitude: f64,
    #[serde(alias = "Longitude")]
    pub longitude: f64,
    #[serde(default, alias = "Altitude")]
    pub altitude: f64,
}

/// One raw sensor reading from a device.
///
/// Devices send either camelCase or PascalCase keys, both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    #[serde(alias = "DeviceId")]
    pub device_id: String,

    /// Missing timestamps are filled in with the ingestion time
    #[serde(default, alias = "Timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Samples without a fix are spatially unusable
    #[serde(default, alias = "Location")]
    pub location: Option<Location>,

    #[serde(alias = "Accelerometer")]
    pub accelerometer: SensorVector,

    #[serde(alias = "Gyroscope")]
    pub gyroscope: SensorVector,
}
